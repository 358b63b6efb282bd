use serde::{ Deserialize, Serialize };

use crate::config::ProofAssistantConfig;
use crate::models::statement::FormalStatement;

/// A natural-language claim extracted from a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathClaim {
    pub id: String,
    pub text: String,
    /// Identifiers of the formal statements supporting this claim
    pub statement_ids: Vec<String>,
    pub location: SourceLocation,
    pub kind: ClaimKind,
    /// Strength of the textual evidence (0-1)
    pub evidence_strength: f64,
    /// Identifiers of other claims this claim builds on
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Where in the source text a claim was found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub document: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    Theorem,
    Lemma,
    Definition,
    Corollary,
    Conjecture,
    Citation,
    Observation,
}

/// Caller-supplied context for a validation request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    #[serde(default)]
    pub related_citations: Vec<String>,
    #[serde(default)]
    pub document: DocumentMetadata,
    #[serde(default)]
    pub expertise: ExpertiseLevel,
    #[serde(default)]
    pub required_checks: Vec<RequiredCheck>,
}

impl ValidationContext {
    pub fn requires(&self, check: RequiredCheck) -> bool {
        self.required_checks.contains(&check)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Novice,
    #[default]
    Intermediate,
    Expert,
}

/// Checks a caller can insist on; they only ever tighten the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredCheck {
    SyntaxPrecheck,
    CrossValidation,
}

/// Everything the extraction layer hands to the engine in one go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub statements: Vec<FormalStatement>,
    #[serde(default)]
    pub claims: Vec<MathClaim>,
    #[serde(default)]
    pub context: ValidationContext,
    #[serde(default)]
    pub config: ProofAssistantConfig,
}
