use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;

use crate::models::common::{ BackendKind, ComplexityClass, MathDomain, ProofStrategy, StatementKind };

/// An identified formal claim, carrying one formal text per backend dialect.
///
/// Statements are produced by the translation layer and never mutated by the
/// engine; dependencies are plain identifiers so the value stays serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormalStatement {
    pub id: String,
    /// The natural-language sentence this statement was derived from
    pub source_text: String,
    /// Formal text keyed by the backend whose dialect it is written in
    #[serde(default)]
    pub dialects: BTreeMap<BackendKind, String>,
    pub kind: StatementKind,
    #[serde(default)]
    pub domain: MathDomain,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub hypotheses: Vec<String>,
    pub conclusion: String,
    /// Confidence of the extraction/translation step (0-1)
    pub extraction_confidence: f64,
    /// Identifiers of other statements in the same request this one relies on
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub proof_sketch: Option<ProofSketch>,
}

impl FormalStatement {
    /// Formal text for the given backend, if the translator produced one
    pub fn dialect_text(&self, backend: &BackendKind) -> Option<&str> {
        self.dialects
            .get(backend)
            .map(|text| text.as_str())
            .filter(|text| !text.trim().is_empty())
    }
}

/// A declared variable with its type and side constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub var_type: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

/// Informal proof outline attached to a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofSketch {
    pub steps: Vec<ProofStep>,
    pub strategy: ProofStrategy,
    #[serde(default = "default_complexity")]
    pub estimated_complexity: ComplexityClass,
    /// Identifiers of lemmas (statements) the sketch needs
    #[serde(default)]
    pub required_lemmas: Vec<String>,
}

fn default_complexity() -> ComplexityClass {
    ComplexityClass::Unknown
}

/// One step of a proof sketch. Dependencies are indices of strictly earlier steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub description: String,
    #[serde(default)]
    pub formal_step: Option<String>,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub depends_on: Vec<usize>,
}

impl ProofSketch {
    /// Length of the longest dependency chain, counted in steps.
    ///
    /// Assumes the sketch already passed ingestion, i.e. every dependency points
    /// to an earlier step; anything else is ignored here.
    pub fn dependency_depth(&self) -> usize {
        let mut depth = vec![0usize; self.steps.len()];
        for (index, step) in self.steps.iter().enumerate() {
            let deepest = step.depends_on
                .iter()
                .filter(|&&dep| dep < index)
                .map(|&dep| depth[dep])
                .max()
                .unwrap_or(0);
            depth[index] = deepest + 1;
        }
        depth.into_iter().max().unwrap_or(0)
    }
}
