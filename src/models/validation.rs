use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::{ fmt, time::Duration };

use crate::config::ProofAssistantConfig;
use crate::models::common::{ duration_ms, BackendKind };
use crate::models::complexity::ComplexityReport;
use crate::models::result::SingleProofResult;

/// How severe a detected contradiction is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionSeverity {
    Minor,
    Major,
    Critical,
}

impl fmt::Display for ContradictionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContradictionSeverity::Minor => write!(f, "minor"),
            ContradictionSeverity::Major => write!(f, "major"),
            ContradictionSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Which detection rule produced a contradiction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// Two validated conclusions negate each other
    Negation,
    /// A validated statement relies on something another validated statement refutes
    DependencyConflict,
    /// The declared dependency graph loops back on itself
    DependencyCycle,
}

/// A set of mutually inconsistent statements found by one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalContradiction {
    /// Sorted, distinct, at least two entries
    pub statement_ids: Vec<String>,
    pub kind: ContradictionKind,
    pub description: String,
    pub severity: ContradictionSeverity,
    #[serde(default)]
    pub resolution_hint: Option<String>,
    /// Backend whose dialect the contradiction was recognized in
    #[serde(default)]
    pub backend: Option<BackendKind>,
}

impl LogicalContradiction {
    pub fn involves(&self, statement_id: &str) -> bool {
        self.statement_ids.iter().any(|id| id == statement_id)
    }
}

/// Consistency block of a validation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    /// Backends agree on each statement's validity
    pub internal_consistent: bool,
    /// No contradictions across statements
    pub external_consistent: bool,
    pub contradictions: Vec<LogicalContradiction>,
    /// Weighted agreement in [0, 1]
    pub score: f64,
    #[serde(default)]
    pub statement_scores: BTreeMap<String, f64>,
}

impl ConsistencyReport {
    /// Narrow a request-wide report down to what concerns one statement
    pub fn for_statement(&self, statement_id: &str, internal_consistent: bool) -> Self {
        let contradictions: Vec<LogicalContradiction> = self.contradictions
            .iter()
            .filter(|c| c.involves(statement_id))
            .cloned()
            .collect();
        let score = self.statement_scores.get(statement_id).copied().unwrap_or(0.0);
        let mut statement_scores = BTreeMap::new();
        statement_scores.insert(statement_id.to_string(), score);

        Self {
            internal_consistent,
            external_consistent: contradictions.is_empty(),
            contradictions,
            score,
            statement_scores,
        }
    }
}

/// Bookkeeping attached to every result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetadata {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(with = "duration_ms")]
    pub total_time: Duration,
    /// Backends that produced a result, live or cached, including timeouts
    pub assistants_used: Vec<BackendKind>,
    #[serde(default)]
    pub cached_backends: Vec<BackendKind>,
    /// Configured backends that could not be used for lack of an adapter or dialect text
    #[serde(default)]
    pub skipped_backends: Vec<BackendKind>,
    pub config: ProofAssistantConfig,
}

/// The engine's verdict on one formal statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofValidationResult {
    pub statement_id: String,
    pub primary_backend: BackendKind,
    pub primary_result: SingleProofResult,
    #[serde(default)]
    pub secondary_results: BTreeMap<BackendKind, SingleProofResult>,
    pub consistency: ConsistencyReport,
    pub complexity: ComplexityReport,
    /// Primary verdict after confidence and error thresholds
    pub valid: bool,
    /// Valid and consistent enough to be trusted
    pub accepted: bool,
    #[serde(default)]
    pub rejection_reasons: Vec<String>,
    pub metadata: ValidationMetadata,
}

impl ProofValidationResult {
    /// Every (backend, result) pair, primary first
    pub fn all_results(&self) -> impl Iterator<Item = (&BackendKind, &SingleProofResult)> {
        std::iter
            ::once((&self.primary_backend, &self.primary_result))
            .chain(self.secondary_results.iter())
    }

    pub fn timed_out_backends(&self) -> Vec<BackendKind> {
        self.all_results()
            .filter(|(_, result)| result.is_timeout())
            .map(|(backend, _)| backend.clone())
            .collect()
    }
}

/// Outcome for one claim of the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimVerdict {
    pub claim_id: String,
    pub statement_ids: Vec<String>,
    /// True when every supporting statement was accepted
    pub supported: bool,
}

/// Request-wide report returned by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: BTreeMap<String, ProofValidationResult>,
    #[serde(default)]
    pub claims: Vec<ClaimVerdict>,
    pub consistency: ConsistencyReport,
    pub accepted: bool,
    pub metadata: ValidationMetadata,
}
