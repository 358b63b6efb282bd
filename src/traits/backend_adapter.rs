use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::EngineResult;
use crate::models::common::BackendKind;
use crate::models::result::{ ProofError, SingleProofResult };
use crate::models::statement::FormalStatement;

/// Backend-specific settings that affect how dialect text is checked
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialectConfig {
    /// Bumped whenever the dialect or its options change; part of the cache key
    pub version: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// What gets handed to a backend for one statement
#[derive(Debug, Clone)]
pub struct Submission {
    pub statement_id: String,
    pub backend: BackendKind,
    pub dialect_text: String,
    pub hypotheses: Vec<String>,
    pub conclusion: String,
    pub dialect: DialectConfig,
    /// Memory ceiling in megabytes, 0 for none
    pub memory_limit_mb: u64,
}

impl Submission {
    /// Build a submission from a statement, or `None` when the statement has no text for `backend`
    pub fn for_statement(
        statement: &FormalStatement,
        backend: &BackendKind,
        dialect: DialectConfig,
        memory_limit_mb: u64
    ) -> Option<Self> {
        let dialect_text = statement.dialect_text(backend)?;
        Some(Self {
            statement_id: statement.id.clone(),
            backend: backend.clone(),
            dialect_text: dialect_text.to_string(),
            hypotheses: statement.hypotheses.clone(),
            conclusion: statement.conclusion.clone(),
            dialect,
            memory_limit_mb,
        })
    }
}

/// Outcome of the parse-only first pass
#[derive(Debug, Clone, PartialEq)]
pub enum QuickCheckOutcome {
    Parsed,
    /// The backend has no cheap parse mode
    Skipped,
    Rejected(SingleProofResult),
}

/// Availability report for a backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendAvailability {
    pub available: bool,
    pub version: Option<String>,
    pub detail: Option<String>,
}

/// Uniform request/response contract to one proof-assistant process.
///
/// `submit` never fails: every problem, including its own timeout, is
/// classified into the returned result's error list.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Dialect configuration submissions to this backend are checked under
    fn dialect(&self) -> DialectConfig;

    /// Verify a submission, enforcing `timeout` itself
    async fn submit(&self, submission: &Submission, timeout: Duration) -> SingleProofResult;

    /// Cheap parse-only pass; adapters without one return `Skipped`
    async fn quick_check(&self, submission: &Submission, timeout: Duration) -> QuickCheckOutcome;

    /// Check the backend is installed and report its version
    async fn check_availability(&self) -> EngineResult<BackendAvailability>;
}

/// Errors that mean the statement did not even parse
pub fn is_parse_failure(errors: &[ProofError]) -> bool {
    use crate::models::result::ProofErrorKind;
    errors.iter().any(|e| matches!(e.kind, ProofErrorKind::Syntax | ProofErrorKind::Timeout))
}
