use serde::{ Deserialize, Serialize };
use std::{ fmt, time::Duration };

use crate::models::common::{ duration_ms, ComplexityClass, ResourceUsage };

/// Category every backend failure is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofErrorKind {
    Syntax,
    Type,
    Logic,
    Incomplete,
    Timeout,
}

impl fmt::Display for ProofErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofErrorKind::Syntax => write!(f, "syntax"),
            ProofErrorKind::Type => write!(f, "type"),
            ProofErrorKind::Logic => write!(f, "logic"),
            ProofErrorKind::Incomplete => write!(f, "incomplete"),
            ProofErrorKind::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofError {
    pub kind: ProofErrorKind,
    pub message: String,
    #[serde(default)]
    pub line: Option<usize>,
}

impl ProofError {
    pub fn new(kind: ProofErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }
}

/// One backend's verdict on one statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleProofResult {
    pub valid: bool,
    pub confidence: f64,
    #[serde(default)]
    pub proof_text: Option<String>,
    #[serde(default)]
    pub errors: Vec<ProofError>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(with = "duration_ms")]
    pub verification_time: Duration,
    #[serde(default)]
    pub resource_usage: ResourceUsage,
    /// Complexity class the backend reported for the statement, if any
    #[serde(default)]
    pub reported_complexity: Option<ComplexityClass>,
    /// Axioms the backend says the proof relies on
    #[serde(default)]
    pub axioms_used: Vec<String>,
}

impl SingleProofResult {
    /// Terminal result for a run that hit its budget or was cancelled
    pub fn timed_out(elapsed: Duration, message: impl Into<String>) -> Self {
        Self::failed(ProofError::new(ProofErrorKind::Timeout, message), elapsed, ResourceUsage::timed_out())
    }

    pub fn failed(error: ProofError, elapsed: Duration, resource_usage: ResourceUsage) -> Self {
        Self {
            valid: false,
            confidence: 0.0,
            proof_text: None,
            errors: vec![error],
            warnings: Vec::new(),
            verification_time: elapsed,
            resource_usage,
            reported_complexity: None,
            axioms_used: Vec::new(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.resource_usage.timeout
    }

    pub fn has_error(&self, kind: ProofErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn status(&self) -> VerificationStatus {
        if self.is_timeout() {
            VerificationStatus::Timeout
        } else if self.valid {
            VerificationStatus::Verified
        } else if self.errors.is_empty() {
            VerificationStatus::Unverified
        } else {
            VerificationStatus::Failed(self.errors.iter().map(|e| e.kind).collect())
        }
    }
}

/// Coarse status derived from a result, used for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    Unverified,
    Failed(Vec<ProofErrorKind>),
    Timeout,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "Verified"),
            VerificationStatus::Unverified => write!(f, "Unverified"),
            VerificationStatus::Failed(kinds) => {
                if kinds.is_empty() {
                    write!(f, "Failed")
                } else {
                    let kinds: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                    write!(f, "Failed: {}", kinds.join(", "))
                }
            }
            VerificationStatus::Timeout => write!(f, "Timeout"),
        }
    }
}
