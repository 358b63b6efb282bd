use thiserror::Error;

use crate::config::ConfigError;

/// Error types for the validation engine.
///
/// Backend failures are not errors: they are classified inside the
/// corresponding `SingleProofResult`. What remains here is malformed input,
/// bad configuration and conditions the engine cannot recover from.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate {entity} identifier: {id}")]
    DuplicateIdentifier { entity: &'static str, id: String },

    #[error("{from} references unknown {entity} {to}")]
    UnknownReference { from: String, entity: &'static str, to: String },

    #[error("Statement {0} depends on itself")]
    SelfDependency(String),

    #[error("Proof sketch of {statement}: step {step} depends on step {dependency}, which is not an earlier step")]
    CyclicStepDependency { statement: String, step: usize, dependency: usize },

    #[error("Statement {statement} uses undeclared variable {variable}")]
    UndeclaredVariable { statement: String, variable: String },

    #[error("{field} of {owner} is out of range: {value}")]
    OutOfRange { owner: String, field: &'static str, value: f64 },

    #[error("No usable backend for statement {0}")]
    NoUsableBackend(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Result cache corrupted: {0}")]
    CacheCorruption(String),

    #[error("Validation task failed: {0}")]
    TaskFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type specific to engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Rejected before any backend call was made
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidInput(_) |
                EngineError::DuplicateIdentifier { .. } |
                EngineError::UnknownReference { .. } |
                EngineError::SelfDependency(_) |
                EngineError::CyclicStepDependency { .. } |
                EngineError::UndeclaredVariable { .. } |
                EngineError::OutOfRange { .. } |
                EngineError::NoUsableBackend(_)
        )
    }

    /// Failure of the whole request, distinct from a negative verdict
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::CacheCorruption(_) | EngineError::TaskFailure(_) | EngineError::Io(_)
        )
    }
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::FileReadError(e) => EngineError::Io(e),
            other => EngineError::Configuration(other.to_string()),
        }
    }
}

/// Recoverable vs. non-recoverable errors
pub trait RecoverableError {
    fn is_recoverable(&self) -> bool;
    fn recovery_strategy(&self) -> Option<String>;
}

impl RecoverableError for EngineError {
    fn is_recoverable(&self) -> bool {
        !self.is_fatal()
    }

    fn recovery_strategy(&self) -> Option<String> {
        match self {
            EngineError::CyclicStepDependency { .. } =>
                Some("Reorder the proof sketch so every step only cites earlier steps".to_string()),
            EngineError::UnknownReference { .. } =>
                Some("Include every referenced statement and claim in the same request".to_string()),
            EngineError::UndeclaredVariable { variable, .. } =>
                Some(format!("Declare variable {} with its type", variable)),
            EngineError::NoUsableBackend(_) =>
                Some("Register an adapter for, or supply dialect text in, at least one configured backend".to_string()),
            EngineError::Configuration(_) => Some("Fix the configuration and resubmit".to_string()),
            EngineError::CacheCorruption(_) => Some("Clear the result cache".to_string()),
            _ => None,
        }
    }
}
