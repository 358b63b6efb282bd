pub mod models;
pub mod traits;
pub mod errors;
pub mod config;
pub mod implementations;
#[cfg(test)]
pub mod tests;

// Re-export core components
pub use config::{ AcceptanceThresholds, PerformanceOptions, ProofAssistantConfig, TimeoutBudget };
pub use errors::{ EngineError, EngineResult, RecoverableError };
pub use implementations::{
    backend_config::BackendRegistryConfig,
    complexity::ComplexityEstimator,
    consistency::{ ConfidenceHistory, ConsistencyAnalyzer, WeightingPolicy },
    dispatcher::{ DispatchOutcome, RequestBudget, SessionDispatcher },
    negation::NegationRecognizer,
    orchestrator::ValidationOrchestrator,
    process_backend::{ ProcessBackend, ProcessBackendConfig },
    result_cache::{ DisabledCache, MemoryResultCache },
};
pub use models::{
    common::{
        BackendKind,
        ComplexityClass,
        MathDomain,
        ProofStrategy,
        StatementKind,
    },
    statement::{
        FormalStatement,
        ProofSketch,
        ProofStep,
        Variable,
    },
    claim::{
        MathClaim,
        RequiredCheck,
        ValidationContext,
        ValidationRequest,
    },
    result::{
        ProofError,
        ProofErrorKind,
        SingleProofResult,
        VerificationStatus,
    },
    complexity::{ ComplexityReport, ProofDifficulty },
    validation::{
        ConsistencyReport,
        LogicalContradiction,
        ContradictionSeverity,
        ProofValidationResult,
        ValidationReport,
    },
};
pub use traits::{
    BackendAdapter,
    DialectConfig,
    Fingerprint,
    QuickCheckOutcome,
    ResultCache,
    Submission,
};
