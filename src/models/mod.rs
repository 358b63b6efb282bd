pub mod common;
pub mod statement;
pub mod claim;
pub mod result;
pub mod complexity;
pub mod validation;

// Re-export common model types
pub use common::{ BackendKind, ComplexityClass, MathDomain, ResourceUsage, StatementKind };
pub use statement::{ FormalStatement, ProofSketch, ProofStep, Variable };
pub use claim::{ MathClaim, RequiredCheck, ValidationContext, ValidationRequest };
pub use result::{ ProofError, ProofErrorKind, SingleProofResult, VerificationStatus };
pub use complexity::{ ComplexityReport, ProofDifficulty };
pub use validation::{
    ClaimVerdict,
    ConsistencyReport,
    ContradictionKind,
    ContradictionSeverity,
    LogicalContradiction,
    ProofValidationResult,
    ValidationMetadata,
    ValidationReport,
};
