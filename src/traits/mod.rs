pub mod backend_adapter;
pub mod result_cache;

// Re-export traits
pub use backend_adapter::{
    BackendAdapter,
    BackendAvailability,
    DialectConfig,
    QuickCheckOutcome,
    Submission,
};
pub use result_cache::{ CacheStats, Fingerprint, ResultCache };
