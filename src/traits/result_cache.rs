use serde::{ Deserialize, Serialize };
use sha2::{ Digest, Sha256 };
use std::fmt;

use crate::errors::EngineResult;
use crate::models::common::BackendKind;
use crate::models::result::SingleProofResult;

/// Stable cache key for a (dialect text, backend, dialect version) triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(dialect_text: &str, backend: &BackendKind, dialect_version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(backend.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(dialect_version.as_bytes());
        hasher.update([0u8]);
        hasher.update(dialect_text.as_bytes());
        let digest = hasher.finalize();
        Fingerprint(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs
        write!(f, "{}", &self.0[..self.0.len().min(12)])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Cross-request memo of backend results.
///
/// Lookups are synchronous and must never wait on a backend. Concurrent
/// writers to the same key are allowed; the last write wins.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &Fingerprint) -> EngineResult<Option<SingleProofResult>>;

    fn put(&self, key: Fingerprint, result: SingleProofResult) -> EngineResult<()>;

    fn invalidate(&self, key: &Fingerprint);

    fn clear(&self);

    /// Drop expired entries, returning how many were removed
    fn purge_expired(&self) -> usize;

    fn stats(&self) -> CacheStats;
}
