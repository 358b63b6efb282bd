use dashmap::DashMap;
use log::{ debug, warn };
use std::sync::atomic::{ AtomicU64, Ordering };
use std::time::{ Duration, Instant };

use crate::errors::{ EngineError, EngineResult };
use crate::models::result::SingleProofResult;
use crate::traits::result_cache::{ CacheStats, Fingerprint, ResultCache };

struct CacheEntry {
    key: Fingerprint,
    result: SingleProofResult,
    inserted_at: Instant,
}

/// In-memory result cache shared across requests.
///
/// Backed by a sharded `DashMap`, so lookups for unrelated fingerprints do not
/// contend with each other.
pub struct MemoryResultCache {
    entries: DashMap<Fingerprint, CacheEntry>,
    ttl: Option<Duration>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryResultCache {
    pub fn new(ttl: Option<Duration>, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// One hour TTL, ten thousand entries
    pub fn with_defaults() -> Self {
        Self::new(Some(Duration::from_secs(3600)), 10_000)
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.ttl.map(|ttl| entry.inserted_at.elapsed() > ttl).unwrap_or(false)
    }

    fn evict_oldest(&self) {
        let oldest = self.entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Evicted cache entry {}", key);
            }
        }
    }
}

fn check_integrity(key: &Fingerprint, entry: &CacheEntry) -> EngineResult<()> {
    if &entry.key != key {
        return Err(
            EngineError::CacheCorruption(
                format!("entry stored under {} claims fingerprint {}", key, entry.key)
            )
        );
    }
    let confidence = entry.result.confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(
            EngineError::CacheCorruption(
                format!("entry {} holds confidence {} outside [0, 1]", key, confidence)
            )
        );
    }
    Ok(())
}

impl ResultCache for MemoryResultCache {
    fn get(&self, key: &Fingerprint) -> EngineResult<Option<SingleProofResult>> {
        let found = match self.entries.get(key) {
            Some(entry) => {
                check_integrity(key, &entry)?;
                if self.is_expired(&entry) { None } else { Some(entry.result.clone()) }
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        match found {
            Some(mut result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                result.verification_time = Duration::ZERO;
                Ok(Some(result))
            }
            None => {
                // Expired: drop it so the next writer starts clean
                self.entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache entry {} expired", key);
                Ok(None)
            }
        }
    }

    fn put(&self, key: Fingerprint, result: SingleProofResult) -> EngineResult<()> {
        if result.is_timeout() {
            warn!("Refusing to cache timed-out result for {}", key);
            return Ok(());
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key.clone(), CacheEntry {
            key,
            result,
            inserted_at: Instant::now(),
        });
        Ok(())
    }

    fn invalidate(&self, key: &Fingerprint) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        before.saturating_sub(self.entries.len())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Cache that never stores anything
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCache;

impl ResultCache for DisabledCache {
    fn get(&self, _key: &Fingerprint) -> EngineResult<Option<SingleProofResult>> {
        Ok(None)
    }

    fn put(&self, _key: Fingerprint, _result: SingleProofResult) -> EngineResult<()> {
        Ok(())
    }

    fn invalidate(&self, _key: &Fingerprint) {}

    fn clear(&self) {}

    fn purge_expired(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}
