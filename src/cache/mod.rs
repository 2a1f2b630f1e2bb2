//! Prompt-decision cache.
//!
//! Prompt-firewall evaluation is pure in the query text, so identical
//! queries can reuse a previous decision until the firewall rules change.
//! The engine clears this cache on every prompt snapshot swap.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::Decision;

/// Cache hit and miss counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that returned a cached decision
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Entries currently held
    pub entries: usize,
}

struct CachedDecision {
    decision: Decision,
    inserted_at: Instant,
}

/// LRU cache of prompt-firewall decisions keyed by query hash.
pub struct DecisionCache {
    entries: Mutex<LruCache<[u8; 32], CachedDecision>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    /// Create a cache with the given capacity and entry TTL.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn key(query: &str) -> [u8; 32] {
        *blake3::hash(query.as_bytes()).as_bytes()
    }

    /// Look up a cached decision for a query. Expired entries are evicted
    /// on access.
    pub fn get(&self, query: &str) -> Option<Decision> {
        let key = Self::key(query);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(cached) if cached.inserted_at.elapsed() <= self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(cached.decision.clone())
            }
            Some(_) => {
                entries.pop(&key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache a decision for a query.
    pub fn insert(&self, query: &str, decision: Decision) {
        let key = Self::key(query);
        self.entries.lock().put(
            key,
            CachedDecision {
                decision,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry. Called when the prompt rules change.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.lock().len(),
        }
    }
}
