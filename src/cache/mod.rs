#[cfg(test)]
mod tests;

use lru::LruCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::pipeline::Answer;

/// In-memory cache for generated answers with TTL expiration and LRU eviction.
///
/// All operations lock an internal mutex, so one instance can be shared across
/// concurrent request handlers without external synchronization. Hit and miss
/// counters are cumulative for the process lifetime and survive `clear`.
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

struct CacheEntry {
    answer: Answer,
    inserted_at: Instant,
}

/// Read-only cache statistics snapshot.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: String,
}

/// Derive the cache key for a question: `hex(sha256(lowercase(trim(question))))`.
/// Questions differing only in case or surrounding whitespace share a key.
#[inline]
pub fn cache_key(question: &str) -> String {
    let normalized = question.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

impl ResponseCache {
    #[inline]
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("capacity is at least 1");
        info!(
            "ResponseCache initialized: max_size={}, ttl={}s",
            capacity,
            ttl.as_secs()
        );
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_size: capacity.get(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached answer, counting a hit or miss either way.
    /// Expired entries are dropped and reported as misses.
    #[inline]
    pub fn get(&self, question: &str) -> Option<Answer> {
        let key = cache_key(question);
        let mut entries = self.entries.lock().expect("cache mutex poisoned");

        let expired = entries
            .peek(&key)
            .is_some_and(|entry| entry.inserted_at.elapsed() >= self.ttl);
        if expired {
            entries.pop(&key);
        }

        match entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache HIT for question: {:.50}...", question);
                Some(entry.answer.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache MISS for question: {:.50}...", question);
                None
            }
        }
    }

    /// Insert or overwrite an answer; evicts the least-recently-used entry when
    /// the cache is at capacity.
    #[inline]
    pub fn set(&self, question: &str, answer: Answer) {
        let key = cache_key(question);
        let entry = CacheEntry {
            answer,
            inserted_at: Instant::now(),
        };
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .put(key, entry);
        debug!("Cached response for question: {:.50}...", question);
    }

    /// Drop all entries. Counters are cumulative and deliberately untouched.
    #[inline]
    pub fn clear(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
        info!("Response cache cleared");
    }

    #[inline]
    pub fn stats(&self) -> CacheStats {
        let size = self.entries.lock().expect("cache mutex poisoned").len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            size,
            max_size: self.max_size,
            ttl_seconds: self.ttl.as_secs(),
            hits,
            misses,
            hit_rate: format!("{:.1}%", hit_rate),
        }
    }
}
