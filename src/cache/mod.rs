//! Bounded in-memory cache keyed by URL.
//!
//! Entries expire after their own TTL and are purged lazily by the read that
//! finds them stale. A hit moves the entry to the newest position, and a
//! write into a full cache evicts whichever entry currently sits at the
//! oldest position. The result is FIFO eviction that reads nudge toward LRU.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::debug;

/// Counters and sizing reported by [`ResourceCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    /// Position in `ResourceCache::order`
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }
}

/// Keys are compared exactly; no URL normalisation happens here.
#[derive(Debug, Clone)]
pub struct ResourceCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    max_size: usize,
    hits: u64,
    misses: u64,
}

impl<V: Clone> ResourceCache<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            max_size,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Look `key` up as of `now`.
    ///
    /// Every call counts as exactly one hit or one miss; an expired entry is
    /// removed and counted as a miss.
    pub fn get_at(&mut self, key: &str, now: Instant) -> Option<V> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.remove(key);
            self.misses += 1;
            debug!(key = %key, "cache entry expired");
            return None;
        }

        self.hits += 1;
        if self.entries.len() > 1 {
            self.promote(key);
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&mut self, key: &str, value: V, ttl: Duration) {
        self.put_at(key, value, ttl, Instant::now());
    }

    /// Store `value` under `key` at the newest position, stamped with `now`.
    pub fn put_at(&mut self, key: &str, value: V, ttl: Duration, now: Instant) {
        if self.max_size == 0 {
            return;
        }

        let replacing = self.remove_entry(key);
        if !replacing && self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        let seq = self.bump_seq();
        self.order.insert(seq, key.to_string());
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                seq,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.remove_entry(key);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Change capacity, evicting from the oldest end if it shrank.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.entries.len() > self.max_size {
            self.evict_oldest();
        }
    }

    /// Keys from oldest to newest position.
    pub fn keys(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
        }
    }

    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn promote(&mut self, key: &str) {
        let seq = self.bump_seq();
        if let Some(entry) = self.entries.get_mut(key) {
            if let Some(owned) = self.order.remove(&entry.seq) {
                self.order.insert(seq, owned);
            }
            entry.seq = seq;
        }
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.seq);
                true
            }
            None => false,
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((_, key)) = self.order.pop_first() {
            self.entries.remove(&key);
            debug!(key = %key, "evicted oldest cache entry");
        }
    }
}
