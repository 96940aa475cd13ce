//! Content-addressed memoization for the scheduler's hot path.
//!
//! Two namespaces, both keyed by block hash:
//!
//! - `block_miner`: the producer recovered from a block's signature;
//! - `next_miners`: the ordered eligible-miner list for the block following
//!   a given tip.
//!
//! Both are pure functions of chain content, so writes are idempotent and
//! entries never need invalidation; eviction only costs a recomputation.
//! Each namespace is a bounded LRU behind its own mutex (the LRU reorders on
//! read, so even lookups need exclusive access), which also guarantees a
//! reader sees either the prior absence or the complete new entry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::types::{BlockHash, KeyId};

/// Default capacity of each cache namespace, in entries.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Hit/miss snapshot across both namespaces.
#[derive(Clone, Copy, Debug)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to recomputation.
    pub misses: u64,
}

impl CacheStats {
    /// Hit ratio in `0.0..=1.0`; `0.0` before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Process-local memoization store for miner recovery and scheduling.
pub struct MinerCache {
    block_miner: Mutex<LruCache<BlockHash, KeyId>>,
    next_miners: Mutex<LruCache<BlockHash, Vec<KeyId>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for MinerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinerCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl MinerCache {
    /// Creates a cache with [`DEFAULT_CACHE_CAPACITY`] per namespace.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache bounding each namespace to `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            block_miner: Mutex::new(LruCache::new(cap)),
            next_miners: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up the memoized producer of `block`.
    pub fn block_miner(&self, block: &BlockHash) -> Option<KeyId> {
        let found = self.block_miner.lock().get(block).copied();
        self.record(found.is_some());
        found
    }

    /// Memoizes the producer of `block`.
    pub fn put_block_miner(&self, block: BlockHash, miner: KeyId) {
        self.block_miner.lock().put(block, miner);
    }

    /// Looks up the memoized eligible-miner list for the block after `tip`.
    pub fn next_miners(&self, tip: &BlockHash) -> Option<Vec<KeyId>> {
        let found = self.next_miners.lock().get(tip).cloned();
        self.record(found.is_some());
        found
    }

    /// Memoizes the eligible-miner list for the block after `tip`.
    pub fn put_next_miners(&self, tip: BlockHash, miners: Vec<KeyId>) {
        self.next_miners.lock().put(tip, miners);
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for MinerCache {
    fn default() -> Self {
        Self::new()
    }
}
