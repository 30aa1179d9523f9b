//! A fixed-capacity, write-back block cache with LRU replacement.
//!
//! # Format
//!
//! [Cache] keeps up to `capacity` blocks in memory, each in its own boxed [crate::Block] buffer.
//! Three structures track them:
//!
//! ```text
//! index:   block id    -> slot
//! recency: last access -> slot   (ordered, smallest first)
//! entries: slot        -> (block id, last access, dirty, data)
//! ```
//!
//! Every read or write of a resident block (and every admission) draws a fresh stamp from a
//! monotonic access counter, so stamps are unique and the first key of `recency` is always the
//! least recently used block.
//!
//! # Eviction
//!
//! A miss on a full cache evicts the least recently used block and reuses its buffer. Dirty
//! victims are written back first. If the write-back fails, the miss fails and the victim remains
//! resident (and dirty), so no data is lost.
//!
//! # Statistics
//!
//! Only reads count as hits or misses. A read miss is counted before the block is fetched, so a
//! miss whose fetch fails still counts.

use crate::MAX_CACHE_BLOCKS;
use std::num::NonZeroUsize;

mod storage;
pub use storage::Cache;

/// Configuration for [Cache].
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of resident blocks.
    pub capacity: NonZeroUsize,
}

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(MAX_CACHE_BLOCKS) {
    Some(capacity) => capacity,
    None => panic!("MAX_CACHE_BLOCKS must be non-zero"),
};

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Lookup counters of a [Cache].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub hits: u64,
    pub misses: u64,
}

impl Stats {
    /// Total number of reads observed.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of reads served from memory, if any reads have happened.
    pub fn hit_rate(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            lookups => Some(self.hits as f64 / lookups as f64),
        }
    }
}
