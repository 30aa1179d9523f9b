//! Absorb repeated block reads and writes with a fixed-capacity write-back cache.
//!
//! [Cache] sits between a client and a block-addressable [store::Store]. Blocks are fixed-size
//! ([BLOCK_SIZE] bytes) and addressed by a 64-bit id. The store is only touched on a read miss, when
//! a dirty block is evicted, and on [Cache::flush].
//!
//! # Replacement
//!
//! Every access (read or write) stamps the touched block with the next value of a monotonic
//! counter. When the cache is full, the block with the smallest stamp (the least recently used one)
//! is evicted. If the victim is dirty, it is written back first; if that write fails, the operation
//! that needed the slot fails and the victim stays resident (and dirty).
//!
//! # Writes
//!
//! Writes always cover a full block, so a write miss never reads from the store. The written block
//! is dirty until it is flushed or evicted.
//!
//! # Example
//!
//! ```rust
//! use blockcache::{store::memory, Cache, Config, BLOCK_SIZE};
//! use prometheus_client::registry::Registry;
//!
//! let mut registry = Registry::default();
//! let store = memory::Store::default();
//! let mut cache = Cache::init(store.clone(), Config::default(), &mut registry).unwrap();
//!
//! // Write a block (stays in memory)
//! cache.write(5, &[0xBB; BLOCK_SIZE]).unwrap();
//! assert!(store.block(5).is_none());
//!
//! // Read it back (a hit)
//! let mut buf = [0u8; BLOCK_SIZE];
//! cache.read(5, &mut buf).unwrap();
//! assert_eq!(buf[0], 0xBB);
//! assert_eq!(cache.stats().hits, 1);
//!
//! // Persist it
//! cache.close().unwrap();
//! assert_eq!(store.block(5).unwrap()[0], 0xBB);
//! ```

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

mod cache;
pub use cache::{Cache, Config, Stats};
pub mod store;

/// Size of a block in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Default maximum number of blocks held by a [Cache].
pub const MAX_CACHE_BLOCKS: usize = 1024;

/// Numeric status reported for a successful operation.
pub const SUCCESS: i32 = 0;

/// Numeric status reported for a failed operation.
pub const ERROR: i32 = -1;

/// A single block of data.
pub type Block = [u8; BLOCK_SIZE];

/// Errors that can occur when interacting with a [Cache] or a [store::Store].
#[derive(Debug, Error)]
pub enum Error {
    #[error("buffer too small: {0} bytes (need {BLOCK_SIZE})")]
    BufferTooSmall(usize),
    #[error("allocation failed")]
    AllocationFailed,
    #[error("offset overflow for block {0}")]
    OffsetOverflow(u64),
    #[error("read of block {0} failed: {1}")]
    ReadFailed(u64, IoError),
    #[error("write of block {0} failed: {1}")]
    WriteFailed(u64, IoError),
    #[error("store open failed: {0:?} error: {1}")]
    StoreOpenFailed(PathBuf, IoError),
}

impl Error {
    /// Collapse the error into the numeric status channel ([ERROR]).
    pub fn code(&self) -> i32 {
        ERROR
    }
}

/// Convert the outcome of an operation into its numeric status ([SUCCESS] or [ERROR]).
pub fn status<T>(result: &Result<T, Error>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(err) => err.code(),
    }
}
