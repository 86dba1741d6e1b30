//! bufmgr - a fixed-capacity buffer pool manager for a page-granular file store
//!
//! Pins/unpins pages by number, serving hits from an in-memory frame table
//! and faulting misses in from a backing page file, replacing frames under
//! a caller-selected FIFO, LRU, or CLOCK policy when the pool is full.

pub mod storage;

pub use storage::{
    is_open, BufferError, BufferPool, BufferStats, FileError, PageFile, PageHandle, PageNum,
    Strategy, NO_PAGE, PAGE_SIZE,
};

/// Crate version, as set in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
