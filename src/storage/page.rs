//! Page identity and sizing.
//!
//! A page is a fixed-size block of bytes identified by a non-negative
//! integer. The buffer pool never interprets page contents; it only moves
//! whole `PAGE_SIZE` buffers between frames and the page file.

/// Fixed page size, in bytes, for every page in every page file.
pub const PAGE_SIZE: usize = 4096;

/// Page identity. Signed so the `NO_PAGE` sentinel is representable
/// without an `Option` wrapper, matching the frame table's invariants.
pub type PageNum = i64;

/// Sentinel page number meaning "this frame holds no page".
pub const NO_PAGE: PageNum = -1;
