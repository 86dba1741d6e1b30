//! Buffer pool: the fixed-capacity frame table and its coordinator.
//!
//! This is the Rust shape of `original_source/buffer_mgr.c`'s `PoolMgmt` and
//! its `pinPage`/`unpinPage`/`markDirty`/`forcePage`/`shutdownBufferPool`
//! entry points, reworked per the interface's own concurrency note: a single
//! [`std::sync::Mutex`] guards all pool state end to end for every public
//! call, rather than the per-frame locks a teacher buffer manager might
//! reach for. `num_read_io`/`num_write_io` live outside that mutex as
//! atomics, matching the original's unlocked `getNumReadIO`/`getNumWriteIO`.

use crate::storage::file::{FileError, PageFile};
use crate::storage::index::PageIndex;
use crate::storage::page::{PageNum, NO_PAGE, PAGE_SIZE};
use crate::storage::policy::{AnyPolicy, Strategy};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

/// Buffer pool errors.
///
/// `FileHandleNotInit` is kept for parity with the taxonomy this adapter
/// mirrors (many operations in the original can observe an uninitialized
/// pool), but it's effectively unreachable here: a [`BufferPool`] only
/// exists once `init` has succeeded, and `shutdown` consumes it by value,
/// so there's no handle left to call a method on afterwards. Ownership
/// does the job a null check did in the original.
#[derive(Error, Debug)]
pub enum BufferError {
    #[error("invalid arguments: {0}")]
    BadArgs(String),

    #[error("buffer pool file handle not initialized")]
    FileHandleNotInit,

    #[error("page {0} is not resident in the buffer pool")]
    ReadOfNonExistingPage(PageNum),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
}

impl From<FileError> for BufferError {
    fn from(e: FileError) -> Self {
        match e {
            FileError::FileNotFound(p) => BufferError::FileNotFound(p),
            other => BufferError::WriteFailed(other.to_string()),
        }
    }
}

/// One slot in the frame table.
///
/// `fifo_pos` is stamped only when a page is loaded; `last_used` is
/// stamped on every pin, hit or miss; `ref_bit` is set on every pin and
/// cleared by the CLOCK sweep as it gives a frame a second chance.
pub(crate) struct Frame {
    pub(crate) page_num: PageNum,
    pub(crate) data: Box<[u8; PAGE_SIZE]>,
    pub(crate) dirty: bool,
    pub(crate) fix_count: u32,
    pub(crate) last_used: u64,
    pub(crate) fifo_pos: u64,
    pub(crate) ref_bit: bool,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self {
            page_num: NO_PAGE,
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
            fix_count: 0,
            last_used: 0,
            fifo_pos: 0,
            ref_bit: false,
        }
    }

    /// A frame is a replacement candidate once it holds a page and nobody
    /// has it pinned.
    pub(crate) fn is_eligible(&self) -> bool {
        self.fix_count == 0 && self.page_num != NO_PAGE
    }

    fn reset(&mut self) {
        self.page_num = NO_PAGE;
        self.dirty = false;
        self.fix_count = 0;
        self.last_used = 0;
        self.fifo_pos = 0;
        self.ref_bit = false;
    }
}

/// A pinned page's direct, unsynchronized window into its frame buffer.
///
/// Obtained while the pool mutex is held, valid until the matching
/// `unpin`. Reads and writes through it bypass the mutex entirely — the
/// same deal the original's raw `char *` into a frame gives a caller, and
/// the reason clients own their own read/write discipline on a pinned
/// page. Not `Send`: the raw pointer ties a handle to the thread that
/// obtained it, since nothing here synchronizes a handoff to another
/// thread.
#[derive(Debug)]
pub struct PageHandle {
    page_num: PageNum,
    ptr: *mut u8,
}

impl PageHandle {
    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    /// Borrows the page's `PAGE_SIZE` bytes for reading.
    ///
    /// SAFETY: `ptr` was taken from a frame's boxed buffer while the pool
    /// mutex was held, and that buffer's address never moves or is freed
    /// while this handle's page remains pinned — `unpin` is the caller's
    /// promise that they're done looking at it.
    pub fn data(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, PAGE_SIZE) }
    }

    /// Borrows the page's `PAGE_SIZE` bytes for writing. Does not itself
    /// mark the page dirty; call [`BufferPool::mark_dirty`] after writing
    /// through it.
    ///
    /// SAFETY: see [`PageHandle::data`].
    pub fn data_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, PAGE_SIZE) }
    }
}

struct PoolInner {
    frames: Vec<Frame>,
    index: PageIndex,
    policy: AnyPolicy,
    tick: u64,
    file: PageFile,
}

/// Point-in-time counters describing pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStats {
    pub capacity: usize,
    pub used_frames: usize,
    pub pinned_pages: usize,
    pub dirty_pages: usize,
    pub read_io: u64,
    pub write_io: u64,
}

/// A fixed-capacity pool of page frames backed by one page file.
///
/// Every public method locks the whole pool for its duration; there is
/// no finer-grained locking and no lock-free path. The two I/O counters
/// are the one exception, living in atomics outside the mutex so a
/// caller can poll them without contending with in-flight pins.
pub struct BufferPool {
    capacity: usize,
    inner: Mutex<PoolInner>,
    num_read_io: AtomicU64,
    num_write_io: AtomicU64,
}

impl BufferPool {
    /// Opens the already-existing page file at `path` and allocates
    /// `num_pages` frames managed under `strategy`. The page file must
    /// have been created beforehand (`PageFile::create`) — `init` does
    /// not create one on a miss, matching `initBufferPool`'s reliance on
    /// a prior, separate `createPageFile` call.
    pub fn init<P: AsRef<Path>>(
        path: P,
        num_pages: usize,
        strategy: Strategy,
    ) -> Result<Self, BufferError> {
        if num_pages == 0 {
            return Err(BufferError::BadArgs("num_pages must be at least 1".into()));
        }
        let file = PageFile::open(path)?;
        let frames = (0..num_pages).map(|_| Frame::new()).collect();
        let index = PageIndex::new(num_pages);
        let policy = AnyPolicy::for_strategy(strategy);
        log::debug!("buffer pool initialized: {num_pages} frames, {strategy:?}");
        Ok(Self {
            capacity: num_pages,
            num_read_io: AtomicU64::new(0),
            num_write_io: AtomicU64::new(0),
            inner: Mutex::new(PoolInner {
                frames,
                index,
                policy,
                tick: 0,
                file,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pins `page_num`, loading it from the page file on a miss. Returns a
    /// handle good for direct reads/writes until the matching `unpin`.
    pub fn pin(&self, page_num: PageNum) -> Result<PageHandle, BufferError> {
        if page_num < 0 {
            return Err(BufferError::BadArgs(format!(
                "negative page number: {page_num}"
            )));
        }
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(idx) = inner.index.get(page_num) {
            let frame = &mut inner.frames[idx];
            frame.fix_count += 1;
            frame.last_used = tick;
            frame.ref_bit = true;
            let ptr = frame.data.as_mut_ptr();
            log::trace!("pin hit: page {page_num} in frame {idx}");
            return Ok(PageHandle { page_num, ptr });
        }

        let target = inner
            .frames
            .iter()
            .position(|f| f.page_num == NO_PAGE)
            .or_else(|| inner.policy.select_victim(&mut inner.frames));

        let Some(idx) = target else {
            log::warn!("pin miss on page {page_num}: no replaceable frame (all pinned)");
            return Err(BufferError::WriteFailed(
                "no replaceable frame: all frames are pinned".into(),
            ));
        };

        self.evict_if_occupied(&mut inner, idx)?;
        self.load_into_frame(&mut inner, idx, page_num, tick)?;

        let ptr = inner.frames[idx].data.as_mut_ptr();
        log::trace!("pin miss: loaded page {page_num} into frame {idx}");
        Ok(PageHandle { page_num, ptr })
    }

    /// Releases one pin on the page behind `handle`. Underflowing the pin
    /// count (more unpins than pins) is clamped to zero rather than
    /// treated as an error, matching the original's lenient bookkeeping.
    pub fn unpin(&self, handle: &PageHandle) -> Result<(), BufferError> {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        let idx = inner
            .index
            .get(handle.page_num)
            .ok_or(BufferError::ReadOfNonExistingPage(handle.page_num))?;
        let frame = &mut inner.frames[idx];
        frame.fix_count = frame.fix_count.saturating_sub(1);
        Ok(())
    }

    /// Marks the page behind `handle` dirty, due for write-back on
    /// eviction, `force_page`, or `force_flush_pool`.
    pub fn mark_dirty(&self, handle: &PageHandle) -> Result<(), BufferError> {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        let idx = inner
            .index
            .get(handle.page_num)
            .ok_or(BufferError::ReadOfNonExistingPage(handle.page_num))?;
        inner.frames[idx].dirty = true;
        Ok(())
    }

    /// Writes the page behind `handle` to the page file immediately if
    /// dirty. A no-op otherwise.
    pub fn force_page(&self, handle: &PageHandle) -> Result<(), BufferError> {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        let idx = inner
            .index
            .get(handle.page_num)
            .ok_or(BufferError::ReadOfNonExistingPage(handle.page_num))?;
        self.flush_if_dirty(&mut inner, idx)
    }

    /// Writes back every dirty, unpinned frame. Pinned dirty frames are
    /// left alone — callers holding a pin are still free to mutate their
    /// page.
    pub fn force_flush_pool(&self) -> Result<(), BufferError> {
        let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
        for idx in 0..inner.frames.len() {
            if inner.frames[idx].fix_count == 0 {
                self.flush_if_dirty(&mut inner, idx)?;
            }
        }
        Ok(())
    }

    /// Tears the pool down: force-unpins every frame, writes back
    /// whatever is dirty, and consumes `self`. Defensive by design — a
    /// caller that still holds outstanding `PageHandle`s into this pool
    /// is using them after the fact, which is already a logic error on
    /// their part.
    pub fn shutdown(self) -> Result<(), BufferError> {
        {
            let mut inner = self.inner.lock().expect("buffer pool mutex poisoned");
            for frame in inner.frames.iter_mut() {
                frame.fix_count = 0;
            }
            for idx in 0..inner.frames.len() {
                self.flush_if_dirty(&mut inner, idx)?;
            }
        }
        log::debug!("buffer pool shutdown complete");
        Ok(())
        // `self` drops here: frame buffers freed, page file closed
        // (`PageFile`'s `Drop` unregisters it) — no separate teardown
        // call needed the way the original's `shutdownBufferPool` frees
        // its `PoolMgmt` by hand.
    }

    /// Snapshot of each frame's resident page number, `NO_PAGE` for empty
    /// frames, in frame order.
    pub fn frame_contents(&self) -> Vec<PageNum> {
        let inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.frames.iter().map(|f| f.page_num).collect()
    }

    /// Snapshot of each frame's dirty bit, in frame order.
    pub fn dirty_flags(&self) -> Vec<bool> {
        let inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.frames.iter().map(|f| f.dirty).collect()
    }

    /// Snapshot of each frame's pin count, in frame order.
    pub fn fix_counts(&self) -> Vec<u32> {
        let inner = self.inner.lock().expect("buffer pool mutex poisoned");
        inner.frames.iter().map(|f| f.fix_count).collect()
    }

    /// Total page reads issued to the page file since `init`. Read
    /// without locking the pool, like the original's `getNumReadIO`.
    pub fn num_read_io(&self) -> u64 {
        self.num_read_io.load(Ordering::Relaxed)
    }

    /// Total page writes issued to the page file since `init`.
    pub fn num_write_io(&self) -> u64 {
        self.num_write_io.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().expect("buffer pool mutex poisoned");
        let mut used_frames = 0;
        let mut pinned_pages = 0;
        let mut dirty_pages = 0;
        for f in &inner.frames {
            if f.page_num != NO_PAGE {
                used_frames += 1;
            }
            if f.fix_count > 0 {
                pinned_pages += 1;
            }
            if f.dirty {
                dirty_pages += 1;
            }
        }
        BufferStats {
            capacity: self.capacity,
            used_frames,
            pinned_pages,
            dirty_pages,
            read_io: self.num_read_io(),
            write_io: self.num_write_io(),
        }
    }

    /// Writes frame `idx`'s page back if dirty, growing the file first if
    /// needed. A no-op for empty or clean frames.
    fn flush_if_dirty(&self, inner: &mut PoolInner, idx: usize) -> Result<(), BufferError> {
        if inner.frames[idx].page_num == NO_PAGE || !inner.frames[idx].dirty {
            return Ok(());
        }
        let page_num = inner.frames[idx].page_num;
        inner.file.ensure_capacity((page_num + 1) as u32)?;
        inner.file.write(page_num, inner.frames[idx].data.as_ref())?;
        self.num_write_io.fetch_add(1, Ordering::Relaxed);
        inner.frames[idx].dirty = false;
        log::trace!("flushed page {page_num} from frame {idx}");
        Ok(())
    }

    /// If frame `idx` holds a page, flushes it (propagating any error)
    /// and drops it from the index, leaving the frame empty. A no-op for
    /// an already-empty frame.
    fn evict_if_occupied(&self, inner: &mut PoolInner, idx: usize) -> Result<(), BufferError> {
        if inner.frames[idx].page_num == NO_PAGE {
            return Ok(());
        }
        self.flush_if_dirty(inner, idx)?;
        let old_page = inner.frames[idx].page_num;
        inner.index.remove(old_page);
        inner.frames[idx].reset();
        log::debug!("evicted page {old_page} from frame {idx}");
        Ok(())
    }

    /// Grows the file to cover `page_num` and reads it into frame `idx`,
    /// then claims the frame for it with one pin and fresh metadata.
    ///
    /// A read failure past this point is not propagated: the buffer is
    /// zeroed and the frame is claimed anyway, matching the original's
    /// `loadIntoFrame` (which counts the load as a hit for the caller
    /// either way). A failure growing the file *is* propagated, and the
    /// frame is left empty rather than claimed — callers never observe
    /// an index entry for a frame that didn't actually get loaded.
    fn load_into_frame(
        &self,
        inner: &mut PoolInner,
        idx: usize,
        page_num: PageNum,
        tick: u64,
    ) -> Result<(), BufferError> {
        inner.file.ensure_capacity((page_num + 1) as u32)?;
        match inner.file.read(page_num, inner.frames[idx].data.as_mut()) {
            Ok(()) => {
                self.num_read_io.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                inner.frames[idx].data.iter_mut().for_each(|b| *b = 0);
            }
        }
        let frame = &mut inner.frames[idx];
        frame.page_num = page_num;
        frame.dirty = false;
        frame.fix_count = 1;
        frame.last_used = tick;
        frame.fifo_pos = tick;
        frame.ref_bit = true;
        inner.index.put(page_num, idx);
        Ok(())
    }
}
