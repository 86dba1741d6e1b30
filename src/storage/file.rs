//! Page-file adapter: the external collaborator the buffer pool depends on.
//!
//! Opens/closes a file of fixed-size pages, reads/writes a single page by
//! index, and grows the file to a target page count with blank (all-zero)
//! pages. This is the Rust shape of `original_source/storage_mgr.c`: same
//! operations (`open`/`close`/`read`/`write`/`ensureCapacity`), same
//! process-wide open-file registry (there so a path-based `destroy` can
//! close a file it didn't open directly), reworked from a global linked
//! list guarded implicitly by single-threadedness into a
//! `std::sync::OnceLock<Mutex<HashMap<..>>>` that's safe to share across
//! threads.

use crate::storage::page::PAGE_SIZE;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use thiserror::Error;

/// Page-file adapter errors.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid arguments: {0}")]
    BadArgs(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn registry() -> &'static Mutex<HashMap<PathBuf, ()>> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, ()>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn canonical_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn register_open(path: &Path) {
    if let Ok(mut reg) = registry().lock() {
        reg.insert(canonical_key(path), ());
    }
}

fn unregister_open(path: &Path) {
    if let Ok(mut reg) = registry().lock() {
        reg.remove(&canonical_key(path));
    }
}

/// Whether `path` currently has an open handle registered anywhere in this
/// process. Lets a path-based destroy operation check before deleting.
pub fn is_open(path: &Path) -> bool {
    registry()
        .lock()
        .map(|reg| reg.contains_key(&canonical_key(path)))
        .unwrap_or(false)
}

/// An open page file: a handle plus positional I/O, exactly the interface
/// the buffer pool core consumes (`spec.md` §2, item 1).
#[derive(Debug)]
pub struct PageFile {
    path: PathBuf,
    file: File,
    total_pages: u32,
}

impl PageFile {
    /// Creates a new page file containing exactly one blank page,
    /// matching `createPageFile`'s contract: callers must `open` it
    /// afterwards to get a handle.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| FileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.write_all(&[0u8; PAGE_SIZE])
            .map_err(|source| FileError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        file.flush().map_err(|source| FileError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Opens an existing `path`. Errors with `FileNotFound` if it doesn't
    /// exist — the page file must already have been `create`d.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(FileError::FileNotFound(path));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?;

        let len = file
            .metadata()
            .map_err(|source| FileError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        let total_pages = (len / PAGE_SIZE as u64) as u32;

        register_open(&path);
        Ok(Self {
            path,
            file,
            total_pages,
        })
    }

    /// Opens `path`, creating it with a single blank page first if it
    /// doesn't already exist. A convenience for callers that want "open or
    /// create" in one step; `BufferPool::init` does not use this — it
    /// requires the page file to already exist, matching
    /// `initBufferPool`'s reliance on a prior `createPageFile` call.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        let path = path.as_ref();
        if !path.exists() {
            Self::create(path)?;
        }
        Self::open(path)
    }

    /// Closes the file, removing it from the process-wide open registry.
    pub fn close(self) {
        // Drop does the unregister; this just makes the intent explicit
        // at call sites mirroring `closePageFile`.
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current number of pages backing this file.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Reads page `page_num` into `buf`, which must be at least
    /// `PAGE_SIZE` bytes.
    pub fn read(&mut self, page_num: i64, buf: &mut [u8]) -> Result<(), FileError> {
        if page_num < 0 || page_num as u64 >= self.total_pages as u64 {
            return Err(FileError::BadArgs(format!(
                "page {page_num} out of range (total {})",
                self.total_pages
            )));
        }
        if buf.len() < PAGE_SIZE {
            return Err(FileError::BadArgs("read buffer smaller than PAGE_SIZE".into()));
        }
        self.seek_to(page_num)?;
        self.file
            .read_exact(&mut buf[..PAGE_SIZE])
            .map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Writes `buf`'s first `PAGE_SIZE` bytes to page `page_num`.
    pub fn write(&mut self, page_num: i64, buf: &[u8]) -> Result<(), FileError> {
        if page_num < 0 || page_num as u64 >= self.total_pages as u64 {
            return Err(FileError::BadArgs(format!(
                "page {page_num} out of range (total {})",
                self.total_pages
            )));
        }
        if buf.len() < PAGE_SIZE {
            return Err(FileError::BadArgs("write buffer smaller than PAGE_SIZE".into()));
        }
        self.seek_to(page_num)?;
        self.file
            .write_all(&buf[..PAGE_SIZE])
            .map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.flush().map_err(|source| FileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Grows the file with blank (all-zero) pages until it holds at least
    /// `target_pages` pages. A no-op if the file is already that large.
    pub fn ensure_capacity(&mut self, target_pages: u32) -> Result<(), FileError> {
        if self.total_pages >= target_pages {
            return Ok(());
        }
        let blank = [0u8; PAGE_SIZE];
        self.file
            .seek(SeekFrom::End(0))
            .map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })?;
        while self.total_pages < target_pages {
            self.file.write_all(&blank).map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })?;
            self.total_pages += 1;
        }
        self.file.flush().map_err(|source| FileError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn seek_to(&mut self, page_num: i64) -> Result<(), FileError> {
        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))
            .map_err(|source| FileError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

impl Drop for PageFile {
    fn drop(&mut self) {
        unregister_open(&self.path);
    }
}
