//! Property tests for the invariants a buffer pool must hold over any
//! sequence of operations, not just one fixed trace: index consistency, no
//! page resident in more than one frame, monotonic I/O counters, and a
//! pinned frame never getting evicted.

use bufmgr::storage::Strategy as PoolStrategy;
use bufmgr::{BufferPool, PageFile};
use proptest::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// `BufferPool::init` only opens an already-existing page file.
fn pool(path: &Path, num_pages: usize, strategy: PoolStrategy) -> BufferPool {
    PageFile::create(path).unwrap();
    BufferPool::init(path, num_pages, strategy).unwrap()
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Pin(i64),
    Unpin(usize),
    Write(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..8).prop_map(Op::Pin),
        (0usize..8).prop_map(Op::Unpin),
        (0usize..8).prop_map(Op::Write),
    ]
}

proptest! {
    /// Every resident frame's page number maps back to that same frame
    /// through the index, and no two frames ever claim the same page.
    #[test]
    fn index_stays_consistent_with_frame_table(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let dir = TempDir::new().unwrap();
        let bm = pool(&dir.path().join("t.db"), 4, PoolStrategy::Clock);
        let mut handles = Vec::new();

        for op in ops {
            match op {
                Op::Pin(p) => {
                    if let Ok(h) = bm.pin(p) {
                        handles.push(h);
                    }
                }
                Op::Unpin(i) => {
                    if i < handles.len() {
                        let h = handles.remove(i);
                        bm.unpin(&h).unwrap();
                    }
                }
                Op::Write(i) => {
                    if i < handles.len() {
                        handles[i].data_mut().fill(0xAB);
                        bm.mark_dirty(&handles[i]).unwrap();
                    }
                }
            }

            let contents = bm.frame_contents();
            let mut seen = std::collections::HashSet::new();
            for &page_num in &contents {
                if page_num == bufmgr::NO_PAGE {
                    continue;
                }
                prop_assert!(seen.insert(page_num), "page {} resident in two frames", page_num);
            }
        }
    }

    /// `num_read_io` and `num_write_io` only ever go up.
    #[test]
    fn io_counters_are_monotonic(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let dir = TempDir::new().unwrap();
        let bm = pool(&dir.path().join("t.db"), 4, PoolStrategy::Lru);
        let mut handles = Vec::new();
        let mut last_read = 0;
        let mut last_write = 0;

        for op in ops {
            match op {
                Op::Pin(p) => {
                    if let Ok(h) = bm.pin(p) {
                        handles.push(h);
                    }
                }
                Op::Unpin(i) => {
                    if i < handles.len() {
                        let h = handles.remove(i);
                        bm.unpin(&h).unwrap();
                    }
                }
                Op::Write(i) => {
                    if i < handles.len() {
                        handles[i].data_mut().fill(0xCD);
                        bm.mark_dirty(&handles[i]).unwrap();
                    }
                }
            }

            let read_now = bm.num_read_io();
            let write_now = bm.num_write_io();
            prop_assert!(read_now >= last_read);
            prop_assert!(write_now >= last_write);
            last_read = read_now;
            last_write = write_now;
        }
    }

    /// A pinned frame (fix_count > 0) is never chosen as an eviction
    /// victim, regardless of how much pressure the rest of the pool is
    /// under.
    #[test]
    fn pinned_frames_are_never_evicted(extra_pages in prop::collection::vec(0i64..64, 1..64)) {
        let dir = TempDir::new().unwrap();
        let bm = pool(&dir.path().join("t.db"), 2, PoolStrategy::Fifo);

        // Pin both frames and hold them for the whole run.
        let pinned0 = bm.pin(1000).unwrap();
        let pinned1 = bm.pin(1001).unwrap();

        for page in extra_pages {
            // Every further pin attempt should fail: no frame is free.
            prop_assert!(bm.pin(page).is_err());
        }

        let contents = bm.frame_contents();
        prop_assert!(contents.contains(&1000));
        prop_assert!(contents.contains(&1001));

        bm.unpin(&pinned0).unwrap();
        bm.unpin(&pinned1).unwrap();
    }
}
