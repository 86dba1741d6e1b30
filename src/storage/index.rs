//! Page index: a page-number to frame-slot map.
//!
//! An open-addressing hash table sized at roughly 4x the frame count, with
//! tombstones on delete, giving amortized O(1) `get`/`put`/`remove`. This is
//! the Rust shape of `original_source/buffer_mgr.c`'s `PageTable`
//! (`hash_page` / `ptab_find_slot` / `ptab_put` / `ptab_get` / `ptab_del`):
//! same probing scheme, same tombstone state, translated from raw arrays
//! into a `Vec<Slot>`.

use crate::storage::page::{PageNum, NO_PAGE};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Occupied(PageNum, usize),
    Tombstone,
}

/// Maps resident page numbers to the frame slot holding them.
///
/// Never stores the `NO_PAGE` sentinel; `get` on an absent page returns
/// `None`, mirroring the spec's `get(page#) -> frame_idx | -1` contract
/// with an `Option` instead of a magic `-1`.
pub struct PageIndex {
    slots: Vec<Slot>,
    mask: usize,
    len: usize,
}

impl PageIndex {
    /// Creates an index sized for roughly `approx_frames` resident pages.
    pub fn new(approx_frames: usize) -> Self {
        let mut cap = 1usize;
        while cap < approx_frames.saturating_mul(4).max(4) {
            cap <<= 1;
        }
        Self {
            slots: vec![Slot::Empty; cap],
            mask: cap - 1,
            len: 0,
        }
    }

    fn hash(page_num: PageNum) -> u64 {
        // Same finalizer as `hash_page` in the original C page table
        // (a splitmix64-style avalanche), widened to 64 bits for i64 keys.
        let mut x = page_num as u64;
        x ^= x >> 33;
        x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
        x ^= x >> 33;
        x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
        x ^= x >> 33;
        x
    }

    /// Returns the slot index of `page_num`'s entry (occupied or a free
    /// slot/tombstone to insert into), and whether an occupied match was
    /// found at that index.
    fn find_slot(&self, page_num: PageNum) -> (usize, bool) {
        debug_assert_ne!(page_num, NO_PAGE);
        let mut idx = (Self::hash(page_num) as usize) & self.mask;
        let mut first_tombstone: Option<usize> = None;
        for _ in 0..self.slots.len() {
            match self.slots[idx] {
                Slot::Empty => {
                    return (first_tombstone.unwrap_or(idx), false);
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(idx);
                    }
                }
                Slot::Occupied(p, _) if p == page_num => return (idx, true),
                Slot::Occupied(_, _) => {}
            }
            idx = (idx + 1) & self.mask;
        }
        (first_tombstone.unwrap_or(idx), false)
    }

    /// Looks up the frame slot currently holding `page_num`.
    pub fn get(&self, page_num: PageNum) -> Option<usize> {
        if page_num == NO_PAGE {
            return None;
        }
        match self.find_slot(page_num) {
            (idx, true) => match self.slots[idx] {
                Slot::Occupied(_, frame_idx) => Some(frame_idx),
                _ => unreachable!(),
            },
            _ => None,
        }
    }

    /// Records that `page_num` is resident in `frame_idx`, growing the
    /// table first if it has gotten too full.
    pub fn put(&mut self, page_num: PageNum, frame_idx: usize) {
        if page_num == NO_PAGE {
            return;
        }
        if (self.len + 1) * 2 > self.slots.len() {
            self.grow();
        }
        let (idx, found) = self.find_slot(page_num);
        if !found {
            self.len += 1;
        }
        self.slots[idx] = Slot::Occupied(page_num, frame_idx);
    }

    /// Removes `page_num`'s entry, if present.
    pub fn remove(&mut self, page_num: PageNum) {
        if page_num == NO_PAGE {
            return;
        }
        let (idx, found) = self.find_slot(page_num);
        if found {
            self.slots[idx] = Slot::Tombstone;
            self.len -= 1;
        }
    }

    fn grow(&mut self) {
        let new_cap = (self.slots.len() * 2).max(4);
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; new_cap]);
        self.mask = new_cap - 1;
        self.len = 0;
        for slot in old {
            if let Slot::Occupied(page_num, frame_idx) = slot {
                self.put(page_num, frame_idx);
            }
        }
    }
}
