//! Raw tile memory for one layer plus its per-cell dirty bitmap.
//!
//! Every cell is a 16-bit value. Word boards store the CPU word as-is; byte
//! boards keep the code byte in the low half and the attribute byte in the
//! high half and write them through byte masks.

use bitvec::prelude::*;

use crate::core::bus::combine;

#[derive(Debug, Clone)]
pub struct TileStore {
    cells: Vec<u16>,
    dirty: BitVec,
}

impl TileStore {
    /// A zeroed store. All cells start dirty so the first update decodes
    /// every tile.
    pub fn new(len: usize) -> Self {
        Self {
            cells: vec![0; len],
            dirty: bitvec![1; len],
        }
    }

    /// Merge `value` into cell `offset` under `mask`. Marks the cell dirty
    /// and returns `true` only if the merged value differs.
    pub fn write(&mut self, offset: usize, value: u16, mask: u16) -> bool {
        debug_assert!(offset < self.cells.len(), "tile offset {offset:#x} out of range");
        let old = self.cells[offset];
        let new = combine(old, value, mask);
        if new == old {
            return false;
        }
        self.cells[offset] = new;
        self.dirty.set(offset, true);
        true
    }

    #[inline]
    pub fn read(&self, offset: usize) -> u16 {
        debug_assert!(offset < self.cells.len(), "tile offset {offset:#x} out of range");
        self.cells[offset]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_dirty(&self, offset: usize) -> bool {
        self.dirty[offset]
    }

    pub fn any_dirty(&self) -> bool {
        self.dirty.any()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.count_ones()
    }

    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Hand the dirty cells to `f` and clear their flags.
    pub fn drain_dirty(&mut self, mut f: impl FnMut(usize, u16)) {
        for offset in self.dirty.iter_ones() {
            f(offset, self.cells[offset]);
        }
        self.dirty.fill(false);
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.cells
    }
}
