//! Memory-mapped register plumbing shared by every board.
//!
//! CPUs on these boards see video state as ordinary memory. The external CPU
//! dispatch layer calls [`VideoBus::read`] / [`VideoBus::write`] with a 24-bit
//! address; writes carry a mask so byte and word accesses share one path.

/// Width of the address bus seen by the video hardware.
pub const ADDRESS_MASK: u32 = 0x00FF_FFFF;

/// Mask for a full 16-bit write.
pub const WORD: u16 = 0xFFFF;
/// Mask for a write to the low byte only.
pub const LOW_BYTE: u16 = 0x00FF;
/// Mask for a write to the high byte only.
pub const HIGH_BYTE: u16 = 0xFF00;

/// Merge `data` into `old`, replacing only the bits selected by `mask`.
#[inline]
pub fn combine(old: u16, data: u16, mask: u16) -> u16 {
    (old & !mask) | (data & mask)
}

/// The side of the bus the video hardware exposes to the CPU dispatcher.
pub trait VideoBus {
    /// Read a word. `None` means the address does not belong to the video
    /// hardware and the dispatcher should route it elsewhere.
    fn read(&mut self, addr: u32) -> Option<u16>;

    /// Write `data` under `mask`. Returns `false` when the address is not a
    /// video address.
    fn write(&mut self, addr: u32, data: u16, mask: u16) -> bool;
}

/// Inclusive address window on a CPU bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

impl AddressRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        let a = addr & ADDRESS_MASK;
        a >= self.start && a <= self.end
    }

    /// Byte offset of `addr` inside the window.
    #[inline]
    pub fn offset(&self, addr: u32) -> u32 {
        (addr & ADDRESS_MASK) - self.start
    }

    /// Word index of `addr` inside the window (68000-style word bus).
    #[inline]
    pub fn word_index(&self, addr: u32) -> usize {
        (self.offset(addr) >> 1) as usize
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Plain read/write word storage: rowscroll tables, control blocks and live
/// sprite RAM all behave like this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRam {
    words: Vec<u16>,
}

impl WordRam {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len],
        }
    }

    #[inline]
    pub fn read(&self, index: usize) -> u16 {
        self.words[index]
    }

    #[inline]
    pub fn write(&mut self, index: usize, data: u16, mask: u16) {
        let slot = &mut self.words[index];
        *slot = combine(*slot, data, mask);
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.words
    }

    /// Overwrite this RAM with the full contents of `other`.
    pub fn copy_from(&mut self, other: &WordRam) {
        assert_eq!(self.words.len(), other.words.len(), "RAM size mismatch");
        self.words.copy_from_slice(&other.words);
    }
}
