// Copyright (C) 2025 Dayton Fishell
// arcvid Arcade Video Hardware Core
// This file is part of arcvid.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Palette manager: raw colour registers, per-frame used-colour tracking and
//! lazy RGB recomputation.
//!
//! The CPU writes raw register words at any time. Nothing is converted on the
//! write path; instead every frame the layers and sprites report which colour
//! indices they are about to use ([`Palette::mark_used`] /
//! [`Palette::mark_pens`]) and [`Palette::recompute_if_needed`] refreshes the
//! published RGB value of exactly those entries whose registers changed. When
//! it reports a change, tilemap caches must be re-rendered because they hold
//! pre-coloured pixels.

use bitvec::prelude::*;

use crate::core::bus::combine;

/// How raw register words map to a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteFormat {
    /// Two word files: `GGGGGGGGRRRRRRRR` in the primary one and
    /// `xxxxxxxxBBBBBBBB` in the secondary one.
    SplitRg8B8,
    /// Two byte files: `RRRRGGGG` in the primary one and `BBBBxxxx` in the
    /// secondary one.
    SplitRrrrGgggBbbbXxxx,
    /// One word file, `xxxxRRRRGGGGBBBB`.
    XxxxRrrrGgggBbbb,
}

impl PaletteFormat {
    pub fn is_split(self) -> bool {
        !matches!(self, PaletteFormat::XxxxRrrrGgggBbbb)
    }

    /// Convert raw register values to `0x00RRGGBB`.
    pub fn decode(self, primary: u16, secondary: u16) -> u32 {
        let (r, g, b) = match self {
            PaletteFormat::SplitRg8B8 => (
                (primary & 0xff) as u8,
                (primary >> 8) as u8,
                (secondary & 0xff) as u8,
            ),
            PaletteFormat::SplitRrrrGgggBbbbXxxx => (
                pal4bit(primary >> 4),
                pal4bit(primary),
                pal4bit(secondary >> 4),
            ),
            PaletteFormat::XxxxRrrrGgggBbbb => (
                pal4bit(primary >> 8),
                pal4bit(primary >> 4),
                pal4bit(primary),
            ),
        };
        rgb(r, g, b)
    }
}

/// Expand a 4-bit channel by replicating the nibble: `0xA` becomes `0xAA`.
#[inline]
pub fn pal4bit(bits: u16) -> u8 {
    let n = (bits & 0x0f) as u8;
    (n << 4) | n
}

#[inline]
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

#[derive(Debug, Clone)]
pub struct Palette {
    format: PaletteFormat,
    primary: Vec<u16>,
    secondary: Vec<u16>,
    published: Vec<u32>,
    used: BitVec,
    // raw registers changed since the entry was last published
    stale: BitVec,
}

impl Palette {
    pub fn new(format: PaletteFormat, entries: usize) -> Self {
        let secondary_len = if format.is_split() { entries } else { 0 };
        Self {
            format,
            primary: vec![0; entries],
            secondary: vec![0; secondary_len],
            published: vec![0; entries],
            used: bitvec![0; entries],
            stale: bitvec![1; entries],
        }
    }

    pub fn format(&self) -> PaletteFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    pub fn write_primary(&mut self, index: usize, data: u16, mask: u16) {
        let slot = &mut self.primary[index];
        let new = combine(*slot, data, mask);
        if new != *slot {
            *slot = new;
            self.stale.set(index, true);
        }
    }

    /// Write the second register file ("B" on split boards).
    ///
    /// Panics on single-file formats.
    pub fn write_secondary(&mut self, index: usize, data: u16, mask: u16) {
        assert!(self.format.is_split(), "{:?} has no secondary file", self.format);
        let slot = &mut self.secondary[index];
        let new = combine(*slot, data, mask);
        if new != *slot {
            *slot = new;
            self.stale.set(index, true);
        }
    }

    pub fn read_primary(&self, index: usize) -> u16 {
        self.primary[index]
    }

    pub fn read_secondary(&self, index: usize) -> u16 {
        assert!(self.format.is_split(), "{:?} has no secondary file", self.format);
        self.secondary[index]
    }

    /// Clear the used flags collected for the previous frame.
    pub fn begin_frame(&mut self) {
        self.used.fill(false);
    }

    #[inline]
    pub fn mark_used(&mut self, index: usize) {
        self.used.set(index, true);
    }

    /// Mark `base + n` used for every bit `n` set in `usage`.
    pub fn mark_pens(&mut self, base: usize, usage: u32) {
        let mut bits = usage;
        while bits != 0 {
            let pen = bits.trailing_zeros() as usize;
            self.used.set(base + pen, true);
            bits &= bits - 1;
        }
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used[index]
    }

    pub fn used_count(&self) -> usize {
        self.used.count_ones()
    }

    /// Republish every used entry whose registers changed since it was last
    /// published. Returns `true` when any published RGB value changed.
    ///
    /// Unused entries keep their stale flag, so they are brought up to date
    /// the first frame they are marked used again.
    pub fn recompute_if_needed(&mut self) -> bool {
        let mut recomputed = 0usize;
        let mut changed = false;
        for index in self.used.iter_ones() {
            if !self.stale[index] {
                continue;
            }
            let secondary = self.secondary.get(index).copied().unwrap_or(0);
            let value = self.format.decode(self.primary[index], secondary);
            if self.published[index] != value {
                self.published[index] = value;
                changed = true;
            }
            self.stale.set(index, false);
            recomputed += 1;
        }
        if recomputed > 0 {
            log::trace!("palette: recomputed {recomputed} entries, changed={changed}");
        }
        changed
    }

    /// Published RGB of `index`.
    #[inline]
    pub fn rgb(&self, index: usize) -> u32 {
        self.published[index]
    }

    /// RGB the raw registers currently describe, published or not.
    pub fn raw_rgb(&self, index: usize) -> u32 {
        let secondary = self.secondary.get(index).copied().unwrap_or(0);
        self.format.decode(self.primary[index], secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::{HIGH_BYTE, LOW_BYTE, WORD};

    #[test]
    fn nibble_replication() {
        assert_eq!(pal4bit(0x0), 0x00);
        assert_eq!(pal4bit(0xa), 0xaa);
        assert_eq!(pal4bit(0xf), 0xff);
        // only the low nibble matters
        assert_eq!(pal4bit(0x35), 0x55);
    }

    #[test]
    fn split_rg_b_decode() {
        let fmt = PaletteFormat::SplitRg8B8;
        assert_eq!(fmt.decode(0x4080, 0x00c0), 0x8040c0);
    }

    #[test]
    fn rrrrggggbbbbxxxx_decode() {
        let fmt = PaletteFormat::SplitRrrrGgggBbbbXxxx;
        // RG byte 0xf8, B byte 0x3x
        assert_eq!(fmt.decode(0x00f8, 0x0037), 0xff8833);
    }

    #[test]
    fn xxxxrrrrggggbbbb_decode() {
        let fmt = PaletteFormat::XxxxRrrrGgggBbbb;
        assert_eq!(fmt.decode(0xf1a5, 0), 0x11aa55);
    }

    #[test]
    fn register_round_trip() {
        let mut pal = Palette::new(PaletteFormat::SplitRg8B8, 16);
        for (i, (rg, b)) in [(0x1234u16, 0x0056u16), (0xffff, 0x00ff), (0, 0)]
            .into_iter()
            .enumerate()
        {
            pal.write_primary(i, rg, WORD);
            pal.write_secondary(i, b, WORD);
            assert_eq!(pal.read_primary(i), rg);
            assert_eq!(pal.read_secondary(i), b);
        }
        pal.write_primary(5, 0x00ab, LOW_BYTE);
        pal.write_primary(5, 0xcd00, HIGH_BYTE);
        assert_eq!(pal.read_primary(5), 0xcdab);
    }

    #[test]
    fn only_used_entries_are_published() {
        let mut pal = Palette::new(PaletteFormat::SplitRg8B8, 16);
        pal.write_primary(1, 0x00ff, WORD);
        pal.write_primary(2, 0xff00, WORD);
        pal.begin_frame();
        pal.mark_used(1);
        assert!(pal.recompute_if_needed());
        assert_eq!(pal.rgb(1), 0xff0000);
        // entry 2 is not in use yet and stays black
        assert_eq!(pal.rgb(2), 0);
        assert_eq!(pal.raw_rgb(2), 0x00ff00);

        // the first frame it is used it becomes correct
        pal.begin_frame();
        pal.mark_used(2);
        assert!(pal.recompute_if_needed());
        assert_eq!(pal.rgb(2), 0x00ff00);
    }

    #[test]
    fn unchanged_palette_reports_no_change() {
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 8);
        pal.write_primary(3, 0x0f00, WORD);
        pal.mark_used(3);
        assert!(pal.recompute_if_needed());
        pal.begin_frame();
        pal.mark_used(3);
        assert!(!pal.recompute_if_needed());
        // rewriting the same value is not a change either
        pal.write_primary(3, 0x0f00, WORD);
        assert!(!pal.recompute_if_needed());
    }

    #[test]
    fn mark_pens_sets_each_bit() {
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 64);
        pal.mark_pens(16, 0b1000_0000_0000_0110);
        assert!(pal.is_used(17));
        assert!(pal.is_used(18));
        assert!(pal.is_used(31));
        assert_eq!(pal.used_count(), 3);
    }

    #[test]
    #[should_panic]
    fn single_file_format_has_no_secondary() {
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 8);
        pal.write_secondary(0, 1, WORD);
    }
}
