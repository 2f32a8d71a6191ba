// Copyright (C) 2025 Dayton Fishell
// arcvid Arcade Video Hardware Core
// This file is part of arcvid.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Board drivers: memory maps and per-board frame sequences.

pub mod cbuster;
pub mod gng;
pub mod tigeroad;

pub use cbuster::CrudeBuster;
pub use gng::Gng;
pub use tigeroad::TigerRoad;

use crate::core::bus::{ADDRESS_MASK, AddressRange};

/// Find the region `addr` falls in. Returns the region tag and the byte
/// offset inside it.
pub(crate) fn decode_address<R: Copy>(map: &[(AddressRange, R)], addr: u32) -> Option<(R, u32)> {
    let a = addr & ADDRESS_MASK;
    map.iter()
        .find(|(range, _)| range.contains(a))
        .map(|&(range, region)| (region, range.offset(a)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::gfx::GfxElement;

    /// `count` tiles of `size`x`size`, tile `n` filled with pen `n % 16`.
    pub fn solid_tiles(size: usize, count: u32, color_base: usize, color_count: usize) -> GfxElement {
        let pixels = (0..count)
            .flat_map(|code| vec![(code % 16) as u8; size * size])
            .collect();
        GfxElement::from_pixels(size, size, 4, color_base, color_count, pixels)
    }

    /// Three-plane variant, tile `n` filled with pen `n % 8`.
    pub fn solid_tiles_3bpp(size: usize, count: u32, color_base: usize, color_count: usize) -> GfxElement {
        let pixels = (0..count)
            .flat_map(|code| vec![(code % 8) as u8; size * size])
            .collect();
        GfxElement::from_pixels(size, size, 3, color_base, color_count, pixels)
    }

    /// Two-plane variant, tile `n` filled with pen `n % 4`.
    pub fn solid_tiles_2bpp(size: usize, count: u32, color_base: usize, color_count: usize) -> GfxElement {
        let pixels = (0..count)
            .flat_map(|code| vec![(code % 4) as u8; size * size])
            .collect();
        GfxElement::from_pixels(size, size, 2, color_base, color_count, pixels)
    }
}
