//! Decoded graphics elements and the primitive that blits them.
//!
//! ROM graphics arrive as planar bitstreams described by a [`GfxLayout`].
//! Decoding happens once, when the board is built, and produces an immutable
//! [`GfxElement`]: one pen byte per pixel plus a per-tile mask of the pens the
//! tile actually uses (used to feed the palette's used-colour tracking).

use std::collections::HashMap;

use crate::core::bitmap::{Bitmap, Rect};
use crate::error::VideoError;
use crate::palette::Palette;

/// A bit offset inside a graphics region, either absolute or a fraction of
/// the region size plus a constant (for layouts that split planes across
/// the halves of a ROM set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOffset {
    Bits(u32),
    Frac { num: u32, den: u32, plus: u32 },
}

impl BitOffset {
    fn resolve(self, region_bits: u64) -> u64 {
        match self {
            BitOffset::Bits(bits) => bits as u64,
            BitOffset::Frac { num, den, plus } => region_bits * num as u64 / den as u64 + plus as u64,
        }
    }
}

/// Number of elements a layout decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCount {
    Fixed(usize),
    /// `num/den` of the region, divided by the per-element stride.
    Frac { num: u32, den: u32 },
}

/// Planar layout of one graphics bank.
///
/// Plane 0 is the most significant bit of the pen. Pixel bits are read
/// MSB-first inside each byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxLayout {
    pub width: usize,
    pub height: usize,
    pub count: ElementCount,
    pub planes: &'static [BitOffset],
    pub x_offsets: &'static [u32],
    pub y_offsets: &'static [u32],
    /// Distance in bits between consecutive elements.
    pub stride: u32,
}

impl GfxLayout {
    fn element_count(&self, region_bits: u64) -> usize {
        match self.count {
            ElementCount::Fixed(n) => n,
            ElementCount::Frac { num, den } => {
                (region_bits * num as u64 / den as u64 / self.stride as u64) as usize
            }
        }
    }
}

#[inline]
fn read_bit(rom: &[u8], bit: u64) -> bool {
    rom[(bit / 8) as usize] & (0x80 >> (bit % 8)) != 0
}

/// An immutable bank of decoded tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxElement {
    width: usize,
    height: usize,
    planes: u8,
    total: usize,
    color_base: usize,
    color_count: usize,
    pixels: Vec<u8>,
    pen_usage: Vec<u32>,
}

impl GfxElement {
    /// Decode every element of `layout` out of `rom`.
    pub fn decode(
        region: &str,
        layout: &GfxLayout,
        rom: &[u8],
        color_base: usize,
        color_count: usize,
    ) -> Result<Self, VideoError> {
        let region_bits = rom.len() as u64 * 8;
        let total = layout.element_count(region_bits);
        if total == 0 || layout.planes.is_empty() {
            return Err(VideoError::EmptyLayout(region.to_string()));
        }
        let planes: Vec<u64> = layout.planes.iter().map(|p| p.resolve(region_bits)).collect();

        // furthest bit the last element touches
        let last = (total as u64 - 1) * layout.stride as u64
            + planes.iter().copied().max().unwrap_or(0)
            + layout.y_offsets.iter().copied().max().unwrap_or(0) as u64
            + layout.x_offsets.iter().copied().max().unwrap_or(0) as u64;
        if last >= region_bits {
            return Err(VideoError::RegionTooSmall {
                region: region.to_string(),
                needed: (last / 8 + 1) as usize,
                actual: rom.len(),
            });
        }

        let tile_len = layout.width * layout.height;
        let mut pixels = vec![0u8; total * tile_len];
        let plane_count = planes.len();
        for code in 0..total {
            let base = code as u64 * layout.stride as u64;
            let tile = &mut pixels[code * tile_len..(code + 1) * tile_len];
            for (y, &yo) in layout.y_offsets.iter().enumerate().take(layout.height) {
                for (x, &xo) in layout.x_offsets.iter().enumerate().take(layout.width) {
                    let mut pen = 0u8;
                    for (plane, &po) in planes.iter().enumerate() {
                        if read_bit(rom, base + po + yo as u64 + xo as u64) {
                            pen |= 1 << (plane_count - 1 - plane);
                        }
                    }
                    tile[y * layout.width + x] = pen;
                }
            }
        }

        Ok(Self::from_pixels(
            layout.width,
            layout.height,
            plane_count as u8,
            color_base,
            color_count,
            pixels,
        ))
    }

    /// Wrap already-decoded pens. `pixels` holds whole tiles back to back.
    pub fn from_pixels(
        width: usize,
        height: usize,
        planes: u8,
        color_base: usize,
        color_count: usize,
        pixels: Vec<u8>,
    ) -> Self {
        let tile_len = width * height;
        assert!(tile_len > 0 && pixels.len() % tile_len == 0, "partial tile in pixel data");
        assert!((1..=5).contains(&planes), "unsupported plane count {planes}");
        let total = pixels.len() / tile_len;
        let pen_usage = pixels
            .chunks_exact(tile_len)
            .map(|tile| tile.iter().fold(0u32, |acc, &pen| acc | 1 << pen))
            .collect();
        Self {
            width,
            height,
            planes,
            total,
            color_base,
            color_count,
            pixels,
            pen_usage,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Pens per colour group.
    pub fn granularity(&self) -> usize {
        1 << self.planes
    }

    pub fn color_base(&self) -> usize {
        self.color_base
    }

    /// Pens of tile `code`, row-major. Codes past the end wrap, like the
    /// address lines of a smaller ROM would.
    #[inline]
    pub fn tile(&self, code: u32) -> &[u8] {
        let len = self.width * self.height;
        let index = code as usize % self.total;
        &self.pixels[index * len..(index + 1) * len]
    }

    /// Bit `n` set when pen `n` appears in tile `code`.
    #[inline]
    pub fn pen_usage(&self, code: u32) -> u32 {
        self.pen_usage[code as usize % self.total]
    }

    /// Palette index of pen 0 of colour group `color`.
    #[inline]
    pub fn palette_base(&self, color: u32) -> usize {
        self.color_base + (color as usize % self.color_count) * self.granularity()
    }
}

/// Pen transparency used by [`draw_gfx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transparency {
    Opaque,
    Pen(u8),
    /// Bit `n` set means pen `n` is transparent.
    Pens(u32),
}

impl Transparency {
    #[inline]
    pub fn is_transparent(self, pen: u8) -> bool {
        match self {
            Transparency::Opaque => false,
            Transparency::Pen(p) => pen == p,
            Transparency::Pens(mask) => mask & (1 << pen) != 0,
        }
    }
}

/// Placement of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GfxDraw {
    pub code: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub x: i32,
    pub y: i32,
}

/// Blit one tile into `dest`, clipped to `clip`. Returns `false` when
/// nothing of the tile was inside the clip.
pub fn draw_gfx(
    dest: &mut Bitmap,
    gfx: &GfxElement,
    palette: &Palette,
    params: &GfxDraw,
    clip: &Rect,
    transparency: Transparency,
) -> bool {
    let w = gfx.width() as i32;
    let h = gfx.height() as i32;
    let area = Rect::new(params.x, params.x + w - 1, params.y, params.y + h - 1);
    let Some(area) = area.intersect(clip).and_then(|a| a.intersect(&dest.bounds())) else {
        return false;
    };
    let tile = gfx.tile(params.code);
    let base = gfx.palette_base(params.color);
    for dy in area.min_y..=area.max_y {
        let mut ty = dy - params.y;
        if params.flip_y {
            ty = h - 1 - ty;
        }
        let src = &tile[(ty * w) as usize..((ty + 1) * w) as usize];
        let row = dest.row_mut(dy as usize);
        for dx in area.min_x..=area.max_x {
            let mut tx = dx - params.x;
            if params.flip_x {
                tx = w - 1 - tx;
            }
            let pen = src[tx as usize];
            if transparency.is_transparent(pen) {
                continue;
            }
            row[dx as usize] = palette.rgb(base + pen as usize);
        }
    }
    true
}

/// One row of a board's graphics decode table.
#[derive(Debug, Clone, Copy)]
pub struct GfxDecodeEntry {
    pub region: &'static str,
    pub layout: &'static GfxLayout,
    pub color_base: usize,
    pub color_count: usize,
}

/// All graphics banks of one board, indexed the way the board's layers and
/// sprites refer to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxSet {
    banks: Vec<GfxElement>,
}

impl GfxSet {
    pub fn new(banks: Vec<GfxElement>) -> Self {
        Self { banks }
    }

    /// Decode every entry of a board's decode table out of named ROM regions.
    pub fn decode(
        entries: &[GfxDecodeEntry],
        regions: &HashMap<String, Vec<u8>>,
    ) -> Result<Self, VideoError> {
        let banks = entries
            .iter()
            .map(|entry| {
                let rom = regions
                    .get(entry.region)
                    .ok_or_else(|| VideoError::MissingRegion(entry.region.to_string()))?;
                let element = GfxElement::decode(
                    entry.region,
                    entry.layout,
                    rom,
                    entry.color_base,
                    entry.color_count,
                )?;
                log::debug!(
                    "gfx: region `{}` decoded {} {}x{} elements",
                    entry.region,
                    element.total(),
                    element.width(),
                    element.height()
                );
                Ok(element)
            })
            .collect::<Result<Vec<_>, VideoError>>()?;
        Ok(Self { banks })
    }

    /// Check the bank count and tile sizes a board expects.
    pub fn validate(&self, board: &'static str, shape: &[(usize, usize)]) -> Result<(), VideoError> {
        if self.banks.len() != shape.len() {
            return Err(VideoError::GfxBankCount {
                board,
                expected: shape.len(),
                actual: self.banks.len(),
            });
        }
        for (bank, (gfx, &(w, h))) in self.banks.iter().zip(shape).enumerate() {
            if gfx.width() != w || gfx.height() != h {
                return Err(VideoError::GfxTileSize {
                    board,
                    bank,
                    width: gfx.width(),
                    height: gfx.height(),
                    expected_width: w,
                    expected_height: h,
                });
            }
        }
        Ok(())
    }

    /// Panics on an index the board never allocated.
    pub fn bank(&self, index: usize) -> &GfxElement {
        &self.banks[index]
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}
