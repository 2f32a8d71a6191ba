//! Tilemap engine: a grid of tile cells rendered into a pre-coloured pixel
//! cache, then scrolled and composited onto the screen.
//!
//! The per-frame flow is:
//!
//! 1. CPU writes land in the layer's [`TileStore`] through [`Tilemap::write`].
//! 2. [`Tilemap::update`] decodes the attribute words of every dirty cell.
//! 3. [`Tilemap::render`] repaints the pixels of cells whose tile or colour
//!    changed. The cache holds final RGB values, so a palette change has to
//!    invalidate it with [`Tilemap::mark_all_pixels_dirty`].
//! 4. [`Tilemap::draw`] copies the cache through the active scroll mode.
//!
//! Next to each cached pixel sits a pass mask saying whether the pixel is
//! opaque in the front pass, the back pass, or both. Split layers use it to
//! draw one tilemap both under and over the sprites.

use bitflags::bitflags;
use bitvec::prelude::*;

use crate::core::bitmap::{Bitmap, Rect};
use crate::gfx::GfxElement;
use crate::palette::Palette;
use crate::tilestore::TileStore;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u8 {
        const FLIP_X = 0b01;
        const FLIP_Y = 0b10;
    }
}

/// Pixel is drawn by [`DrawPass::Normal`] and [`DrawPass::Front`].
pub const PEN_FRONT: u8 = 0b01;
/// Pixel is drawn by [`DrawPass::Back`].
pub const PEN_BACK: u8 = 0b10;

/// How a cell coordinate maps to an index in tile RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    RowMajor,
    ColMajor,
    /// Four 32x32 pages, as used by the Data East playfield chips:
    /// `(col&0x1f) + ((row&0x1f)<<5) + ((col&0x20)<<5) + ((row&0x20)<<6)`.
    FourPageWrap,
}

impl ScanOrder {
    pub fn index(self, col: usize, row: usize, cols: usize, rows: usize) -> usize {
        match self {
            ScanOrder::RowMajor => row * cols + col,
            ScanOrder::ColMajor => col * rows + row,
            ScanOrder::FourPageWrap => {
                (col & 0x1f) + ((row & 0x1f) << 5) + ((col & 0x20) << 5) + ((row & 0x20) << 6)
            }
        }
    }
}

/// Attribute layout of byte-paired tile RAM: code byte low, attribute byte
/// high. Attribute bits 6-7 always extend the code to bits 8-9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankedAttr {
    /// Attribute bit that selects code bit 10, or 0.
    pub high_bank: u16,
    pub color_mask: u16,
    pub flip_x: u16,
    pub flip_y: u16,
    /// Attribute bit that selects split group 1, or 0.
    pub split: u16,
}

/// Turns a raw cell into a [`TileInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileDecoder {
    /// `CCCC TTTT TTTT TTTT`: colour in the top nibble, code below.
    Simple,
    Banked(BankedAttr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileInfo {
    pub code: u32,
    pub color: u32,
    pub flags: TileFlags,
    /// Split group, selects a row of [`LayerKind::Split`] masks.
    pub group: u8,
}

impl TileDecoder {
    pub fn decode(self, cell: u16) -> TileInfo {
        match self {
            TileDecoder::Simple => TileInfo {
                code: (cell & 0x0fff) as u32,
                color: (cell >> 12) as u32,
                flags: TileFlags::empty(),
                group: 0,
            },
            TileDecoder::Banked(attr_bits) => {
                let attr = cell >> 8;
                let mut code = (cell & 0xff) as u32 | (((attr & 0xc0) as u32) << 2);
                if attr & attr_bits.high_bank != 0 {
                    code |= 0x400;
                }
                let mut flags = TileFlags::empty();
                flags.set(TileFlags::FLIP_X, attr & attr_bits.flip_x != 0);
                flags.set(TileFlags::FLIP_Y, attr & attr_bits.flip_y != 0);
                TileInfo {
                    code,
                    color: (attr & attr_bits.color_mask) as u32,
                    flags,
                    group: (attr & attr_bits.split != 0) as u8,
                }
            }
        }
    }
}

/// Pens a split group hides in each pass. Bit `n` set hides pen `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitMask {
    pub front_transparent: u32,
    pub back_transparent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Opaque,
    Transparent { pen: u8 },
    Split([SplitMask; 2]),
}

impl LayerKind {
    #[inline]
    fn pass_mask(self, group: u8, pen: u8) -> u8 {
        match self {
            LayerKind::Opaque => PEN_FRONT | PEN_BACK,
            LayerKind::Transparent { pen: clear } => {
                if pen == clear {
                    0
                } else {
                    PEN_FRONT | PEN_BACK
                }
            }
            LayerKind::Split(masks) => {
                let mask = masks[group as usize & 1];
                let bit = 1u32 << pen;
                let mut out = 0;
                if mask.front_transparent & bit == 0 {
                    out |= PEN_FRONT;
                }
                if mask.back_transparent & bit == 0 {
                    out |= PEN_BACK;
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPass {
    Normal,
    Back,
    Front,
}

/// The single scroll mode a layer honours for a frame. Selecting one mode
/// discards the others' tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerScroll {
    Whole { x: i32, y: i32 },
    /// One X offset per horizontal band of the layer.
    Rows { y: i32, x: Vec<i32> },
    /// One Y offset per vertical band of the layer.
    Cols { x: i32, y: Vec<i32> },
}

impl Default for LayerScroll {
    fn default() -> Self {
        LayerScroll::Whole { x: 0, y: 0 }
    }
}

impl LayerScroll {
    /// Layer pixel shown at screen position (`sx`, `sy`).
    #[inline]
    fn map(&self, sx: i32, sy: i32, width: usize, height: usize) -> (usize, usize) {
        let (w, h) = (width as i32, height as i32);
        match self {
            LayerScroll::Whole { x, y } => ((sx + x).rem_euclid(w) as usize, (sy + y).rem_euclid(h) as usize),
            LayerScroll::Rows { y, x } => {
                let ly = (sy + y).rem_euclid(h) as usize;
                let band = ly * x.len() / height;
                ((sx + x[band]).rem_euclid(w) as usize, ly)
            }
            LayerScroll::Cols { x, y } => {
                let lx = (sx + x).rem_euclid(w) as usize;
                let band = lx * y.len() / width;
                (lx, (sy + y[band]).rem_euclid(h) as usize)
            }
        }
    }

    fn table_len(&self) -> Option<usize> {
        match self {
            LayerScroll::Whole { .. } => None,
            LayerScroll::Rows { x, .. } => Some(x.len()),
            LayerScroll::Cols { y, .. } => Some(y.len()),
        }
    }
}

/// Static description of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilemapConfig {
    pub name: &'static str,
    /// Graphics bank the layer's tiles come from.
    pub gfx_bank: usize,
    pub cols: usize,
    pub rows: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub scan: ScanOrder,
    pub decoder: TileDecoder,
    pub kind: LayerKind,
}

#[derive(Debug, Clone)]
pub struct Tilemap {
    config: TilemapConfig,
    store: TileStore,
    info: Vec<TileInfo>,
    // storage index -> (col, row)
    cell_of: Vec<(usize, usize)>,
    pixel_dirty: BitVec,
    pixels: Vec<u32>,
    masks: Vec<u8>,
    flip: bool,
    scroll: LayerScroll,
}

impl Tilemap {
    pub fn new(config: TilemapConfig) -> Self {
        let cells = config.cols * config.rows;
        let mut cell_of = vec![(usize::MAX, usize::MAX); cells];
        for row in 0..config.rows {
            for col in 0..config.cols {
                let index = config.scan.index(col, row, config.cols, config.rows);
                assert!(index < cells, "{}: scan order leaves the layer", config.name);
                cell_of[index] = (col, row);
            }
        }
        assert!(
            cell_of.iter().all(|&(c, _)| c != usize::MAX),
            "{}: scan order is not a bijection",
            config.name
        );
        let width = config.cols * config.tile_width;
        let height = config.rows * config.tile_height;
        Self {
            config,
            store: TileStore::new(cells),
            info: vec![TileInfo::default(); cells],
            cell_of,
            pixel_dirty: bitvec![1; cells],
            pixels: vec![0; width * height],
            masks: vec![0; width * height],
            flip: false,
            scroll: LayerScroll::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.config.name
    }

    pub fn gfx_bank(&self) -> usize {
        self.config.gfx_bank
    }

    /// Layer size in pixels.
    pub fn width(&self) -> usize {
        self.config.cols * self.config.tile_width
    }

    pub fn height(&self) -> usize {
        self.config.rows * self.config.tile_height
    }

    pub fn write(&mut self, offset: usize, value: u16, mask: u16) -> bool {
        self.store.write(offset, value, mask)
    }

    pub fn read(&self, offset: usize) -> u16 {
        self.store.read(offset)
    }

    /// Storage index of cell (`col`, `row`).
    pub fn cell_index(&self, col: usize, row: usize) -> usize {
        assert!(col < self.config.cols && row < self.config.rows, "cell ({col},{row}) out of range");
        self.config.scan.index(col, row, self.config.cols, self.config.rows)
    }

    /// Decode the cell at storage index `offset` straight from tile RAM.
    pub fn tile_info(&self, offset: usize) -> TileInfo {
        self.config.decoder.decode(self.store.read(offset))
    }

    pub fn mark_all_dirty(&mut self) {
        self.store.mark_all_dirty();
    }

    pub fn mark_all_pixels_dirty(&mut self) {
        self.pixel_dirty.fill(true);
    }

    pub fn pixels_dirty_count(&self) -> usize {
        self.pixel_dirty.count_ones()
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    /// Mirror the layer on both axes. Only [`Tilemap::draw`] looks at this.
    pub fn set_flip(&mut self, flip: bool) {
        self.flip = flip;
    }

    pub fn scroll(&self) -> &LayerScroll {
        &self.scroll
    }

    /// Select this frame's scroll mode.
    ///
    /// Panics when a row/column table length is not a power of two in
    /// `1..=512` or exceeds the layer's pixel size on that axis.
    pub fn set_scroll(&mut self, scroll: LayerScroll) {
        if let Some(len) = scroll.table_len() {
            let limit = match &scroll {
                LayerScroll::Rows { .. } => self.height(),
                _ => self.width(),
            };
            assert!(
                len.is_power_of_two() && len <= 512 && len <= limit,
                "{}: invalid scroll table length {len}",
                self.config.name
            );
        }
        self.scroll = scroll;
    }

    /// Decode every dirty cell and queue its pixels for repaint. Returns the
    /// number of cells refreshed.
    pub fn update(&mut self) -> usize {
        let decoder = self.config.decoder;
        let mut refreshed = Vec::new();
        self.store.drain_dirty(|offset, cell| refreshed.push((offset, decoder.decode(cell))));
        for &(offset, info) in &refreshed {
            self.info[offset] = info;
            self.pixel_dirty.set(offset, true);
        }
        refreshed.len()
    }

    /// Mark every pen any cell of this layer can show. This covers
    /// off-screen cells too, so a scroll never exposes an unpublished colour.
    pub fn mark_used_colors(&self, palette: &mut Palette, gfx: &GfxElement) {
        let hidden = match self.config.kind {
            LayerKind::Transparent { pen } => 1u32 << pen,
            _ => 0,
        };
        for info in &self.info {
            palette.mark_pens(gfx.palette_base(info.color), gfx.pen_usage(info.code) & !hidden);
        }
    }

    #[inline]
    fn cache_offset(&self, lx: usize, ly: usize) -> usize {
        ly * self.width() + lx
    }

    /// Repaint stale cells into the pixel cache. Returns the number of cells
    /// painted.
    pub fn render(&mut self, gfx: &GfxElement, palette: &Palette) -> usize {
        let (tw, th) = (self.config.tile_width, self.config.tile_height);
        assert!(
            gfx.width() == tw && gfx.height() == th,
            "{}: graphics bank holds {}x{} tiles, layer uses {tw}x{th}",
            self.config.name,
            gfx.width(),
            gfx.height()
        );
        let stale: Vec<usize> = self.pixel_dirty.iter_ones().collect();
        for &index in &stale {
            let (col, row) = self.cell_of[index];
            let info = self.info[index];
            let tile = gfx.tile(info.code);
            let base = gfx.palette_base(info.color);
            for ty in 0..th {
                let src_y = if info.flags.contains(TileFlags::FLIP_Y) { th - 1 - ty } else { ty };
                for tx in 0..tw {
                    let src_x = if info.flags.contains(TileFlags::FLIP_X) { tw - 1 - tx } else { tx };
                    let pen = tile[src_y * tw + src_x];
                    let at = self.cache_offset(col * tw + tx, row * th + ty);
                    self.pixels[at] = palette.rgb(base + pen as usize);
                    self.masks[at] = self.config.kind.pass_mask(info.group, pen);
                }
            }
        }
        self.pixel_dirty.fill(false);
        stale.len()
    }

    /// Cached RGB and pass mask of layer pixel (`lx`, `ly`).
    pub fn cached_pixel(&self, lx: usize, ly: usize) -> (u32, u8) {
        let at = self.cache_offset(lx, ly);
        (self.pixels[at], self.masks[at])
    }

    /// Composite the layer onto `dest` inside `clip`.
    pub fn draw(&self, dest: &mut Bitmap, clip: &Rect, pass: DrawPass) {
        let Some(area) = clip.intersect(&dest.bounds()) else {
            return;
        };
        let want = match pass {
            DrawPass::Normal | DrawPass::Front => PEN_FRONT,
            DrawPass::Back => PEN_BACK,
        };
        let (w, h) = (self.width(), self.height());
        let (screen_w, screen_h) = (dest.width() as i32, dest.height() as i32);
        for sy in area.min_y..=area.max_y {
            let row = dest.row_mut(sy as usize);
            for sx in area.min_x..=area.max_x {
                let (qx, qy) = if self.flip {
                    (screen_w - 1 - sx, screen_h - 1 - sy)
                } else {
                    (sx, sy)
                };
                let (lx, ly) = self.scroll.map(qx, qy, w, h);
                let at = self.cache_offset(lx, ly);
                if self.masks[at] & want != 0 {
                    row[sx as usize] = self.pixels[at];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::WORD;
    use crate::palette::PaletteFormat;
    use pretty_assertions::assert_eq;

    fn palette(len: usize) -> Palette {
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, len);
        for i in 0..len {
            pal.write_primary(i, i as u16, WORD);
            pal.mark_used(i);
        }
        pal.recompute_if_needed();
        pal
    }

    /// 8x8 tiles, 16 pens, tile `n` is filled with pen `n % 16` except pixel
    /// (0,0) which is pen 1.
    fn gfx(color_base: usize) -> GfxElement {
        let mut pixels = Vec::new();
        for code in 0..0x100u32 {
            let mut tile = vec![(code % 16) as u8; 64];
            tile[0] = 1;
            pixels.extend(tile);
        }
        GfxElement::from_pixels(8, 8, 4, color_base, 16, pixels)
    }

    fn layer(kind: LayerKind) -> Tilemap {
        Tilemap::new(TilemapConfig {
            name: "test",
            gfx_bank: 0,
            cols: 64,
            rows: 32,
            tile_width: 8,
            tile_height: 8,
            scan: ScanOrder::RowMajor,
            decoder: TileDecoder::Simple,
            kind,
        })
    }

    #[test]
    fn scan_orders() {
        assert_eq!(ScanOrder::RowMajor.index(3, 2, 64, 32), 2 * 64 + 3);
        assert_eq!(ScanOrder::ColMajor.index(3, 2, 32, 32), 3 * 32 + 2);
        assert_eq!(ScanOrder::FourPageWrap.index(0x21, 0x01, 64, 32), 0x1 + 0x20 + 0x400);
        assert_eq!(ScanOrder::FourPageWrap.index(63, 31, 64, 32), 2047);
    }

    #[test]
    fn simple_decoder() {
        let info = TileDecoder::Simple.decode(0x3042);
        assert_eq!(info.code, 0x042);
        assert_eq!(info.color, 3);
        assert_eq!(info.flags, TileFlags::empty());
    }

    #[test]
    fn banked_decoder() {
        let attr = BankedAttr {
            high_bank: 0x20,
            color_mask: 0x0f,
            flip_x: 0,
            flip_y: 0x10,
            split: 0,
        };
        let info = TileDecoder::Banked(attr).decode(0xf5_42);
        // 0xf5 = bank 3, high bank set, flip y, colour 5
        assert_eq!(info.code, 0x742);
        assert_eq!(info.color, 5);
        assert_eq!(info.flags, TileFlags::FLIP_Y);
        assert_eq!(info.group, 0);
    }

    #[test]
    fn foreground_tile_lands_on_its_cell() {
        // colour group 3 of a layer whose colours start at 0x90 uses
        // palette entries 192..=207
        let gfx = gfx(0x90);
        let pal = palette(512);
        let mut fg = layer(LayerKind::Transparent { pen: 0 });
        let cell = fg.cell_index(5, 5);
        fg.write(cell, 0x3042, WORD);
        fg.update();
        fg.render(&gfx, &pal);
        let mut screen = Bitmap::new(256, 256);
        screen.fill(0xabcdef);
        let clip = screen.bounds();
        fg.draw(&mut screen, &clip, DrawPass::Normal);

        // tile 0x42 is pen 2 except its first pixel
        assert_eq!(screen.pixel(40, 40), pal.rgb(192 + 1));
        for y in 40..48 {
            for x in 40..48 {
                if (x, y) != (40, 40) {
                    assert_eq!(screen.pixel(x, y), pal.rgb(192 + 2), "pixel ({x},{y})");
                }
            }
        }
        // neighbours are tile 0, pen 0, transparent
        assert_eq!(screen.pixel(39, 40), 0xabcdef);
        assert_eq!(screen.pixel(48, 47), 0xabcdef);
        assert_eq!(screen.pixel(41, 48), 0xabcdef);
    }

    #[test]
    fn render_is_idempotent() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        for i in 0..64 {
            map.write(i * 7, (i as u16) << 8 | i as u16, WORD);
        }
        map.update();
        map.render(&gfx, &pal);
        let first = (map.pixels.clone(), map.masks.clone());
        assert_eq!(map.render(&gfx, &pal), 0);
        map.mark_all_pixels_dirty();
        assert_eq!(map.render(&gfx, &pal), 64 * 32);
        assert_eq!((map.pixels.clone(), map.masks.clone()), first);
    }

    #[test]
    fn update_only_refreshes_changed_cells() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.update();
        map.render(&gfx, &pal);
        map.write(10, 0x0001, WORD);
        map.write(10, 0x0001, WORD);
        map.write(11, 0x0000, WORD);
        assert_eq!(map.update(), 1);
        assert_eq!(map.pixels_dirty_count(), 1);
    }

    #[test]
    fn whole_scroll_wraps() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.write(map.cell_index(0, 0), 0x0005, WORD);
        map.update();
        map.render(&gfx, &pal);
        map.set_scroll(LayerScroll::Whole { x: -8, y: 248 });
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        map.draw(&mut screen, &clip, DrawPass::Normal);
        // cell (0,0) appears at screen (8, 8): y wraps at 256 pixels
        assert_eq!(screen.pixel(9, 9), pal.rgb(5));
        assert_eq!(screen.pixel(9, 17), pal.rgb(0));
    }

    #[test]
    fn row_scroll_shifts_bands_independently() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.write(map.cell_index(1, 0), 0x0007, WORD);
        map.write(map.cell_index(1, 1), 0x0007, WORD);
        map.update();
        map.render(&gfx, &pal);
        let mut table = vec![0; 32];
        table[1] = 8;
        map.set_scroll(LayerScroll::Rows { y: 0, x: table });
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        map.draw(&mut screen, &clip, DrawPass::Normal);
        assert_eq!(screen.pixel(9, 1), pal.rgb(7));
        // second band scrolled left by one tile
        assert_eq!(screen.pixel(1, 9), pal.rgb(7));
        assert_eq!(screen.pixel(9, 9), pal.rgb(0));
    }

    #[test]
    fn col_scroll_shifts_columns() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.write(map.cell_index(0, 1), 0x0009, WORD);
        map.update();
        map.render(&gfx, &pal);
        let mut table = vec![0; 64];
        table[0] = 8;
        map.set_scroll(LayerScroll::Cols { x: 0, y: table });
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        map.draw(&mut screen, &clip, DrawPass::Normal);
        assert_eq!(screen.pixel(1, 1), pal.rgb(9));
        assert_eq!(screen.pixel(9, 1), pal.rgb(0));
    }

    #[test]
    fn switching_scroll_mode_drops_old_table() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.write(map.cell_index(1, 0), 0x0007, WORD);
        map.update();
        map.render(&gfx, &pal);
        map.set_scroll(LayerScroll::Rows { y: 0, x: vec![8; 32] });
        map.set_scroll(LayerScroll::Whole { x: 0, y: 0 });
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        map.draw(&mut screen, &clip, DrawPass::Normal);
        assert_eq!(screen.pixel(9, 1), pal.rgb(7));
        assert_eq!(screen.pixel(1, 1), pal.rgb(0));
    }

    #[test]
    #[should_panic]
    fn scroll_table_must_be_power_of_two() {
        let mut map = layer(LayerKind::Opaque);
        map.set_scroll(LayerScroll::Rows { y: 0, x: vec![0; 3] });
    }

    #[test]
    fn flip_mirrors_the_screen() {
        let gfx = gfx(0);
        let pal = palette(256);
        let mut map = layer(LayerKind::Opaque);
        map.write(map.cell_index(0, 0), 0x0005, WORD);
        map.update();
        map.set_flip(true);
        map.render(&gfx, &pal);
        assert_eq!(map.cached_pixel(0, 0), (pal.rgb(1), PEN_FRONT | PEN_BACK));
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        map.draw(&mut screen, &clip, DrawPass::Normal);
        assert_eq!(screen.pixel(255, 255), pal.rgb(1));
        assert_eq!(screen.pixel(250, 250), pal.rgb(5));
        assert_eq!(screen.pixel(246, 246), pal.rgb(0));
        // the cache stays put, so flipping back needs no repaint
        map.set_flip(false);
        assert_eq!(map.pixels_dirty_count(), 0);
        map.draw(&mut screen, &clip, DrawPass::Normal);
        assert_eq!(screen.pixel(0, 0), pal.rgb(1));
        assert_eq!(screen.pixel(5, 5), pal.rgb(5));
    }

    #[test]
    fn split_layer_passes() {
        let masks = [
            SplitMask { front_transparent: 0xffff, back_transparent: 0 },
            SplitMask { front_transparent: 0x0001, back_transparent: 0 },
        ];
        assert_eq!(LayerKind::Split(masks).pass_mask(0, 3), PEN_BACK);
        assert_eq!(LayerKind::Split(masks).pass_mask(1, 3), PEN_FRONT | PEN_BACK);
        assert_eq!(LayerKind::Split(masks).pass_mask(1, 0), PEN_BACK);
        assert_eq!(LayerKind::Transparent { pen: 3 }.pass_mask(0, 3), 0);
    }

    #[test]
    fn used_colours_cover_every_cell() {
        let gfx = gfx(0x40);
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 512);
        let mut map = layer(LayerKind::Transparent { pen: 0 });
        map.write(100, 0x2003, WORD);
        map.update();
        map.mark_used_colors(&mut pal, &gfx);
        // tile 3 in colour 2: pens 1 and 3
        assert!(pal.is_used(0x40 + 2 * 16 + 1));
        assert!(pal.is_used(0x40 + 2 * 16 + 3));
        // tile 0 elsewhere: pen 1 only, pen 0 is transparent
        assert!(pal.is_used(0x40 + 1));
        assert!(!pal.is_used(0x40));
    }
}
