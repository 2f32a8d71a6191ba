//! Sprite compositor.
//!
//! The CPU writes live sprite RAM whenever it likes; the hardware only looks
//! at a copy latched at a fixed moment (a DMA-flag write, or vblank on the
//! buffered boards). [`SpriteCompositor::snapshot`] models that latch and
//! everything that draws reads the snapshot only.

use crate::core::bitmap::{Bitmap, Rect};
use crate::core::bus::WordRam;
use crate::gfx::{GfxDraw, GfxElement, Transparency, draw_gfx};
use crate::palette::Palette;

/// RAM cells per sprite entry on every supported board.
pub const ENTRY_CELLS: usize = 4;

/// Per-board sprite RAM layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteFormat {
    /// Words `y/flags, code, x/colour, unused`; chained multi-height cells,
    /// a flash bit and a behind-playfield bit. Code 0 is an empty slot.
    CrudeBuster,
    /// Bytes `code, attr, y, x`, one byte per RAM cell.
    Gng,
    /// Words `code, attr, y, x`. Code 0xfff is an empty slot.
    TigerRoad,
}

impl SpriteFormat {
    /// Higher-index entries draw last, so they win overlaps.
    pub fn descending(self) -> bool {
        !matches!(self, SpriteFormat::CrudeBuster)
    }

    pub fn transparent_pen(self) -> u8 {
        match self {
            SpriteFormat::CrudeBuster => 0,
            SpriteFormat::Gng | SpriteFormat::TigerRoad => 15,
        }
    }

    /// Decode one entry into unflipped screen coordinates. `None` for empty
    /// slots.
    pub fn decode(self, cells: &[u16]) -> Option<SpriteEntry> {
        match self {
            SpriteFormat::CrudeBuster => {
                let (w0, w1, w2) = (cells[0], cells[1], cells[2]);
                let mut code = (w1 & 0x7fff) as u32;
                if code == 0 {
                    return None;
                }
                let mut color = ((w2 >> 9) & 0xf) as u32;
                if w2 & 0x2000 != 0 {
                    color += 64;
                }
                let multi = (1u32 << ((w0 & 0x0600) >> 9)) - 1;
                let flip_y = w0 & 0x4000 != 0;
                code &= !multi;
                let code_step = if flip_y {
                    -1
                } else {
                    code += multi;
                    1
                };
                Some(SpriteEntry {
                    code,
                    code_step,
                    cells: multi + 1,
                    color,
                    flip_x: w0 & 0x2000 != 0,
                    flip_y,
                    x: 240 - sign_extend_9(w2),
                    y: 240 - sign_extend_9(w0),
                    behind: w0 & 0x8000 != 0,
                    flash: w0 & 0x1000 != 0,
                })
            }
            SpriteFormat::Gng => {
                let (code, attr, y, x) = (cells[0] & 0xff, cells[1] & 0xff, cells[2] & 0xff, cells[3] & 0xff);
                Some(SpriteEntry {
                    code: (code | ((attr << 2) & 0x300)) as u32,
                    color: ((attr >> 4) & 3) as u32,
                    flip_x: attr & 0x04 != 0,
                    flip_y: attr & 0x08 != 0,
                    x: x as i32 - 0x100 * (attr & 1) as i32,
                    y: y as i32,
                    ..SpriteEntry::single()
                })
            }
            SpriteFormat::TigerRoad => {
                let (code, attr) = (cells[0], cells[1]);
                if code == 0xfff {
                    return None;
                }
                let mut sy = (cells[2] & 0x1ff) as i32;
                let mut sx = (cells[3] & 0x1ff) as i32;
                if sx > 0x100 {
                    sx -= 0x200;
                }
                if sy > 0x100 {
                    sy -= 0x200;
                }
                Some(SpriteEntry {
                    code: code as u32,
                    color: ((attr >> 2) & 0x0f) as u32,
                    flip_x: attr & 0x02 != 0,
                    flip_y: attr & 0x01 != 0,
                    x: sx,
                    y: 240 - sy,
                    ..SpriteEntry::single()
                })
            }
        }
    }
}

/// 9-bit position with values from 256 upwards wrapping to negative.
#[inline]
fn sign_extend_9(value: u16) -> i32 {
    let v = (value & 0x1ff) as i32;
    if v >= 256 { v - 512 } else { v }
}

/// One decoded sprite. `x`/`y` place the first cell on an unflipped screen;
/// further cells chain upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteEntry {
    /// Code of the first cell.
    pub code: u32,
    /// Code difference from one cell to the next one up.
    pub code_step: i32,
    pub cells: u32,
    pub color: u32,
    pub flip_x: bool,
    pub flip_y: bool,
    pub x: i32,
    pub y: i32,
    /// Drawn in the pass under the mid playfields.
    pub behind: bool,
    /// Hidden on odd frames.
    pub flash: bool,
}

impl SpriteEntry {
    fn single() -> Self {
        Self {
            code: 0,
            code_step: 1,
            cells: 1,
            color: 0,
            flip_x: false,
            flip_y: false,
            x: 0,
            y: 0,
            behind: false,
            flash: false,
        }
    }

    /// Screen placement of every cell, last-drawn cell last.
    pub fn layout(&self, flip_screen: bool, cell_size: i32, screen_size: i32) -> Vec<GfxDraw> {
        let origin = screen_size - cell_size;
        let (mut x, mut y) = (self.x, self.y);
        let (mut flip_x, mut flip_y) = (self.flip_x, self.flip_y);
        let mut step_y = -cell_size;
        if flip_screen {
            x = origin - x;
            y = origin - y;
            flip_x = !flip_x;
            flip_y = !flip_y;
            step_y = cell_size;
        }
        (0..self.cells)
            .rev()
            .map(|i| GfxDraw {
                code: (self.code as i64 - i as i64 * self.code_step as i64) as u32,
                color: self.color,
                flip_x,
                flip_y,
                x,
                y: y + step_y * i as i32,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpritePass {
    All,
    /// Only sprites flagged to sit behind the mid playfields.
    Back,
    Front,
}

impl SpritePass {
    fn accepts(self, entry: &SpriteEntry) -> bool {
        match self {
            SpritePass::All => true,
            SpritePass::Back => entry.behind,
            SpritePass::Front => !entry.behind,
        }
    }
}

/// Frame state the compositor needs, passed in rather than read globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteDrawParams {
    pub pass: SpritePass,
    pub frame_parity: u8,
    pub flip_screen: bool,
}

#[derive(Debug, Clone)]
pub struct SpriteCompositor {
    format: SpriteFormat,
    gfx_bank: usize,
    live: WordRam,
    table: WordRam,
}

impl SpriteCompositor {
    /// `ram_cells` is the sprite RAM size in words (bytes on byte boards).
    pub fn new(format: SpriteFormat, gfx_bank: usize, ram_cells: usize) -> Self {
        assert!(ram_cells % ENTRY_CELLS == 0, "sprite RAM holds partial entries");
        Self {
            format,
            gfx_bank,
            live: WordRam::new(ram_cells),
            table: WordRam::new(ram_cells),
        }
    }

    pub fn format(&self) -> SpriteFormat {
        self.format
    }

    pub fn gfx_bank(&self) -> usize {
        self.gfx_bank
    }

    pub fn write(&mut self, index: usize, data: u16, mask: u16) {
        self.live.write(index, data, mask);
    }

    pub fn read(&self, index: usize) -> u16 {
        self.live.read(index)
    }

    /// Latch live sprite RAM into the table the next draws read.
    pub fn snapshot(&mut self) {
        self.table.copy_from(&self.live);
    }

    /// Non-empty entries of the latched table, in draw order.
    pub fn entries(&self) -> Vec<SpriteEntry> {
        let raw = self.table.as_slice();
        let count = raw.len() / ENTRY_CELLS;
        let decode = |i: usize| self.format.decode(&raw[i * ENTRY_CELLS..(i + 1) * ENTRY_CELLS]);
        if self.format.descending() {
            (0..count).rev().filter_map(decode).collect()
        } else {
            (0..count).filter_map(decode).collect()
        }
    }

    /// Mark the pens every latched sprite can show.
    pub fn mark_used_colors(&self, palette: &mut Palette, gfx: &GfxElement) {
        let hidden = 1u32 << self.format.transparent_pen();
        for entry in self.entries() {
            let base = gfx.palette_base(entry.color);
            for i in 0..entry.cells {
                let code = (entry.code as i64 - i as i64 * entry.code_step as i64) as u32;
                palette.mark_pens(base, gfx.pen_usage(code) & !hidden);
            }
        }
    }

    /// Draw the latched sprites that belong to `params.pass`. Returns the
    /// number of cells that reached the screen.
    pub fn draw(
        &self,
        dest: &mut Bitmap,
        gfx: &GfxElement,
        palette: &Palette,
        clip: &Rect,
        params: &SpriteDrawParams,
    ) -> usize {
        let cell = gfx.width() as i32;
        let screen = dest.width() as i32;
        let transparency = Transparency::Pen(self.format.transparent_pen());
        let mut drawn = 0;
        for entry in self.entries() {
            if !params.pass.accepts(&entry) {
                continue;
            }
            if entry.flash && params.frame_parity & 1 != 0 {
                continue;
            }
            let cells = entry.layout(params.flip_screen, cell, screen);
            // skip sprites whose whole column misses the clip
            let min_y = cells.iter().map(|c| c.y).min().unwrap_or(0);
            let max_y = cells.iter().map(|c| c.y).max().unwrap_or(0) + gfx.height() as i32 - 1;
            let x = cells.first().map_or(0, |c| c.x);
            if Rect::new(x, x + cell - 1, min_y, max_y).intersect(clip).is_none() {
                continue;
            }
            for placed in &cells {
                if draw_gfx(dest, gfx, palette, placed, clip, transparency) {
                    drawn += 1;
                }
            }
        }
        drawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::WORD;
    use crate::palette::PaletteFormat;
    use pretty_assertions::assert_eq;

    fn palette() -> Palette {
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 2048);
        for i in 0..2048 {
            pal.write_primary(i, i as u16, WORD);
            pal.mark_used(i);
        }
        pal.recompute_if_needed();
        pal
    }

    /// 16x16 cells, tile `n` filled with pen `n % 16`.
    fn gfx(color_count: usize) -> GfxElement {
        let pixels = (0..0x200u32).flat_map(|code| vec![(code % 16) as u8; 256]).collect();
        GfxElement::from_pixels(16, 16, 4, 0, color_count, pixels)
    }

    fn write_entry(sprites: &mut SpriteCompositor, slot: usize, cells: [u16; 4]) {
        for (i, value) in cells.into_iter().enumerate() {
            sprites.write(slot * ENTRY_CELLS + i, value, WORD);
        }
    }

    fn ys(cells: &[GfxDraw]) -> Vec<i32> {
        cells.iter().map(|c| c.y).collect()
    }

    #[test]
    fn four_tall_sprite_chains_upwards() {
        // multi-height field 2, base cell at screen (100, 100)
        let entry = SpriteFormat::CrudeBuster
            .decode(&[0x0400 | 140, 0x0101, 140, 0])
            .unwrap();
        assert_eq!(entry.cells, 4);
        let cells = entry.layout(false, 16, 256);
        assert_eq!(ys(&cells), vec![52, 68, 84, 100]);
        assert!(cells.iter().all(|c| c.x == 100));
        // code base is rounded down to the chain, the top cell shows it
        let codes: Vec<u32> = cells.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![0x100, 0x101, 0x102, 0x103]);
    }

    #[test]
    fn flipped_screen_chains_downwards() {
        let entry = SpriteFormat::CrudeBuster
            .decode(&[0x0400 | 100, 0x0100, 100, 0])
            .unwrap();
        let cells = entry.layout(true, 16, 256);
        assert_eq!(ys(&cells), vec![148, 132, 116, 100]);
        assert!(cells.iter().all(|c| c.flip_x && c.flip_y));
    }

    #[test]
    fn flip_y_reverses_chain_codes() {
        let entry = SpriteFormat::CrudeBuster
            .decode(&[0x4200 | 140, 0x0103, 140, 0])
            .unwrap();
        let codes: Vec<u32> = entry.layout(false, 16, 256).iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![0x103, 0x102]);
    }

    #[test]
    fn flip_y_keeps_placement_of_tall_sprites() {
        // the flip-Y attribute mirrors each cell and reverses the codes;
        // only flip screen moves the chain
        let entry = SpriteFormat::CrudeBuster
            .decode(&[0x4000 | 0x0400 | 140, 0x0100, 140, 0])
            .unwrap();
        let cells = entry.layout(false, 16, 256);
        assert_eq!(ys(&cells), vec![52, 68, 84, 100]);
        let codes: Vec<u32> = cells.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![0x103, 0x102, 0x101, 0x100]);
        assert!(cells.iter().all(|c| c.flip_y && !c.flip_x));
    }

    #[test]
    fn crude_buster_fields() {
        let entry = SpriteFormat::CrudeBuster
            .decode(&[0x9000 | 0x1f0, 0x8005, 0x2000 | (3 << 9) | 0x10, 0])
            .unwrap();
        assert_eq!(entry.code, 5);
        assert_eq!(entry.color, 67);
        assert!(entry.behind);
        assert!(entry.flash);
        // 0x1f0 wraps to -16
        assert_eq!(entry.y, 256);
        assert_eq!(entry.x, 224);
        assert_eq!(SpriteFormat::CrudeBuster.decode(&[0, 0x8000, 0, 0]), None);
    }

    #[test]
    fn gng_fields() {
        let entry = SpriteFormat::Gng.decode(&[0x12, 0xfd, 0x40, 0x08]).unwrap();
        // attr 0xfd: bank 3, colour 3, flip y, flip x, x high bit
        assert_eq!(entry.code, 0x312);
        assert_eq!(entry.color, 3);
        assert!(entry.flip_x && entry.flip_y);
        assert_eq!(entry.x, 8 - 0x100);
        assert_eq!(entry.y, 0x40);
    }

    #[test]
    fn tiger_road_fields() {
        assert_eq!(SpriteFormat::TigerRoad.decode(&[0xfff, 0, 0, 0]), None);
        let entry = SpriteFormat::TigerRoad.decode(&[0x123, 0x003e, 0x180, 0x020]).unwrap();
        assert_eq!(entry.color, 0x0f);
        assert!(entry.flip_x && !entry.flip_y);
        // 0x180 wraps to -0x80
        assert_eq!(entry.y, 240 + 0x80);
        assert_eq!(entry.x, 0x20);
    }

    #[test]
    fn snapshot_isolates_the_frame() {
        let gfx = gfx(80);
        let pal = palette();
        let mut sprites = SpriteCompositor::new(SpriteFormat::CrudeBuster, 0, 0x400);
        write_entry(&mut sprites, 0, [140, 0x0003, 140, 0]);
        sprites.snapshot();
        // the CPU moves the sprite after the latch
        write_entry(&mut sprites, 0, [40, 0x0003, 40, 0]);

        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        let params = SpriteDrawParams { pass: SpritePass::All, frame_parity: 0, flip_screen: false };
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &params), 1);
        assert_eq!(screen.pixel(100, 100), pal.rgb(3));
        assert_eq!(screen.pixel(200, 200), 0);

        sprites.snapshot();
        let mut next = Bitmap::new(256, 256);
        sprites.draw(&mut next, &gfx, &pal, &clip, &params);
        assert_eq!(next.pixel(100, 100), 0);
        assert_eq!(next.pixel(200, 200), pal.rgb(3));
    }

    #[test]
    fn flashing_sprites_skip_odd_frames() {
        let gfx = gfx(80);
        let pal = palette();
        let mut sprites = SpriteCompositor::new(SpriteFormat::CrudeBuster, 0, 0x400);
        write_entry(&mut sprites, 0, [0x1000 | 140, 0x0003, 140, 0]);
        sprites.snapshot();
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        let mut params = SpriteDrawParams { pass: SpritePass::All, frame_parity: 1, flip_screen: false };
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &params), 0);
        params.frame_parity = 2;
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &params), 1);
    }

    #[test]
    fn passes_split_on_behind_bit() {
        let gfx = gfx(80);
        let pal = palette();
        let mut sprites = SpriteCompositor::new(SpriteFormat::CrudeBuster, 0, 0x400);
        write_entry(&mut sprites, 0, [0x8000 | 140, 0x0003, 140, 0]);
        write_entry(&mut sprites, 1, [100, 0x0004, 100, 0]);
        sprites.snapshot();
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        let back = SpriteDrawParams { pass: SpritePass::Back, frame_parity: 0, flip_screen: false };
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &back), 1);
        assert_eq!(screen.pixel(100, 100), pal.rgb(3));
        assert_eq!(screen.pixel(140, 140), 0);
        let front = SpriteDrawParams { pass: SpritePass::Front, ..back };
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &front), 1);
        assert_eq!(screen.pixel(140, 140), pal.rgb(4));
    }

    #[test]
    fn descending_order_puts_higher_slots_on_top() {
        let gfx = gfx(4);
        let pal = palette();
        let mut sprites = SpriteCompositor::new(SpriteFormat::Gng, 0, 0x200);
        write_entry(&mut sprites, 0, [0x01, 0, 0x50, 0x50]);
        write_entry(&mut sprites, 1, [0x02, 0, 0x50, 0x50]);
        sprites.snapshot();
        let mut screen = Bitmap::new(256, 256);
        let clip = screen.bounds();
        let params = SpriteDrawParams { pass: SpritePass::All, frame_parity: 0, flip_screen: false };
        sprites.draw(&mut screen, &gfx, &pal, &clip, &params);
        // slot 1 draws first, slot 0 last
        assert_eq!(screen.pixel(0x55, 0x55), pal.rgb(1));
    }

    #[test]
    fn off_screen_sprites_draw_nothing() {
        let gfx = gfx(80);
        let pal = palette();
        let mut sprites = SpriteCompositor::new(SpriteFormat::CrudeBuster, 0, 0x400);
        // x wraps to 240 - (-256) = 496
        write_entry(&mut sprites, 0, [140, 0x0003, 0x100, 0]);
        sprites.snapshot();
        let mut screen = Bitmap::new(256, 256);
        let clip = Rect::new(0, 255, 8, 247);
        let params = SpriteDrawParams { pass: SpritePass::All, frame_parity: 0, flip_screen: false };
        assert_eq!(sprites.draw(&mut screen, &gfx, &pal, &clip, &params), 0);
        assert_eq!(screen, Bitmap::new(256, 256));
    }

    #[test]
    fn used_colours_skip_transparent_pen() {
        let gfx = gfx(4);
        let mut pal = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 256);
        let mut sprites = SpriteCompositor::new(SpriteFormat::Gng, 0, 0x200);
        // the remaining slots are zero: tile 0 in colour 0, all pen 0
        write_entry(&mut sprites, 0, [0x0f, 0x10, 0, 0]);
        sprites.snapshot();
        sprites.mark_used_colors(&mut pal, &gfx);
        assert!(pal.is_used(0));
        // tile 0x0f is all pen 15, the transparent pen
        assert!(!pal.is_used(16 + 15));
    }
}
