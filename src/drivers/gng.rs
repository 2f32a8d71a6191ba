//! Ghosts'n Goblins / Makai-Mura (Capcom, 1985).
//!
//! 6809 board with a byte-wide video bus. A 2bpp text layer sits above a
//! 3bpp split background: background tiles in split group 1 keep most of
//! their pens in front of the sprites. Sprite RAM is buffered at vblank.

use std::collections::HashMap;

use crate::compositor::VideoContext;
use crate::core::bitmap::{Bitmap, Rect};
use crate::core::bus::{AddressRange, HIGH_BYTE, LOW_BYTE, VideoBus};
use crate::core::io::{InputPorts, SoundLatch};
use crate::drivers::decode_address;
use crate::error::VideoError;
use crate::gfx::{BitOffset, ElementCount, GfxDecodeEntry, GfxLayout, GfxSet};
use crate::palette::{Palette, PaletteFormat};
use crate::sprites::{SpriteCompositor, SpriteFormat, SpritePass};
use crate::tilemap::{
    BankedAttr, DrawPass, LayerKind, LayerScroll, ScanOrder, SplitMask, TileDecoder, Tilemap,
    TilemapConfig,
};

pub const BOARD: &str = "gng";
pub const PALETTE_ENTRIES: usize = 256;
/// System, P1, P2, DSW1, DSW2.
pub const INPUT_PORTS: usize = 5;

const CHAR_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    count: ElementCount::Frac { num: 1, den: 1 },
    planes: &[BitOffset::Bits(4), BitOffset::Bits(0)],
    x_offsets: &[0, 1, 2, 3, 8, 9, 10, 11],
    y_offsets: &[0, 16, 32, 48, 64, 80, 96, 112],
    stride: 16 * 8,
};

const TILE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: ElementCount::Frac { num: 1, den: 3 },
    planes: &[
        BitOffset::Frac { num: 2, den: 3, plus: 0 },
        BitOffset::Frac { num: 1, den: 3, plus: 0 },
        BitOffset::Frac { num: 0, den: 3, plus: 0 },
    ],
    x_offsets: &[
        0, 1, 2, 3, 4, 5, 6, 7, 128, 129, 130, 131, 132, 133, 134, 135,
    ],
    y_offsets: &[
        0, 8, 16, 24, 32, 40, 48, 56, 64, 72, 80, 88, 96, 104, 112, 120,
    ],
    stride: 32 * 8,
};

const SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: ElementCount::Frac { num: 1, den: 2 },
    planes: &[
        BitOffset::Frac { num: 1, den: 2, plus: 4 },
        BitOffset::Frac { num: 1, den: 2, plus: 0 },
        BitOffset::Bits(4),
        BitOffset::Bits(0),
    ],
    x_offsets: &[
        0, 1, 2, 3, 8, 9, 10, 11, 256, 257, 258, 259, 264, 265, 266, 267,
    ],
    y_offsets: &[
        0, 16, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224, 240,
    ],
    stride: 64 * 8,
};

pub const GFX_DECODE: [GfxDecodeEntry; 3] = [
    GfxDecodeEntry { region: "gfx1", layout: &CHAR_LAYOUT, color_base: 0x80, color_count: 16 },
    GfxDecodeEntry { region: "gfx2", layout: &TILE_LAYOUT, color_base: 0x00, color_count: 8 },
    GfxDecodeEntry { region: "gfx3", layout: &SPRITE_LAYOUT, color_base: 0x40, color_count: 4 },
];

const GFX_SHAPE: [(usize, usize); 3] = [(8, 8), (16, 16), (16, 16)];
const SPRITE_BANK: usize = 2;

const FG_CONFIG: TilemapConfig = TilemapConfig {
    name: "fg",
    gfx_bank: 0,
    cols: 32,
    rows: 32,
    tile_width: 8,
    tile_height: 8,
    scan: ScanOrder::RowMajor,
    decoder: TileDecoder::Banked(BankedAttr {
        high_bank: 0,
        color_mask: 0x0f,
        flip_x: 0x10,
        flip_y: 0x20,
        split: 0,
    }),
    kind: LayerKind::Transparent { pen: 3 },
};

const BG_CONFIG: TilemapConfig = TilemapConfig {
    name: "bg",
    gfx_bank: 1,
    cols: 32,
    rows: 32,
    tile_width: 16,
    tile_height: 16,
    scan: ScanOrder::ColMajor,
    decoder: TileDecoder::Banked(BankedAttr {
        high_bank: 0,
        color_mask: 0x07,
        flip_x: 0x10,
        flip_y: 0x20,
        split: 0x08,
    }),
    // group 0 is entirely behind the sprites; group 1 keeps pens 0 and 6
    // behind them
    kind: LayerKind::Split([
        SplitMask { front_transparent: 0xff, back_transparent: 0x00 },
        SplitMask { front_transparent: 0x41, back_transparent: 0x00 },
    ]),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    SpriteRam,
    FgCode,
    FgAttr,
    BgCode,
    BgAttr,
    Inputs,
    PaletteB,
    PaletteRg,
    SoundLatch,
    BgScroll,
    Watchdog,
    Flip,
}

const MEMORY_MAP: &[(AddressRange, Region)] = &[
    (AddressRange::new(0x1e00, 0x1fff), Region::SpriteRam),
    (AddressRange::new(0x2000, 0x23ff), Region::FgCode),
    (AddressRange::new(0x2400, 0x27ff), Region::FgAttr),
    (AddressRange::new(0x2800, 0x2bff), Region::BgCode),
    (AddressRange::new(0x2c00, 0x2fff), Region::BgAttr),
    (AddressRange::new(0x3000, 0x3004), Region::Inputs),
    (AddressRange::new(0x3800, 0x38ff), Region::PaletteB),
    (AddressRange::new(0x3900, 0x39ff), Region::PaletteRg),
    (AddressRange::new(0x3a00, 0x3a00), Region::SoundLatch),
    (AddressRange::new(0x3b08, 0x3b0b), Region::BgScroll),
    (AddressRange::new(0x3c00, 0x3c00), Region::Watchdog),
    (AddressRange::new(0x3d00, 0x3d00), Region::Flip),
];

#[derive(Debug, Clone)]
pub struct Gng {
    ctx: VideoContext,
    fg: Tilemap,
    bg: Tilemap,
    sprites: SpriteCompositor,
    // x low, x high, y low, y high
    bg_scroll: [u8; 4],
    flip: bool,
    sound: SoundLatch,
    inputs: InputPorts,
    watchdog: u32,
}

impl Gng {
    pub fn new(gfx: GfxSet, visible: Rect) -> Result<Self, VideoError> {
        gfx.validate(BOARD, &GFX_SHAPE)?;
        log::info!("{BOARD}: video hardware ready, {} graphics banks", gfx.len());
        let palette = Palette::new(PaletteFormat::SplitRrrrGgggBbbbXxxx, PALETTE_ENTRIES);
        Ok(Self {
            ctx: VideoContext::new(palette, gfx, visible)?,
            fg: Tilemap::new(FG_CONFIG),
            bg: Tilemap::new(BG_CONFIG),
            sprites: SpriteCompositor::new(SpriteFormat::Gng, SPRITE_BANK, 0x200),
            bg_scroll: [0; 4],
            flip: false,
            sound: SoundLatch::default(),
            inputs: InputPorts::new(INPUT_PORTS),
            watchdog: 0,
        })
    }

    pub fn from_regions(regions: &HashMap<String, Vec<u8>>, visible: Rect) -> Result<Self, VideoError> {
        Self::new(GfxSet::decode(&GFX_DECODE, regions)?, visible)
    }

    pub fn context(&self) -> &VideoContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut VideoContext {
        &mut self.ctx
    }

    pub fn sound_latch(&mut self) -> &mut SoundLatch {
        &mut self.sound
    }

    pub fn inputs_mut(&mut self) -> &mut InputPorts {
        &mut self.inputs
    }

    pub fn watchdog_resets(&self) -> u32 {
        self.watchdog
    }

    pub fn fg(&self) -> &Tilemap {
        &self.fg
    }

    pub fn bg(&self) -> &Tilemap {
        &self.bg
    }

    pub fn flip_screen(&self) -> bool {
        self.flip
    }

    pub fn bg_scroll(&self) -> (i32, i32) {
        let x = u16::from_le_bytes([self.bg_scroll[0], self.bg_scroll[1]]);
        let y = u16::from_le_bytes([self.bg_scroll[2], self.bg_scroll[3]]);
        (x as i32, y as i32)
    }

    pub fn render_frame(&mut self) -> &Bitmap {
        self.ctx.poll_flip(self.flip, &mut [&mut self.fg, &mut self.bg]);
        let (x, y) = self.bg_scroll();
        self.bg.set_scroll(LayerScroll::Whole { x, y });

        self.ctx.begin_frame();
        self.ctx.prepare(&mut [&mut self.fg, &mut self.bg], Some(&self.sprites));

        self.ctx.draw_layer(&self.bg, DrawPass::Back);
        self.ctx.draw_sprites(&self.sprites, SpritePass::All);
        self.ctx.draw_layer(&self.bg, DrawPass::Front);
        self.ctx.draw_layer(&self.fg, DrawPass::Normal);
        self.ctx.finish_frame()
    }

    /// Vblank: the sprite chip latches sprite RAM for the next frame.
    pub fn end_of_frame(&mut self) {
        self.sprites.snapshot();
    }
}

impl VideoBus for Gng {
    fn read(&mut self, addr: u32) -> Option<u16> {
        let (region, offset) = decode_address(MEMORY_MAP, addr)?;
        let index = offset as usize;
        let value = match region {
            Region::SpriteRam => self.sprites.read(index) & 0xff,
            Region::FgCode => self.fg.read(index) & 0xff,
            Region::FgAttr => self.fg.read(index) >> 8,
            Region::BgCode => self.bg.read(index) & 0xff,
            Region::BgAttr => self.bg.read(index) >> 8,
            Region::Inputs => self.inputs.get(index) & 0xff,
            Region::PaletteB => self.ctx.palette().read_secondary(index),
            Region::PaletteRg => self.ctx.palette().read_primary(index),
            Region::BgScroll => self.bg_scroll[index] as u16,
            // write-only latches
            Region::SoundLatch | Region::Watchdog | Region::Flip => 0xff,
        };
        Some(value)
    }

    fn write(&mut self, addr: u32, data: u16, _mask: u16) -> bool {
        let Some((region, offset)) = decode_address(MEMORY_MAP, addr) else {
            return false;
        };
        let index = offset as usize;
        let byte = data & 0xff;
        match region {
            Region::SpriteRam => self.sprites.write(index, byte, LOW_BYTE),
            Region::FgCode => {
                self.fg.write(index, byte, LOW_BYTE);
            }
            Region::FgAttr => {
                self.fg.write(index, byte << 8, HIGH_BYTE);
            }
            Region::BgCode => {
                self.bg.write(index, byte, LOW_BYTE);
            }
            Region::BgAttr => {
                self.bg.write(index, byte << 8, HIGH_BYTE);
            }
            Region::Inputs => log::debug!("{BOARD}: write {byte:#04x} to input port {index}"),
            Region::PaletteB => self.ctx.palette_mut().write_secondary(index, byte, LOW_BYTE),
            Region::PaletteRg => self.ctx.palette_mut().write_primary(index, byte, LOW_BYTE),
            Region::SoundLatch => self.sound.write(byte as u8),
            Region::BgScroll => self.bg_scroll[index] = byte as u8,
            Region::Watchdog => self.watchdog += 1,
            Region::Flip => self.flip = byte & 1 == 0,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Game;
    use crate::core::bus::WORD;
    use crate::drivers::test_support::{solid_tiles, solid_tiles_2bpp, solid_tiles_3bpp};
    use crate::tilemap::TileFlags;
    use pretty_assertions::assert_eq;

    fn board() -> Gng {
        let gfx = GfxSet::new(vec![
            solid_tiles_2bpp(8, 1024, 0x80, 16),
            solid_tiles_3bpp(16, 1024, 0x00, 8),
            solid_tiles(16, 1024, 0x40, 4),
        ]);
        let mut board = Gng::new(gfx, Game::Gng.default_visible_area()).unwrap();
        // upright
        board.write(0x3d00, 0x01, WORD);
        board
    }

    /// 4-bit channels, written through the two palette byte windows.
    fn set_color(board: &mut Gng, index: u32, r: u16, g: u16, b: u16) {
        board.write(0x3900 + index, (r << 4) | g, WORD);
        board.write(0x3800 + index, b << 4, WORD);
    }

    fn write_sprite(board: &mut Gng, slot: u32, bytes: [u16; 4]) {
        for (i, byte) in bytes.into_iter().enumerate() {
            board.write(0x1e00 + slot * 4 + i as u32, byte, WORD);
        }
    }

    #[test]
    fn palette_bytes_expand_by_nibble_replication() {
        let mut board = board();
        set_color(&mut board, 0x10, 0xa, 0x5, 0xf);
        assert_eq!(board.read(0x3910), Some(0xa5));
        assert_eq!(board.read(0x3810), Some(0xf0));
        assert_eq!(board.context().palette().raw_rgb(0x10), 0xaa55ff);
    }

    #[test]
    fn text_layer_code_and_attribute_bytes() {
        let mut board = board();
        let cell = 3 * 32 + 2;
        board.write(0x2000 + cell, 0x42, WORD);
        board.write(0x2400 + cell, 0xa5, WORD);
        assert_eq!(board.read(0x2000 + cell), Some(0x42));
        assert_eq!(board.read(0x2400 + cell), Some(0xa5));
        let info = board.fg().tile_info(cell as usize);
        assert_eq!(info.code, 0x242);
        assert_eq!(info.color, 5);
        assert_eq!(info.flags, TileFlags::FLIP_Y);
    }

    #[test]
    fn text_pixels_use_char_colours() {
        let mut board = board();
        // colour 2 of the text layer, pen 1 -> entry 0x80 + 2*4 + 1
        set_color(&mut board, 0x89, 0xf, 0, 0);
        let cell = 5 * 32 + 5;
        board.write(0x2000 + cell, 0x01, WORD);
        board.write(0x2400 + cell, 0x02, WORD);
        let screen = board.render_frame();
        assert_eq!(screen.pixel(40, 40), 0xff0000);
        assert_eq!(screen.pixel(47, 47), 0xff0000);
    }

    #[test]
    fn split_background_straddles_sprites() {
        let mut board = board();
        set_color(&mut board, 1, 0, 0xf, 0); // bg colour 0 pen 1
        set_color(&mut board, 0x43, 0, 0, 0xf); // sprite colour 0 pen 3
        // bg column 2 row 2 (pixels 32..47): group 1 tile with pen 1
        let cell = 2 * 32 + 2;
        board.write(0x2800 + cell, 0x01, WORD);
        board.write(0x2c00 + cell, 0x08, WORD);
        // bg column 4 row 2 (pixels 64..79): group 0 tile with pen 1
        let cell = 4 * 32 + 2;
        board.write(0x2800 + cell, 0x01, WORD);
        // fg tile 3 everywhere is transparent; default fg tile 0 is pen 0,
        // make it transparent too
        for cell in 0..0x400 {
            board.write(0x2000 + cell, 0x03, WORD);
        }
        // one sprite over each tile
        write_sprite(&mut board, 0, [0x03, 0x00, 32, 32]);
        write_sprite(&mut board, 1, [0x03, 0x00, 32, 64]);
        board.end_of_frame();
        let screen = board.render_frame();
        assert_eq!(screen.pixel(40, 40), 0x00ff00);
        assert_eq!(screen.pixel(72, 40), 0x0000ff);
    }

    #[test]
    fn sprites_latch_at_vblank() {
        let mut board = board();
        set_color(&mut board, 0x43, 0xf, 0xf, 0xf);
        write_sprite(&mut board, 0, [0x03, 0x00, 100, 100]);
        assert_ne!(board.render_frame().pixel(104, 104), 0xffffff);
        board.end_of_frame();
        write_sprite(&mut board, 0, [0x03, 0x00, 100, 200]);
        assert_eq!(board.render_frame().pixel(104, 104), 0xffffff);
    }

    #[test]
    fn scroll_registers_combine_bytes() {
        let mut board = board();
        board.write(0x3b08, 0x34, WORD);
        board.write(0x3b09, 0x01, WORD);
        board.write(0x3b0a, 0x10, WORD);
        assert_eq!(board.bg_scroll(), (0x134, 0x10));
        board.render_frame();
        assert_eq!(board.bg().scroll(), &LayerScroll::Whole { x: 0x134, y: 0x10 });
    }

    #[test]
    fn flip_port_is_active_low() {
        let mut board = board();
        assert!(!board.flip_screen());
        board.write(0x3d00, 0x00, WORD);
        assert!(board.flip_screen());
        board.render_frame();
        assert!(board.fg().flip() && board.bg().flip());
    }

    #[test]
    fn oversized_visible_area_is_rejected() {
        let gfx = GfxSet::new(vec![
            solid_tiles_2bpp(8, 16, 0x80, 16),
            solid_tiles_3bpp(16, 16, 0x00, 8),
            solid_tiles(16, 16, 0x40, 4),
        ]);
        let wide = Rect::new(0, 319, 0, 239);
        assert_eq!(Gng::new(gfx, wide).unwrap_err(), VideoError::VisibleArea(wide));
    }

    #[test]
    fn side_channels() {
        let mut board = board();
        board.write(0x3a00, 0x1f, WORD);
        assert_eq!(board.sound_latch().take(), Some(0x1f));
        board.write(0x3c00, 0, WORD);
        assert_eq!(board.watchdog_resets(), 1);
        board.inputs_mut().set(1, 0xfe);
        assert_eq!(board.read(0x3001), Some(0xfe));
        assert_eq!(board.read(0x4000), None);
    }
}
