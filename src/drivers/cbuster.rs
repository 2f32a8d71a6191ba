//! Crude Buster / Two Crude (Data East, 1990).
//!
//! Four playfields: PF1 is an 8x8 text layer, PF2-PF4 use 16x16 tiles. Two
//! control blocks drive them in pairs (PF1/PF4 and PF2/PF3), each with its
//! own scroll registers, row/column scroll styles and enables. Sprite RAM is
//! copied to the sprite chip by a DMA write; the protection port doubles as
//! the PF3/PF4 priority switch.

use std::collections::HashMap;

use crate::compositor::VideoContext;
use crate::core::bitmap::{Bitmap, Rect};
use crate::core::bus::{AddressRange, VideoBus, WordRam};
use crate::core::io::{InputPorts, SoundLatch};
use crate::drivers::decode_address;
use crate::error::VideoError;
use crate::gfx::{BitOffset, ElementCount, GfxDecodeEntry, GfxLayout, GfxSet};
use crate::palette::{Palette, PaletteFormat};
use crate::protection::{LayerOrder, ProtectionResolver};
use crate::sprites::{SpriteCompositor, SpriteFormat, SpritePass};
use crate::tilemap::{
    DrawPass, LayerKind, LayerScroll, ScanOrder, TileDecoder, Tilemap, TilemapConfig,
};

pub const BOARD: &str = "cbuster";
pub const PALETTE_ENTRIES: usize = 2048;

/// Input ports: joysticks (P1 low byte, P2 high byte), DIP switches,
/// coins/VBL.
pub const PORT_PLAYERS: usize = 0;
pub const PORT_DIPS: usize = 1;
pub const PORT_COINS: usize = 2;

const CHAR_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    count: ElementCount::Frac { num: 1, den: 2 },
    planes: &[
        BitOffset::Frac { num: 1, den: 2, plus: 8 },
        BitOffset::Bits(8),
        BitOffset::Frac { num: 1, den: 2, plus: 0 },
        BitOffset::Bits(0),
    ],
    x_offsets: &[0, 1, 2, 3, 4, 5, 6, 7],
    y_offsets: &[0, 16, 32, 48, 64, 80, 96, 112],
    stride: 16 * 8,
};

const TILE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: ElementCount::Frac { num: 1, den: 1 },
    planes: &[
        BitOffset::Bits(24),
        BitOffset::Bits(16),
        BitOffset::Bits(8),
        BitOffset::Bits(0),
    ],
    x_offsets: &[
        512, 513, 514, 515, 516, 517, 518, 519, 0, 1, 2, 3, 4, 5, 6, 7,
    ],
    y_offsets: &[
        0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 480,
    ],
    stride: 128 * 8,
};

const SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: ElementCount::Frac { num: 1, den: 2 },
    planes: &[
        BitOffset::Frac { num: 1, den: 2, plus: 8 },
        BitOffset::Frac { num: 1, den: 2, plus: 0 },
        BitOffset::Bits(8),
        BitOffset::Bits(0),
    ],
    x_offsets: &[
        256, 257, 258, 259, 260, 261, 262, 263, 0, 1, 2, 3, 4, 5, 6, 7,
    ],
    y_offsets: &[
        0, 16, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224, 240,
    ],
    stride: 64 * 8,
};

/// Graphics banks, in the order the layers refer to them.
pub const GFX_DECODE: [GfxDecodeEntry; 5] = [
    GfxDecodeEntry { region: "gfx1", layout: &CHAR_LAYOUT, color_base: 0, color_count: 32 },
    GfxDecodeEntry { region: "gfx2", layout: &TILE_LAYOUT, color_base: 1024, color_count: 16 },
    GfxDecodeEntry { region: "gfx2", layout: &TILE_LAYOUT, color_base: 768, color_count: 16 },
    GfxDecodeEntry { region: "gfx3", layout: &TILE_LAYOUT, color_base: 512, color_count: 16 },
    GfxDecodeEntry { region: "gfx4", layout: &SPRITE_LAYOUT, color_base: 256, color_count: 80 },
];

const GFX_SHAPE: [(usize, usize); 5] = [(8, 8), (16, 16), (16, 16), (16, 16), (16, 16)];
const SPRITE_BANK: usize = 4;

/// All four playfields are 64x32 cells; the 16x16 ones are stored as four
/// 32x32 pages.
fn playfield_config(name: &'static str, gfx_bank: usize, tile: usize, kind: LayerKind) -> TilemapConfig {
    let scan = if tile == 8 {
        ScanOrder::RowMajor
    } else {
        ScanOrder::FourPageWrap
    };
    TilemapConfig {
        name,
        gfx_bank,
        cols: 64,
        rows: 32,
        tile_width: tile,
        tile_height: tile,
        scan,
        decoder: TileDecoder::Simple,
        kind,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Pf1Data,
    Pf4Data,
    Pf1RowScroll,
    Pf4RowScroll,
    Pf3Data,
    Pf2Data,
    Pf3RowScroll,
    Pf2RowScroll,
    SpriteRam,
    SpriteChipNop,
    Pf14Control,
    Pf23Control,
    PaletteRg,
    PaletteB,
    Control,
}

const MEMORY_MAP: &[(AddressRange, Region)] = &[
    (AddressRange::new(0x0a0000, 0x0a1fff), Region::Pf1Data),
    (AddressRange::new(0x0a2000, 0x0a2fff), Region::Pf4Data),
    (AddressRange::new(0x0a4000, 0x0a47ff), Region::Pf1RowScroll),
    (AddressRange::new(0x0a6000, 0x0a67ff), Region::Pf4RowScroll),
    (AddressRange::new(0x0a8000, 0x0a8fff), Region::Pf3Data),
    (AddressRange::new(0x0aa000, 0x0aafff), Region::Pf2Data),
    (AddressRange::new(0x0ac000, 0x0ac7ff), Region::Pf3RowScroll),
    (AddressRange::new(0x0ae000, 0x0ae7ff), Region::Pf2RowScroll),
    (AddressRange::new(0x0b0000, 0x0b07ff), Region::SpriteRam),
    (AddressRange::new(0x0b4000, 0x0b4001), Region::SpriteChipNop),
    (AddressRange::new(0x0b5000, 0x0b500f), Region::Pf14Control),
    (AddressRange::new(0x0b6000, 0x0b600f), Region::Pf23Control),
    (AddressRange::new(0x0b8000, 0x0b8fff), Region::PaletteRg),
    (AddressRange::new(0x0b9000, 0x0b9fff), Region::PaletteB),
    (AddressRange::new(0x0bc000, 0x0bc00f), Region::Control),
];

const PF1: usize = 0;
const PF2: usize = 1;
const PF3: usize = 2;
const PF4: usize = 3;

const SCROLL_TABLE_WORDS: usize = 0x400;
const COLSCROLL_OFFSET: usize = 0x200;

/// Scroll modes of the two playfields one control block drives: `a` is the
/// one with the column-scroll option (PF1 or PF3), `b` the other (PF4 or
/// PF2).
///
/// Control words: 1/2 scroll X/Y of `a`, 3/4 scroll X/Y of `b`, 5 band
/// sizes, 6 enables.
pub fn block_scroll(
    control: &WordRam,
    a: &Tilemap,
    a_table: &WordRam,
    b: &Tilemap,
    b_table: &WordRam,
) -> (LayerScroll, LayerScroll) {
    let reg = |i: usize| control.read(i) as i32;
    let style = control.read(5);
    let enable = control.read(6);

    let a_scroll = if enable & 0x0040 != 0 {
        let rows = (a.height() >> ((style >> 3) & 7)).clamp(1, 512);
        LayerScroll::Rows {
            y: reg(2),
            x: (0..rows).map(|i| reg(1) + a_table.read(i) as i32).collect(),
        }
    } else if enable & 0x0020 != 0 {
        let cols = (64usize >> (style & 7)).max(1);
        LayerScroll::Cols {
            x: reg(1),
            y: (0..cols)
                .map(|i| reg(2) + a_table.read(COLSCROLL_OFFSET + i) as i32)
                .collect(),
        }
    } else {
        LayerScroll::Whole { x: reg(1), y: reg(2) }
    };

    let b_scroll = if enable & 0x4000 != 0 {
        let rows = (b.height() >> ((style >> 11) & 7)).clamp(1, 512);
        LayerScroll::Rows {
            y: reg(4),
            x: (0..rows).map(|i| reg(3) + b_table.read(i) as i32).collect(),
        }
    } else {
        LayerScroll::Whole { x: reg(3), y: reg(4) }
    };

    (a_scroll, b_scroll)
}

#[derive(Debug, Clone)]
pub struct CrudeBuster {
    ctx: VideoContext,
    pf1: Tilemap,
    pf2: Tilemap,
    pf3: Tilemap,
    pf4: Tilemap,
    rowscroll: [WordRam; 4],
    pf14_control: WordRam,
    pf23_control: WordRam,
    sprites: SpriteCompositor,
    protection: ProtectionResolver,
    sound: SoundLatch,
    inputs: InputPorts,
    irq_acks: u32,
}

impl CrudeBuster {
    pub fn new(gfx: GfxSet, visible: Rect) -> Result<Self, VideoError> {
        gfx.validate(BOARD, &GFX_SHAPE)?;
        log::info!("{BOARD}: video hardware ready, {} graphics banks", gfx.len());
        let palette = Palette::new(PaletteFormat::SplitRg8B8, PALETTE_ENTRIES);
        Ok(Self {
            ctx: VideoContext::new(palette, gfx, visible)?,
            pf1: Tilemap::new(playfield_config("pf1", 0, 8, LayerKind::Transparent { pen: 0 })),
            pf2: Tilemap::new(playfield_config("pf2", 3, 16, LayerKind::Opaque)),
            pf3: Tilemap::new(playfield_config("pf3", 2, 16, LayerKind::Transparent { pen: 0 })),
            pf4: Tilemap::new(playfield_config("pf4", 1, 16, LayerKind::Transparent { pen: 0 })),
            rowscroll: std::array::from_fn(|_| WordRam::new(SCROLL_TABLE_WORDS)),
            pf14_control: WordRam::new(8),
            pf23_control: WordRam::new(8),
            sprites: SpriteCompositor::new(SpriteFormat::CrudeBuster, SPRITE_BANK, 0x400),
            protection: ProtectionResolver::new(),
            sound: SoundLatch::default(),
            inputs: InputPorts::new(3),
            irq_acks: 0,
        })
    }

    /// Decode the graphics ROM regions and build the board.
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

    pub fn protection(&self) -> &ProtectionResolver {
        &self.protection
    }

    pub fn irq_acks(&self) -> u32 {
        self.irq_acks
    }

    /// The PF14 block's bit 7 is set for an upright screen.
    pub fn flip_screen(&self) -> bool {
        self.pf14_control.read(0) & 0x0080 == 0
    }

    /// Playfields 1-4 by number.
    pub fn playfield(&self, number: usize) -> &Tilemap {
        match number {
            1 => &self.pf1,
            2 => &self.pf2,
            3 => &self.pf3,
            4 => &self.pf4,
            _ => panic!("{BOARD} has no playfield {number}"),
        }
    }

    pub fn render_frame(&mut self) -> &Bitmap {
        let flip = self.flip_screen();
        self.ctx.poll_flip(
            flip,
            &mut [&mut self.pf1, &mut self.pf2, &mut self.pf3, &mut self.pf4],
        );

        let (pf1, pf4) = block_scroll(
            &self.pf14_control,
            &self.pf1,
            &self.rowscroll[PF1],
            &self.pf4,
            &self.rowscroll[PF4],
        );
        let (pf3, pf2) = block_scroll(
            &self.pf23_control,
            &self.pf3,
            &self.rowscroll[PF3],
            &self.pf2,
            &self.rowscroll[PF2],
        );
        self.pf1.set_scroll(pf1);
        self.pf2.set_scroll(pf2);
        self.pf3.set_scroll(pf3);
        self.pf4.set_scroll(pf4);

        self.ctx.begin_frame();
        // graphics bank order: 3, 2, 1, 0
        self.ctx.prepare(
            &mut [&mut self.pf2, &mut self.pf3, &mut self.pf4, &mut self.pf1],
            Some(&self.sprites),
        );

        self.ctx.draw_layer(&self.pf2, DrawPass::Normal);
        self.ctx.draw_sprites(&self.sprites, SpritePass::Back);
        match self.protection.layer_order() {
            LayerOrder::Pf4OverPf3 => {
                self.ctx.draw_layer(&self.pf3, DrawPass::Normal);
                self.ctx.draw_layer(&self.pf4, DrawPass::Normal);
            }
            LayerOrder::Pf3OverPf4 => {
                self.ctx.draw_layer(&self.pf4, DrawPass::Normal);
                self.ctx.draw_layer(&self.pf3, DrawPass::Normal);
            }
        }
        self.ctx.draw_sprites(&self.sprites, SpritePass::Front);
        self.ctx.draw_layer(&self.pf1, DrawPass::Normal);
        self.ctx.finish_frame()
    }

    /// Sprites are latched by the DMA write, not by vblank.
    pub fn end_of_frame(&mut self) {}

    fn control_write(&mut self, offset: u32, data: u16, mask: u16) {
        match offset & !1 {
            0x0 => self.sprites.snapshot(),
            0x2 => self.sound.write((data & 0xff) as u8),
            0x4 => self.protection.write(data, mask),
            0x6 => self.irq_acks += 1,
            other => log::debug!("{BOARD}: write {data:#06x} to unmapped control +{other:#x}"),
        }
    }

    fn control_read(&self, offset: u32) -> u16 {
        match offset & !1 {
            0x0 => self.inputs.get(PORT_PLAYERS),
            0x2 => self.inputs.get(PORT_DIPS),
            0x4 => self.protection.read(),
            0x6 => self.inputs.get(PORT_COINS),
            other => {
                log::debug!("{BOARD}: read from unmapped control +{other:#x}");
                0xffff
            }
        }
    }
}

impl VideoBus for CrudeBuster {
    fn read(&mut self, addr: u32) -> Option<u16> {
        let (region, offset) = decode_address(MEMORY_MAP, addr)?;
        let index = (offset >> 1) as usize;
        let value = match region {
            Region::Pf1Data => self.pf1.read(index & 0x7ff),
            Region::Pf2Data => self.pf2.read(index),
            Region::Pf3Data => self.pf3.read(index),
            Region::Pf4Data => self.pf4.read(index),
            Region::Pf1RowScroll => self.rowscroll[PF1].read(index),
            Region::Pf2RowScroll => self.rowscroll[PF2].read(index),
            Region::Pf3RowScroll => self.rowscroll[PF3].read(index),
            Region::Pf4RowScroll => self.rowscroll[PF4].read(index),
            Region::SpriteRam => self.sprites.read(index),
            Region::SpriteChipNop => 0xffff,
            Region::Pf14Control => self.pf14_control.read(index),
            Region::Pf23Control => self.pf23_control.read(index),
            Region::PaletteRg => self.ctx.palette().read_primary(index),
            Region::PaletteB => self.ctx.palette().read_secondary(index),
            Region::Control => self.control_read(offset),
        };
        Some(value)
    }

    fn write(&mut self, addr: u32, data: u16, mask: u16) -> bool {
        let Some((region, offset)) = decode_address(MEMORY_MAP, addr) else {
            return false;
        };
        let index = (offset >> 1) as usize;
        match region {
            Region::Pf1Data => {
                self.pf1.write(index & 0x7ff, data, mask);
            }
            Region::Pf2Data => {
                self.pf2.write(index, data, mask);
            }
            Region::Pf3Data => {
                self.pf3.write(index, data, mask);
            }
            Region::Pf4Data => {
                self.pf4.write(index, data, mask);
            }
            Region::Pf1RowScroll => self.rowscroll[PF1].write(index, data, mask),
            Region::Pf2RowScroll => self.rowscroll[PF2].write(index, data, mask),
            Region::Pf3RowScroll => self.rowscroll[PF3].write(index, data, mask),
            Region::Pf4RowScroll => self.rowscroll[PF4].write(index, data, mask),
            Region::SpriteRam => self.sprites.write(index, data, mask),
            Region::SpriteChipNop => {}
            Region::Pf14Control => self.pf14_control.write(index, data, mask),
            Region::Pf23Control => self.pf23_control.write(index, data, mask),
            Region::PaletteRg => self.ctx.palette_mut().write_primary(index, data, mask),
            Region::PaletteB => self.ctx.palette_mut().write_secondary(index, data, mask),
            Region::Control => self.control_write(offset, data, mask),
        }
        true
    }
}
