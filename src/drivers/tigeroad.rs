//! Tiger Road / Tora he no Michi (Capcom, 1987).
//!
//! The background is not in RAM: its 128x128 map of 32x32 tiles lives in a
//! ROM and the CPU only scrolls it, so it is drawn straight from the map
//! each frame instead of through a cached [`Tilemap`]. Split group 1 tiles
//! show pens 0-8 behind the sprites and pens 9-15 in front of them.

use std::collections::HashMap;

use crate::compositor::VideoContext;
use crate::core::bitmap::{Bitmap, Rect};
use crate::core::bus::{AddressRange, HIGH_BYTE, LOW_BYTE, VideoBus};
use crate::core::io::{InputPorts, SoundLatch};
use crate::drivers::decode_address;
use crate::error::VideoError;
use crate::gfx::{
    BitOffset, ElementCount, GfxDecodeEntry, GfxDraw, GfxLayout, GfxSet, Transparency, draw_gfx,
};
use crate::palette::{Palette, PaletteFormat};
use crate::sprites::{SpriteCompositor, SpriteFormat, SpritePass};
use crate::tilemap::{
    BankedAttr, DrawPass, LayerKind, ScanOrder, TileDecoder, TileFlags, TileInfo, Tilemap,
    TilemapConfig,
};

pub const BOARD: &str = "tigeroad";
pub const PALETTE_ENTRIES: usize = 1024;
/// P1/P2, system, DIP switches.
pub const INPUT_PORTS: usize = 3;

/// Background map ROM: 128x128 cells of (code, attribute) bytes.
pub const BG_MAP_REGION: &str = "bgmap";
pub const BG_MAP_BYTES: usize = 128 * 128 * 2;
const BG_TILES: usize = 128;
const BG_TILE_SIZE: i32 = 32;
const BG_PIXELS: i32 = BG_TILES as i32 * BG_TILE_SIZE;
/// Group 1 pens hidden in each background pass.
const BG_BACK_HIDDEN: u32 = 0xfe00;
const BG_FRONT_HIDDEN: u32 = 0x01ff;

const TEXT_LAYOUT: GfxLayout = GfxLayout {
    width: 8,
    height: 8,
    count: ElementCount::Frac { num: 1, den: 1 },
    planes: &[BitOffset::Bits(4), BitOffset::Bits(0)],
    x_offsets: &[0, 1, 2, 3, 8, 9, 10, 11],
    y_offsets: &[0, 16, 32, 48, 64, 80, 96, 112],
    stride: 16 * 8,
};

const TILE_LAYOUT: GfxLayout = GfxLayout {
    width: 32,
    height: 32,
    count: ElementCount::Frac { num: 1, den: 2 },
    planes: &[
        BitOffset::Frac { num: 1, den: 2, plus: 4 },
        BitOffset::Frac { num: 1, den: 2, plus: 0 },
        BitOffset::Bits(4),
        BitOffset::Bits(0),
    ],
    x_offsets: &[
        0, 1, 2, 3, 8, 9, 10, 11, 512, 513, 514, 515, 520, 521, 522, 523, 1024, 1025, 1026, 1027,
        1032, 1033, 1034, 1035, 1536, 1537, 1538, 1539, 1544, 1545, 1546, 1547,
    ],
    y_offsets: &[
        0, 16, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224, 240, 256, 272, 288,
        304, 320, 336, 352, 368, 384, 400, 416, 432, 448, 464, 480, 496,
    ],
    stride: 256 * 8,
};

const SPRITE_LAYOUT: GfxLayout = GfxLayout {
    width: 16,
    height: 16,
    count: ElementCount::Frac { num: 1, den: 4 },
    planes: &[
        BitOffset::Frac { num: 3, den: 4, plus: 0 },
        BitOffset::Frac { num: 2, den: 4, plus: 0 },
        BitOffset::Frac { num: 1, den: 4, plus: 0 },
        BitOffset::Bits(0),
    ],
    x_offsets: &[
        0, 1, 2, 3, 4, 5, 6, 7, 128, 129, 130, 131, 132, 133, 134, 135,
    ],
    y_offsets: &[
        0, 8, 16, 24, 32, 40, 48, 56, 64, 72, 80, 88, 96, 104, 112, 120,
    ],
    stride: 32 * 8,
};

pub const GFX_DECODE: [GfxDecodeEntry; 3] = [
    GfxDecodeEntry { region: "text", layout: &TEXT_LAYOUT, color_base: 0x300, color_count: 16 },
    GfxDecodeEntry { region: "tiles", layout: &TILE_LAYOUT, color_base: 0x100, color_count: 16 },
    GfxDecodeEntry { region: "sprites", layout: &SPRITE_LAYOUT, color_base: 0x200, color_count: 16 },
];

const GFX_SHAPE: [(usize, usize); 3] = [(8, 8), (32, 32), (16, 16)];
const BG_BANK: usize = 1;
const SPRITE_BANK: usize = 2;

const TEXT_CONFIG: TilemapConfig = TilemapConfig {
    name: "text",
    gfx_bank: 0,
    cols: 32,
    rows: 32,
    tile_width: 8,
    tile_height: 8,
    scan: ScanOrder::RowMajor,
    decoder: TileDecoder::Banked(BankedAttr {
        high_bank: 0x20,
        color_mask: 0x0f,
        flip_x: 0,
        flip_y: 0x10,
        split: 0,
    }),
    kind: LayerKind::Transparent { pen: 3 },
};

/// Byte offset of background cell (`col`, `row`) in the map ROM. The map is
/// stored in 8x8-cell blocks with rows counted from the bottom.
pub fn bg_map_offset(col: usize, row: usize) -> usize {
    let row = BG_TILES - 1 - row;
    2 * (col % 8) + 16 * (row % 8) + 128 * (col / 8) + 2048 * (row / 8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    SpriteRam,
    Io,
    Scroll,
    Watchdog,
    TextRam,
    Palette,
}

const MEMORY_MAP: &[(AddressRange, Region)] = &[
    (AddressRange::new(0xfe0800, 0xfe0cff), Region::SpriteRam),
    (AddressRange::new(0xfe4000, 0xfe4005), Region::Io),
    (AddressRange::new(0xfe8000, 0xfe8003), Region::Scroll),
    (AddressRange::new(0xfe800e, 0xfe800f), Region::Watchdog),
    (AddressRange::new(0xfec000, 0xfec7ff), Region::TextRam),
    (AddressRange::new(0xff8200, 0xff867f), Region::Palette),
];

/// First palette entry of the palette window.
const PALETTE_WINDOW_BASE: usize = 0x100;

#[derive(Debug, Clone)]
pub struct TigerRoad {
    ctx: VideoContext,
    text: Tilemap,
    bg_map: Vec<u8>,
    bg_bank: u32,
    sprites: SpriteCompositor,
    scroll: [u16; 2],
    flip: bool,
    sound: SoundLatch,
    sample: SoundLatch,
    inputs: InputPorts,
    watchdog: u32,
}

impl TigerRoad {
    pub fn new(gfx: GfxSet, bg_map: Vec<u8>, visible: Rect) -> Result<Self, VideoError> {
        gfx.validate(BOARD, &GFX_SHAPE)?;
        if bg_map.len() != BG_MAP_BYTES {
            return Err(VideoError::TileMapRomSize {
                board: BOARD,
                expected: BG_MAP_BYTES,
                actual: bg_map.len(),
            });
        }
        log::info!("{BOARD}: video hardware ready, {} graphics banks", gfx.len());
        let palette = Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, PALETTE_ENTRIES);
        Ok(Self {
            ctx: VideoContext::new(palette, gfx, visible)?,
            text: Tilemap::new(TEXT_CONFIG),
            bg_map,
            bg_bank: 0,
            sprites: SpriteCompositor::new(SpriteFormat::TigerRoad, SPRITE_BANK, 0x280),
            scroll: [0; 2],
            flip: false,
            sound: SoundLatch::default(),
            sample: SoundLatch::default(),
            inputs: InputPorts::new(INPUT_PORTS),
            watchdog: 0,
        })
    }

    pub fn from_regions(regions: &HashMap<String, Vec<u8>>, visible: Rect) -> Result<Self, VideoError> {
        let gfx = GfxSet::decode(&GFX_DECODE, regions)?;
        let bg_map = regions
            .get(BG_MAP_REGION)
            .ok_or_else(|| VideoError::MissingRegion(BG_MAP_REGION.to_string()))?
            .clone();
        Self::new(gfx, bg_map, visible)
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

    /// Low byte of the sound command word, read by the sample board.
    pub fn sample_latch(&mut self) -> &mut SoundLatch {
        &mut self.sample
    }

    pub fn inputs_mut(&mut self) -> &mut InputPorts {
        &mut self.inputs
    }

    pub fn watchdog_resets(&self) -> u32 {
        self.watchdog
    }

    pub fn text(&self) -> &Tilemap {
        &self.text
    }

    pub fn flip_screen(&self) -> bool {
        self.flip
    }

    pub fn bg_bank(&self) -> u32 {
        self.bg_bank
    }

    /// Background scroll origin: the layer pixel shown at the top-left
    /// corner of the unflipped screen.
    pub fn bg_origin(&self) -> (i32, i32) {
        let x = self.scroll[0] as i32;
        let y = -(self.scroll[1] as i32) - 256;
        (x.rem_euclid(BG_PIXELS), y.rem_euclid(BG_PIXELS))
    }

    pub fn bg_tile_info(&self, col: usize, row: usize) -> TileInfo {
        let at = bg_map_offset(col, row);
        let (data, attr) = (self.bg_map[at] as u32, self.bg_map[at + 1] as u32);
        let mut flags = TileFlags::empty();
        flags.set(TileFlags::FLIP_X, attr & 0x20 != 0);
        TileInfo {
            code: data + ((attr & 0xc0) << 2) + (self.bg_bank << 10),
            color: attr & 0x0f,
            flags,
            group: ((attr >> 4) & 1) as u8,
        }
    }

    /// Every background tile touching the screen, placed in screen space.
    fn bg_tiles(&self) -> Vec<(GfxDraw, u8)> {
        let (ox, oy) = self.bg_origin();
        let (fine_x, fine_y) = (ox % BG_TILE_SIZE, oy % BG_TILE_SIZE);
        let (col0, row0) = ((ox / BG_TILE_SIZE) as usize, (oy / BG_TILE_SIZE) as usize);
        let span = 256 / BG_TILE_SIZE as usize;
        let flip = self.ctx.flip();
        let mut tiles = Vec::with_capacity((span + 1) * (span + 1));
        for ty in 0..=span {
            for tx in 0..=span {
                let info = self.bg_tile_info((col0 + tx) % BG_TILES, (row0 + ty) % BG_TILES);
                let mut draw = GfxDraw {
                    code: info.code,
                    color: info.color,
                    flip_x: info.flags.contains(TileFlags::FLIP_X),
                    flip_y: false,
                    x: tx as i32 * BG_TILE_SIZE - fine_x,
                    y: ty as i32 * BG_TILE_SIZE - fine_y,
                };
                if flip {
                    draw.x = 256 - BG_TILE_SIZE - draw.x;
                    draw.y = 256 - BG_TILE_SIZE - draw.y;
                    draw.flip_x = !draw.flip_x;
                    draw.flip_y = true;
                }
                tiles.push((draw, info.group));
            }
        }
        tiles
    }

    fn mark_bg_colors(&mut self, tiles: &[(GfxDraw, u8)]) {
        let visible = self.ctx.visible();
        let marks: Vec<(usize, u32)> = {
            let gfx = self.ctx.gfx().bank(BG_BANK);
            let size = BG_TILE_SIZE - 1;
            tiles
                .iter()
                .filter(|(d, _)| Rect::new(d.x, d.x + size, d.y, d.y + size).intersect(&visible).is_some())
                .map(|(d, _)| (gfx.palette_base(d.color), gfx.pen_usage(d.code)))
                .collect()
        };
        let palette = self.ctx.palette_mut();
        for (base, usage) in marks {
            palette.mark_pens(base, usage);
        }
    }

    fn draw_bg(&mut self, tiles: &[(GfxDraw, u8)], pass: DrawPass) {
        let (screen, gfx, palette, clip) = self.ctx.parts_mut();
        let bank = gfx.bank(BG_BANK);
        for (draw, group) in tiles {
            let transparency = match (pass, *group) {
                (DrawPass::Front, 0) => continue,
                (DrawPass::Front, _) => Transparency::Pens(BG_FRONT_HIDDEN),
                (_, 0) => Transparency::Opaque,
                _ => Transparency::Pens(BG_BACK_HIDDEN),
            };
            draw_gfx(screen, bank, palette, draw, &clip, transparency);
        }
    }

    pub fn render_frame(&mut self) -> &Bitmap {
        self.ctx.poll_flip(self.flip, &mut [&mut self.text]);

        self.ctx.begin_frame();
        let tiles = self.bg_tiles();
        self.mark_bg_colors(&tiles);
        self.ctx.prepare(&mut [&mut self.text], Some(&self.sprites));

        self.draw_bg(&tiles, DrawPass::Back);
        self.ctx.draw_sprites(&self.sprites, SpritePass::All);
        self.draw_bg(&tiles, DrawPass::Front);
        self.ctx.draw_layer(&self.text, DrawPass::Normal);
        self.ctx.finish_frame()
    }

    /// Vblank: sprite RAM is buffered for the next frame.
    pub fn end_of_frame(&mut self) {
        self.sprites.snapshot();
    }

    fn write_video_control(&mut self, data: u16, mask: u16) {
        if mask & HIGH_BYTE == 0 {
            return;
        }
        let bits = data >> 8;
        self.flip = bits & 0x02 != 0;
        let bank = ((bits >> 2) & 1) as u32;
        if bank != self.bg_bank {
            log::debug!("{BOARD}: background char bank {bank}");
            self.bg_bank = bank;
        }
        // bits 4-7: coin lockouts and counters
    }
}

impl VideoBus for TigerRoad {
    fn read(&mut self, addr: u32) -> Option<u16> {
        let (region, offset) = decode_address(MEMORY_MAP, addr)?;
        let index = (offset / 2) as usize;
        let value = match region {
            Region::SpriteRam => self.sprites.read(index),
            Region::Io => self.inputs.get(index),
            Region::Scroll => self.scroll[index],
            Region::Watchdog => 0xffff,
            Region::TextRam => self.text.read(index),
            Region::Palette => self.ctx.palette().read_primary(PALETTE_WINDOW_BASE + index),
        };
        Some(value)
    }

    fn write(&mut self, addr: u32, data: u16, mask: u16) -> bool {
        let Some((region, offset)) = decode_address(MEMORY_MAP, addr) else {
            return false;
        };
        let index = (offset / 2) as usize;
        match region {
            Region::SpriteRam => self.sprites.write(index, data, mask),
            Region::Io => match index {
                0 => self.write_video_control(data, mask),
                1 => {
                    if mask & HIGH_BYTE != 0 {
                        self.sound.write((data >> 8) as u8);
                    }
                    if mask & LOW_BYTE != 0 {
                        self.sample.write(data as u8);
                    }
                }
                _ => log::debug!("{BOARD}: write {data:#06x} to input port {index}"),
            },
            Region::Scroll => {
                let old = self.scroll[index];
                self.scroll[index] = (old & !mask) | (data & mask);
            }
            Region::Watchdog => self.watchdog += 1,
            Region::TextRam => {
                self.text.write(index, data, mask);
            }
            Region::Palette => self
                .ctx
                .palette_mut()
                .write_primary(PALETTE_WINDOW_BASE + index, data, mask),
        }
        true
    }
}
