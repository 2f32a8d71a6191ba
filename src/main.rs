// Copyright (C) 2025 Dayton Fishell
// arcvid Arcade Video Hardware Core
// This file is part of arcvid.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// A small demo for the arcvid video core.
//
// Boots one board on synthetic graphics ROMs, drives it through its memory
// map the way a game's CPU would, and optionally dumps the last frame as a
// binary PPM.
//
//     arcvid [game | config.yaml] [frames] [out.ppm]

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use arcvid_core::core::bus::{HIGH_BYTE, LOW_BYTE, VideoBus, WORD};
use arcvid_core::{Bitmap, Emulator, Game, Rect, VideoConfig};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(arg) => load_config(&arg)?,
        None => VideoConfig::default(),
    };
    let frames: u64 = match args.next() {
        Some(n) => n.parse().with_context(|| format!("bad frame count `{n}`"))?,
        None => 60,
    };
    let out = args.next();

    println!("arcvid {}", env!("CARGO_PKG_VERSION"));
    println!("{} ({})", config.game.title(), config.game);
    println!();

    let regions = synthetic_regions(config.game);
    let mut emu = Emulator::from_config(&config, &regions).context("failed to build the video board")?;

    for frame in 0..frames {
        match config.game {
            Game::CrudeBuster => drive_cbuster(&mut emu, frame),
            Game::Gng => drive_gng(&mut emu, frame),
            Game::TigerRoad => drive_tigeroad(&mut emu, frame),
        }
        emu.step_frame();
    }

    let visible = config.visible_area();
    let stats = emu.stats();
    println!("Frames:          {}", stats.frame_count);
    println!("Tiles updated:   {}", stats.last_frame.tiles_updated);
    println!("Tiles rendered:  {}", stats.last_frame.tiles_rendered);
    println!("Sprite cells:    {}", stats.last_frame.sprite_cells);
    println!("Palette in use:  {}", stats.palette_used);
    println!("Frame checksum:  {:016x}", emu.screen().checksum(&visible));

    if let Some(path) = out {
        write_ppm(Path::new(&path), emu.screen(), &visible)?;
        println!("Wrote {path}");
    }
    Ok(())
}

/// A game name, or a YAML/JSON config file when the argument has an
/// extension.
fn load_config(arg: &str) -> Result<VideoConfig> {
    let path = Path::new(arg);
    if path.extension().is_some() {
        return load_config_file(path);
    }
    let game: Game = arg.parse()?;
    Ok(VideoConfig::new(game))
}

#[cfg(feature = "serde-config")]
fn load_config_file(path: &Path) -> Result<VideoConfig> {
    VideoConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

#[cfg(not(feature = "serde-config"))]
fn load_config_file(path: &Path) -> Result<VideoConfig> {
    anyhow::bail!("reading {} needs the `serde-config` feature", path.display())
}

/// Deterministic noise standing in for the graphics ROMs.
fn synthetic_regions(game: Game) -> HashMap<String, Vec<u8>> {
    let sizes: &[(&str, usize)] = match game {
        Game::CrudeBuster => &[
            ("gfx1", 0x20000),
            ("gfx2", 0x40000),
            ("gfx3", 0x40000),
            ("gfx4", 0x40000),
        ],
        Game::Gng => &[("gfx1", 0x4000), ("gfx2", 0x18000), ("gfx3", 0x20000)],
        Game::TigerRoad => &[
            ("text", 0x8000),
            ("tiles", 0x40000),
            ("sprites", 0x40000),
            ("bgmap", 0x8000),
        ],
    };
    sizes
        .iter()
        .enumerate()
        .map(|(i, &(name, len))| {
            let mut state = 0x2545_f491_u32 ^ (i as u32 + 1).wrapping_mul(0x9e37_79b9);
            let rom = (0..len)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 17;
                    state ^= state << 5;
                    (state >> 24) as u8
                })
                .collect();
            (name.to_string(), rom)
        })
        .collect()
}

fn drive_cbuster(emu: &mut Emulator, frame: u64) {
    if frame == 0 {
        for i in 0..2048u32 {
            let (r, g, b) = ((i * 7) & 0xff, (i * 13) & 0xff, (i * 3) & 0xff);
            emu.write(0x0b8000 + i * 2, (r | (g << 8)) as u16, WORD);
            emu.write(0x0b9000 + i * 2, b as u16, WORD);
        }
        // upright screen, no row or column scroll
        emu.write(0x0b5000, 0x0080, WORD);
        for cell in 0..0x800u32 {
            emu.write(0x0aa000 + cell * 2, ((cell % 16) << 12 | cell % 0x400) as u16, WORD);
            emu.write(0x0a0000 + cell * 2, (cell % 0x100) as u16, WORD);
        }
        for slot in 0..8u32 {
            let (x, y) = (32 + slot * 24, 64 + slot * 8);
            let base = 0x0b0000 + slot * 8;
            emu.write(base, (0x0200 | (240 - y)) as u16, WORD);
            emu.write(base + 2, (0x100 + slot * 2) as u16, WORD);
            emu.write(base + 4, ((slot << 9) | (240 - x)) as u16, WORD);
        }
        // sprite DMA
        emu.write(0x0bc000, 0, WORD);
    }
    if frame == 30 {
        // the game's level-1 priority code
        emu.write(0x0bc004, 0x00f1, WORD);
    }
    emu.write(0x0b6006, frame as u16, WORD);
}

fn drive_gng(emu: &mut Emulator, frame: u64) {
    if frame == 0 {
        for i in 0..256u32 {
            emu.write(0x3900 + i, (i * 37) as u16 & 0xff, WORD);
            emu.write(0x3800 + i, (i * 11) as u16 & 0xf0, WORD);
        }
        emu.write(0x3d00, 0x01, WORD);
        for cell in 0..0x400u32 {
            emu.write(0x2800 + cell, cell as u16 & 0xff, WORD);
            emu.write(0x2c00 + cell, (cell >> 2) as u16 & 0x0f, WORD);
            // text layer mostly blank
            let code = if cell % 7 == 0 { cell as u16 & 0xff } else { 0x20 };
            emu.write(0x2000 + cell, code, WORD);
        }
        for slot in 0..16u32 {
            let base = 0x1e00 + slot * 4;
            emu.write(base, slot as u16 * 3, WORD);
            emu.write(base + 1, ((slot & 3) << 4) as u16, WORD);
            emu.write(base + 2, (48 + slot * 10) as u16, WORD);
            emu.write(base + 3, (16 + slot * 14) as u16, WORD);
        }
    }
    let scroll = (frame * 2) as u16;
    emu.write(0x3b08, scroll & 0xff, WORD);
    emu.write(0x3b09, scroll >> 8 & 1, WORD);
}

fn drive_tigeroad(emu: &mut Emulator, frame: u64) {
    if frame == 0 {
        for i in 0..0x240u32 {
            emu.write(0xff8200 + i * 2, (i * 0x123) as u16 & 0x0fff, WORD);
        }
        for slot in 0..0xa0u32 {
            let base = 0xfe0800 + slot * 8;
            if slot < 12 {
                emu.write(base, 0x40 + slot as u16, WORD);
                emu.write(base + 2, ((slot & 0x0f) << 2) as u16, WORD);
                emu.write(base + 4, (200 - slot * 12) as u16, WORD);
                emu.write(base + 6, (20 + slot * 18) as u16, WORD);
            } else {
                emu.write(base, 0x0fff, WORD);
            }
        }
        for cell in 0..0x400u32 {
            let word = if cell / 32 == 2 { 0x0f00 | (cell as u16 & 0xff) } else { 0x0003 };
            emu.write(0xfec000 + cell * 2, word, WORD);
        }
        // upright, char bank 0
        emu.write(0xfe4000, 0x0000, HIGH_BYTE);
    }
    // sound command to the audio CPU every second
    if frame % 60 == 0 {
        emu.write(0xfe4002, 0x0100, HIGH_BYTE);
        emu.write(0xfe4002, 0x0001, LOW_BYTE);
    }
    emu.write(0xfe8002, (frame as u16).wrapping_neg(), WORD);
}

fn write_ppm(path: &Path, screen: &Bitmap, area: &Rect) -> Result<()> {
    let mut data = format!("P6\n{} {}\n255\n", area.width(), area.height()).into_bytes();
    data.extend(screen.to_rgb_bytes(area));
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))
}
