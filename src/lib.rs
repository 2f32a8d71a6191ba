// Copyright (C) 2025 Dayton Fishell
// arcvid Arcade Video Hardware Core
// This file is part of arcvid.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! arcvid: video hardware of three tile-and-sprite arcade boards
//!
//! Crude Buster (Data East), Ghosts'n Goblins and Tiger Road (Capcom). The
//! crate rebuilds each frame from the video RAM, scroll registers and palette
//! the game CPU writes through [`VideoBus`]; CPU cores, sound and input
//! devices live outside it.

pub mod compositor;
pub mod config;
pub mod core;
pub mod drivers;
pub mod emulator;
pub mod error;
pub mod gfx;
pub mod palette;
pub mod protection;
pub mod sprites;
pub mod tilemap;
pub mod tilestore;

// Re-export commonly used types
pub use compositor::{FrameStats, VideoContext};
pub use config::{ConfigError, Game, VideoConfig};
pub use crate::core::{Bitmap, Rect, VideoBus};
pub use drivers::{CrudeBuster, Gng, TigerRoad};
pub use emulator::{Board, Emulator, EmulatorStats};
pub use error::VideoError;
pub use gfx::{GfxElement, GfxLayout, GfxSet};
pub use palette::{Palette, PaletteFormat};
pub use protection::{LayerOrder, ProtectionResolver};
pub use sprites::{SpriteCompositor, SpriteFormat};
pub use tilemap::{LayerScroll, Tilemap, TilemapConfig};
pub use tilestore::TileStore;
