//! Board dispatch and frame bookkeeping.
//!
//! [`Emulator`] owns one board and drives it a frame at a time: the external
//! CPU cores write through [`VideoBus`], then `step_frame` renders the frame
//! and runs the board's vblank work.

use std::collections::HashMap;

use crate::compositor::{FrameStats, VideoContext};
use crate::config::{ConfigError, Game, VideoConfig};
use crate::core::bitmap::{Bitmap, Rect};
use crate::core::bus::VideoBus;
use crate::core::io::{InputPorts, SoundLatch};
use crate::drivers::{CrudeBuster, Gng, TigerRoad};
use crate::error::VideoError;

/// One of the supported video boards.
#[derive(Debug, Clone)]
pub enum Board {
    CrudeBuster(CrudeBuster),
    Gng(Gng),
    TigerRoad(TigerRoad),
}

impl Board {
    /// Build `game` from its named ROM regions.
    pub fn from_regions(
        game: Game,
        regions: &HashMap<String, Vec<u8>>,
        visible: Rect,
    ) -> Result<Self, VideoError> {
        Ok(match game {
            Game::CrudeBuster => Board::CrudeBuster(CrudeBuster::from_regions(regions, visible)?),
            Game::Gng => Board::Gng(Gng::from_regions(regions, visible)?),
            Game::TigerRoad => Board::TigerRoad(TigerRoad::from_regions(regions, visible)?),
        })
    }

    pub fn game(&self) -> Game {
        match self {
            Board::CrudeBuster(_) => Game::CrudeBuster,
            Board::Gng(_) => Game::Gng,
            Board::TigerRoad(_) => Game::TigerRoad,
        }
    }

    pub fn context(&self) -> &VideoContext {
        match self {
            Board::CrudeBuster(b) => b.context(),
            Board::Gng(b) => b.context(),
            Board::TigerRoad(b) => b.context(),
        }
    }

    pub fn context_mut(&mut self) -> &mut VideoContext {
        match self {
            Board::CrudeBuster(b) => b.context_mut(),
            Board::Gng(b) => b.context_mut(),
            Board::TigerRoad(b) => b.context_mut(),
        }
    }

    pub fn render_frame(&mut self) -> &Bitmap {
        match self {
            Board::CrudeBuster(b) => b.render_frame(),
            Board::Gng(b) => b.render_frame(),
            Board::TigerRoad(b) => b.render_frame(),
        }
    }

    pub fn end_of_frame(&mut self) {
        match self {
            Board::CrudeBuster(b) => b.end_of_frame(),
            Board::Gng(b) => b.end_of_frame(),
            Board::TigerRoad(b) => b.end_of_frame(),
        }
    }

    pub fn sound_latch(&mut self) -> &mut SoundLatch {
        match self {
            Board::CrudeBuster(b) => b.sound_latch(),
            Board::Gng(b) => b.sound_latch(),
            Board::TigerRoad(b) => b.sound_latch(),
        }
    }

    pub fn inputs_mut(&mut self) -> &mut InputPorts {
        match self {
            Board::CrudeBuster(b) => b.inputs_mut(),
            Board::Gng(b) => b.inputs_mut(),
            Board::TigerRoad(b) => b.inputs_mut(),
        }
    }
}

impl VideoBus for Board {
    fn read(&mut self, addr: u32) -> Option<u16> {
        match self {
            Board::CrudeBuster(b) => b.read(addr),
            Board::Gng(b) => b.read(addr),
            Board::TigerRoad(b) => b.read(addr),
        }
    }

    fn write(&mut self, addr: u32, data: u16, mask: u16) -> bool {
        match self {
            Board::CrudeBuster(b) => b.write(addr, data, mask),
            Board::Gng(b) => b.write(addr, data, mask),
            Board::TigerRoad(b) => b.write(addr, data, mask),
        }
    }
}

/// Video side of one arcade machine.
#[derive(Debug, Clone)]
pub struct Emulator {
    board: Board,
    frame_count: u64,
}

impl Emulator {
    pub fn new(board: Board) -> Self {
        Self { board, frame_count: 0 }
    }

    /// Validate `config`, decode the board's graphics and apply the
    /// presentation settings.
    pub fn from_config(
        config: &VideoConfig,
        regions: &HashMap<String, Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut board = Board::from_regions(config.game, regions, config.visible_area())?;
        board.context_mut().set_clear_color(config.clear_color);
        log::info!(
            "emulator: {} ({}), visible {:?}",
            config.game.title(),
            config.game,
            config.visible_area()
        );
        Ok(Self::new(board))
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn game(&self) -> Game {
        self.board.game()
    }

    /// Render one frame, then run vblank.
    pub fn step_frame(&mut self) -> &Bitmap {
        self.board.render_frame();
        self.board.end_of_frame();
        self.frame_count += 1;
        self.board.context().screen()
    }

    pub fn run_frames(&mut self, num_frames: u64) {
        for _ in 0..num_frames {
            self.step_frame();
        }
    }

    pub fn screen(&self) -> &Bitmap {
        self.board.context().screen()
    }

    pub fn stats(&self) -> EmulatorStats {
        let ctx = self.board.context();
        EmulatorStats {
            frame_count: self.frame_count,
            last_frame: ctx.stats(),
            palette_used: ctx.palette().used_count(),
        }
    }
}

impl VideoBus for Emulator {
    fn read(&mut self, addr: u32) -> Option<u16> {
        self.board.read(addr)
    }

    fn write(&mut self, addr: u32, data: u16, mask: u16) -> bool {
        self.board.write(addr, data, mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorStats {
    pub frame_count: u64,
    pub last_frame: FrameStats,
    /// Palette entries the last frame could show.
    pub palette_used: usize,
}
