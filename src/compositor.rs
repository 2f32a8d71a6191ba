//! Per-machine video context and the shared steps of the frame sequence.
//!
//! Every board owns exactly one [`VideoContext`]: the palette, the decoded
//! graphics banks, the output bitmap and the frame counter. Nothing here is
//! global, so several machines can run side by side.
//!
//! A board's `render_frame` runs:
//!
//! 1. [`VideoContext::poll_flip`] to push a flip-screen change to its layers,
//! 2. its own scroll resolution,
//! 3. [`VideoContext::begin_frame`] and [`VideoContext::prepare`], which
//!    update layers in bank order, collect used colours, republish the
//!    palette and repaint stale tiles,
//! 4. its fixed draw sequence,
//! 5. [`VideoContext::finish_frame`].

use crate::core::bitmap::{Bitmap, Rect};
use crate::error::VideoError;
use crate::gfx::GfxSet;
use crate::palette::Palette;
use crate::sprites::{SpriteCompositor, SpriteDrawParams, SpritePass};
use crate::tilemap::{DrawPass, Tilemap};

/// Screen bitmap size shared by all three boards.
pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 256;

/// Work done for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub tiles_updated: usize,
    pub tiles_rendered: usize,
    pub sprite_cells: usize,
    pub palette_changed: bool,
}

/// Reject a visible area that reaches outside the screen bitmap.
pub fn check_visible_area(visible: Rect) -> Result<(), VideoError> {
    let screen = Rect::new(0, SCREEN_WIDTH as i32 - 1, 0, SCREEN_HEIGHT as i32 - 1);
    if visible.intersect(&screen) != Some(visible) {
        return Err(VideoError::VisibleArea(visible));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct VideoContext {
    palette: Palette,
    gfx: GfxSet,
    screen: Bitmap,
    visible: Rect,
    clear_color: u32,
    frame: u64,
    flip: bool,
    stats: FrameStats,
}

impl VideoContext {
    pub fn new(palette: Palette, gfx: GfxSet, visible: Rect) -> Result<Self, VideoError> {
        check_visible_area(visible)?;
        Ok(Self {
            palette,
            gfx,
            screen: Bitmap::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            visible,
            clear_color: 0,
            frame: 0,
            flip: false,
            stats: FrameStats::default(),
        })
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn gfx(&self) -> &GfxSet {
        &self.gfx
    }

    pub fn screen(&self) -> &Bitmap {
        &self.screen
    }

    pub fn visible(&self) -> Rect {
        self.visible
    }

    pub fn clear_color(&self) -> u32 {
        self.clear_color
    }

    pub fn set_clear_color(&mut self, rgb: u32) {
        self.clear_color = rgb;
    }

    /// Frames completed so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn frame_parity(&self) -> u8 {
        (self.frame & 1) as u8
    }

    pub fn flip(&self) -> bool {
        self.flip
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Propagate the flip-screen line to every layer when it changed since
    /// the last frame. Returns whether it changed.
    pub fn poll_flip(&mut self, flip: bool, layers: &mut [&mut Tilemap]) -> bool {
        if flip == self.flip {
            return false;
        }
        log::debug!("video: flip screen {}", if flip { "on" } else { "off" });
        self.flip = flip;
        for layer in layers.iter_mut() {
            layer.set_flip(flip);
        }
        true
    }

    /// Reset per-frame palette usage and statistics, and clear the visible
    /// area.
    pub fn begin_frame(&mut self) {
        self.palette.begin_frame();
        self.stats = FrameStats::default();
        let visible = self.visible;
        for y in visible.min_y..=visible.max_y {
            self.screen.row_mut(y as usize)[visible.min_x as usize..=visible.max_x as usize]
                .fill(self.clear_color);
        }
    }

    /// Update `layers` in the order given, mark every colour they and the
    /// sprites can show, republish the palette and repaint stale pixels.
    pub fn prepare(&mut self, layers: &mut [&mut Tilemap], sprites: Option<&SpriteCompositor>) {
        for layer in layers.iter_mut() {
            self.stats.tiles_updated += layer.update();
        }
        for layer in layers.iter() {
            layer.mark_used_colors(&mut self.palette, self.gfx.bank(layer.gfx_bank()));
        }
        if let Some(sprites) = sprites {
            sprites.mark_used_colors(&mut self.palette, self.gfx.bank(sprites.gfx_bank()));
        }
        if self.palette.recompute_if_needed() {
            self.stats.palette_changed = true;
            for layer in layers.iter_mut() {
                layer.mark_all_pixels_dirty();
            }
        }
        for layer in layers.iter_mut() {
            let bank = layer.gfx_bank();
            self.stats.tiles_rendered += layer.render(self.gfx.bank(bank), &self.palette);
        }
    }

    pub fn draw_layer(&mut self, layer: &Tilemap, pass: DrawPass) {
        layer.draw(&mut self.screen, &self.visible, pass);
    }

    pub fn draw_sprites(&mut self, sprites: &SpriteCompositor, pass: SpritePass) {
        let params = SpriteDrawParams {
            pass,
            frame_parity: self.frame_parity(),
            flip_screen: self.flip,
        };
        let gfx = self.gfx.bank(sprites.gfx_bank());
        self.stats.sprite_cells += sprites.draw(&mut self.screen, gfx, &self.palette, &self.visible, &params);
    }

    /// Split borrow for boards that draw straight from graphics ROM.
    pub fn parts_mut(&mut self) -> (&mut Bitmap, &GfxSet, &Palette, Rect) {
        (&mut self.screen, &self.gfx, &self.palette, self.visible)
    }

    /// Close the frame and hand out the finished bitmap.
    pub fn finish_frame(&mut self) -> &Bitmap {
        log::trace!("video: frame {} {:?}", self.frame, self.stats);
        self.frame += 1;
        &self.screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bus::WORD;
    use crate::gfx::GfxElement;
    use crate::palette::PaletteFormat;
    use crate::sprites::SpriteFormat;
    use crate::tilemap::{LayerKind, ScanOrder, TileDecoder, TilemapConfig};

    fn context() -> VideoContext {
        let pixels = (0..16u32).flat_map(|code| vec![code as u8; 64]).collect();
        let gfx = GfxSet::new(vec![GfxElement::from_pixels(8, 8, 4, 0, 16, pixels)]);
        VideoContext::new(
            Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 256),
            gfx,
            Rect::new(0, 255, 16, 239),
        )
        .unwrap()
    }

    fn layer() -> Tilemap {
        Tilemap::new(TilemapConfig {
            name: "fg",
            gfx_bank: 0,
            cols: 32,
            rows: 32,
            tile_width: 8,
            tile_height: 8,
            scan: ScanOrder::RowMajor,
            decoder: TileDecoder::Simple,
            kind: LayerKind::Opaque,
        })
    }

    #[test]
    fn flip_is_propagated_once() {
        let mut ctx = context();
        let mut fg = layer();
        ctx.begin_frame();
        ctx.prepare(&mut [&mut fg], None);
        assert!(ctx.poll_flip(true, &mut [&mut fg]));
        assert!(fg.flip());
        // the cache is in layer coordinates, a flip needs no repaint
        assert_eq!(fg.pixels_dirty_count(), 0);
        assert!(!ctx.poll_flip(true, &mut [&mut fg]));
    }

    #[test]
    fn visible_area_must_fit_the_screen() {
        let palette = || Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 256);
        let gfx = || GfxSet::new(Vec::new());
        for area in [Rect::new(0, 319, 0, 239), Rect::new(-8, 255, 16, 239), Rect::new(0, 255, 16, 256)] {
            assert_eq!(
                VideoContext::new(palette(), gfx(), area).unwrap_err(),
                VideoError::VisibleArea(area)
            );
        }
        assert!(VideoContext::new(palette(), gfx(), Rect::new(0, 255, 0, 255)).is_ok());
    }

    #[test]
    fn palette_change_repaints_cached_tiles() {
        let mut ctx = context();
        let mut fg = layer();
        fg.write(0, 0x0001, WORD);
        ctx.palette_mut().write_primary(1, 0x0f00, WORD);
        ctx.begin_frame();
        ctx.prepare(&mut [&mut fg], None);
        assert!(ctx.stats().palette_changed);
        assert_eq!(fg.cached_pixel(0, 0).0, 0xff0000);
        ctx.finish_frame();

        // no writes: nothing repainted
        ctx.begin_frame();
        ctx.prepare(&mut [&mut fg], None);
        assert_eq!(ctx.stats().tiles_rendered, 0);
        ctx.finish_frame();

        // a colour change alone repaints the whole layer with the new value
        ctx.palette_mut().write_primary(1, 0x00f0, WORD);
        ctx.begin_frame();
        ctx.prepare(&mut [&mut fg], None);
        assert_eq!(ctx.stats().tiles_rendered, 32 * 32);
        assert_eq!(fg.cached_pixel(0, 0).0, 0x00ff00);
    }

    #[test]
    fn frame_parity_alternates() {
        let mut ctx = context();
        assert_eq!(ctx.frame_parity(), 0);
        ctx.finish_frame();
        assert_eq!(ctx.frame_parity(), 1);
        ctx.finish_frame();
        assert_eq!(ctx.frame(), 2);
        assert_eq!(ctx.frame_parity(), 0);
    }

    #[test]
    fn sprites_use_context_flip_and_parity() {
        let pixels = (0..16u32).flat_map(|code| vec![code as u8; 256]).collect();
        let gfx = GfxSet::new(vec![GfxElement::from_pixels(16, 16, 4, 0, 16, pixels)]);
        let mut ctx = VideoContext::new(
            Palette::new(PaletteFormat::XxxxRrrrGgggBbbb, 256),
            gfx,
            Rect::new(0, 255, 16, 239),
        )
        .unwrap();
        let mut sprites = SpriteCompositor::new(SpriteFormat::Gng, 0, 0x200);
        for (i, v) in [0x02u16, 0x00, 0x40, 0x20].into_iter().enumerate() {
            sprites.write(i, v, WORD);
        }
        sprites.snapshot();
        ctx.palette_mut().write_primary(2, 0x0fff, WORD);
        ctx.begin_frame();
        ctx.prepare(&mut [], Some(&sprites));
        ctx.draw_sprites(&sprites, SpritePass::All);
        assert_eq!(ctx.screen().pixel(0x20, 0x40), 0xffffff);
        assert_eq!(ctx.stats().sprite_cells, 1);
    }
}
