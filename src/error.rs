//! Recoverable errors: bad assets and bad configuration.
//!
//! Programmer errors (a cell index past the end of a layer, a scroll table
//! whose length is not a power of two) are not represented here; they panic.

use thiserror::Error;

use crate::core::bitmap::Rect;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VideoError {
    #[error("missing graphics region `{0}`")]
    MissingRegion(String),
    #[error("graphics region `{region}` is {actual} bytes, layout needs at least {needed}")]
    RegionTooSmall {
        region: String,
        needed: usize,
        actual: usize,
    },
    #[error("graphics layout for region `{0}` decodes to zero elements")]
    EmptyLayout(String),
    #[error("{board} expects {expected} graphics banks, got {actual}")]
    GfxBankCount {
        board: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{board} graphics bank {bank} holds {width}x{height} tiles, expected {expected_width}x{expected_height}")]
    GfxTileSize {
        board: &'static str,
        bank: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
    #[error("{board} tile map ROM is {actual} bytes, expected {expected}")]
    TileMapRomSize {
        board: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("visible area {0:?} does not fit the 256x256 screen")]
    VisibleArea(Rect),
    #[error("unknown game `{0}`")]
    UnknownGame(String),
}
