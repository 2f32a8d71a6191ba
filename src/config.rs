//! Machine configuration: which board to build and how to present it.
//!
//! With the `serde-config` feature a config can be loaded from YAML or JSON:
//!
//! ```yaml
//! game: cbuster
//! visible_area: { min_x: 0, max_x: 255, min_y: 8, max_y: 247 }
//! clear_color: 0
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::compositor::check_visible_area;
use crate::core::bitmap::Rect;
use crate::error::VideoError;

/// The supported boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-config", serde(try_from = "String", into = "String"))]
pub enum Game {
    CrudeBuster,
    Gng,
    TigerRoad,
}

impl Game {
    pub const ALL: [Game; 3] = [Game::CrudeBuster, Game::Gng, Game::TigerRoad];

    /// Short set name.
    pub fn name(self) -> &'static str {
        match self {
            Game::CrudeBuster => "cbuster",
            Game::Gng => "gng",
            Game::TigerRoad => "tigeroad",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Game::CrudeBuster => "Crude Buster",
            Game::Gng => "Ghosts'n Goblins",
            Game::TigerRoad => "Tiger Road",
        }
    }

    /// Visible part of the 256x256 screen bitmap on the original monitor.
    pub fn default_visible_area(self) -> Rect {
        match self {
            Game::CrudeBuster => Rect::new(0, 255, 8, 247),
            Game::Gng | Game::TigerRoad => Rect::new(0, 255, 16, 239),
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Game {
    type Err = VideoError;

    /// Accepts the set name or a regional clone name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cbuster" | "twocrude" | "crudebuster" => Ok(Game::CrudeBuster),
            "gng" | "makaimur" => Ok(Game::Gng),
            "tigeroad" | "toramich" => Ok(Game::TigerRoad),
            _ => Err(VideoError::UnknownGame(s.to_string())),
        }
    }
}

impl TryFrom<String> for Game {
    type Error = VideoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Game> for String {
    fn from(game: Game) -> Self {
        game.name().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-config", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoConfig {
    pub game: Game,
    /// Overrides the board's visible area.
    #[cfg_attr(feature = "serde-config", serde(default))]
    pub visible_area: Option<Rect>,
    /// RGB the visible area is cleared to before each frame.
    #[cfg_attr(feature = "serde-config", serde(default))]
    pub clear_color: u32,
}

impl VideoConfig {
    pub fn new(game: Game) -> Self {
        Self {
            game,
            visible_area: None,
            clear_color: 0,
        }
    }

    pub fn visible_area(&self) -> Rect {
        self.visible_area.unwrap_or_else(|| self.game.default_visible_area())
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self::new(Game::CrudeBuster)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde-config")]
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[cfg(feature = "serde-config")]
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format `{0}`, expected .yaml, .yml or .json")]
    UnsupportedFormat(String),
    #[error("visible area {0:?} does not fit the 256x256 screen")]
    BadVisibleArea(Rect),
    #[error(transparent)]
    Video(#[from] VideoError),
}

impl VideoConfig {
    /// Reject settings no board can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(area) = self.visible_area {
            check_visible_area(area).map_err(|_| ConfigError::BadVisibleArea(area))?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde-config")]
impl VideoConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: VideoConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: VideoConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load by file extension.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Self::from_yaml(&text),
            "json" => Self::from_json(&text),
            _ => Err(ConfigError::UnsupportedFormat(ext)),
        }
    }
}
