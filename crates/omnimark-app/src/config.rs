//! Application configuration.

use omnimark_core::{SerializableColor, ToolDefaults};
use omnimark_core::viewport::DEFAULT_FIT_PADDING;
use omnimark_render::DEFAULT_FRAME_INTERVAL;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Application configuration, loaded from JSON. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background_color: SerializableColor,
    /// Padding around the image when fitting it to the window.
    pub fit_padding: f64,
    pub frame_interval_ms: u64,
    /// Brush each tool starts with.
    pub tools: ToolDefaults,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "OmniMark".to_string(),
            width: 1280,
            height: 800,
            background_color: SerializableColor::new(250, 250, 250, 255),
            fit_padding: DEFAULT_FIT_PADDING,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
            tools: ToolDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file, falling back to defaults when it does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace unusable values with defaults.
    fn sanitized(mut self) -> Self {
        if !self.fit_padding.is_finite() || self.fit_padding < 0.0 {
            log::warn!("Ignoring fit_padding {}", self.fit_padding);
            self.fit_padding = DEFAULT_FIT_PADDING;
        }
        if self.frame_interval_ms == 0 {
            self.frame_interval_ms = DEFAULT_FRAME_INTERVAL.as_millis() as u64;
        }
        self.tools = self.tools.normalized();
        self
    }

    pub fn background(&self) -> Color {
        self.background_color.into()
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}
