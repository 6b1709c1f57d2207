//! Configuration loading
//!
//! TOML configuration for the player. Resolution priority:
//! 1. Explicit path (command-line argument)
//! 2. `JUSTPLAY_CONFIG` environment variable
//! 3. Per-user config file (`<config dir>/justplay/config.toml`)
//! 4. Built-in defaults
//!
//! An explicitly named file must exist and parse; a missing per-user file
//! falls through to defaults.

use crate::audio::types::{clamp_volume, VolumeCurve};
use crate::error::{Error, Result};
use crate::playback::EngineSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "JUSTPLAY_CONFIG";

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Fixed device period in frames (None = device default)
    pub buffer_frames: Option<u32>,

    /// Initial volume in `[0, 1]`
    pub volume: f32,

    pub loop_at_end: bool,

    pub volume_curve: VolumeCurve,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_frames: None,
            volume: 1.0,
            loop_at_end: false,
            volume_curve: VolumeCurve::Linear,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PlaybackConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: PlaybackConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Resolve configuration following the priority order above.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            debug!("Loading config from argument: {}", path.display());
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                debug!("Loading config from {}: {}", CONFIG_ENV_VAR, path);
                return Self::load(Path::new(&path));
            }
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                debug!("Loading config from {}", path.display());
                return Self::load(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Engine settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            volume: self.volume,
            loop_at_end: self.loop_at_end,
            volume_curve: self.volume_curve,
        }
    }

    fn validate(mut self) -> Result<Self> {
        if self.buffer_frames == Some(0) {
            return Err(Error::Config("buffer_frames must be greater than 0".to_string()));
        }
        self.volume = clamp_volume(self.volume);
        Ok(self)
    }
}

/// Per-user config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("justplay").join("config.toml"))
}
