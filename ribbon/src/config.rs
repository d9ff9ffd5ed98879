use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{frame::RenderMode, normalize::Normalizer, style::RenderStyleParams};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: RenderStyleParams,
    pub render_mode: RenderMode,
    /// Side of the cube loaded datasets are fit into.
    pub target_span: f32,

    // Input
    /// Radians of rotation per pixel dragged.
    pub rotate_sensitivity: f32,
    /// Wheel delta per degree of field of view.
    pub zoom_divisor: f32,

    pub frame_interval_ms: u64,
}

impl Config {
    /// `<config dir>/ribbon`, if the platform has a config directory.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|x| x.join("ribbon"))
    }

    /// Loads the config from `config_dir`, falling back to the defaults if
    /// it can't be read.
    pub fn load_or_default(config_dir: &Path) -> Self {
        Self::load(config_dir).unwrap_or_else(|err| {
            warn!("Failed to load config, using defaults: {err:#}");
            Self::default()
        })
    }

    /// Reads `config.toml` from `config_dir`. A missing file gives the
    /// defaults, a malformed one is an error.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            info!("No config file at `{}`, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read `{}`", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Invalid config file `{}`", path.display()))?;
        info!("Loaded config from `{}`", path.display());
        Ok(config)
    }

    /// Writes the config to `config.toml` in `config_dir`, creating the
    /// directory if needed.
    pub fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir)?;
        let path = config_dir.join(CONFIG_FILE);
        fs::write(&path, toml::to_string(self)?)
            .with_context(|| format!("Failed to write `{}`", path.display()))
    }

    /// Normalizer fitting datasets into `target_span`.
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.target_span)
    }

    /// Time between frames, never zero.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: RenderStyleParams::default(),
            render_mode: RenderMode::Lines,
            target_span: Normalizer::default().target_span,

            rotate_sensitivity: 0.01,
            zoom_divisor: 30.0,

            frame_interval_ms: 16,
        }
    }
}
