//! Tunables for interaction and history.

use egui::{Vec2, vec2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV_VAR: &str = "FORM_DESIGNER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerConfig {
    /// Smallest width/height a resize may produce.
    pub min_size: f32,
    /// Quiet period after which buffered undo entries become one history step.
    pub coalesce_window_ms: u64,
    pub grid_size: f32,
    pub undo_limit: usize,
    pub canvas_size: Vec2,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            min_size: 20.0,
            coalesce_window_ms: 150,
            grid_size: 1.0,
            undo_limit: 200,
            canvas_size: vec2(800.0, 600.0),
        }
    }
}

impl DesignerConfig {
    pub fn coalesce_window(&self) -> Duration {
        Duration::from_millis(self.coalesce_window_ms)
    }

    pub fn from_json(json: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(json)
            .map(Self::sanitized)
            .map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_json(&json, path)?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`], or the defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.min_size.is_finite() && self.min_size >= 1.0) {
            self.min_size = defaults.min_size;
        }
        if !(self.grid_size.is_finite() && self.grid_size >= 1.0) {
            self.grid_size = defaults.grid_size;
        }
        self.undo_limit = self.undo_limit.max(1);
        if !(self.canvas_size.x > 0.0 && self.canvas_size.y > 0.0) {
            self.canvas_size = defaults.canvas_size;
        }
        self
    }
}
