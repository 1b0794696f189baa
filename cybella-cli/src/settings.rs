//! Persistent CLI settings (JSON file in the platform data directory).

use std::fs;
use std::path::{Path, PathBuf};

use cybella_core::{AggregationStrategy, EngineConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub engine: EngineConfig,
    /// Directory holding the ONNX exports; `None` uses the platform default.
    pub model_dir: Option<PathBuf>,
    /// Peak-normalise decoded audio before prediction.
    pub normalize_input: bool,
    /// Apply a softmax to classifier outputs (for exports ending in logits).
    pub apply_softmax: bool,
    /// Log every classified window through `tracing`.
    pub log_segments: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            model_dir: None,
            normalize_input: true,
            apply_softmax: false,
            log_segments: false,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.engine.normalize();
        self.model_dir = self
            .model_dir
            .as_ref()
            .map(|d| PathBuf::from(d.to_string_lossy().trim()))
            .filter(|d| !d.as_os_str().is_empty());
    }

    /// Apply `CYBELLA_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("CYBELLA_STRATEGY") {
            match raw.parse::<AggregationStrategy>() {
                Ok(strategy) => self.engine.strategy = strategy,
                Err(e) => warn!("ignoring CYBELLA_STRATEGY: {e}"),
            }
        }
        if let Some(raw) = lookup("CYBELLA_MODEL_DIR") {
            if !raw.trim().is_empty() {
                self.model_dir = Some(PathBuf::from(raw.trim()));
            }
        }
        if let Some(raw) = lookup("CYBELLA_PARALLEL_WINDOWS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.engine.max_parallel_windows = n,
                Err(_) => warn!("ignoring CYBELLA_PARALLEL_WINDOWS={raw:?}: not a number"),
            }
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Cybella")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("cybella")
            .join("settings.json")
    }
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| match serde_json::from_str::<AppSettings>(&raw) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(path = %path.display(), "ignoring malformed settings file: {e}");
                None
            }
        })
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
