//! Engine configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Wiring and tuning for an [`Engine`](crate::Engine).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Directory holding `signal_lexicon.json` and/or
    /// `signal_lexicon_runtime.json`.
    pub lexicon_dir: PathBuf,
    /// Glyph catalog SQLite file.
    pub db_path: PathBuf,
    /// Append-only feedback JSONL file.
    pub feedback_path: PathBuf,
    /// Prefer the compact runtime lexicon when present.
    #[serde(default = "default_true")]
    pub prefer_runtime_lexicon: bool,
    /// Saturation constant `k` in `score / (score + k)`.
    #[serde(default = "default_saturation")]
    pub saturation: f64,
    /// Hits at or below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Selections scoring below this return no glyph.
    #[serde(default = "default_selection_threshold")]
    pub selection_threshold: f64,
    /// SQLite busy timeout, milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Cooperative CPU-time guard for one parse+select call, milliseconds.
    #[serde(default = "default_cpu_guard_ms")]
    pub cpu_guard_ms: u64,
}

impl EngineConfig {
    /// Conventional layout inside a single workspace directory: lexicon
    /// files beside `glyphs.db` and `feedback.jsonl`.
    pub fn for_workspace(dir: &Path) -> Self {
        Self {
            lexicon_dir: dir.to_path_buf(),
            db_path: dir.join("glyphs.db"),
            feedback_path: dir.join("feedback.jsonl"),
            prefer_runtime_lexicon: true,
            saturation: default_saturation(),
            min_confidence: default_min_confidence(),
            selection_threshold: default_selection_threshold(),
            busy_timeout_ms: default_busy_timeout_ms(),
            cpu_guard_ms: default_cpu_guard_ms(),
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = fs::read_to_string(path).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|e| EngineError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_saturation() -> f64 {
    1.0
}

fn default_min_confidence() -> f64 {
    0.05
}

fn default_selection_threshold() -> f64 {
    0.15
}

fn default_busy_timeout_ms() -> u64 {
    1000
}

fn default_cpu_guard_ms() -> u64 {
    2000
}
