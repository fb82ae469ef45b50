//! Append-only JSONL feedback log.
//!
//! One record per interaction, newline-terminated, flushed and fsynced
//! before `append` returns. The read path tolerates malformed lines. A
//! single external writer is assumed; the file handle itself is
//! mutex-guarded so the store can be shared.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::composer::ResponseSource;
use crate::error::EngineError;
use crate::parser::SignalHit;

/// One logged interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub timestamp: DateTime<Utc>,
    pub input_text: String,
    pub signal_hits: Vec<SignalHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_glyph_name: Option<String>,
    pub response_text: String,
    pub response_source: ResponseSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_rating: Option<i32>,
}

/// Aggregate counts over the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    pub total: usize,
    pub template: usize,
    pub contextual: usize,
    pub fallback: usize,
    pub rated: usize,
}

/// Append-only feedback store.
#[derive(Debug)]
pub struct FeedbackStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl FeedbackStore {
    /// Open (or create) the log in append mode, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_err(path, e))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Append one record durably: written, flushed, fsynced.
    pub fn append(&self, record: &FeedbackRecord) -> Result<(), EngineError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| io_err(&self.path, std::io::Error::other(e)))?;
        line.push('\n');

        let mut file = self.file.lock();
        file.write_all(line.as_bytes())
            .map_err(|e| io_err(&self.path, e))?;
        file.flush().map_err(|e| io_err(&self.path, e))?;
        file.sync_all().map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }

    /// Read every record in order, skipping malformed lines with a warning.
    pub fn read_all(&self) -> Result<Vec<FeedbackRecord>, EngineError> {
        let file = File::open(&self.path).map_err(|e| io_err(&self.path, e))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| io_err(&self.path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed feedback line {}: {e}", lineno + 1),
            }
        }
        Ok(records)
    }

    /// Aggregate counts by reply source.
    pub fn stats(&self) -> Result<FeedbackStats, EngineError> {
        let mut stats = FeedbackStats::default();
        for record in self.read_all()? {
            stats.total += 1;
            match record.response_source {
                ResponseSource::Template => stats.template += 1,
                ResponseSource::Contextual => stats.contextual += 1,
                ResponseSource::Fallback => stats.fallback += 1,
            }
            if record.user_rating.is_some() {
                stats.rated += 1;
            }
        }
        Ok(stats)
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn io_err(path: &Path, e: std::io::Error) -> EngineError {
    EngineError::Feedback {
        path: path.to_path_buf(),
        source: e,
    }
}
