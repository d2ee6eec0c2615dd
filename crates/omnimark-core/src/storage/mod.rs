//! Stroke log persistence.
//!
//! A document is persisted as "a raster plus a vector stroke log": the image
//! file is never rewritten; the strokes live in a [`StrokeLog`] saved beside it.

mod file;
mod memory;

pub use file::{FileStorage, LOG_EXTENSION};
pub use memory::MemoryStorage;

use crate::history::{History, HistoryError};
use crate::stroke::StrokeGroup;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current stroke log format version.
pub const STROKE_LOG_VERSION: u32 = 1;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stroke log not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Unsupported stroke log version {0}")]
    UnsupportedVersion(u32),
    #[error("Invalid history: {0}")]
    History(#[from] HistoryError),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Serialized stroke history of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeLog {
    pub version: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub groups: Vec<StrokeGroup>,
    /// Index of the last applied group, `None` when everything is undone.
    pub current_index: Option<usize>,
}

impl StrokeLog {
    /// Capture a history. An unfinished group is not included.
    pub fn from_history(history: &History, image_width: u32, image_height: u32) -> Self {
        Self {
            version: STROKE_LOG_VERSION,
            image_width,
            image_height,
            groups: history.groups().to_vec(),
            current_index: history.current_index(),
        }
    }

    /// Rebuild the history this log describes.
    ///
    /// Brushes and points are sanitized first, so a hand-edited log cannot
    /// make replay rasterize unbounded footprints.
    pub fn to_history(&self) -> StorageResult<History> {
        if self.version > STROKE_LOG_VERSION {
            return Err(StorageError::UnsupportedVersion(self.version));
        }
        let groups = self.groups.iter().cloned().map(StrokeGroup::sanitized).collect();
        Ok(History::from_parts(groups, self.current_index)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Trait for stroke log storage backends.
pub trait Storage: Send + Sync {
    /// Save a stroke log under an id.
    fn save(&self, id: &str, log: &StrokeLog) -> StorageResult<()>;

    /// Load a stroke log.
    fn load(&self, id: &str) -> StorageResult<StrokeLog>;

    /// Delete a stroke log. Missing logs are not an error.
    fn delete(&self, id: &str) -> StorageResult<()>;

    /// Check if a stroke log exists.
    fn exists(&self, id: &str) -> StorageResult<bool>;
}
