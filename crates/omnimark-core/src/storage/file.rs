//! File-based storage implementation.

use super::{Storage, StorageError, StorageResult, StrokeLog};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension appended to stroke log files.
pub const LOG_EXTENSION: &str = "omnimark.json";

/// File-based storage.
///
/// Stores stroke logs as JSON files in a directory. With
/// [`FileStorage::beside`] the directory is the image's own, so
/// `photo.png` gets a `photo.png.omnimark.json` sidecar.
pub struct FileStorage {
    /// Base directory for stroke logs.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Storage in the directory of an image, plus the id of its sidecar log.
    pub fn beside(image_path: &Path) -> StorageResult<(Self, String)> {
        let dir = image_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let id = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::Io(format!("Invalid image path: {}", image_path.display())))?
            .to_string();
        Ok((Self::new(dir)?, id))
    }

    /// Get the file path for a log id.
    fn log_path(&self, id: &str) -> PathBuf {
        // Sanitize ID to be safe for filenames
        let safe_id: String = id
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.{}", safe_id, LOG_EXTENSION))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(&self, id: &str, log: &StrokeLog) -> StorageResult<()> {
        let path = self.log_path(id);
        let json = log
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
        log::info!("Saved stroke log to {}", path.display());
        Ok(())
    }

    fn load(&self, id: &str) -> StorageResult<StrokeLog> {
        let path = self.log_path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        StrokeLog::from_json(&json).map_err(|e| {
            StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self.log_path(id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.log_path(id).exists())
    }
}
