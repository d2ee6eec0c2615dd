//! In-memory storage implementation.

use super::{Storage, StorageError, StorageResult, StrokeLog};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    logs: RwLock<HashMap<String, StrokeLog>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, log: &StrokeLog) -> StorageResult<()> {
        let mut logs = self.logs.write().map_err(lock_error)?;
        logs.insert(id.to_string(), log.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> StorageResult<StrokeLog> {
        let logs = self.logs.read().map_err(lock_error)?;
        logs.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let mut logs = self.logs.write().map_err(lock_error)?;
        logs.remove(id);
        Ok(())
    }

    fn exists(&self, id: &str) -> StorageResult<bool> {
        let logs = self.logs.read().map_err(lock_error)?;
        Ok(logs.contains_key(id))
    }
}
