//! In-memory storage implementation.

use super::{SceneStorage, StorageError, StorageResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {e}"))
}

impl SceneStorage for MemoryStorage {
    fn save(&self, id: &str, document: &Value) -> StorageResult<()> {
        let mut docs = self.documents.write().map_err(lock_error)?;
        docs.insert(id.to_string(), document.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> StorageResult<Value> {
        let docs = self.documents.read().map_err(lock_error)?;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> StorageResult<()> {
        let mut docs = self.documents.write().map_err(lock_error)?;
        docs.remove(id);
        Ok(())
    }

    fn list(&self) -> StorageResult<Vec<String>> {
        let docs = self.documents.read().map_err(lock_error)?;
        let mut ids: Vec<String> = docs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn exists(&self, id: &str) -> StorageResult<bool> {
        let docs = self.documents.read().map_err(lock_error)?;
        Ok(docs.contains_key(id))
    }
}
