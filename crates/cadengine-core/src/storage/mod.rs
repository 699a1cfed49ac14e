//! Scene document persistence.
//!
//! Backends store serialized scene documents (see
//! [`serialize_scene`](crate::serialize::serialize_scene)) under string ids.
//! Calls are synchronous; a host that wants background saves runs them on
//! its own thread.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use serde_json::Value;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for scene document storage backends.
pub trait SceneStorage: Send + Sync {
    /// Save a document.
    fn save(&self, id: &str, document: &Value) -> StorageResult<()>;

    /// Load a document.
    fn load(&self, id: &str) -> StorageResult<Value>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, id: &str) -> StorageResult<()>;

    /// List all document ids.
    fn list(&self) -> StorageResult<Vec<String>>;

    /// Check if a document exists.
    fn exists(&self, id: &str) -> StorageResult<bool>;
}
