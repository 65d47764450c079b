//! Named storage backends.
//!
//! Configured under the top-level `storage` key; the core itself keeps no
//! persistent state, but components may use these to remember values
//! across restarts.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageError};

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde_json::Value;

/// Build a storage backend from one `storage` list entry.
pub fn from_config(config: &Value) -> Result<(String, Arc<dyn Storage>), StorageError> {
    let name = config
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::Config("storage entry needs a name".to_string()))?
        .to_string();
    let storage_type = config
        .get("storage_type")
        .and_then(Value::as_str)
        .unwrap_or("memory");

    let backend: Arc<dyn Storage> = match storage_type {
        "memory" => Arc::new(MemoryStorage::new()),
        "file" => {
            let path = config
                .get("path")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StorageError::Config(format!("file storage {name} needs a path"))
                })?;
            Arc::new(FileStorage::open(path)?)
        }
        other => {
            return Err(StorageError::Config(format!(
                "unknown storage_type: {other}"
            )))
        }
    };
    Ok((name, backend))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_from_config() {
        let (name, storage) = from_config(&json!({"name": "scratch"})).unwrap();
        assert_eq!(name, "scratch");
        storage.put("k", json!(1)).unwrap();
        assert_eq!(storage.get("k").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_unknown_type_is_error() {
        let result = from_config(&json!({"name": "s", "storage_type": "redis"}));
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[test]
    fn test_file_storage_needs_path() {
        let result = from_config(&json!({"name": "s", "storage_type": "file"}));
        assert!(matches!(result, Err(StorageError::Config(_))));
    }
}
