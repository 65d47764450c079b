// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde_json::Value;

// Layer 3: Internal module imports
use super::traits::{Storage, StorageError};

/// JSON-file-backed storage, keyed by string.
///
/// The whole store is one JSON object; every mutation rewrites the file.
/// Suitable for small amounts of component state, not as a database.
pub struct FileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl FileStorage {
    /// Open (or create) the backing file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let text = fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&text).map_err(|e| StorageError::Data(e.to_string()))?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, Value>) -> Result<(), StorageError> {
        let text =
            serde_json::to_string_pretty(entries).map_err(|e| StorageError::Data(e.to_string()))?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock();
        let existed = entries.remove(key).is_some();
        if existed {
            self.persist(&entries)?;
        }
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let storage = FileStorage::open(&path).unwrap();
            storage.put("greeting", json!("Hello, World!")).unwrap();
            storage.put("count", json!(3)).unwrap();
        }

        // A fresh handle sees the persisted data
        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get("greeting").unwrap(), Some(json!("Hello, World!")));
        assert_eq!(storage.get("count").unwrap(), Some(json!(3)));

        assert!(storage.delete("count").unwrap());
        let reloaded = FileStorage::open(&path).unwrap();
        assert_eq!(reloaded.get("count").unwrap(), None);
    }

    #[test]
    fn test_empty_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "").unwrap();
        let storage = FileStorage::open(&path).unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Data(_))
        ));
    }
}
