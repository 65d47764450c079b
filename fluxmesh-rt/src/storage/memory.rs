// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use parking_lot::RwLock;
use serde_json::Value;

// Layer 3: Internal module imports
use super::traits::{Storage, StorageError};

/// Volatile in-process storage.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn put(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
