// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage configuration is malformed
    #[error("Storage configuration error: {0}")]
    Config(String),

    /// Filesystem access failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted data could not be parsed
    #[error("Storage data error: {0}")]
    Data(String),
}

/// A keyed JSON store.
pub trait Storage: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Remove `key`. Returns `true` when it existed.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// All stored keys.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}
