//! `KeyValueStore` trait — the durable storage seam.

use crate::error::StorageError;

/// Synchronous string key-value store.
///
/// Writes are expected to be durable once `set` returns. A single client
/// process is assumed; there is no concurrent-writer model.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
