//! Key/value persistence behind the annotation store and preferences.
//!
//! Values are JSON documents, mirroring the browser's local extension
//! storage. Backends may enforce a byte quota, measured as key length plus
//! serialized value length summed over every entry.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

/// The browser's `storage.local` limit.
pub const DEFAULT_QUOTA_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Storage file {0} does not hold a JSON object")]
    Corrupt(PathBuf),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
    /// Every stored key, sorted.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Bytes the entries would occupy.
pub(crate) fn bytes_in_use(entries: &BTreeMap<String, Value>) -> usize {
    entries
        .iter()
        .map(|(key, value)| key.len() + value.to_string().len())
        .sum()
}

pub(crate) fn check_quota(
    entries: &BTreeMap<String, Value>,
    quota: Option<usize>,
) -> Result<(), StorageError> {
    match quota {
        Some(quota) => {
            let needed = bytes_in_use(entries);
            if needed > quota {
                Err(StorageError::QuotaExceeded { needed, quota })
            } else {
                Ok(())
            }
        }
        None => Ok(()),
    }
}
