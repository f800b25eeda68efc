//! Quota-bound key/value port the session store persists through.
//!
//! Backends are synchronous: every call completes (or fails) before it
//! returns. Callers on an async runtime are expected to use
//! `spawn_blocking`.

use thiserror::Error;

pub mod keys;
pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// All keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Short backend name for logs and health output
    fn kind(&self) -> &'static str;
}
