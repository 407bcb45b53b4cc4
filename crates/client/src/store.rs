//! Device-scoped persistent key/value storage.
//!
//! Emulates browser local storage with one file per key under a storage
//! directory. Values are strings; typed accessors serialize through JSON.
//! Corrupt or unparseable content is cleared and treated as absent rather
//! than surfaced as an error.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

/// Storage keys in use by the client.
pub mod keys {
    /// Serialized anonymous cart line items.
    pub const CART: &str = "cart_v1";
    /// Bearer token for the current session.
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Cached display username.
    pub const AUTH_USERNAME: &str = "auth_username";
}

/// Errors that can occur writing to the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized.
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Directory-backed key/value store.
///
/// Cheap to clone; all handles share the same directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Open (creating if necessary) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read the raw string value for a key, or `None` if absent/unreadable.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.key_path(key)).ok()
    }

    /// Write the raw string value for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    pub fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::write(self.key_path(key), value)?;
        Ok(())
    }

    /// Remove a key. Removing an absent key is a no-op.
    pub fn remove(&self, key: &str) {
        let _ = std::fs::remove_file(self.key_path(key));
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.key_path(key).exists()
    }

    /// Read and deserialize the JSON value for a key.
    ///
    /// Corrupt content is cleared and reported as absent.
    #[must_use]
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt local storage entry");
                self.remove(key);
                None
            }
        }
    }

    /// Serialize and write a JSON value for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }

    /// Root directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
