//! Local persistent storage - a JSON object of string keys on disk
//!
//! Every mutation rewrites the whole file through a temp file + rename so a
//! crash never leaves a half-written store behind.

use crate::domain::error::{BookingError, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One store shared by the cart and the auth session
pub type SharedStorage = Arc<Mutex<LocalStorage>>;

pub struct LocalStorage {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl LocalStorage {
    /// Open the store at `path`. A missing file is an empty store; an
    /// unreadable or non-object file is logged and treated as empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(path = %path.display(), "local_storage_corrupt_starting_empty");
                    Map::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Map::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "local_storage_read_failed");
                Map::new()
            }
        };
        info!(path = %path.display(), keys = %entries.len(), "local_storage_opened");
        Self { path, entries }
    }

    pub fn open_shared<P: AsRef<Path>>(path: P) -> SharedStorage {
        Arc::new(Mutex::new(Self::open(path)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Typed read. `Ok(None)` when absent, `Err` when the stored value does
    /// not have the expected shape.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(value) => T::deserialize(value).map(Some).map_err(BookingError::Decode),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(BookingError::Decode)?;
        let previous = self.entries.insert(key.to_string(), value);
        if let Err(e) = self.flush() {
            // Keep memory in line with what is on disk
            match previous {
                Some(old) => self.entries.insert(key.to_string(), old),
                None => self.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns whether the key was present
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.flush() {
            self.entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(true)
    }

    fn flush(&self) -> Result<()> {
        self.write_file().map_err(|e| {
            BookingError::Storage(format!("{}: {}", self.path.display(), e))
        })
    }

    fn write_file(&self) -> std::io::Result<()> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let body = serde_json::to_vec_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &body)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = %body.len(), "local_storage_written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::open(dir.path().join("nope.json"));
        assert!(!storage.contains("auth_token"));
        assert_eq!(storage.get::<String>("auth_token").unwrap(), None);
    }

    #[test]
    fn test_set_persists_and_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/store.json");

        let mut storage = LocalStorage::open(&path);
        storage.set("auth_token", "abc").unwrap();
        assert!(path.exists());

        let reopened = LocalStorage::open(&path);
        assert_eq!(reopened.get::<String>("auth_token").unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let mut storage = LocalStorage::open(&path);
        storage.set("k", &1u32).unwrap();
        assert!(storage.remove("k").unwrap());
        assert!(!storage.remove("k").unwrap());
        assert!(!LocalStorage::open(&path).contains("k"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();

        let mut storage = LocalStorage::open(&path);
        assert!(!storage.contains("m19_cart"));
        storage.set("k", "v").unwrap();
        assert!(LocalStorage::open(&path).contains("k"));
    }

    #[test]
    fn test_failed_write_leaves_entries_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let mut storage = LocalStorage::open(&path);
        storage.set("kept", "v").unwrap();

        // A directory in the file's place makes the rename fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(storage.set("k", "v"), Err(BookingError::Storage(_))));
        assert!(!storage.contains("k"));

        assert!(storage.remove("kept").is_err());
        assert_eq!(storage.get::<String>("kept").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_wrong_shape_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let mut storage = LocalStorage::open(dir.path().join("store.json"));
        storage.set("k", "text").unwrap();
        assert!(matches!(storage.get::<Vec<u32>>("k"), Err(BookingError::Decode(_))));
    }
}
