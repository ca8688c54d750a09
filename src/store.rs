//! Key-value persistence
//!
//! State is stored as one JSON document per logical key. The last write to a
//! key wins on the next read.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{BoltError, Result};

pub const ENVIRONMENTS: &str = "environments";
pub const ACTIVE_ENVIRONMENT: &str = "active_environment";
pub const COOKIES: &str = "cookies";
pub const COLLECTIONS: &str = "collections";
pub const HISTORY: &str = "history";

/// Persistence backend
pub trait Store: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<JsonValue>>;

    fn save(&self, key: &str, value: &JsonValue) -> Result<()>;
}

/// Load and deserialize a key, `None` when it was never written
pub fn load_as<T: DeserializeOwned>(store: &dyn Store, key: &str) -> Result<Option<T>> {
    match store.load(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn save_as<T: Serialize + ?Sized>(store: &dyn Store, key: &str, value: &T) -> Result<()> {
    store.save(key, &serde_json::to_value(value)?)
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(BoltError::Storage(format!("invalid store key: {:?}", key)))
    }
}

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Store for FileStore {
    fn load(&self, key: &str) -> Result<Option<JsonValue>> {
        validate_key(key)?;
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| BoltError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
        let value = serde_json::from_str(&content)
            .map_err(|e| BoltError::Storage(format!("Failed to parse {}: {}", path.display(), e)))?;
        Ok(Some(value))
    }

    fn save(&self, key: &str, value: &JsonValue) -> Result<()> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| BoltError::Storage(format!("Failed to create data directory: {}", e)))?;

        let path = self.path(key);
        let content = serde_json::to_string_pretty(value)?;

        // Write to a sibling temp file and rename over the target
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| BoltError::Storage(format!("Failed to create temp file: {}", e)))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| BoltError::Storage(format!("Failed to write {}: {}", key, e)))?;
        temp.persist(&path)
            .map_err(|e| BoltError::Storage(format!("Failed to save {}: {}", key, e)))?;

        // Cookies and auth tokens live here
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&path, permissions);
        }

        debug!(key, path = %path.display(), "saved");
        Ok(())
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<JsonValue>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &JsonValue) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}
