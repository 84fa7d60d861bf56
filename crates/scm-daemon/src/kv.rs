//! Passive key-value store holding the persisted data-mode flag.
//!
//! This is the only thing the daemon persists; datasets live in memory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};

pub const PERSISTED_DATA_MODE_KEY: &str = "scmPersistedDataMode";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store, e.g. a session that already chose mock mode.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(key.to_string(), value.to_string());
        Self {
            inner: Mutex::new(map),
        }
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON object on disk, rewritten whole on every `set`.
#[derive(Debug)]
pub struct JsonFileKvStore {
    path: PathBuf,
    cache: Mutex<Map<String, Value>>,
}

impl JsonFileKvStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cache = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read state file: {}", path.display()))?;
            if raw.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str::<Map<String, Value>>(&raw).with_context(|| {
                    format!("state file is not a JSON object: {}", path.display())
                })?
            }
        } else {
            Map::new()
        };
        Ok(Self {
            path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for JsonFileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache
            .lock()
            .ok()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("kv store lock poisoned"))?;
        cache.insert(key.to_string(), Value::String(value.to_string()));
        let body = serde_json::to_vec_pretty(&*cache).context("state file serialize failed")?;
        fs::write(&self.path, body)
            .with_context(|| format!("failed to write state file: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_get_set() {
        let kv = MemoryKvStore::new();
        assert!(kv.get(PERSISTED_DATA_MODE_KEY).is_none());
        kv.set(PERSISTED_DATA_MODE_KEY, "live").unwrap();
        assert_eq!(kv.get(PERSISTED_DATA_MODE_KEY).as_deref(), Some("live"));
    }

    #[test]
    fn json_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let kv = JsonFileKvStore::open(&path).unwrap();
        assert!(kv.get(PERSISTED_DATA_MODE_KEY).is_none());
        kv.set(PERSISTED_DATA_MODE_KEY, "mock").unwrap();
        kv.set("other", "x").unwrap();

        let reopened = JsonFileKvStore::open(&path).unwrap();
        assert_eq!(reopened.get(PERSISTED_DATA_MODE_KEY).as_deref(), Some("mock"));
        assert_eq!(reopened.get("other").as_deref(), Some("x"));
    }

    #[test]
    fn json_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1,2,3]").unwrap();
        assert!(JsonFileKvStore::open(&path).is_err());
    }
}
