//! File-backed history cache.
//!
//! All keys live in one JSON object. Writes go to a sibling temp file that is then
//! renamed over the cache, so a crash mid-write leaves the previous cache intact.

use anyhow::{Context, Result};
use globo_core::HistoryCache;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct FileHistoryCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) | Err(_) => {
                tracing::warn!("Discarding unreadable history cache {}", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

impl HistoryCache for FileHistoryCache {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_all()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn store(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("history cache lock poisoned"))?;

        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        let payload = serde_json::to_string_pretty(&Value::Object(entries))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, payload)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
