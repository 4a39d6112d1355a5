//! Cache storage backends.
//!
//! Memory: bounded in-process LRU, entries without TTL never expire.
//! File: persisted JSON documents, every entry carries an expiry.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;

use super::config::CacheConfig;
use super::lock::{mutex_lock, rw_read, rw_write};

const SOURCE: &str = "cache::store";
const ENTRY_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] io::Error),
    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("failed to persist cache entry `{key}`: {message}")]
    Persist { key: String, message: String },
}

/// A key/value store the facade can sit on.
///
/// Keys arrive fully prefixed and sanitized. A `ttl_seconds` of zero means
/// "backend default".
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), CacheError>;
    /// Returns whether an entry was removed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;
    /// Remove every entry whose key starts with `prefix`; returns the count.
    fn flush_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

// ============================================================================
// Memory backend
// ============================================================================

struct MemoryEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

pub struct MemoryBackend {
    entries: RwLock<LruCache<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "memory_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "memory_get");
        let expired = match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => true,
            Some(entry) => return Ok(Some(entry.value.clone())),
            None => return Ok(None),
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), CacheError> {
        let expires_at =
            (ttl_seconds > 0).then(|| Instant::now() + Duration::from_secs(ttl_seconds));
        rw_write(&self.entries, SOURCE, "memory_set")
            .put(key.to_string(), MemoryEntry { value, expires_at });
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(rw_write(&self.entries, SOURCE, "memory_delete")
            .pop(key)
            .is_some())
    }

    fn flush_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = rw_write(&self.entries, SOURCE, "memory_flush_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
}

// ============================================================================
// File backend
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    /// Unix seconds.
    expires_at: i64,
    value: Value,
}

pub struct FileBackend {
    directory: PathBuf,
    default_ttl_seconds: u64,
    // Serializes flushes against writes so a flush never races a rename.
    write_guard: Mutex<()>,
}

impl FileBackend {
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        fs::create_dir_all(&config.directory)?;
        Ok(Self {
            directory: config.directory.clone(),
            default_ttl_seconds: config.default_ttl_seconds.max(1),
            write_guard: Mutex::new(()),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.{ENTRY_EXTENSION}"))
    }

    fn entry_files(&self) -> Result<Vec<(String, PathBuf)>, CacheError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                files.push((stem.to_string(), path.clone()));
            }
        }
        Ok(files)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn remove_if_present(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

impl CacheBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let stored: StoredEntry = serde_json::from_slice(&raw)?;
        if stored.expires_at <= unix_now() {
            remove_if_present(&path)?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    fn set(&self, key: &str, value: Value, ttl_seconds: u64) -> Result<(), CacheError> {
        let ttl = if ttl_seconds == 0 {
            self.default_ttl_seconds
        } else {
            ttl_seconds
        };
        let stored = StoredEntry {
            key: key.to_string(),
            expires_at: unix_now().saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
            value,
        };

        let _guard = mutex_lock(&self.write_guard, SOURCE, "file_set");
        let mut staging = NamedTempFile::new_in(&self.directory)?;
        serde_json::to_writer(&mut staging, &stored)?;
        staging.flush()?;
        staging
            .persist(self.entry_path(key))
            .map_err(|err| CacheError::Persist {
                key: key.to_string(),
                message: err.error.to_string(),
            })?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let _guard = mutex_lock(&self.write_guard, SOURCE, "file_delete");
        remove_if_present(&self.entry_path(key))
    }

    fn flush_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let _guard = mutex_lock(&self.write_guard, SOURCE, "file_flush_prefix");
        let mut removed = 0;
        for (stem, path) in self.entry_files()? {
            if stem.starts_with(prefix) && remove_if_present(&path)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn file_config(dir: &Path) -> CacheConfig {
        CacheConfig {
            directory: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn memory_roundtrip_and_delete() {
        let store = MemoryBackend::new(&CacheConfig::default());
        assert!(store.get("weft_dynamic_a").expect("get").is_none());

        store
            .set("weft_dynamic_a", json!("value"), 0)
            .expect("set");
        assert_eq!(
            store.get("weft_dynamic_a").expect("get"),
            Some(json!("value"))
        );

        assert!(store.delete("weft_dynamic_a").expect("delete"));
        assert!(!store.delete("weft_dynamic_a").expect("second delete"));
        assert!(store.is_empty());
    }

    #[test]
    fn memory_evicts_least_recently_used() {
        let config = CacheConfig {
            memory_capacity: 1,
            ..Default::default()
        };
        let store = MemoryBackend::new(&config);
        store.set("first", json!(1), 0).expect("set first");
        store.set("second", json!(2), 0).expect("set second");

        assert!(store.get("first").expect("get first").is_none());
        assert_eq!(store.get("second").expect("get second"), Some(json!(2)));
    }

    #[test]
    fn memory_flush_prefix_only_touches_group() {
        let store = MemoryBackend::new(&CacheConfig::default());
        store.set("weft_query_a", json!(1), 0).expect("set");
        store.set("weft_query_b", json!(2), 0).expect("set");
        store.set("weft_templates_a", json!(3), 0).expect("set");

        assert_eq!(store.flush_prefix("weft_query_").expect("flush"), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn file_roundtrip_and_flush_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBackend::new(&file_config(dir.path())).expect("file backend");

        store
            .set("weft_query_abc", json!({"ids": [1, 2]}), 60)
            .expect("set");
        store.set("weft_dynamic_x", json!("x"), 0).expect("set");
        assert_eq!(
            store.get("weft_query_abc").expect("get"),
            Some(json!({"ids": [1, 2]}))
        );

        assert_eq!(store.flush_prefix("weft_query_").expect("flush"), 1);
        assert!(store.get("weft_query_abc").expect("get").is_none());
        assert_eq!(store.get("weft_dynamic_x").expect("get"), Some(json!("x")));
    }

    #[test]
    fn file_entries_expire() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBackend::new(&file_config(dir.path())).expect("file backend");
        let stale = StoredEntry {
            key: "weft_dynamic_old".to_string(),
            expires_at: unix_now() - 5,
            value: json!("stale"),
        };
        fs::write(
            store.entry_path("weft_dynamic_old"),
            serde_json::to_vec(&stale).expect("encode"),
        )
        .expect("write stale entry");

        assert!(store.get("weft_dynamic_old").expect("get").is_none());
        assert!(!store.entry_path("weft_dynamic_old").exists());
    }

    #[test]
    fn file_flush_leaves_foreign_files_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileBackend::new(&file_config(dir.path())).expect("file backend");
        store.set("weft_dynamic_a", json!(1), 0).expect("set");
        store.set("other_dynamic_a", json!(2), 0).expect("set");
        fs::write(dir.path().join("package.json"), "{}").expect("write foreign file");

        assert_eq!(store.flush_prefix("weft_").expect("flush"), 1);
        assert!(store.get("weft_dynamic_a").expect("get").is_none());
        assert_eq!(store.get("other_dynamic_a").expect("get"), Some(json!(2)));
        assert!(dir.path().join("package.json").exists());
    }
}
