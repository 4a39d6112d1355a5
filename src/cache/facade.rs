//! Cache-aside facade.
//!
//! One entry point over whichever backend was configured. Every method is
//! total: backend failures are logged and reported as a miss or a failed
//! write, never raised to callers.

use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::{BackendKind, CacheConfig};
use super::keys::{build_key, group_prefix, namespace_prefix, storage_key};
use super::store::{CacheBackend, CacheError, FileBackend, MemoryBackend};

const METRIC_CACHE_HIT: &str = "weft_cache_hit_total";
const METRIC_CACHE_MISS: &str = "weft_cache_miss_total";
const METRIC_CACHE_WRITE: &str = "weft_cache_write_total";
const METRIC_CACHE_ERROR: &str = "weft_cache_error_total";

pub const DEFAULT_GROUP: &str = "default";

/// Lifecycle notification fired after a mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Set {
        key: String,
        group: String,
        ttl_seconds: u64,
        stored: bool,
    },
    Delete {
        key: String,
        group: String,
        removed: bool,
    },
    Flush {
        group: Option<String>,
    },
}

pub type CacheListener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    listeners: Vec<CacheListener>,
}

impl Cache {
    /// Build the facade over the backend selected in `config`.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new(config)),
            BackendKind::File => Arc::new(FileBackend::new(config)?),
        };
        Ok(Self::with_backend(backend, config.prefix.clone()))
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            listeners: Vec::new(),
        }
    }

    /// Register a listener for set/delete/flush events.
    pub fn subscribe(&mut self, listener: CacheListener) {
        self.listeners.push(listener);
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Deterministic hashed key for `payload` within `group`.
    pub fn build_key<T: Serialize + ?Sized>(&self, payload: &T, group: &str) -> String {
        build_key(payload, group)
    }

    /// Look up `key`; `None` is the miss sentinel.
    pub fn get<T: DeserializeOwned>(&self, key: &str, group: &str) -> Option<T> {
        let full_key = storage_key(&self.prefix, group, key);
        let raw = match self.backend.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                counter!(METRIC_CACHE_MISS, "group" => group.to_string()).increment(1);
                return None;
            }
            Err(err) => {
                self.report_error("get", group, &full_key, &err);
                counter!(METRIC_CACHE_MISS, "group" => group.to_string()).increment(1);
                return None;
            }
        };

        match serde_json::from_value(raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "group" => group.to_string()).increment(1);
                Some(value)
            }
            Err(err) => {
                self.report_error("decode", group, &full_key, &CacheError::Payload(err));
                counter!(METRIC_CACHE_MISS, "group" => group.to_string()).increment(1);
                None
            }
        }
    }

    /// Store `value`; zero TTL means "backend default". Returns whether the
    /// write landed.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
        group: &str,
    ) -> bool {
        let full_key = storage_key(&self.prefix, group, key);
        let stored = match serde_json::to_value(value) {
            Ok(encoded) => match self.backend.set(&full_key, encoded, ttl_seconds) {
                Ok(()) => true,
                Err(err) => {
                    self.report_error("set", group, &full_key, &err);
                    false
                }
            },
            Err(err) => {
                self.report_error("encode", group, &full_key, &CacheError::Payload(err));
                false
            }
        };

        if stored {
            counter!(METRIC_CACHE_WRITE, "group" => group.to_string()).increment(1);
            debug!(op = "set", group, key = %full_key, ttl_seconds, "Cache entry stored");
        }

        self.emit(&CacheEvent::Set {
            key: key.to_string(),
            group: group.to_string(),
            ttl_seconds,
            stored,
        });
        stored
    }

    pub fn delete(&self, key: &str, group: &str) -> bool {
        let full_key = storage_key(&self.prefix, group, key);
        let removed = match self.backend.delete(&full_key) {
            Ok(removed) => removed,
            Err(err) => {
                self.report_error("delete", group, &full_key, &err);
                false
            }
        };
        self.emit(&CacheEvent::Delete {
            key: key.to_string(),
            group: group.to_string(),
            removed,
        });
        removed
    }

    /// Flush one group, or every entry under this facade's prefix when
    /// `group` is `None`.
    pub fn flush(&self, group: Option<&str>) {
        let doomed = match group {
            Some(group) => group_prefix(&self.prefix, group),
            None => namespace_prefix(&self.prefix),
        };
        let outcome = self.backend.flush_prefix(&doomed).map(|removed| {
            debug!(op = "flush", group = group.unwrap_or("*"), removed, "Cache flushed");
        });
        if let Err(err) = outcome {
            self.report_error("flush", group.unwrap_or("*"), "", &err);
        }
        self.emit(&CacheEvent::Flush {
            group: group.map(str::to_string),
        });
    }

    /// Return the cached value, computing and storing it on a miss.
    pub fn remember<T, F>(&self, key: &str, ttl_seconds: u64, group: &str, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(hit) = self.get(key, group) {
            return hit;
        }
        let value = compute();
        self.set(key, &value, ttl_seconds, group);
        value
    }

    fn emit(&self, event: &CacheEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    fn report_error(&self, op: &'static str, group: &str, key: &str, err: &CacheError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            op,
            backend = self.backend.name(),
            group,
            key,
            error = %err,
            "Cache backend call failed; treating as miss"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;

    fn memory_cache() -> Cache {
        Cache::from_config(&CacheConfig::default()).expect("memory cache")
    }

    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
        fn set(&self, _key: &str, _value: Value, _ttl: u64) -> Result<(), CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
        fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
        fn flush_prefix(&self, _prefix: &str) -> Result<usize, CacheError> {
            Err(CacheError::Io(std::io::Error::other("disk gone")))
        }
    }

    #[test]
    fn set_then_get_returns_value() {
        let cache = memory_cache();
        assert!(cache.set("tagline", "Just another site", 0, "dynamic"));
        assert_eq!(
            cache.get::<String>("tagline", "dynamic").as_deref(),
            Some("Just another site")
        );
        assert!(cache.get::<String>("tagline", "query").is_none());
    }

    #[test]
    fn remember_computes_once() {
        let cache = memory_cache();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let value: Vec<u64> = cache.remember("ids", 60, "query", || {
                calls.set(calls.get() + 1);
                vec![1, 2, 3]
            });
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn flush_group_leaves_other_groups() {
        let cache = memory_cache();
        cache.set("a", &json!(1), 0, "query");
        cache.set("b", &json!(2), 0, "templates");

        cache.flush(Some("query"));
        assert!(cache.get::<Value>("a", "query").is_none());
        assert_eq!(cache.get::<Value>("b", "templates"), Some(json!(2)));

        cache.flush(None);
        assert!(cache.get::<Value>("b", "templates").is_none());
    }

    #[test]
    fn failing_backend_degrades_to_miss() {
        let cache = Cache::with_backend(Arc::new(BrokenBackend), "weft_");
        assert!(!cache.set("k", "v", 0, "dynamic"));
        assert!(cache.get::<String>("k", "dynamic").is_none());
        assert!(!cache.delete("k", "dynamic"));
        cache.flush(None);

        let value: String = cache.remember("k", 0, "dynamic", || "fresh".to_string());
        assert_eq!(value, "fresh");
    }

    #[test]
    fn listeners_observe_lifecycle() {
        let seen: Arc<Mutex<Vec<CacheEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let mut cache = memory_cache();
        let sink = Arc::clone(&seen);
        cache.subscribe(Arc::new(move |event| {
            sink.lock().expect("listener lock").push(event.clone());
        }));

        cache.set("k", "v", 5, "dynamic");
        cache.delete("k", "dynamic");
        cache.flush(Some("dynamic"));

        let events = seen.lock().expect("events lock");
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], CacheEvent::Set { stored: true, .. }));
        assert!(matches!(events[1], CacheEvent::Delete { removed: true, .. }));
        assert_eq!(
            events[2],
            CacheEvent::Flush {
                group: Some("dynamic".to_string())
            }
        );
    }

    #[test]
    fn type_mismatch_is_a_miss() {
        let cache = memory_cache();
        cache.set("n", &json!("not a number"), 0, "dynamic");
        assert!(cache.get::<u64>("n", "dynamic").is_none());
    }
}
