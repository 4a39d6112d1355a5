//! Cache configuration.
//!
//! Selects the backend and its limits via the `[cache]` table in `weft.toml`.

use std::num::NonZeroUsize;
use std::path::PathBuf;

const DEFAULT_PREFIX: &str = "weft_";
const DEFAULT_DIRECTORY: &str = ".weft-cache";
const DEFAULT_MEMORY_CAPACITY: usize = 1024;
const DEFAULT_PERSISTED_TTL_SECS: u64 = 86_400;
const DEFAULT_QUERY_TTL_SECS: u64 = 43_200;

/// Which store backs the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-process LRU; zero TTL means no expiry.
    Memory,
    /// One JSON document per entry on disk; zero TTL falls back to the default.
    File,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: BackendKind,
    /// Directory for the file backend.
    pub directory: PathBuf,
    /// Prefix applied to every storage key.
    pub prefix: String,
    /// TTL the file backend applies when callers pass zero.
    pub default_ttl_seconds: u64,
    /// Maximum entries held by the memory backend.
    pub memory_capacity: usize,
    /// Whether content queries are memoized.
    pub query_cache: bool,
    /// Default TTL for memoized queries.
    pub query_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl_seconds: DEFAULT_PERSISTED_TTL_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            query_cache: true,
            query_ttl_seconds: DEFAULT_QUERY_TTL_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            directory: settings.directory.clone(),
            prefix: settings.prefix.clone(),
            default_ttl_seconds: settings.default_ttl_seconds,
            memory_capacity: settings.memory_capacity,
            query_cache: settings.query_cache,
            query_ttl_seconds: settings.query_ttl_seconds,
        }
    }
}

impl CacheConfig {
    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.prefix, "weft_");
        assert_eq!(config.default_ttl_seconds, 86_400);
        assert_eq!(config.query_ttl_seconds, 43_200);
        assert!(config.query_cache);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
