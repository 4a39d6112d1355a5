//! Weft cache layer.
//!
//! A cache-aside facade over two interchangeable stores:
//!
//! - **memory**: bounded LRU held in process, entries may live forever
//! - **file**: JSON documents on disk, every entry expires
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! backend = "file"
//! directory = ".weft-cache"
//! prefix = "weft_"
//! default_ttl_seconds = 86400
//! ```

mod config;
mod facade;
mod keys;
mod lock;
mod store;

pub use config::{BackendKind, CacheConfig};
pub use facade::{Cache, CacheEvent, CacheListener, DEFAULT_GROUP};
pub use keys::{build_key, storage_key};
pub use store::{CacheBackend, CacheError, FileBackend, MemoryBackend};
