//! Per-member notification read-cache.
//!
//! Each member owns one namespace: the cached entries of every scenario with
//! an active notification, plus a version token surfaced to clients as the
//! ETag. The token and the entries always change together.
//!
//! # Layers
//!
//! - [`keys`]: namespaced key generation, shared collection prefixes
//! - [`serializer`]: JSON wire encoding with condition tag validation
//! - [`CacheStore`]: the key-value adapter, with LMDB, Redis and in-memory
//!   implementations
//! - [`NotificationCacheService`]: reads with rebuild-on-miss, incremental
//!   writes, fail-safe invalidation

pub mod config;
pub mod entry;
pub mod generation;
pub mod keys;
pub mod lmdb_backend;
pub mod memory;
pub mod redis_backend;
pub mod serializer;
pub mod service;
pub mod traits;
pub mod version;

pub use config::{CacheBackendKind, CacheConfig};
pub use entry::{CacheEntry, NotificationList};
pub use generation::MutationGenerations;
pub use keys::{entry_key, etag_key, member_key, CacheCollection, NamespaceKey};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use memory::InMemoryCacheStore;
pub use redis_backend::RedisCacheStore;
pub use serializer::{deserialize_entry, parse_condition, serialize_condition, serialize_entry};
pub use service::{ConditionalList, MutationOutcome, NotificationCacheService};
pub use traits::{CacheCounters, CacheStats, CacheStore, EntryLookup, NamespaceSnapshot};
pub use version::{IfNoneMatch, VersionToken};
