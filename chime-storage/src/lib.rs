//! Chime Storage - Notification Cache and Source Adapters
//!
//! The read-cache that sits in front of the relational store, its key-value
//! backends, and the source-of-truth interface used to rebuild it.

pub mod cache;
pub mod source;

pub use cache::{
    CacheBackendKind, CacheCollection, CacheConfig, CacheEntry, CacheStats, CacheStore,
    ConditionalList, EntryLookup, IfNoneMatch, InMemoryCacheStore, LmdbCacheStore,
    MutationOutcome, NamespaceKey, NamespaceSnapshot, NotificationCacheService, NotificationList,
    RedisCacheStore, VersionToken,
};
pub use source::{InMemoryNotificationSource, NotificationSource};
