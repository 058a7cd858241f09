//! Cache store trait and usage statistics.
//!
//! A store holds, per member, a set of raw JSON entries plus one version
//! token. The namespace exists exactly when the token exists. Every method
//! that changes entries also writes the new token in the same atomic step, so
//! a reader never sees a token paired with data it does not describe.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chime_core::{CacheError, MemberId, ScenarioId};

use super::keys::CacheCollection;
use super::version::VersionToken;

/// A consistent read of one member's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSnapshot {
    pub version: VersionToken,
    /// Raw serialized entries, in no particular order.
    pub entries: Vec<String>,
}

/// Result of looking up a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryLookup {
    /// The member has no cached namespace at all.
    NoNamespace,
    /// The namespace exists but holds no entry for the scenario.
    Missing,
    /// Raw serialized entry.
    Found(String),
}

/// Key-value store backing the notification cache.
///
/// Implemented for LMDB, Redis and an in-memory map.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Read the token and every entry of a member in one consistent view.
    async fn read_namespace(
        &self,
        member_id: MemberId,
    ) -> Result<Option<NamespaceSnapshot>, CacheError>;

    /// Read only the current token.
    async fn read_version(&self, member_id: MemberId) -> Result<Option<VersionToken>, CacheError>;

    /// Read a single entry.
    async fn read_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<EntryLookup, CacheError>;

    /// Write one entry and the new token, only if the namespace exists.
    ///
    /// Returns `false` (and writes nothing) when there is no namespace.
    async fn write_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        value: String,
        version: &VersionToken,
    ) -> Result<bool, CacheError>;

    /// Remove one entry (absent is fine) and write the new token, only if the
    /// namespace exists.
    ///
    /// Returns `false` (and writes nothing) when there is no namespace.
    async fn remove_entry(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
        version: &VersionToken,
    ) -> Result<bool, CacheError>;

    /// Replace the whole namespace with the given entries and token.
    async fn replace_namespace(
        &self,
        member_id: MemberId,
        entries: Vec<(ScenarioId, String)>,
        version: &VersionToken,
    ) -> Result<(), CacheError>;

    /// Remove every entry and the token of a member.
    ///
    /// Returns whether a namespace existed.
    async fn drop_namespace(&self, member_id: MemberId) -> Result<bool, CacheError>;

    /// Remove every key of a collection, across all members.
    async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Snapshot of cache usage counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from a cached namespace.
    pub hits: u64,
    /// Reads that had to rebuild from the source of truth.
    pub misses: u64,
    /// Full rebuilds from the source of truth.
    pub rebuilds: u64,
    /// Entry writes and removals applied.
    pub writes: u64,
    /// Incremental mutations skipped because no namespace existed.
    pub skipped: u64,
    /// Namespaces dropped.
    pub invalidations: u64,
    /// Rebuilds whose namespace was dropped because a mutation overlapped.
    pub discarded_rebuilds: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Live counters behind [`CacheStats`].
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    rebuilds: AtomicU64,
    writes: AtomicU64,
    skipped: AtomicU64,
    invalidations: AtomicU64,
    discarded_rebuilds: AtomicU64,
}

impl CacheCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rebuild(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_rebuild(&self) {
        self.discarded_rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            discarded_rebuilds: self.discarded_rebuilds.load(Ordering::Relaxed),
        }
    }
}
