//! Notification cache service.
//!
//! Reads are served from the member's cached namespace and fall back to a
//! full rebuild from the source of truth on a miss. Writes patch or evict the
//! namespace and always advance the version token together with the data.
//! Only the rebuild paths touch the source of truth.
//!
//! A rebuild that overlaps an incremental mutation of the same member does not
//! keep its namespace: the source snapshot may predate the mutation, and a
//! skipped mutation would never be replayed against it. See
//! [`MutationGenerations`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chime_core::{CacheError, MemberId, ScenarioId, ScenarioSnapshot};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::entry::{sort_entries, CacheEntry, NotificationList};
use super::generation::MutationGenerations;
use super::keys::CacheCollection;
use super::serializer::{deserialize_entry, serialize_entry};
use super::traits::{CacheCounters, CacheStats, CacheStore, EntryLookup};
use super::version::{IfNoneMatch, VersionToken};
use crate::source::NotificationSource;

/// Outcome of an incremental upsert or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Applied; the namespace now carries this token.
    Applied(VersionToken),
    /// The member had no cached namespace, so nothing was written. The next
    /// read rebuilds the full set.
    Skipped,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }
}

/// Result of a conditional list read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalList {
    /// The client's copy is current.
    NotModified(VersionToken),
    /// The full list and its token.
    Modified(NotificationList),
}

/// Read and maintenance operations over per-member notification caches.
pub struct NotificationCacheService {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn NotificationSource>,
    store_timeout: Duration,
    counters: CacheCounters,
    generations: MutationGenerations,
}

impl NotificationCacheService {
    pub fn new(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn NotificationSource>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            source,
            store_timeout,
            counters: CacheCounters::default(),
            generations: MutationGenerations::new(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Run a store call under the configured timeout.
    async fn timed<T, F>(&self, operation: &'static str, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::StoreTimeout {
                operation,
                timeout_ms: self.store_timeout.as_millis() as u64,
            }),
        }
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// A member's full list in display order, with its token.
    ///
    /// Rebuilds from the source of truth when the member has no namespace or
    /// when a cached entry cannot be decoded.
    pub async fn get_list(&self, member_id: MemberId) -> Result<NotificationList, CacheError> {
        let snapshot = self
            .timed("read_namespace", self.store.read_namespace(member_id))
            .await
            .map_err(|e| fetch_all_failed(member_id, e))?;

        let Some(snapshot) = snapshot else {
            debug!(member_id = %member_id, "Notification cache miss");
            self.counters.record_miss();
            return self.rebuild_from_source(member_id).await;
        };

        match decode_entries(&snapshot.entries) {
            Ok(entries) => {
                debug!(member_id = %member_id, entries = entries.len(), "Notification cache hit");
                self.counters.record_hit();
                Ok(NotificationList {
                    etag: snapshot.version,
                    entries,
                })
            }
            Err(e) => {
                warn!(
                    member_id = %member_id,
                    error = %e,
                    "Cached namespace failed to decode, rebuilding"
                );
                self.counters.record_miss();
                self.invalidate_all(member_id)
                    .await
                    .map_err(|e| fetch_all_failed(member_id, e))?;
                self.rebuild_from_source(member_id).await
            }
        }
    }

    /// Conditional list read against a client's `If-None-Match`.
    ///
    /// Answers `NotModified` from the token alone, without reading entries.
    pub async fn get_list_if_none_match(
        &self,
        member_id: MemberId,
        if_none_match: Option<&IfNoneMatch>,
    ) -> Result<ConditionalList, CacheError> {
        if let Some(condition) = if_none_match {
            let current = self
                .timed("read_version", self.store.read_version(member_id))
                .await
                .map_err(|e| fetch_all_failed(member_id, e))?;
            if let Some(current) = current.filter(|v| condition.matches(Some(v))) {
                debug!(member_id = %member_id, "Notification list not modified");
                self.counters.record_hit();
                return Ok(ConditionalList::NotModified(current));
            }
        }
        self.get_list(member_id).await.map(ConditionalList::Modified)
    }

    /// One cached entry.
    ///
    /// Fails with `NotFound` when the namespace exists without the scenario.
    /// When the member has no namespace, rebuilds first and looks again.
    pub async fn get_single(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<CacheEntry, CacheError> {
        let lookup = self
            .timed("read_entry", self.store.read_entry(member_id, scenario_id))
            .await?;

        match lookup {
            EntryLookup::Found(raw) => match deserialize_entry(&raw) {
                Ok(entry) => {
                    self.counters.record_hit();
                    Ok(entry)
                }
                Err(e) => {
                    warn!(
                        member_id = %member_id,
                        scenario_id = %scenario_id,
                        error = %e,
                        "Cached entry failed to decode, rebuilding"
                    );
                    self.counters.record_miss();
                    self.invalidate_all(member_id).await?;
                    let list = self.rebuild_from_source(member_id).await?;
                    find_entry(list, member_id, scenario_id)
                }
            },
            EntryLookup::Missing => {
                self.counters.record_hit();
                Err(CacheError::NotFound {
                    member_id,
                    scenario_id,
                })
            }
            EntryLookup::NoNamespace => {
                debug!(member_id = %member_id, scenario_id = %scenario_id, "Notification cache miss");
                self.counters.record_miss();
                let list = self.rebuild_from_source(member_id).await?;
                find_entry(list, member_id, scenario_id)
            }
        }
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Write or overwrite one member's entry for a scenario.
    pub async fn upsert(
        &self,
        member_id: MemberId,
        scenario: &ScenarioSnapshot,
    ) -> Result<MutationOutcome, CacheError> {
        if scenario.member_id != member_id {
            return Err(CacheError::UpdateFailed {
                member_id,
                scenario_id: scenario.scenario_id,
                reason: format!("scenario belongs to member {}", scenario.member_id),
            });
        }

        let entry = CacheEntry::from_scenario(scenario)?;
        let raw = serialize_entry(&entry)?;
        let version = VersionToken::generate();
        self.generations.bump(member_id);

        let written = self
            .timed(
                "write_entry",
                self.store
                    .write_entry(member_id, scenario.scenario_id, raw, &version),
            )
            .await
            .map_err(|e| match e {
                CacheError::StoreFailed { reason, .. } => CacheError::UpdateFailed {
                    member_id,
                    scenario_id: scenario.scenario_id,
                    reason,
                },
                other => other,
            })?;

        Ok(self.outcome(written, version, member_id, scenario.scenario_id, "upsert"))
    }

    /// Remove one member's entry for a scenario. Absent entries are fine.
    pub async fn delete(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Result<MutationOutcome, CacheError> {
        let version = VersionToken::generate();
        self.generations.bump(member_id);

        let removed = self
            .timed(
                "remove_entry",
                self.store.remove_entry(member_id, scenario_id, &version),
            )
            .await
            .map_err(|e| match e {
                CacheError::StoreFailed { reason, .. } => CacheError::DeleteFailed {
                    member_id,
                    scenario_id,
                    reason,
                },
                other => other,
            })?;

        Ok(self.outcome(removed, version, member_id, scenario_id, "delete"))
    }

    fn outcome(
        &self,
        applied: bool,
        version: VersionToken,
        member_id: MemberId,
        scenario_id: ScenarioId,
        operation: &'static str,
    ) -> MutationOutcome {
        if applied {
            debug!(member_id = %member_id, scenario_id = %scenario_id, operation, "Cache entry updated");
            self.counters.record_write();
            MutationOutcome::Applied(version)
        } else {
            debug!(
                member_id = %member_id,
                scenario_id = %scenario_id,
                operation,
                "No cached namespace, skipping incremental update"
            );
            self.counters.record_skipped();
            MutationOutcome::Skipped
        }
    }

    /// Drop every entry and the token of a member.
    ///
    /// Returns whether a namespace existed.
    pub async fn invalidate_all(&self, member_id: MemberId) -> Result<bool, CacheError> {
        self.generations.bump(member_id);
        let existed = self
            .timed("drop_namespace", self.store.drop_namespace(member_id))
            .await
            .map_err(|e| match e {
                CacheError::StoreFailed { reason, .. } => CacheError::InvalidateFailed {
                    member_id,
                    reason,
                },
                other => other,
            })?;

        self.counters.record_invalidation();
        info!(member_id = %member_id, existed, "Invalidated notification cache");
        Ok(existed)
    }

    /// Replace a member's namespace with the source of truth's current state.
    ///
    /// When a mutation of the member lands between the source query and the
    /// namespace write, the written namespace is dropped again and the list
    /// is returned uncached. The next read rebuilds.
    pub async fn rebuild_from_source(
        &self,
        member_id: MemberId,
    ) -> Result<NotificationList, CacheError> {
        let generation = self.generations.current(member_id);
        let scenarios = self
            .source
            .active_notifications(member_id)
            .await
            .map_err(|e| CacheError::FetchAllFailed {
                member_id,
                reason: e.to_string(),
            })?;

        let mut entries = scenarios
            .iter()
            .filter(|s| s.has_active_notification())
            .map(CacheEntry::from_scenario)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fetch_all_failed(member_id, e))?;
        sort_entries(&mut entries);

        let raw = entries
            .iter()
            .map(|entry| serialize_entry(entry).map(|raw| (entry.scenario_id, raw)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| fetch_all_failed(member_id, e))?;

        let version = VersionToken::generate();
        self.timed(
            "replace_namespace",
            self.store.replace_namespace(member_id, raw, &version),
        )
        .await
        .map_err(|e| fetch_all_failed(member_id, e))?;

        if self.generations.current(member_id) != generation {
            warn!(
                member_id = %member_id,
                "Notification cache mutated during rebuild, discarding rebuilt namespace"
            );
            self.timed("drop_namespace", self.store.drop_namespace(member_id))
                .await
                .map_err(|e| fetch_all_failed(member_id, e))?;
            self.counters.record_discarded_rebuild();
            return Ok(NotificationList {
                etag: version,
                entries,
            });
        }

        self.counters.record_rebuild();
        info!(member_id = %member_id, entries = entries.len(), "Rebuilt notification cache");
        Ok(NotificationList {
            etag: version,
            entries,
        })
    }

    /// Drop every key of a collection across all members.
    pub async fn evict_collection(&self, collection: CacheCollection) -> Result<u64, CacheError> {
        let deleted = self
            .timed("evict_collection", self.store.evict_collection(collection))
            .await?;
        info!(collection = ?collection, deleted, "Evicted cache collection");
        Ok(deleted)
    }

    /// Check the store is reachable.
    pub async fn ping(&self) -> Result<(), CacheError> {
        self.timed("ping", self.store.ping()).await
    }
}

fn decode_entries(raw: &[String]) -> Result<Vec<CacheEntry>, CacheError> {
    let mut entries = raw
        .iter()
        .map(|r| deserialize_entry(r))
        .collect::<Result<Vec<_>, _>>()?;
    sort_entries(&mut entries);
    Ok(entries)
}

fn find_entry(
    list: NotificationList,
    member_id: MemberId,
    scenario_id: ScenarioId,
) -> Result<CacheEntry, CacheError> {
    list.entries
        .into_iter()
        .find(|e| e.scenario_id == scenario_id)
        .ok_or(CacheError::NotFound {
            member_id,
            scenario_id,
        })
}

/// Wrap a failure on the list path, keeping timeouts and existing
/// fetch-all failures as they are.
fn fetch_all_failed(member_id: MemberId, e: CacheError) -> CacheError {
    match e {
        CacheError::StoreTimeout { .. } | CacheError::FetchAllFailed { .. } => e,
        other => CacheError::FetchAllFailed {
            member_id,
            reason: other.to_string(),
        },
    }
}
