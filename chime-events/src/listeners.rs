//! Cache maintenance listeners.
//!
//! Each lifecycle event maps to one cache action through [`plan_for`]. The
//! listener runs that action behind a guard: any failure, including a panic,
//! drops the member's whole namespace so the next read rebuilds it. Failures
//! are logged and never reach the request that triggered the event.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chime_core::{CacheError, MemberId, ScenarioId, ScenarioSnapshot};
use chime_storage::NotificationCacheService;
use futures_util::FutureExt;
use tracing::{debug, error, warn};

use crate::dispatcher::{EventDispatcher, ExecutionMode};
use crate::event::{EventEnvelope, EventKind, NotificationEvent};

/// A handler for published lifecycle events.
#[async_trait]
pub trait NotificationListener: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handle one event. Implementations own their failures.
    async fn handle(&self, envelope: &EventEnvelope);
}

// ============================================================================
// TRANSITION TABLE
// ============================================================================

/// The cache action an event calls for.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
    Noop,
    Upsert(ScenarioSnapshot),
    Delete(ScenarioId),
    /// Delete the entry, then write the new state.
    Replace(ScenarioSnapshot),
    Rebuild,
    InvalidateAll,
}

impl SyncPlan {
    pub fn name(&self) -> &'static str {
        match self {
            SyncPlan::Noop => "noop",
            SyncPlan::Upsert(_) => "upsert",
            SyncPlan::Delete(_) => "delete",
            SyncPlan::Replace(_) => "replace",
            SyncPlan::Rebuild => "rebuild",
            SyncPlan::InvalidateAll => "invalidate_all",
        }
    }
}

/// Decide the cache action for an event from its prior and new state.
///
/// A scenario whose member has notifications switched off never counts as
/// active, so events for it plan no write.
pub fn plan_for(event: &NotificationEvent) -> SyncPlan {
    match event {
        NotificationEvent::ScenarioCreated { scenario } => {
            if scenario.has_active_notification() {
                SyncPlan::Upsert(scenario.clone())
            } else {
                SyncPlan::Noop
            }
        }
        NotificationEvent::ScenarioUpdated {
            scenario,
            was_active,
        } => match (*was_active, scenario.has_active_notification()) {
            (false, false) => SyncPlan::Noop,
            (false, true) => SyncPlan::Upsert(scenario.clone()),
            (true, false) => SyncPlan::Delete(scenario.scenario_id),
            (true, true) => SyncPlan::Replace(scenario.clone()),
        },
        NotificationEvent::ScenarioDeleted {
            scenario_id,
            was_active,
            ..
        } => {
            if *was_active {
                SyncPlan::Delete(*scenario_id)
            } else {
                SyncPlan::Noop
            }
        }
        NotificationEvent::MemberNotificationsToggled { active, .. } => {
            if *active {
                SyncPlan::Rebuild
            } else {
                SyncPlan::InvalidateAll
            }
        }
        NotificationEvent::ScenarioOrderChanged { .. } => SyncPlan::InvalidateAll,
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Snapshot of listener outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerStatsSnapshot {
    pub applied: u64,
    pub noops: u64,
    pub failures: u64,
    pub fail_safe_invalidations: u64,
    pub fail_safe_errors: u64,
}

#[derive(Debug, Default)]
pub struct ListenerStats {
    applied: AtomicU64,
    noops: AtomicU64,
    failures: AtomicU64,
    fail_safe_invalidations: AtomicU64,
    fail_safe_errors: AtomicU64,
}

impl ListenerStats {
    pub fn snapshot(&self) -> ListenerStatsSnapshot {
        ListenerStatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            noops: self.noops.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            fail_safe_invalidations: self.fail_safe_invalidations.load(Ordering::Relaxed),
            fail_safe_errors: self.fail_safe_errors.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// LISTENER
// ============================================================================

/// Keeps the notification cache in step with lifecycle events.
pub struct CacheSyncListener {
    cache: Arc<NotificationCacheService>,
    stats: Arc<ListenerStats>,
}

impl CacheSyncListener {
    pub fn new(cache: Arc<NotificationCacheService>, stats: Arc<ListenerStats>) -> Self {
        Self { cache, stats }
    }

    async fn apply(&self, member_id: MemberId, plan: SyncPlan) -> Result<(), CacheError> {
        match plan {
            SyncPlan::Noop => {}
            SyncPlan::Upsert(scenario) => {
                self.cache.upsert(member_id, &scenario).await?;
            }
            SyncPlan::Delete(scenario_id) => {
                self.cache.delete(member_id, scenario_id).await?;
            }
            SyncPlan::Replace(scenario) => {
                self.cache.delete(member_id, scenario.scenario_id).await?;
                self.cache.upsert(member_id, &scenario).await?;
            }
            SyncPlan::Rebuild => {
                self.cache.rebuild_from_source(member_id).await?;
            }
            SyncPlan::InvalidateAll => {
                self.cache.invalidate_all(member_id).await?;
            }
        }
        Ok(())
    }

    async fn fail_safe(&self, member_id: MemberId, event_type: &'static str) {
        let outcome = AssertUnwindSafe(self.cache.invalidate_all(member_id))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(_)) => {
                self.stats
                    .fail_safe_invalidations
                    .fetch_add(1, Ordering::Relaxed);
                warn!(member_id = %member_id, event_type, "Fail-safe invalidation applied");
            }
            Ok(Err(e)) => {
                self.stats.fail_safe_errors.fetch_add(1, Ordering::Relaxed);
                error!(
                    member_id = %member_id,
                    event_type,
                    error = %e,
                    "Fail-safe invalidation failed, cached namespace may be stale"
                );
            }
            Err(panic) => {
                self.stats.fail_safe_errors.fetch_add(1, Ordering::Relaxed);
                error!(
                    member_id = %member_id,
                    event_type,
                    panic = %panic_message(panic.as_ref()),
                    "Fail-safe invalidation panicked, cached namespace may be stale"
                );
            }
        }
    }
}

#[async_trait]
impl NotificationListener for CacheSyncListener {
    fn name(&self) -> &'static str {
        "notification_cache_sync"
    }

    async fn handle(&self, envelope: &EventEnvelope) {
        let event = &envelope.event;
        let event_type = event.event_type();
        let member_id = event.member_id();
        let plan = plan_for(event);

        if plan == SyncPlan::Noop {
            self.stats.noops.fetch_add(1, Ordering::Relaxed);
            debug!(member_id = %member_id, event_type, "No cache action required");
            return;
        }

        let action = plan.name();
        let outcome = AssertUnwindSafe(self.apply(member_id, plan))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                debug!(member_id = %member_id, event_type, action, "Cache synchronised");
            }
            Ok(Err(e)) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    member_id = %member_id,
                    scenario_id = ?event.scenario_id(),
                    event_type,
                    action,
                    kind = e.kind(),
                    error = %e,
                    "Cache synchronisation failed"
                );
                self.fail_safe(member_id, event_type).await;
            }
            Err(panic) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    member_id = %member_id,
                    scenario_id = ?event.scenario_id(),
                    event_type,
                    action,
                    panic = %panic_message(panic.as_ref()),
                    "Cache synchronisation panicked"
                );
                self.fail_safe(member_id, event_type).await;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Register the cache listener for every lifecycle event.
///
/// Scenario-level events run on the pool. Member-level events run inline so
/// that the namespace is rebuilt or dropped before the committing request
/// returns.
pub fn register_cache_listeners(
    dispatcher: &mut EventDispatcher,
    cache: Arc<NotificationCacheService>,
) -> Arc<ListenerStats> {
    let stats = Arc::new(ListenerStats::default());
    let listener: Arc<dyn NotificationListener> =
        Arc::new(CacheSyncListener::new(cache, stats.clone()));

    for kind in EventKind::ALL {
        let mode = match kind {
            EventKind::ScenarioCreated | EventKind::ScenarioUpdated | EventKind::ScenarioDeleted => {
                ExecutionMode::Pooled
            }
            EventKind::MemberNotificationsToggled | EventKind::ScenarioOrderChanged => {
                ExecutionMode::Inline
            }
        };
        dispatcher.register(kind, listener.clone(), mode);
    }
    stats
}
