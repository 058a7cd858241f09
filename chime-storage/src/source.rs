//! Source-of-truth read interface used to (re)build the cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chime_core::{MemberId, ScenarioId, ScenarioSnapshot, SourceError};
use tokio::sync::RwLock;

/// Read access to the relational store.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// All scenarios of a member that carry an active notification, with
    /// their conditions, in display order.
    async fn active_notifications(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<ScenarioSnapshot>, SourceError>;
}

/// In-memory source of truth for tests and local runs.
///
/// Tracks how many times it was queried so callers can assert whether a read
/// was served from the cache or rebuilt.
#[derive(Debug, Default)]
pub struct InMemoryNotificationSource {
    scenarios: RwLock<HashMap<MemberId, BTreeMap<ScenarioId, ScenarioSnapshot>>>,
    disabled_members: RwLock<HashSet<MemberId>>,
    fetches: AtomicU64,
}

impl InMemoryNotificationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a scenario.
    pub async fn put_scenario(&self, scenario: ScenarioSnapshot) {
        self.scenarios
            .write()
            .await
            .entry(scenario.member_id)
            .or_default()
            .insert(scenario.scenario_id, scenario);
    }

    /// Remove a scenario, returning it if present.
    pub async fn remove_scenario(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Option<ScenarioSnapshot> {
        self.scenarios
            .write()
            .await
            .get_mut(&member_id)
            .and_then(|scenarios| scenarios.remove(&scenario_id))
    }

    /// A stored scenario, carrying the member's current notification switch.
    pub async fn scenario(
        &self,
        member_id: MemberId,
        scenario_id: ScenarioId,
    ) -> Option<ScenarioSnapshot> {
        let enabled = self.member_notifications_enabled(member_id).await;
        self.scenarios
            .read()
            .await
            .get(&member_id)
            .and_then(|scenarios| scenarios.get(&scenario_id).cloned())
            .map(|scenario| scenario.with_member_notifications(enabled))
    }

    pub async fn member_notifications_enabled(&self, member_id: MemberId) -> bool {
        !self.disabled_members.read().await.contains(&member_id)
    }

    /// Member-level notification switch. While off, the member has no
    /// active notifications regardless of per-scenario flags. The switch
    /// held here overrides the one carried by stored snapshots.
    pub async fn set_member_notifications(&self, member_id: MemberId, enabled: bool) {
        let mut disabled = self.disabled_members.write().await;
        if enabled {
            disabled.remove(&member_id);
        } else {
            disabled.insert(member_id);
        }
    }

    /// Number of `active_notifications` calls served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationSource for InMemoryNotificationSource {
    async fn active_notifications(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<ScenarioSnapshot>, SourceError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        if self.disabled_members.read().await.contains(&member_id) {
            return Ok(Vec::new());
        }

        let scenarios = self.scenarios.read().await;
        let mut active: Vec<ScenarioSnapshot> = scenarios
            .get(&member_id)
            .map(|s| {
                s.values()
                    .map(|scenario| scenario.clone().with_member_notifications(true))
                    .filter(ScenarioSnapshot::has_active_notification)
                    .collect()
            })
            .unwrap_or_default();
        active.sort_by_key(|s| (s.position, s.scenario_id));
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{
        DayOfWeek, DeliveryMethod, NotificationCondition, NotificationId, NotificationSnapshot,
    };

    fn scenario(id: i64, position: i32, active: bool) -> ScenarioSnapshot {
        let notification = NotificationSnapshot::active(
            NotificationId::new(id),
            DeliveryMethod::Push,
            vec![DayOfWeek::Monday],
            NotificationCondition::time(8, 0),
        );
        let notification = if active {
            notification
        } else {
            notification.deactivated()
        };
        ScenarioSnapshot::new(MemberId::new(1), ScenarioId::new(id), format!("s{}", id), position)
            .with_notification(notification)
    }

    #[tokio::test]
    async fn test_returns_active_in_display_order() {
        let source = InMemoryNotificationSource::new();
        source.put_scenario(scenario(1, 2, true)).await;
        source.put_scenario(scenario(2, 0, true)).await;
        source.put_scenario(scenario(3, 1, false)).await;

        let active = source.active_notifications(MemberId::new(1)).await.unwrap();
        let ids: Vec<i64> = active.iter().map(|s| s.scenario_id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_member_switch_hides_everything() {
        let source = InMemoryNotificationSource::new();
        source.put_scenario(scenario(1, 0, true)).await;
        source.set_member_notifications(MemberId::new(1), false).await;
        assert!(source
            .active_notifications(MemberId::new(1))
            .await
            .unwrap()
            .is_empty());

        let stored = source.scenario(MemberId::new(1), ScenarioId::new(1)).await.unwrap();
        assert!(!stored.member_notifications_enabled);

        source.set_member_notifications(MemberId::new(1), true).await;
        assert_eq!(
            source.active_notifications(MemberId::new(1)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_stored_member_flag_does_not_hide_scenarios() {
        let source = InMemoryNotificationSource::new();
        source
            .put_scenario(scenario(1, 0, true).with_member_notifications(false))
            .await;
        let active = source.active_notifications(MemberId::new(1)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].member_notifications_enabled);
    }
}
