//! Cache entry shapes.

use serde::{Deserialize, Serialize};

use chime_core::{
    CacheError, DayOfWeek, DeliveryMethod, NotificationCondition, NotificationId,
    NotificationType, ScenarioId, ScenarioSnapshot,
};

use super::serializer::{parse_condition, serialize_condition};
use super::version::VersionToken;

/// Denormalized scenario + notification pair stored per (member, scenario).
///
/// The condition is kept as an opaque JSON blob tagged with the same type as
/// `notification_type`; use [`CacheEntry::decode_condition`] to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub scenario_id: ScenarioId,
    pub name: String,
    pub memo: Option<String>,
    pub position: i32,
    pub notification_id: NotificationId,
    pub notification_type: NotificationType,
    pub delivery_method: DeliveryMethod,
    pub days: Vec<DayOfWeek>,
    pub condition: String,
}

impl CacheEntry {
    /// Build an entry from a scenario that carries an active notification.
    pub fn from_scenario(scenario: &ScenarioSnapshot) -> Result<Self, CacheError> {
        let update_failed = |reason: &str| CacheError::UpdateFailed {
            member_id: scenario.member_id,
            scenario_id: scenario.scenario_id,
            reason: reason.to_string(),
        };

        if !scenario.member_notifications_enabled {
            return Err(update_failed("member notifications are disabled"));
        }
        let notification = scenario
            .notification
            .as_ref()
            .filter(|n| n.active)
            .ok_or_else(|| update_failed("scenario has no active notification"))?;
        let condition = notification
            .condition
            .as_ref()
            .ok_or_else(|| update_failed("active notification has no condition"))?;

        Ok(Self {
            scenario_id: scenario.scenario_id,
            name: scenario.name.clone(),
            memo: scenario.memo.clone(),
            position: scenario.position,
            notification_id: notification.notification_id,
            notification_type: notification.notification_type,
            delivery_method: notification.delivery_method,
            days: notification.days.clone(),
            condition: serialize_condition(notification.notification_type, condition)?,
        })
    }

    /// Decode the condition blob, validating its tag against `notification_type`.
    pub fn decode_condition(&self) -> Result<NotificationCondition, CacheError> {
        parse_condition(self.notification_type, &self.condition)
    }
}

/// Sort entries into display order.
pub fn sort_entries(entries: &mut [CacheEntry]) {
    entries.sort_by_key(|entry| (entry.position, entry.scenario_id));
}

/// A member's full cached list together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationList {
    pub etag: VersionToken,
    pub entries: Vec<CacheEntry>,
}

impl NotificationList {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, scenario_id: ScenarioId) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.scenario_id == scenario_id)
    }
}
