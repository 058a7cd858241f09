//! Scenario and notification snapshots.
//!
//! These are the shapes read from the source of truth and carried inside
//! domain events. They hold enough state for the cache layer to build an
//! entry without re-querying the database.

use serde::{Deserialize, Serialize};

use crate::{
    ConditionError, DayOfWeek, DeliveryMethod, MemberId, NotificationCondition, NotificationId,
    NotificationType, ScenarioId,
};

/// A member-owned scenario, optionally carrying one notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScenarioSnapshot {
    pub member_id: MemberId,
    pub scenario_id: ScenarioId,
    pub name: String,
    pub memo: Option<String>,
    /// Display position within the member's scenario list.
    pub position: i32,
    pub notification: Option<NotificationSnapshot>,
    /// The owning member's notification switch at the time of the snapshot.
    /// While off, none of the member's scenarios count as active.
    #[serde(default = "enabled")]
    pub member_notifications_enabled: bool,
}

fn enabled() -> bool {
    true
}

/// The notification attached to a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationSnapshot {
    pub notification_id: NotificationId,
    pub active: bool,
    pub notification_type: NotificationType,
    pub delivery_method: DeliveryMethod,
    pub days: Vec<DayOfWeek>,
    /// Cleared when the notification is inactive.
    pub condition: Option<NotificationCondition>,
}

impl ScenarioSnapshot {
    /// Create a scenario without a notification.
    pub fn new(
        member_id: MemberId,
        scenario_id: ScenarioId,
        name: impl Into<String>,
        position: i32,
    ) -> Self {
        Self {
            member_id,
            scenario_id,
            name: name.into(),
            memo: None,
            position,
            notification: None,
            member_notifications_enabled: true,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_notification(mut self, notification: NotificationSnapshot) -> Self {
        self.notification = Some(notification);
        self
    }

    pub fn with_member_notifications(mut self, enabled: bool) -> Self {
        self.member_notifications_enabled = enabled;
        self
    }

    /// Check the range of the attached condition, if any.
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self.notification.as_ref().and_then(|n| n.condition.as_ref()) {
            Some(condition) => condition.validate(),
            None => Ok(()),
        }
    }

    /// Whether this scenario belongs in the member's read cache.
    pub fn has_active_notification(&self) -> bool {
        self.member_notifications_enabled && self.notification.as_ref().is_some_and(|n| n.active)
    }
}

impl NotificationSnapshot {
    /// Create an active notification from its condition.
    ///
    /// The type tag is taken from the condition so the two cannot disagree.
    pub fn active(
        notification_id: NotificationId,
        delivery_method: DeliveryMethod,
        days: Vec<DayOfWeek>,
        condition: NotificationCondition,
    ) -> Self {
        Self {
            notification_id,
            active: true,
            notification_type: condition.notification_type(),
            delivery_method,
            days,
            condition: Some(condition),
        }
    }

    /// Return the inactive form of this notification, with the condition cleared.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self.condition = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> NotificationSnapshot {
        NotificationSnapshot::active(
            NotificationId::new(100),
            DeliveryMethod::Push,
            vec![DayOfWeek::Monday, DayOfWeek::Friday],
            NotificationCondition::time(9, 30),
        )
    }

    #[test]
    fn test_active_notification_takes_type_from_condition() {
        let n = notification();
        assert!(n.active);
        assert_eq!(n.notification_type, NotificationType::Time);
    }

    #[test]
    fn test_deactivated_clears_condition() {
        let n = notification().deactivated();
        assert!(!n.active);
        assert!(n.condition.is_none());
        assert_eq!(n.notification_type, NotificationType::Time);
    }

    #[test]
    fn test_has_active_notification() {
        let bare = ScenarioSnapshot::new(MemberId::new(1), ScenarioId::new(10), "Morning", 0);
        assert!(!bare.has_active_notification());

        let active = bare.clone().with_notification(notification());
        assert!(active.has_active_notification());

        let inactive = bare.clone().with_notification(notification().deactivated());
        assert!(!inactive.has_active_notification());

        let member_off = bare
            .with_notification(notification())
            .with_member_notifications(false);
        assert!(!member_off.has_active_notification());
    }

    #[test]
    fn test_validate_checks_attached_condition() {
        let bare = ScenarioSnapshot::new(MemberId::new(1), ScenarioId::new(10), "Morning", 0);
        assert!(bare.validate().is_ok());

        let mut late = notification();
        late.condition = Some(NotificationCondition::time(25, 0));
        assert_eq!(
            bare.with_notification(late).validate(),
            Err(ConditionError::StartHourOutOfRange(25))
        );
    }

    #[test]
    fn test_member_switch_defaults_on_when_absent() {
        let json = r#"{"member_id":1,"scenario_id":10,"name":"Morning","memo":null,"position":0,"notification":null}"#;
        let scenario: ScenarioSnapshot = serde_json::from_str(json).unwrap();
        assert!(scenario.member_notifications_enabled);
    }
}
