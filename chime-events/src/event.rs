//! Notification lifecycle events.
//!
//! Each event carries enough prior state for a listener to act without
//! querying the source of truth again.

use chime_core::{ConditionError, MemberId, ScenarioId, ScenarioSnapshot, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A scenario notification lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type")]
pub enum NotificationEvent {
    /// A scenario was created.
    ScenarioCreated {
        /// State after creation
        scenario: ScenarioSnapshot,
    },

    /// A scenario or its notification was changed.
    ScenarioUpdated {
        /// State after the update
        scenario: ScenarioSnapshot,
        /// Whether the notification was active before the update
        was_active: bool,
    },

    /// A scenario was deleted.
    ScenarioDeleted {
        member_id: MemberId,
        scenario_id: ScenarioId,
        /// Whether the deleted notification was active
        was_active: bool,
    },

    /// The member switched all of their notifications on or off.
    MemberNotificationsToggled { member_id: MemberId, active: bool },

    /// The member reordered their scenarios.
    ScenarioOrderChanged {
        member_id: MemberId,
        /// Scenario ids in their new display order
        scenario_ids: Vec<ScenarioId>,
    },
}

/// Event discriminator used for listener lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ScenarioCreated,
    ScenarioUpdated,
    ScenarioDeleted,
    MemberNotificationsToggled,
    ScenarioOrderChanged,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::ScenarioCreated,
        EventKind::ScenarioUpdated,
        EventKind::ScenarioDeleted,
        EventKind::MemberNotificationsToggled,
        EventKind::ScenarioOrderChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ScenarioCreated => "ScenarioCreated",
            EventKind::ScenarioUpdated => "ScenarioUpdated",
            EventKind::ScenarioDeleted => "ScenarioDeleted",
            EventKind::MemberNotificationsToggled => "MemberNotificationsToggled",
            EventKind::ScenarioOrderChanged => "ScenarioOrderChanged",
        }
    }
}

impl NotificationEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NotificationEvent::ScenarioCreated { .. } => EventKind::ScenarioCreated,
            NotificationEvent::ScenarioUpdated { .. } => EventKind::ScenarioUpdated,
            NotificationEvent::ScenarioDeleted { .. } => EventKind::ScenarioDeleted,
            NotificationEvent::MemberNotificationsToggled { .. } => {
                EventKind::MemberNotificationsToggled
            }
            NotificationEvent::ScenarioOrderChanged { .. } => EventKind::ScenarioOrderChanged,
        }
    }

    /// Get the event type name for logging.
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The member whose cache this event affects.
    pub fn member_id(&self) -> MemberId {
        match self {
            NotificationEvent::ScenarioCreated { scenario }
            | NotificationEvent::ScenarioUpdated { scenario, .. } => scenario.member_id,
            NotificationEvent::ScenarioDeleted { member_id, .. }
            | NotificationEvent::MemberNotificationsToggled { member_id, .. }
            | NotificationEvent::ScenarioOrderChanged { member_id, .. } => *member_id,
        }
    }

    /// Range-check the condition carried by scenario-level events.
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self {
            NotificationEvent::ScenarioCreated { scenario }
            | NotificationEvent::ScenarioUpdated { scenario, .. } => scenario.validate(),
            _ => Ok(()),
        }
    }

    /// The scenario involved, for scenario-level events.
    pub fn scenario_id(&self) -> Option<ScenarioId> {
        match self {
            NotificationEvent::ScenarioCreated { scenario }
            | NotificationEvent::ScenarioUpdated { scenario, .. } => Some(scenario.scenario_id),
            NotificationEvent::ScenarioDeleted { scenario_id, .. } => Some(*scenario_id),
            _ => None,
        }
    }
}

/// A published event with its identity and publication time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: Timestamp,
    pub event: NotificationEvent,
}

impl EventEnvelope {
    pub fn new(event: NotificationEvent) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{
        DayOfWeek, DeliveryMethod, NotificationCondition, NotificationId, NotificationSnapshot,
    };

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = NotificationEvent::ScenarioDeleted {
            member_id: MemberId::new(1),
            scenario_id: ScenarioId::new(11),
            was_active: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ScenarioDeleted");
        assert_eq!(json["scenario_id"], 11);

        let back: NotificationEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_member_and_scenario_accessors() {
        let scenario = ScenarioSnapshot::new(MemberId::new(3), ScenarioId::new(30), "Gym", 0);
        let created = NotificationEvent::ScenarioCreated { scenario };
        assert_eq!(created.member_id(), MemberId::new(3));
        assert_eq!(created.scenario_id(), Some(ScenarioId::new(30)));
        assert_eq!(created.event_type(), "ScenarioCreated");

        let toggled = NotificationEvent::MemberNotificationsToggled {
            member_id: MemberId::new(4),
            active: true,
        };
        assert_eq!(toggled.member_id(), MemberId::new(4));
        assert_eq!(toggled.scenario_id(), None);
        assert_eq!(toggled.kind(), EventKind::MemberNotificationsToggled);
        assert!(toggled.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_condition() {
        let notification = NotificationSnapshot::active(
            NotificationId::new(1),
            DeliveryMethod::Push,
            vec![DayOfWeek::Monday],
            NotificationCondition::time(9, 60),
        );
        let scenario = ScenarioSnapshot::new(MemberId::new(3), ScenarioId::new(30), "Gym", 0)
            .with_notification(notification);
        let updated = NotificationEvent::ScenarioUpdated {
            scenario,
            was_active: false,
        };
        assert_eq!(
            updated.validate(),
            Err(ConditionError::StartMinuteOutOfRange(60))
        );
    }
}
