//! Type-specific notification conditions.
//!
//! A condition is a tagged union: the `type` field of its JSON form carries
//! the same tag as the owning notification's [`NotificationType`], and a
//! condition is only valid when the two agree.

use serde::{Deserialize, Serialize};

use crate::{ConditionError, LocationTrigger, NotificationType};

/// Condition payload for a notification, one variant per notification type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCondition {
    Time(TimeCondition),
    Location(LocationCondition),
}

/// Fires once per selected day at a wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimeCondition {
    pub start_hour: u8,
    pub start_minute: u8,
}

/// Fires when the member crosses a geofence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LocationCondition {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: u32,
    pub trigger: LocationTrigger,
}

impl NotificationCondition {
    /// Build a time-of-day condition.
    pub fn time(start_hour: u8, start_minute: u8) -> Self {
        NotificationCondition::Time(TimeCondition {
            start_hour,
            start_minute,
        })
    }

    /// The notification type this condition belongs to.
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationCondition::Time(_) => NotificationType::Time,
            NotificationCondition::Location(_) => NotificationType::Location,
        }
    }

    /// Check whether this condition is valid for the given type tag.
    pub fn matches_type(&self, notification_type: NotificationType) -> bool {
        self.notification_type() == notification_type
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ConditionError> {
        match self {
            NotificationCondition::Time(time) => {
                if time.start_hour > 23 {
                    return Err(ConditionError::StartHourOutOfRange(time.start_hour));
                }
                if time.start_minute > 59 {
                    return Err(ConditionError::StartMinuteOutOfRange(time.start_minute));
                }
            }
            NotificationCondition::Location(location) => {
                if !(-90.0..=90.0).contains(&location.latitude) {
                    return Err(ConditionError::LatitudeOutOfRange(location.latitude));
                }
                if !(-180.0..=180.0).contains(&location.longitude) {
                    return Err(ConditionError::LongitudeOutOfRange(location.longitude));
                }
                if location.radius_meters == 0 {
                    return Err(ConditionError::ZeroRadius);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_condition_json_carries_tag() {
        let condition = NotificationCondition::time(9, 30);
        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(json["type"], "TIME");
        assert_eq!(json["start_hour"], 9);
        assert_eq!(json["start_minute"], 30);
    }

    #[test]
    fn test_matches_type() {
        let condition = NotificationCondition::time(7, 0);
        assert!(condition.matches_type(NotificationType::Time));
        assert!(!condition.matches_type(NotificationType::Location));
    }

    #[test]
    fn test_validate_ranges() {
        assert!(NotificationCondition::time(23, 59).validate().is_ok());
        assert_eq!(
            NotificationCondition::time(24, 0).validate(),
            Err(ConditionError::StartHourOutOfRange(24))
        );
        assert_eq!(
            NotificationCondition::time(0, 60).validate(),
            Err(ConditionError::StartMinuteOutOfRange(60))
        );

        let location = NotificationCondition::Location(LocationCondition {
            latitude: 37.5,
            longitude: 127.0,
            radius_meters: 0,
            trigger: LocationTrigger::Arrive,
        });
        assert_eq!(location.validate(), Err(ConditionError::ZeroRadius));
    }
}
