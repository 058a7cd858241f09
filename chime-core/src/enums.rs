//! Enum types for Chime entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// NOTIFICATION ENUMS
// ============================================================================

/// Type tag of a notification.
///
/// The tag selects which [`NotificationCondition`](crate::NotificationCondition)
/// variant is valid for the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// Fires at a time of day
    Time,
    /// Fires on arriving at or leaving a place
    Location,
}

impl NotificationType {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            NotificationType::Time => "TIME",
            NotificationType::Location => "LOCATION",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "TIME" => Ok(NotificationType::Time),
            "LOCATION" => Ok(NotificationType::Location),
            _ => Err(EnumParseError::new("notification type", s)),
        }
    }
}

/// How a notification reaches the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    /// Push notification
    Push,
    /// Full-screen alarm
    Alarm,
}

impl DeliveryMethod {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Push => "PUSH",
            DeliveryMethod::Alarm => "ALARM",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "PUSH" => Ok(DeliveryMethod::Push),
            "ALARM" => Ok(DeliveryMethod::Alarm),
            _ => Err(EnumParseError::new("delivery method", s)),
        }
    }
}

/// Day of the week a notification repeats on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    /// All days, Monday first.
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
            DayOfWeek::Sunday => "SUNDAY",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "MONDAY" => Ok(DayOfWeek::Monday),
            "TUESDAY" => Ok(DayOfWeek::Tuesday),
            "WEDNESDAY" => Ok(DayOfWeek::Wednesday),
            "THURSDAY" => Ok(DayOfWeek::Thursday),
            "FRIDAY" => Ok(DayOfWeek::Friday),
            "SATURDAY" => Ok(DayOfWeek::Saturday),
            "SUNDAY" => Ok(DayOfWeek::Sunday),
            _ => Err(EnumParseError::new("day of week", s)),
        }
    }
}

/// Whether a location notification fires on arrival or departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationTrigger {
    Arrive,
    Leave,
}

// ============================================================================
// DISPLAY / FROMSTR
// ============================================================================

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for NotificationType {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for DeliveryMethod {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for DayOfWeek {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid enum string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl EnumParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_type_roundtrip() {
        for ty in [NotificationType::Time, NotificationType::Location] {
            assert_eq!(NotificationType::from_db_str(ty.as_db_str()), Ok(ty));
        }
        assert_eq!("time".parse::<NotificationType>(), Ok(NotificationType::Time));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = NotificationType::from_db_str("WEATHER").unwrap_err();
        assert_eq!(err.kind, "notification type");
        assert!(err.to_string().contains("WEATHER"));
        assert!("FAX".parse::<DeliveryMethod>().is_err());
        assert!("FUNDAY".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_day_of_week_serde_matches_db_str() {
        for day in DayOfWeek::ALL {
            let json = serde_json::to_string(&day).unwrap();
            assert_eq!(json, format!("\"{}\"", day.as_db_str()));
        }
    }
}
