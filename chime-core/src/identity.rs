//! Identity types for Chime entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Declares a strongly-typed numeric identifier.
///
/// Source-of-truth rows use `BIGINT` keys, so every id wraps an `i64` and
/// serializes transparently as a plain number.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw database key.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Get the raw database key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of a member (the owner of scenarios).
    MemberId
);

define_id!(
    /// Identifier of a scenario.
    ScenarioId
);

define_id!(
    /// Identifier of the notification attached to a scenario.
    NotificationId
);
