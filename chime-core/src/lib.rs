//! Chime Core - Domain Types
//!
//! Identifiers, enums, notification conditions and scenario snapshots shared
//! by every other crate, plus the error types they report through.
//! This crate contains ONLY data types - no I/O.

pub mod condition;
pub mod enums;
pub mod error;
pub mod identity;
pub mod scenario;

pub use condition::{LocationCondition, NotificationCondition, TimeCondition};
pub use enums::{DayOfWeek, DeliveryMethod, EnumParseError, LocationTrigger, NotificationType};
pub use error::{
    CacheError, ChimeError, ChimeResult, ConditionError, ConfigError, SourceError,
};
pub use identity::{MemberId, NotificationId, ScenarioId, Timestamp};
pub use scenario::{NotificationSnapshot, ScenarioSnapshot};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
