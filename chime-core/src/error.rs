//! Error types for Chime operations

use crate::{MemberId, ScenarioId};
use thiserror::Error;

/// Notification cache errors.
///
/// Read-path variants surface to clients; everything raised inside a
/// listener is logged and turned into a full invalidation instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to fetch notifications for member {member_id}: {reason}")]
    FetchAllFailed { member_id: MemberId, reason: String },

    #[error("Notification for scenario {scenario_id} not cached for member {member_id}")]
    NotFound {
        member_id: MemberId,
        scenario_id: ScenarioId,
    },

    #[error("Cache update failed for member {member_id}, scenario {scenario_id}: {reason}")]
    UpdateFailed {
        member_id: MemberId,
        scenario_id: ScenarioId,
        reason: String,
    },

    #[error("Cache delete failed for member {member_id}, scenario {scenario_id}: {reason}")]
    DeleteFailed {
        member_id: MemberId,
        scenario_id: ScenarioId,
        reason: String,
    },

    #[error("Cache invalidation failed for member {member_id}: {reason}")]
    InvalidateFailed { member_id: MemberId, reason: String },

    #[error("Failed to serialize cache entry: {reason}")]
    SerializeFailed { reason: String },

    #[error("Failed to deserialize cache entry: {reason}")]
    DeserializeFailed { reason: String },

    #[error("Failed to parse notification condition: {reason}")]
    ConditionParseFailed { reason: String },

    #[error("Failed to serialize notification condition: {reason}")]
    ConditionSerializeFailed { reason: String },

    #[error("Cache store {operation} failed: {reason}")]
    StoreFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Cache store {operation} timed out after {timeout_ms}ms")]
    StoreTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}

impl CacheError {
    /// Stable identifier for the error kind, used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheError::FetchAllFailed { .. } => "FETCH_ALL_FAILED",
            CacheError::NotFound { .. } => "NOT_FOUND",
            CacheError::UpdateFailed { .. } => "UPDATE_FAILED",
            CacheError::DeleteFailed { .. } => "DELETE_FAILED",
            CacheError::InvalidateFailed { .. } => "INVALIDATE_FAILED",
            CacheError::SerializeFailed { .. } => "SERIALIZE_FAILED",
            CacheError::DeserializeFailed { .. } => "DESERIALIZE_FAILED",
            CacheError::ConditionParseFailed { .. } => "CONDITION_PARSE_FAILED",
            CacheError::ConditionSerializeFailed { .. } => "CONDITION_SERIALIZE_FAILED",
            CacheError::StoreFailed { .. } => "STORE_FAILED",
            CacheError::StoreTimeout { .. } => "STORE_TIMEOUT",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }

    pub fn store(operation: &'static str, reason: impl ToString) -> Self {
        CacheError::StoreFailed {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// A notification condition field outside its allowed range.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("start_hour {0} out of range 0..=23")]
    StartHourOutOfRange(u8),

    #[error("start_minute {0} out of range 0..=59")]
    StartMinuteOutOfRange(u8),

    #[error("latitude {0} out of range -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range -180..=180")]
    LongitudeOutOfRange(f64),

    #[error("radius_meters must be positive")]
    ZeroRadius,
}

/// Errors from the relational source of truth.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Invalid row for scenario {scenario_id}: {reason}")]
    InvalidRow {
        scenario_id: ScenarioId,
        reason: String,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Chime errors.
#[derive(Debug, Clone, Error)]
pub enum ChimeError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Chime operations.
pub type ChimeResult<T> = Result<T, ChimeError>;

// =============================================================================
// TESTS
// =============================================================================
