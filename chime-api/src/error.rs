//! Error Types for Chime API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chime_core::{CacheError, ChimeError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
///
/// Each error code maps to a specific HTTP status code and represents
/// a category of error that can occur during API operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Request carries no usable member identity
    Unauthorized,

    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// The member has no active notification for the scenario
    NotificationNotFound,

    // ========================================================================
    // Server Errors (500, 503, 504)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Cached data could not be written, removed or decoded
    CacheError,

    /// Database operation failed
    DatabaseError,

    /// The cache could not be rebuilt from the database
    SourceUnavailable,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    /// Database connection pool exhausted
    ConnectionPoolExhausted,

    /// Operation timed out
    Timeout,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,

            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,

            ErrorCode::NotificationNotFound => StatusCode::NOT_FOUND,

            ErrorCode::SourceUnavailable
            | ErrorCode::ServiceUnavailable
            | ErrorCode::ConnectionPoolExhausted => StatusCode::SERVICE_UNAVAILABLE,

            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,

            ErrorCode::InternalError | ErrorCode::CacheError | ErrorCode::DatabaseError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::NotificationNotFound => "Notification not found",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::CacheError => "Notification cache operation failed",
            ErrorCode::DatabaseError => "Database operation failed",
            ErrorCode::SourceUnavailable => "Notifications could not be loaded",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCode::ConnectionPoolExhausted => "Connection pool exhausted",
            ErrorCode::Timeout => "Operation timed out",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Create an InvalidFormat error.
    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn notification_not_found(scenario_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotificationNotFound,
            format!("No active notification for scenario {}", scenario_id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn database_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn connection_pool_exhausted() -> Self {
        Self::from_code(ErrorCode::ConnectionPoolExhausted)
    }

    /// Create a Timeout error.
    pub fn timeout(operation: &str) -> Self {
        Self::new(
            ErrorCode::Timeout,
            format!("Operation '{}' timed out", operation),
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN AND STANDARD ERRORS
// ============================================================================

/// Convert a cache error, keeping its kind in the details.
impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        let kind = err.kind();
        let error = match &err {
            CacheError::NotFound { scenario_id, .. } => {
                return ApiError::notification_not_found(scenario_id);
            }
            CacheError::StoreTimeout { operation, .. } => ApiError::timeout(operation),
            CacheError::FetchAllFailed { .. } => {
                tracing::error!(error = %err, "Notification list rebuild failed");
                ApiError::from_code(ErrorCode::SourceUnavailable)
            }
            CacheError::StoreFailed { .. } => {
                tracing::error!(error = %err, "Cache store unavailable");
                ApiError::service_unavailable("Notification cache unavailable")
            }
            _ => {
                tracing::error!(error = %err, "Notification cache error");
                ApiError::from_code(ErrorCode::CacheError)
            }
        };
        error.with_details(serde_json::json!({ "kind": kind }))
    }
}

impl From<ChimeError> for ApiError {
    fn from(err: ChimeError) -> Self {
        match err {
            ChimeError::Cache(e) => e.into(),
            ChimeError::Source(e) => {
                tracing::error!(error = %e, "Notification source error");
                ApiError::from_code(ErrorCode::SourceUnavailable)
            }
            ChimeError::Config(e) => ApiError::internal_error(e.to_string()),
        }
    }
}

/// Convert from tokio_postgres::Error to ApiError.
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        tracing::error!("Database error: {:?}", err);

        // Generic message to avoid leaking internal details
        ApiError::database_error("Database operation failed")
    }
}

/// Convert from deadpool_postgres::PoolError to ApiError.
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        tracing::error!("Connection pool error: {:?}", err);

        match err {
            deadpool_postgres::PoolError::Timeout(_) => ApiError::connection_pool_exhausted(),
            deadpool_postgres::PoolError::Closed => {
                ApiError::service_unavailable("Database connection pool is closed")
            }
            _ => ApiError::database_error("Failed to acquire database connection"),
        }
    }
}

/// Convert from serde_json::Error to ApiError.
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {:?}", err);
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::{MemberId, ScenarioId};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::InvalidFormat.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotificationNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::CacheError.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::SourceUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ErrorCode::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_cache_not_found_maps_to_404() {
        let err: ApiError = CacheError::NotFound {
            member_id: MemberId::new(1),
            scenario_id: ScenarioId::new(10),
        }
        .into();
        assert_eq!(err.code, ErrorCode::NotificationNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert!(err.message.contains("10"));
    }

    #[test]
    fn test_cache_errors_keep_their_kind() {
        let err: ApiError = CacheError::StoreTimeout {
            operation: "read_namespace",
            timeout_ms: 500,
        }
        .into();
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.details, Some(serde_json::json!({ "kind": "STORE_TIMEOUT" })));

        let err: ApiError = CacheError::FetchAllFailed {
            member_id: MemberId::new(1),
            reason: "down".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert_eq!(err.details, Some(serde_json::json!({ "kind": "FETCH_ALL_FAILED" })));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::notification_not_found(10);
        let json = serde_json::to_value(&err)?;

        assert_eq!(json["code"], "NOTIFICATION_NOT_FOUND");
        assert!(json.get("details").is_none());

        let deserialized: ApiError = serde_json::from_value(json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }
}
