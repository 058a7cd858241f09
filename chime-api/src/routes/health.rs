//! Health Check Endpoints
//!
//! Provides Kubernetes-compatible health check endpoints:
//! - /health/ping - Simple liveness check
//! - /health/live - Process alive check
//! - /health/ready - Cache store (and database, when configured) connectivity
//!
//! No member identity required for health endpoints.

use std::future::Future;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Degraded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthDetails {
    pub cache: ComponentHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<ComponentHealth>,
    /// Name of the active cache backend
    pub backend: String,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn from_check(result: Result<u64, String>) -> Self {
        match result {
            Ok(latency) => Self {
                status: HealthStatus::Healthy,
                latency_ms: Some(latency),
                error: None,
            },
            Err(e) => Self {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                error: Some(e),
            },
        }
    }
}

/// The cache is required; an unreachable database only degrades the service
/// because cached reads keep working.
fn overall_status(cache: &ComponentHealth, database: Option<&ComponentHealth>) -> HealthStatus {
    if cache.status != HealthStatus::Healthy {
        return HealthStatus::Unhealthy;
    }
    match database {
        Some(db) if db.status != HealthStatus::Healthy => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - Simple pong response
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses(
        (status = 200, description = "Service is responding", body = String),
    ),
)]
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - Process liveness check
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = HealthResponse),
    ),
)]
pub async fn liveness() -> impl IntoResponse {
    let response = HealthResponse {
        status: HealthStatus::Healthy,
        message: Some("Process is alive".to_string()),
        details: None,
    };
    (StatusCode::OK, Json(response))
}

/// GET /health/ready - Readiness check (cache store and database connectivity)
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Service is not ready", body = HealthResponse),
    ),
)]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let cache = ComponentHealth::from_check(
        timed_check(async { state.cache.ping().await.map_err(|e| e.to_string()) }).await,
    );

    let database = match &state.db {
        Some(db) => Some(ComponentHealth::from_check(
            timed_check(async { db.ping().await.map_err(|e| e.message) }).await,
        )),
        None => None,
    };

    let status = overall_status(&cache, database.as_ref());
    let response = HealthResponse {
        status,
        message: None,
        details: Some(HealthDetails {
            cache,
            database,
            backend: state.cache.backend_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status_code = if status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

async fn timed_check<F>(check: F) -> Result<u64, String>
where
    F: Future<Output = Result<(), String>>,
{
    let start = Instant::now();
    check.await?;
    Ok(start.elapsed().as_millis() as u64)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create health check router (no member identity required)
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> ComponentHealth {
        ComponentHealth::from_check(Ok(2))
    }

    fn unhealthy() -> ComponentHealth {
        ComponentHealth::from_check(Err("Connection refused".to_string()))
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            message: Some("All systems operational".to_string()),
            details: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(&healthy(), None), HealthStatus::Healthy);
        assert_eq!(overall_status(&healthy(), Some(&healthy())), HealthStatus::Healthy);
        assert_eq!(overall_status(&healthy(), Some(&unhealthy())), HealthStatus::Degraded);
        assert_eq!(overall_status(&unhealthy(), Some(&healthy())), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_component_health_with_error() {
        let component = unhealthy();
        let json = serde_json::to_string(&component).unwrap();
        assert!(json.contains("\"status\":\"unhealthy\""));
        assert!(json.contains("Connection refused"));
        assert!(!json.contains("latency_ms"));
    }
}
