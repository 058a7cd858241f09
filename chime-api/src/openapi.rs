//! OpenAPI Specification for Chime API
//!
//! Generated with utoipa from the route annotations and response types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::events::{EventAccepted, EvictionResponse};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::notification::{NotificationListResponse, ScenarioNotificationResponse};
use crate::routes::{events, health, notification};
use crate::telemetry::metrics;

use chime_core::{
    DayOfWeek, DeliveryMethod, LocationCondition, LocationTrigger, MemberId, NotificationCondition,
    NotificationId, NotificationSnapshot, NotificationType, ScenarioId, ScenarioSnapshot,
    TimeCondition,
};
use chime_events::NotificationEvent;

/// OpenAPI document for Chime API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chime API",
        version = "0.1.0",
        description = "Cached scenario notification reads with ETag revalidation",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Notifications", description = "Cached scenario notification reads"),
        (name = "Internal", description = "Lifecycle event ingestion and cache operations"),
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        notification::list_notifications,
        notification::get_notification,
        events::ingest_event,
        events::evict_collection,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            NotificationListResponse,
            ScenarioNotificationResponse,
            NotificationCondition,
            TimeCondition,
            LocationCondition,
            NotificationType,
            DeliveryMethod,
            DayOfWeek,
            LocationTrigger,
            MemberId,
            ScenarioId,
            NotificationId,
            NotificationEvent,
            ScenarioSnapshot,
            NotificationSnapshot,
            EventAccepted,
            EvictionResponse,
            HealthResponse,
            HealthStatus,
            HealthDetails,
            ComponentHealth,
            ApiError,
            ErrorCode,
        )
    ),
    modifiers(&MemberHeaderAddon)
)]
pub struct ApiDoc;

/// Documents the gateway-forwarded member header as a security scheme.
struct MemberHeaderAddon;

impl Modify for MemberHeaderAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "member_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Member-Id"))),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        let openapi = Self::openapi();
        serde_json::to_string_pretty(&openapi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() -> Result<(), String> {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Chime API");

        let components = openapi
            .components
            .as_ref()
            .ok_or_else(|| "OpenAPI components missing".to_string())?;
        assert!(components.security_schemes.contains_key("member_id"));
        assert!(components.schemas.contains_key("NotificationListResponse"));
        Ok(())
    }

    #[test]
    fn test_openapi_paths_exist() {
        let openapi = ApiDoc::openapi();
        for path in [
            "/notifications/scenarios",
            "/notifications/scenarios/{scenario_id}",
            "/internal/notification-events",
            "/health/ready",
            "/metrics",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_json_serialization() -> Result<(), String> {
        let json = ApiDoc::to_json().map_err(|e| format!("Failed to serialize OpenAPI: {}", e))?;
        serde_json::from_str::<serde_json::Value>(&json)
            .map_err(|e| format!("Generated JSON invalid: {}", e))?;
        assert!(json.contains("Chime API"));
        Ok(())
    }
}
