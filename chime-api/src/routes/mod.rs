//! REST API Routes Module
//!
//! Includes:
//! - Cached notification reads (member identity from `X-Member-Id`)
//! - Internal event ingestion and cache eviction
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document
//! - CORS support for browser-based clients

pub mod events;
pub mod health;
pub mod notification;

use std::time::Duration;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::extractors::MEMBER_ID_HEADER;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use events::create_router as internal_router;
pub use health::create_router as health_router;
pub use notification::create_router as notification_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Check if running in a production environment.
fn is_production_environment() -> bool {
    std::env::var("CHIME_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

/// Validate API configuration for production use.
fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set CHIME_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the complete API router.
///
/// - Notification reads at /notifications/*
/// - Internal ingestion and eviction at /internal/*
/// - Health checks at /health/*
/// - Metrics at /metrics
/// - OpenAPI spec at /openapi.json
/// - Swagger UI at /swagger-ui (when swagger-ui feature is enabled)
///
/// Layer order, outermost first: CORS, request tracing, observability.
pub fn create_router(state: AppState, api_config: &ApiConfig) -> ApiResult<Router> {
    if is_production_environment() {
        validate_api_config_for_production(api_config)?;
    }

    let mut router = Router::new()
        .nest("/notifications", notification_router())
        .nest("/internal", internal_router())
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .with_state(state);

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));
    }

    let cors = build_cors_layer(api_config);

    Ok(router
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::IF_NONE_MATCH,
            HeaderName::from_static(MEMBER_ID_HEADER),
        ])
        .expose_headers([header::ETAG])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
