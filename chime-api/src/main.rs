//! Chime API Server Entry Point
//!
//! Bootstraps configuration, opens the cache store, starts the listener
//! pool and serves the Axum router until interrupted.

use std::sync::Arc;
use std::time::Duration;

use chime_api::telemetry::{init_tracer, TelemetryConfig, METRICS};
use chime_api::{
    create_router, ApiConfig, ApiError, ApiResult, AppState, DbClient, DbConfig,
    PgNotificationSource,
};
use chime_events::{ListenerPool, WorkerPoolConfig};
use chime_storage::{CacheConfig, NotificationCacheService};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracer(&telemetry_config)?;
    if telemetry_config.metrics_enabled {
        if let Err(e) = METRICS.as_ref() {
            tracing::warn!(error = %e, "Prometheus metrics unavailable");
        }
    }

    let cache_config = CacheConfig::from_env().map_err(|e| ApiError::internal_error(e.to_string()))?;
    let store = cache_config.open_store().await?;

    let db = DbClient::from_config(&DbConfig::from_env())?;
    let source = Arc::new(PgNotificationSource::new(db.clone()));
    let cache = Arc::new(NotificationCacheService::new(
        store,
        source,
        cache_config.store_timeout,
    ));

    let pool_config =
        WorkerPoolConfig::from_env().map_err(|e| ApiError::internal_error(e.to_string()))?;
    let pool = Arc::new(
        ListenerPool::start(pool_config).map_err(|e| ApiError::internal_error(e.to_string()))?,
    );

    let api_config = ApiConfig::from_env();
    let state = AppState::new(cache.clone(), pool.clone(), Some(db));
    let app = create_router(state, &api_config)?;

    let addr = api_config.socket_addr();
    tracing::info!(%addr, backend = cache.backend_name(), "Starting Chime API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let grace = Duration::from_secs(api_config.shutdown_grace_secs);
    if !pool.shutdown(grace).await {
        tracing::warn!(?grace, "Listener pool did not drain before the grace period");
    }

    Ok(())
}
