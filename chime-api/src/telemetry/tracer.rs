//! Tracing Subscriber Initialization
//!
//! Structured logging through tracing-subscriber, filtered by `RUST_LOG` and
//! formatted as JSON in production or human-readable text locally.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str =
    "chime_api=debug,chime_events=info,chime_storage=info,tower_http=debug,info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Environment (production, staging, development)
    pub environment: String,
    pub log_format: LogFormat,
    /// Enable metrics collection
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl TelemetryConfig {
    /// Environment variables:
    /// - `CHIME_SERVICE_NAME` (default: chime-api)
    /// - `CHIME_ENVIRONMENT` (default: development)
    /// - `CHIME_LOG_FORMAT`: `json` or `pretty` (default: json)
    /// - `CHIME_METRICS_ENABLED`: `true`/`1` (default: true)
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("CHIME_SERVICE_NAME")
                .unwrap_or_else(|_| "chime-api".to_string()),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("CHIME_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            log_format: match std::env::var("CHIME_LOG_FORMAT").as_deref() {
                Ok("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
            metrics_enabled: std::env::var("CHIME_METRICS_ENABLED")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(true),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Call once at application startup before any tracing occurs.
pub fn init_tracer(config: &TelemetryConfig) -> ApiResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = config.service_name,
        service_version = config.service_version,
        environment = config.environment,
        log_format = ?config.log_format,
        "Telemetry initialized"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_defaults() {
        let config = TelemetryConfig {
            environment: "test".to_string(),
            ..TelemetryConfig::from_env()
        };
        assert_eq!(config.service_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(config.environment, "test");
    }
}
