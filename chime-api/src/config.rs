//! API Configuration Module
//!
//! Listener address and CORS settings, loaded from environment variables
//! with sensible defaults for development.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// API configuration for the HTTP listener and CORS.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind.
    pub bind: IpAddr,

    /// Port to listen on.
    pub port: u16,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins (dev mode).
    /// Example: "https://chime.run,https://app.chime.run"
    pub cors_origins: Vec<String>,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Grace period for in-flight listeners at shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            cors_origins: Vec::new(), // Empty = allow all
            cors_max_age_secs: 86400, // 24 hours
            shutdown_grace_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CHIME_API_BIND`: Bind address (default: 0.0.0.0)
    /// - `PORT` or `CHIME_API_PORT`: Listen port (default: 3000)
    /// - `CHIME_CORS_ORIGINS`: Comma-separated allowed origins (empty = allow all)
    /// - `CHIME_CORS_MAX_AGE_SECS`: Preflight cache duration (default: 86400)
    /// - `CHIME_SHUTDOWN_GRACE_SECS`: Listener drain period (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = std::env::var("CHIME_API_BIND")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bind);

        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("CHIME_API_PORT"))
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let cors_origins = std::env::var("CHIME_CORS_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_max_age_secs = std::env::var("CHIME_CORS_MAX_AGE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let shutdown_grace_secs = std::env::var("CHIME_SHUTDOWN_GRACE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.shutdown_grace_secs);

        Self {
            bind,
            port,
            cors_origins,
            cors_max_age_secs,
            shutdown_grace_secs,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // Wildcard subdomains: *.chime.run
            if let Some(pattern) = allowed.strip_prefix("*.") {
                if let Some(origin_domain) = origin.strip_prefix("https://") {
                    return origin_domain.ends_with(&format!(".{}", pattern));
                }
            }
            false
        })
    }
}
