//! Cache configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chime_core::{ChimeResult, ConfigError};
use tracing::info;

use super::lmdb_backend::LmdbCacheStore;
use super::memory::InMemoryCacheStore;
use super::redis_backend::RedisCacheStore;
use super::traits::CacheStore;

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Lmdb,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackendKind::Redis),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            "memory" | "in-memory" => Ok(CacheBackendKind::Memory),
            other => Err(ConfigError::InvalidValue {
                field: "CHIME_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected one of redis, lmdb, memory".to_string(),
            }),
        }
    }
}

/// Configuration for the notification cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Store backend.
    pub backend: CacheBackendKind,
    /// Redis connection URL.
    pub redis_url: String,
    /// Directory for LMDB files.
    pub lmdb_path: PathBuf,
    /// Maximum LMDB map size in megabytes.
    pub lmdb_max_size_mb: usize,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            lmdb_path: PathBuf::from("./data/chime-cache"),
            lmdb_max_size_mb: 256,
            store_timeout: Duration::from_millis(500),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CHIME_CACHE_BACKEND`: `redis`, `lmdb` or `memory` (default: memory)
    /// - `CHIME_REDIS_URL`: Redis URL (default: redis://127.0.0.1:6379)
    /// - `CHIME_LMDB_PATH`: LMDB directory (default: ./data/chime-cache)
    /// - `CHIME_LMDB_MAX_SIZE_MB`: LMDB map size (default: 256)
    /// - `CHIME_CACHE_STORE_TIMEOUT_MS`: store call timeout (default: 500)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match std::env::var("CHIME_CACHE_BACKEND") {
            Ok(value) => value.parse()?,
            Err(_) => defaults.backend,
        };

        let redis_url = std::env::var("CHIME_REDIS_URL").unwrap_or(defaults.redis_url);

        let lmdb_path = std::env::var("CHIME_LMDB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.lmdb_path);

        let lmdb_max_size_mb = parse_env("CHIME_LMDB_MAX_SIZE_MB", defaults.lmdb_max_size_mb)?;

        let store_timeout = Duration::from_millis(parse_env(
            "CHIME_CACHE_STORE_TIMEOUT_MS",
            defaults.store_timeout.as_millis() as u64,
        )?);

        let config = Self {
            backend,
            redis_url,
            lmdb_path,
            lmdb_max_size_mb,
            store_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "CHIME_CACHE_STORE_TIMEOUT_MS".to_string(),
                value: "0".to_string(),
                reason: "timeout must be positive".to_string(),
            });
        }
        if self.lmdb_max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "CHIME_LMDB_MAX_SIZE_MB".to_string(),
                value: "0".to_string(),
                reason: "map size must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_backend(mut self, backend: CacheBackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_lmdb_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lmdb_path = path.into();
        self
    }

    /// Open the configured store.
    pub async fn open_store(&self) -> ChimeResult<Arc<dyn CacheStore>> {
        let store: Arc<dyn CacheStore> = match self.backend {
            CacheBackendKind::Redis => Arc::new(RedisCacheStore::connect(&self.redis_url).await?),
            CacheBackendKind::Lmdb => Arc::new(
                LmdbCacheStore::open(&self.lmdb_path, self.lmdb_max_size_mb).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "CHIME_LMDB_PATH".to_string(),
                        value: self.lmdb_path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?,
            ),
            CacheBackendKind::Memory => Arc::new(InMemoryCacheStore::new()),
        };

        info!(backend = store.backend_name(), "Opened notification cache store");
        Ok(store)
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw.clone(),
            reason: "not a valid number".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.backend, CacheBackendKind::Memory);
        assert_eq!(config.store_timeout, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("Redis".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Redis));
        assert_eq!(" lmdb ".parse::<CacheBackendKind>(), Ok(CacheBackendKind::Lmdb));
        let err = "memcached".parse::<CacheBackendKind>().unwrap_err();
        assert!(err.to_string().contains("CHIME_CACHE_BACKEND"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = CacheConfig::default().with_store_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_open_memory_and_lmdb_stores() {
        let memory = CacheConfig::default().open_store().await.unwrap();
        assert_eq!(memory.backend_name(), "memory");

        let dir = tempfile::TempDir::new().unwrap();
        let lmdb = CacheConfig::default()
            .with_backend(CacheBackendKind::Lmdb)
            .with_lmdb_path(dir.path())
            .open_store()
            .await
            .unwrap();
        assert_eq!(lmdb.backend_name(), "lmdb");
        lmdb.ping().await.unwrap();
    }
}
