//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and the
//! source-of-truth adapter the notification cache rebuilds from.

use std::time::Duration;

use async_trait::async_trait;
use chime_core::{
    DayOfWeek, DeliveryMethod, MemberId, NotificationId, NotificationSnapshot, NotificationType,
    ScenarioId, ScenarioSnapshot, SourceError,
};
use chime_storage::cache::parse_condition;
use chime_storage::NotificationSource;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "chime".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("CHIME_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("CHIME_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("CHIME_DB_NAME").unwrap_or_else(|_| "chime".to_string()),
            user: std::env::var("CHIME_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("CHIME_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("CHIME_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("CHIME_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = deadpool_postgres::PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps a connection pool.
#[derive(Clone)]
pub struct DbClient {
    pool: Pool,
}

impl DbClient {
    /// Create a new database client with the given pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create a new database client from configuration.
    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        let pool = config.create_pool()?;
        Ok(Self::new(pool))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Check that a connection can be acquired and used.
    pub async fn ping(&self) -> ApiResult<()> {
        let conn = self.pool.get().await?;
        conn.simple_query("SELECT 1").await?;
        Ok(())
    }
}

// ============================================================================
// SOURCE OF TRUTH
// ============================================================================

/// Every scenario of a member with an active notification, in display order.
/// A member-level switch turned off hides all of them.
const ACTIVE_NOTIFICATIONS_SQL: &str = "\
    SELECT s.id, s.name, s.memo, s.position, \
           n.id, n.notification_type, n.delivery_method, n.days, n.condition::text \
    FROM scenario s \
    JOIN notification n ON n.scenario_id = s.id \
    JOIN member m ON m.id = s.member_id \
    WHERE s.member_id = $1 \
      AND n.active = true \
      AND m.notification_enabled = true \
    ORDER BY s.position, s.id";

/// One joined scenario/notification row.
#[derive(Debug, Clone)]
pub struct NotificationRow {
    pub scenario_id: i64,
    pub name: String,
    pub memo: Option<String>,
    pub position: i32,
    pub notification_id: i64,
    pub notification_type: String,
    pub delivery_method: String,
    pub days: Vec<String>,
    pub condition: String,
}

impl NotificationRow {
    fn from_row(row: &tokio_postgres::Row) -> Result<Self, tokio_postgres::Error> {
        Ok(Self {
            scenario_id: row.try_get(0)?,
            name: row.try_get(1)?,
            memo: row.try_get(2)?,
            position: row.try_get(3)?,
            notification_id: row.try_get(4)?,
            notification_type: row.try_get(5)?,
            delivery_method: row.try_get(6)?,
            days: row.try_get(7)?,
            condition: row.try_get(8)?,
        })
    }

    /// Decode into a snapshot, validating enums and the condition tag.
    pub fn into_snapshot(self, member_id: MemberId) -> Result<ScenarioSnapshot, SourceError> {
        let scenario_id = ScenarioId::new(self.scenario_id);
        let invalid = |reason: String| SourceError::InvalidRow {
            scenario_id,
            reason,
        };

        let notification_type = NotificationType::from_db_str(&self.notification_type)
            .map_err(|e| invalid(e.to_string()))?;
        let delivery_method = DeliveryMethod::from_db_str(&self.delivery_method)
            .map_err(|e| invalid(e.to_string()))?;
        let days = self
            .days
            .iter()
            .map(|d| DayOfWeek::from_db_str(d))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.to_string()))?;
        let condition = parse_condition(notification_type, &self.condition)
            .map_err(|e| invalid(e.to_string()))?;

        let notification = NotificationSnapshot::active(
            NotificationId::new(self.notification_id),
            delivery_method,
            days,
            condition,
        );
        let scenario = ScenarioSnapshot::new(member_id, scenario_id, self.name, self.position)
            .with_notification(notification);
        Ok(match self.memo {
            Some(memo) => scenario.with_memo(memo),
            None => scenario,
        })
    }
}

/// Reads active notifications from PostgreSQL.
#[derive(Clone)]
pub struct PgNotificationSource {
    db: DbClient,
}

impl PgNotificationSource {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn active_notifications(
        &self,
        member_id: MemberId,
    ) -> Result<Vec<ScenarioSnapshot>, SourceError> {
        let conn = self
            .db
            .pool
            .get()
            .await
            .map_err(|e| SourceError::Unavailable {
                reason: e.to_string(),
            })?;

        let rows = conn
            .query(ACTIVE_NOTIFICATIONS_SQL, &[&member_id.get()])
            .await
            .map_err(|e| SourceError::QueryFailed {
                reason: e.to_string(),
            })?;

        rows.iter()
            .map(|row| {
                NotificationRow::from_row(row)
                    .map_err(|e| SourceError::QueryFailed {
                        reason: e.to_string(),
                    })
                    .and_then(|r| r.into_snapshot(member_id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::NotificationCondition;

    fn row(notification_type: &str, condition: &str) -> NotificationRow {
        NotificationRow {
            scenario_id: 10,
            name: "Morning".to_string(),
            memo: Some("coffee".to_string()),
            position: 0,
            notification_id: 100,
            notification_type: notification_type.to_string(),
            delivery_method: "PUSH".to_string(),
            days: vec!["MONDAY".to_string(), "FRIDAY".to_string()],
            condition: condition.to_string(),
        }
    }

    #[test]
    fn test_default_db_config() {
        let config = DbConfig::default();
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "chime");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_row_decodes_time_notification() {
        let snapshot = row("TIME", r#"{"type":"TIME","start_hour":9,"start_minute":30}"#)
            .into_snapshot(MemberId::new(1))
            .unwrap();
        assert_eq!(snapshot.scenario_id, ScenarioId::new(10));
        assert_eq!(snapshot.memo.as_deref(), Some("coffee"));
        let notification = snapshot.notification.unwrap();
        assert!(notification.active);
        assert_eq!(notification.days, vec![DayOfWeek::Monday, DayOfWeek::Friday]);
        assert_eq!(notification.condition, Some(NotificationCondition::time(9, 30)));
    }

    #[test]
    fn test_row_with_mismatched_condition_is_rejected() {
        let err = row("LOCATION", r#"{"type":"TIME","start_hour":9,"start_minute":30}"#)
            .into_snapshot(MemberId::new(1))
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidRow { scenario_id, .. } if scenario_id == ScenarioId::new(10)));
    }

    #[test]
    fn test_row_with_unknown_day_is_rejected() {
        let mut bad = row("TIME", r#"{"type":"TIME","start_hour":9,"start_minute":30}"#);
        bad.days = vec!["FUNDAY".to_string()];
        assert!(bad.into_snapshot(MemberId::new(1)).is_err());
    }
}
