//! Chime API - HTTP surface for the scenario notification cache
//!
//! Serves cached notification lists with ETag revalidation, accepts
//! committed lifecycle events from the write side, and reads the
//! PostgreSQL source of truth when a member's cache must be rebuilt.

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig, PgNotificationSource};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use extractors::{MemberContext, PathId, MEMBER_ID_HEADER};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::AppState;
