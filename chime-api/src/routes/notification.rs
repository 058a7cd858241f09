//! Notification Read Routes
//!
//! Cached reads of a member's scenario notifications. The list endpoint
//! honours `If-None-Match` against the member's version token.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chime_core::{
    DayOfWeek, DeliveryMethod, NotificationCondition, NotificationId, NotificationType, ScenarioId,
};
use chime_storage::{
    CacheEntry, ConditionalList, IfNoneMatch, NotificationCacheService, NotificationList,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{MemberContext, PathId};
use crate::state::AppState;
use crate::telemetry::METRICS;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// One scenario with its active notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScenarioNotificationResponse {
    pub scenario_id: ScenarioId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub position: i32,
    pub notification_id: NotificationId,
    pub notification_type: NotificationType,
    pub delivery_method: DeliveryMethod,
    pub days: Vec<DayOfWeek>,
    pub condition: NotificationCondition,
}

impl TryFrom<CacheEntry> for ScenarioNotificationResponse {
    type Error = ApiError;

    fn try_from(entry: CacheEntry) -> Result<Self, Self::Error> {
        let condition = entry.decode_condition()?;
        Ok(Self {
            scenario_id: entry.scenario_id,
            name: entry.name,
            memo: entry.memo,
            position: entry.position,
            notification_id: entry.notification_id,
            notification_type: entry.notification_type,
            delivery_method: entry.delivery_method,
            days: entry.days,
            condition,
        })
    }
}

/// A member's notification list with its version token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationListResponse {
    /// Version token, unquoted. The `ETag` header carries the quoted form.
    pub etag: String,
    pub scenarios: Vec<ScenarioNotificationResponse>,
}

impl TryFrom<NotificationList> for NotificationListResponse {
    type Error = ApiError;

    fn try_from(list: NotificationList) -> Result<Self, Self::Error> {
        let scenarios = list
            .entries
            .into_iter()
            .map(ScenarioNotificationResponse::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            etag: list.etag.as_str().to_string(),
            scenarios,
        })
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

fn record_read(endpoint: &str, outcome: &str) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_read(endpoint, outcome);
    }
}

/// GET /notifications/scenarios - List the member's active notifications
#[utoipa::path(
    get,
    path = "/notifications/scenarios",
    tag = "Notifications",
    params(
        ("X-Member-Id" = i64, Header, description = "Authenticated member id"),
        ("If-None-Match" = Option<String>, Header, description = "Previously returned ETag"),
    ),
    responses(
        (status = 200, description = "Current list", body = NotificationListResponse,
            headers(("ETag" = String, description = "Quoted version token"))),
        (status = 304, description = "List unchanged since the given ETag",
            headers(("ETag" = String, description = "Quoted version token"))),
        (status = 401, description = "Missing member identity", body = ApiError),
        (status = 503, description = "Source of truth unavailable", body = ApiError),
    ),
)]
pub async fn list_notifications(
    State(cache): State<Arc<NotificationCacheService>>,
    member: MemberContext,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .and_then(IfNoneMatch::parse);

    let result = cache
        .get_list_if_none_match(member.member_id, if_none_match.as_ref())
        .await;

    match result {
        Ok(ConditionalList::NotModified(token)) => {
            record_read("list", "not_modified");
            Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, token.to_etag())]).into_response())
        }
        Ok(ConditionalList::Modified(list)) => {
            record_read("list", "ok");
            let etag = list.etag.to_etag();
            let body = NotificationListResponse::try_from(list)?;
            Ok((StatusCode::OK, [(header::ETAG, etag)], Json(body)).into_response())
        }
        Err(e) => {
            record_read("list", "error");
            Err(e.into())
        }
    }
}

/// GET /notifications/scenarios/{scenario_id} - One scenario's notification
#[utoipa::path(
    get,
    path = "/notifications/scenarios/{scenario_id}",
    tag = "Notifications",
    params(
        ("X-Member-Id" = i64, Header, description = "Authenticated member id"),
        ("scenario_id" = i64, Path, description = "Scenario id"),
    ),
    responses(
        (status = 200, description = "Cached notification", body = ScenarioNotificationResponse),
        (status = 400, description = "Malformed scenario id", body = ApiError),
        (status = 401, description = "Missing member identity", body = ApiError),
        (status = 404, description = "No active notification for the scenario", body = ApiError),
    ),
)]
pub async fn get_notification(
    State(cache): State<Arc<NotificationCacheService>>,
    member: MemberContext,
    PathId(scenario_id): PathId<ScenarioId>,
) -> ApiResult<Json<ScenarioNotificationResponse>> {
    match cache.get_single(member.member_id, scenario_id).await {
        Ok(entry) => {
            record_read("single", "ok");
            Ok(Json(ScenarioNotificationResponse::try_from(entry)?))
        }
        Err(e) => {
            record_read(
                "single",
                if e.is_not_found() { "not_found" } else { "error" },
            );
            Err(e.into())
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the notification read router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/scenarios", get(list_notifications))
        .route("/scenarios/:scenario_id", get(get_notification))
}
