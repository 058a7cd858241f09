//! Internal Event Ingestion Routes
//!
//! The scenario write side commits its own transaction and forwards the
//! resulting lifecycle event here. Each accepted event is published in a
//! unit of work that commits immediately, so listeners run exactly as they
//! would for an in-process write.
//!
//! Also exposes operational collection eviction. Neither route is meant to
//! be reachable from outside the service network.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chime_core::MemberId;
use chime_events::{DomainEventPublisher, NotificationEvent, UnitOfWork};
use chime_storage::{CacheCollection, NotificationCacheService};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Acknowledgement for an ingested event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventAccepted {
    /// Unit of work the event was published in
    pub unit_of_work_id: Uuid,
    pub event_type: String,
    pub member_id: MemberId,
}

/// Result of a collection eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvictionResponse {
    pub collection: String,
    pub evicted_keys: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /internal/notification-events - Publish a committed lifecycle event
#[utoipa::path(
    post,
    path = "/internal/notification-events",
    tag = "Internal",
    request_body = NotificationEvent,
    responses(
        (status = 202, description = "Event published", body = EventAccepted),
        (status = 400, description = "Condition out of range", body = ApiError),
        (status = 422, description = "Malformed event"),
    ),
)]
pub async fn ingest_event(
    State(publisher): State<DomainEventPublisher>,
    Json(event): Json<NotificationEvent>,
) -> ApiResult<(StatusCode, Json<EventAccepted>)> {
    event
        .validate()
        .map_err(|e| ApiError::invalid_input(format!("Invalid notification condition: {}", e)))?;

    let mut uow = UnitOfWork::begin();
    let accepted = EventAccepted {
        unit_of_work_id: uow.id(),
        event_type: event.event_type().to_string(),
        member_id: event.member_id(),
    };
    publisher.publish(&mut uow, event);
    uow.commit().await;

    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// POST /internal/cache/{collection}/evict - Drop every key of a collection
#[utoipa::path(
    post,
    path = "/internal/cache/{collection}/evict",
    tag = "Internal",
    params(
        ("collection" = String, Path, description = "`notifications` or `missions`"),
    ),
    responses(
        (status = 200, description = "Collection evicted", body = EvictionResponse),
        (status = 400, description = "Unknown collection", body = ApiError),
    ),
)]
pub async fn evict_collection(
    State(cache): State<Arc<NotificationCacheService>>,
    Path(name): Path<String>,
) -> ApiResult<Json<EvictionResponse>> {
    let collection = CacheCollection::from_name(&name)
        .ok_or_else(|| ApiError::invalid_input(format!("Unknown cache collection '{}'", name)))?;

    let evicted_keys = cache.evict_collection(collection).await?;

    Ok(Json(EvictionResponse {
        collection: name,
        evicted_keys,
    }))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the internal router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/notification-events", post(ingest_event))
        .route("/cache/:collection/evict", post(evict_collection))
}
