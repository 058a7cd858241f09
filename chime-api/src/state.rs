//! Shared application state for Axum routers.

use std::sync::Arc;

use chime_events::{
    register_cache_listeners, DomainEventPublisher, EventDispatcher, ListenerPool, ListenerStats,
};
use chime_storage::NotificationCacheService;

use crate::db::DbClient;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Read side of the notification cache.
    pub cache: Arc<NotificationCacheService>,
    /// Publishes lifecycle events after their unit of work commits.
    pub publisher: DomainEventPublisher,
    /// Worker pool that runs pooled cache listeners.
    pub pool: Arc<ListenerPool>,
    pub listener_stats: Arc<ListenerStats>,
    /// Relational source, when one is configured. Only used for readiness.
    pub db: Option<DbClient>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the cache listeners onto a dispatcher backed by `pool`.
    pub fn new(
        cache: Arc<NotificationCacheService>,
        pool: Arc<ListenerPool>,
        db: Option<DbClient>,
    ) -> Self {
        let mut dispatcher = EventDispatcher::new(pool.clone());
        let listener_stats = register_cache_listeners(&mut dispatcher, cache.clone());
        let publisher = DomainEventPublisher::new(Arc::new(dispatcher));

        Self {
            cache,
            publisher,
            pool,
            listener_stats,
            db,
            start_time: std::time::Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<NotificationCacheService>, cache);
crate::impl_from_ref!(DomainEventPublisher, publisher);
crate::impl_from_ref!(Arc<ListenerPool>, pool);
