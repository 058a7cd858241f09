//! Explicit event-kind to listener routing.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::event::{EventEnvelope, EventKind};
use crate::listeners::NotificationListener;
use crate::pool::{ListenerPool, Submission};

/// Where a listener runs relative to the committing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On the committing task, before `commit` returns.
    Inline,
    /// On the listener worker pool.
    Pooled,
}

struct Registration {
    listener: Arc<dyn NotificationListener>,
    mode: ExecutionMode,
}

/// Routes each event to the listeners registered for its kind, in
/// registration order.
pub struct EventDispatcher {
    routes: HashMap<EventKind, Vec<Registration>>,
    pool: Arc<ListenerPool>,
}

impl EventDispatcher {
    pub fn new(pool: Arc<ListenerPool>) -> Self {
        Self {
            routes: HashMap::new(),
            pool,
        }
    }

    /// Register a listener for one event kind.
    pub fn register(
        &mut self,
        kind: EventKind,
        listener: Arc<dyn NotificationListener>,
        mode: ExecutionMode,
    ) -> &mut Self {
        debug!(
            event_type = kind.as_str(),
            listener = listener.name(),
            ?mode,
            "Registered listener"
        );
        self.routes
            .entry(kind)
            .or_default()
            .push(Registration { listener, mode });
        self
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.routes.get(&kind).map_or(0, Vec::len)
    }

    pub fn pool(&self) -> &Arc<ListenerPool> {
        &self.pool
    }

    /// Deliver an event to every listener registered for its kind.
    ///
    /// Inline listeners have finished when this returns; pooled listeners
    /// have been handed to the pool (or run here if the pool is saturated).
    pub async fn dispatch(&self, envelope: Arc<EventEnvelope>) {
        let kind = envelope.event.kind();
        let Some(registrations) = self.routes.get(&kind) else {
            trace!(event_type = kind.as_str(), "No listeners registered");
            return;
        };

        for registration in registrations {
            match registration.mode {
                ExecutionMode::Inline => {
                    registration.listener.handle(&envelope).await;
                }
                ExecutionMode::Pooled => {
                    let listener = registration.listener.clone();
                    let envelope = envelope.clone();
                    let submission = self
                        .pool
                        .submit(async move { listener.handle(&envelope).await })
                        .await;
                    if submission == Submission::CallerRan {
                        debug!(
                            event_type = kind.as_str(),
                            listener = registration.listener.name(),
                            "Pool saturated, listener ran on committing task"
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NotificationEvent;
    use crate::pool::WorkerPoolConfig;
    use async_trait::async_trait;
    use chime_core::MemberId;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl NotificationListener for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, _envelope: &EventEnvelope) {
            self.log.lock().unwrap().push(self.name);
        }
    }

    fn toggle() -> Arc<EventEnvelope> {
        Arc::new(EventEnvelope::new(NotificationEvent::MemberNotificationsToggled {
            member_id: MemberId::new(1),
            active: false,
        }))
    }

    #[tokio::test]
    async fn test_inline_listeners_run_in_registration_order() {
        let pool = Arc::new(ListenerPool::start(WorkerPoolConfig::default()).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new(pool.clone());
        for name in ["first", "second", "third"] {
            dispatcher.register(
                EventKind::MemberNotificationsToggled,
                Arc::new(Recorder {
                    name,
                    log: log.clone(),
                }),
                ExecutionMode::Inline,
            );
        }

        dispatcher.dispatch(toggle()).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        pool.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_pooled_listener_runs_on_pool() {
        let pool = Arc::new(ListenerPool::start(WorkerPoolConfig::default()).unwrap());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new(pool.clone());
        dispatcher.register(
            EventKind::MemberNotificationsToggled,
            Arc::new(Recorder {
                name: "pooled",
                log: log.clone(),
            }),
            ExecutionMode::Pooled,
        );

        dispatcher.dispatch(toggle()).await;
        assert!(pool.shutdown(Duration::from_secs(1)).await);
        assert_eq!(*log.lock().unwrap(), vec!["pooled"]);
    }

    #[tokio::test]
    async fn test_unrouted_event_is_ignored() {
        let pool = Arc::new(ListenerPool::start(WorkerPoolConfig::default()).unwrap());
        let dispatcher = EventDispatcher::new(pool.clone());
        assert_eq!(dispatcher.listener_count(EventKind::ScenarioCreated), 0);
        dispatcher.dispatch(toggle()).await;
        pool.shutdown(Duration::from_secs(1)).await;
    }
}
