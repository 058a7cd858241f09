//! Domain event publisher.

use std::sync::Arc;

use tracing::debug;

use crate::dispatcher::EventDispatcher;
use crate::event::{EventEnvelope, NotificationEvent};
use crate::unit_of_work::UnitOfWork;

/// Publishes lifecycle events into a unit of work.
///
/// Publishing only registers the dispatch; listeners see the event after the
/// unit of work commits, and never if it rolls back.
#[derive(Clone)]
pub struct DomainEventPublisher {
    dispatcher: Arc<EventDispatcher>,
}

impl DomainEventPublisher {
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn publish(&self, uow: &mut UnitOfWork, event: NotificationEvent) {
        let envelope = Arc::new(EventEnvelope::new(event));
        debug!(
            uow_id = %uow.id(),
            event_id = %envelope.event_id,
            event_type = envelope.event.event_type(),
            member_id = %envelope.event.member_id(),
            "Event published"
        );

        let dispatcher = self.dispatcher.clone();
        uow.after_commit(move || async move { dispatcher.dispatch(envelope).await });
    }
}
