//! Chime Events - Lifecycle Events and Cache Listeners
//!
//! Scenario and notification lifecycle changes are published as typed
//! events into a [`UnitOfWork`]. On commit, the [`EventDispatcher`] routes
//! each event to its listeners, either inline on the committing task or on
//! the bounded [`ListenerPool`].
//!
//! ```text
//! write ──► publish ──► UnitOfWork ──commit──► dispatcher ──► listeners ──► cache
//!                           │                                    │
//!                        rollback: dropped              failure: invalidate_all
//! ```

pub mod dispatcher;
pub mod event;
pub mod listeners;
pub mod pool;
pub mod publisher;
pub mod unit_of_work;

pub use dispatcher::{EventDispatcher, ExecutionMode};
pub use event::{EventEnvelope, EventKind, NotificationEvent};
pub use listeners::{
    plan_for, register_cache_listeners, CacheSyncListener, ListenerStats, ListenerStatsSnapshot,
    NotificationListener, SyncPlan,
};
pub use pool::{ListenerPool, PoolStats, Submission, WorkerPoolConfig};
pub use publisher::DomainEventPublisher;
pub use unit_of_work::UnitOfWork;
