//! Bounded worker pool for asynchronous listeners.
//!
//! Core workers start with the pool and live until shutdown. When the queue
//! is full, a surge worker is started for the task as long as the pool is
//! below its maximum size; surge workers exit after idling for the
//! keep-alive period. When the queue is full and the pool is at its maximum,
//! the submitting task runs the work itself.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chime_core::ConfigError;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type Task = BoxFuture<'static, ()>;

pub const DEFAULT_CORE_SIZE: usize = 2;
pub const DEFAULT_MAX_SIZE: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Sizing of the listener worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Workers started with the pool (default: 2)
    pub core_size: usize,
    /// Upper bound on concurrent workers (default: 4)
    pub max_size: usize,
    /// Tasks buffered before surge workers or caller-runs kick in (default: 16)
    pub queue_capacity: usize,
    /// Idle time after which a surge worker exits (default: 30 seconds)
    pub keep_alive: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
        }
    }
}

impl WorkerPoolConfig {
    /// Create WorkerPoolConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CHIME_LISTENER_CORE_SIZE`: core workers (default: 2)
    /// - `CHIME_LISTENER_MAX_SIZE`: maximum workers (default: 4)
    /// - `CHIME_LISTENER_QUEUE_CAPACITY`: queue capacity (default: 16)
    /// - `CHIME_LISTENER_KEEP_ALIVE_SECS`: surge worker idle timeout (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let core_size = std::env::var("CHIME_LISTENER_CORE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CORE_SIZE);

        let max_size = std::env::var("CHIME_LISTENER_MAX_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_SIZE);

        let queue_capacity = std::env::var("CHIME_LISTENER_QUEUE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        let keep_alive = Duration::from_secs(
            std::env::var("CHIME_LISTENER_KEEP_ALIVE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_KEEP_ALIVE_SECS),
        );

        let config = Self {
            core_size,
            max_size,
            queue_capacity,
            keep_alive,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, value: usize, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        if self.core_size == 0 {
            return Err(invalid("CHIME_LISTENER_CORE_SIZE", self.core_size, "must be at least 1"));
        }
        if self.max_size < self.core_size {
            return Err(invalid(
                "CHIME_LISTENER_MAX_SIZE",
                self.max_size,
                "must not be smaller than the core size",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(invalid(
                "CHIME_LISTENER_QUEUE_CAPACITY",
                self.queue_capacity,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// POOL
// ============================================================================

/// How a submitted task was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Buffered for an existing worker.
    Queued,
    /// Handed to a newly started surge worker.
    SurgeWorker,
    /// Executed by the submitter because the pool was saturated or closed.
    CallerRan,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: u64,
    pub surge_started: u64,
    pub caller_runs: u64,
    pub completed: u64,
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct Counters {
    workers: AtomicUsize,
    queued: AtomicU64,
    surge_started: AtomicU64,
    caller_runs: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

struct Shared {
    receiver: Mutex<mpsc::Receiver<Task>>,
    counters: Counters,
    max_size: usize,
    keep_alive: Duration,
}

/// Bounded worker pool with caller-runs backpressure.
pub struct ListenerPool {
    sender: RwLock<Option<mpsc::Sender<Task>>>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    config: WorkerPoolConfig,
}

impl ListenerPool {
    /// Start the pool and its core workers. Must be called inside a Tokio runtime.
    pub fn start(config: WorkerPoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let shared = Arc::new(Shared {
            receiver: Mutex::new(receiver),
            counters: Counters::default(),
            max_size: config.max_size,
            keep_alive: config.keep_alive,
        });

        let handles = (0..config.core_size)
            .map(|index| {
                shared.counters.workers.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(run_worker(shared.clone(), index, None, None))
            })
            .collect();

        info!(
            core_size = config.core_size,
            max_size = config.max_size,
            queue_capacity = config.queue_capacity,
            "Listener pool started"
        );

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            shared,
            handles: Mutex::new(handles),
            config,
        })
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Submit a task.
    pub async fn submit<F>(&self, task: F) -> Submission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task: Task = task.boxed();
        let sender = self.sender.read().await.clone();

        let task = match sender {
            Some(sender) => match sender.try_send(task) {
                Ok(()) => {
                    self.shared.counters.queued.fetch_add(1, Ordering::Relaxed);
                    return Submission::Queued;
                }
                Err(mpsc::error::TrySendError::Full(task)) => task,
                Err(mpsc::error::TrySendError::Closed(task)) => {
                    warn!("Listener pool closed, running task on caller");
                    return self.run_on_caller(task).await;
                }
            },
            None => {
                warn!("Listener pool shut down, running task on caller");
                return self.run_on_caller(task).await;
            }
        };

        if self.reserve_worker_slot() {
            let shared = self.shared.clone();
            let index = shared.counters.surge_started.fetch_add(1, Ordering::Relaxed) as usize;
            debug!(index, "Queue full, starting surge worker");
            let handle = tokio::spawn(run_worker(
                shared,
                self.config.core_size + index,
                Some(task),
                Some(self.config.keep_alive),
            ));
            let mut handles = self.handles.lock().await;
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
            return Submission::SurgeWorker;
        }

        debug!("Listener pool saturated, running task on caller");
        self.run_on_caller(task).await
    }

    async fn run_on_caller(&self, task: Task) -> Submission {
        self.shared
            .counters
            .caller_runs
            .fetch_add(1, Ordering::Relaxed);
        execute(&self.shared, task).await;
        Submission::CallerRan
    }

    fn reserve_worker_slot(&self) -> bool {
        let workers = &self.shared.counters.workers;
        let mut current = workers.load(Ordering::SeqCst);
        loop {
            if current >= self.shared.max_size {
                return false;
            }
            match workers.compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.shared.counters;
        PoolStats {
            workers: c.workers.load(Ordering::SeqCst),
            queued: c.queued.load(Ordering::Relaxed),
            surge_started: c.surge_started.load(Ordering::Relaxed),
            caller_runs: c.caller_runs.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            panicked: c.panicked.load(Ordering::Relaxed),
        }
    }

    /// Stop accepting work, let workers drain the queue, and wait for them.
    ///
    /// Returns `false` if the workers did not finish within `grace`.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.sender.write().await.take();
        let handles = std::mem::take(&mut *self.handles.lock().await);

        let drained = tokio::time::timeout(grace, async {
            for handle in handles {
                if let Err(e) = handle.await {
                    error!(error = %e, "Listener worker ended abnormally");
                }
            }
        })
        .await
        .is_ok();

        if drained {
            info!("Listener pool shut down");
        } else {
            warn!(grace_ms = grace.as_millis() as u64, "Listener pool shutdown timed out");
        }
        drained
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    index: usize,
    first: Option<Task>,
    keep_alive: Option<Duration>,
) {
    if let Some(task) = first {
        execute(&shared, task).await;
    }

    loop {
        let next = async {
            let mut receiver = shared.receiver.lock().await;
            receiver.recv().await
        };
        let task = match keep_alive {
            Some(idle) => match tokio::time::timeout(idle, next).await {
                Ok(task) => task,
                Err(_) => {
                    debug!(index, "Surge worker idle, exiting");
                    break;
                }
            },
            None => next.await,
        };

        match task {
            Some(task) => execute(&shared, task).await,
            None => break,
        }
    }

    shared.counters.workers.fetch_sub(1, Ordering::SeqCst);
}

async fn execute(shared: &Shared, task: Task) {
    match AssertUnwindSafe(task).catch_unwind().await {
        Ok(()) => {
            shared.counters.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(_) => {
            shared.counters.panicked.fetch_add(1, Ordering::Relaxed);
            error!("Listener task panicked");
        }
    }
}
