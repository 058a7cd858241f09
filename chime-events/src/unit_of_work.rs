//! Unit of work with after-commit callbacks.
//!
//! Callbacks registered during a unit of work run only once it commits, in
//! registration order. A rollback, or dropping the unit of work without
//! committing, discards them.

use std::future::Future;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::debug;
use uuid::Uuid;

type AfterCommit = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Transactional scope that defers side effects until commit.
pub struct UnitOfWork {
    id: Uuid,
    after_commit: Vec<AfterCommit>,
}

impl UnitOfWork {
    /// Start a new unit of work.
    pub fn begin() -> Self {
        Self {
            id: Uuid::now_v7(),
            after_commit: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of callbacks waiting for commit.
    pub fn pending(&self) -> usize {
        self.after_commit.len()
    }

    /// Register a callback to run after a successful commit.
    pub fn after_commit<F, Fut>(&mut self, callback: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.after_commit
            .push(Box::new(move || callback().boxed()));
    }

    /// Commit and run every registered callback in order.
    pub async fn commit(mut self) {
        let callbacks = std::mem::take(&mut self.after_commit);
        debug!(uow_id = %self.id, callbacks = callbacks.len(), "Unit of work committed");
        for callback in callbacks {
            callback().await;
        }
    }

    /// Roll back, discarding every registered callback.
    pub fn rollback(mut self) {
        let discarded = std::mem::take(&mut self.after_commit).len();
        debug!(uow_id = %self.id, discarded, "Unit of work rolled back");
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.after_commit.is_empty() {
            debug!(
                uow_id = %self.id,
                discarded = self.after_commit.len(),
                "Unit of work dropped without commit"
            );
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("pending", &self.after_commit.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) -> BoxFuture<'static, ()>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let push = move |n: u32| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(n);
            }
            .boxed()
        };
        (log, push)
    }

    #[tokio::test]
    async fn test_commit_runs_callbacks_in_order() {
        let (log, push) = recorder();
        let mut uow = UnitOfWork::begin();
        for n in 1..=3 {
            let fut = push(n);
            uow.after_commit(move || fut);
        }
        assert_eq!(uow.pending(), 3);
        assert!(log.lock().unwrap().is_empty());

        uow.commit().await;
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rollback_discards_callbacks() {
        let (log, push) = recorder();
        let mut uow = UnitOfWork::begin();
        let fut = push(1);
        uow.after_commit(move || fut);
        uow.rollback();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_discards_callbacks() {
        let (log, push) = recorder();
        {
            let mut uow = UnitOfWork::begin();
            let fut = push(1);
            uow.after_commit(move || fut);
        }
        assert!(log.lock().unwrap().is_empty());
    }
}
