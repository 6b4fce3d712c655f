//! Bounded concurrency for crawl passes
//!
//! A `TaskPool` is a counting semaphore. Every spawned task holds one permit
//! for its whole lifetime, so no more than `size` tasks of the pool are ever
//! running. Acquiring happens on the dispatching side: when the pool is
//! exhausted, the dispatch loop blocks until a task finishes.

use crate::SpiderError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// Counting token pool shared by the passes that use it
#[derive(Debug, Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl TaskPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a task
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Starts a batch of tasks drawing on this pool
    pub fn batch<T: Send + 'static>(&self) -> TaskBatch<T> {
        TaskBatch {
            pool: self.clone(),
            tasks: JoinSet::new(),
        }
    }
}

/// A pool slot held before its task is spawned
#[derive(Debug)]
pub struct Reservation {
    permit: OwnedSemaphorePermit,
}

/// A group of tasks that is joined as a whole
pub struct TaskBatch<T> {
    pool: TaskPool,
    tasks: JoinSet<T>,
}

impl<T: Send + 'static> TaskBatch<T> {
    /// Waits for a free slot without spawning anything yet
    ///
    /// Dropping the reservation gives the slot back.
    pub async fn reserve(&self) -> Result<Reservation, SpiderError> {
        let permit = Arc::clone(&self.pool.permits)
            .acquire_owned()
            .await
            .map_err(|_| SpiderError::PoolClosed)?;
        Ok(Reservation { permit })
    }

    /// Runs `task` in a slot reserved earlier
    pub fn spawn_reserved<F>(&mut self, reservation: Reservation, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permit = reservation.permit;
        self.tasks.spawn(async move {
            let output = task.await;
            drop(permit);
            output
        });
    }

    /// Waits for a slot, then runs `task` while holding it
    pub async fn spawn<F>(&mut self, task: F) -> Result<(), SpiderError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let reservation = self.reserve().await?;
        self.spawn_reserved(reservation, task);
        Ok(())
    }

    /// Waits for every task of the batch
    ///
    /// Outputs are returned in completion order. A panicked task is logged
    /// and contributes no output.
    pub async fn join(mut self) -> Vec<T> {
        let mut outputs = Vec::with_capacity(self.tasks.len());
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(output) => outputs.push(output),
                Err(e) => tracing::error!(error = %e, "crawl task failed to complete"),
            }
        }
        outputs
    }
}
