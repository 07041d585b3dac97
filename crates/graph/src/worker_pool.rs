// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker Pool (§4.3): bounded concurrency for step execution.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A size of 0 or 1 is not a useful bound for a concurrent pool; the pool
/// substitutes the host's CPU count instead of running serially by accident.
/// A size larger than the CPU count is also capped to it, since the
/// executor's work is provider-RPC bound rather than CPU bound beyond that.
fn normalize_size(requested: usize) -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if requested <= 1 || requested > cpus {
        cpus
    } else {
        requested
    }
}

#[derive(Debug, Error)]
#[error("{} task(s) failed: {}", .0.len(), .0.join("; "))]
pub struct PoolErrors(pub Vec<String>);

pub type BoxTaskError = Box<dyn std::error::Error + Send + Sync>;

/// Bounded-concurrency task pool. Tasks are submitted as futures and run on
/// the ambient tokio runtime; `submit` blocks the caller until a slot frees
/// up, `wait` blocks until everything submitted so far has completed.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<Result<(), BoxTaskError>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        WorkerPool {
            semaphore: Arc::new(Semaphore::new(normalize_size(size))),
            tasks: JoinSet::new(),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Submit a task. Blocks until a slot is free, then spawns it on a new
    /// lightweight worker. Errors from the task are collected under a
    /// dedicated mutex and never interrupt other running tasks.
    pub async fn submit<F, Fut>(&mut self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), BoxTaskError>> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        #[allow(clippy::expect_used)]
        let permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
        self.tasks.spawn(async move {
            let result = task().await;
            drop(permit);
            result
        });
    }

    /// Block until every submitted task has completed. Returns the
    /// aggregated error if any task failed. With `clear = true`, the error
    /// list is reset afterward so the pool can be reused.
    pub async fn wait(&mut self, clear: bool) -> Result<(), PoolErrors> {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.errors.lock().push(e.to_string()),
                Err(join_err) => self.errors.lock().push(join_err.to_string()),
            }
        }
        let errors = if clear {
            std::mem::take(&mut *self.errors.lock())
        } else {
            self.errors.lock().clone()
        };
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PoolErrors(errors))
        }
    }
}

#[cfg(test)]
#[path = "worker_pool_tests.rs"]
mod tests;
