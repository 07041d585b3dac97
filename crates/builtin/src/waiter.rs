// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output Waiter Store (§4.6.1): resolves `StackReference` reads against an
//! in-memory store rather than the backend when several stacks are
//! co-deployed in one process. Cycle detection maintains a directed
//! `waiter -> target` wait graph; a reachability probe from `target` back to
//! `waiter` rejects mutually dependent waits before either side blocks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dce_core::PropertyMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Identifies one of the stacks being driven in this process: `project/stack`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId {
    pub project: String,
    pub stack: String,
}

impl StackId {
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        StackId { project: project.into(), stack: stack.into() }
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.stack)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("circular dependency detected: {waiter} -> {target}")]
    CircularDependency { waiter: StackId, target: StackId },
    #[error("timed out waiting for outputs of {0}")]
    TimedOut(StackId),
}

#[derive(Default)]
struct Inner {
    outputs: HashMap<StackId, PropertyMap>,
    notifies: HashMap<StackId, Arc<Notify>>,
    /// `waiter -> targets it is currently blocked on`, the live wait graph.
    wait_edges: HashMap<StackId, HashSet<StackId>>,
}

impl Inner {
    fn notify_for(&mut self, id: &StackId) -> Arc<Notify> {
        self.notifies.entry(id.clone()).or_insert_with(|| Arc::new(Notify::new())).clone()
    }

    /// Whether `target` can already reach `waiter` through the existing wait
    /// graph — i.e. whether adding `waiter -> target` would close a cycle.
    fn reaches(&self, from: &StackId, to: &StackId) -> bool {
        let mut stack = vec![from.clone()];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if &node == to {
                return true;
            }
            if !seen.insert(node.clone()) {
                continue;
            }
            if let Some(edges) = self.wait_edges.get(&node) {
                stack.extend(edges.iter().cloned());
            }
        }
        false
    }
}

/// Process-scoped store resolving stack-reference reads across co-deployed
/// stacks. The driver owns one instance per deployment run.
pub struct OutputWaiterStore {
    co_deployed: HashSet<StackId>,
    inner: Mutex<Inner>,
}

impl OutputWaiterStore {
    pub fn new(co_deployed: impl IntoIterator<Item = StackId>) -> Self {
        OutputWaiterStore { co_deployed: co_deployed.into_iter().collect(), inner: Mutex::new(Inner::default()) }
    }

    pub fn is_co_deployed(&self, id: &StackId) -> bool {
        self.co_deployed.contains(id)
    }

    /// Publish outputs for `id` and wake everyone waiting on it.
    pub fn set_outputs(&self, id: StackId, outputs: PropertyMap) {
        let notify = {
            let mut inner = self.inner.lock();
            inner.outputs.insert(id.clone(), outputs);
            inner.notify_for(&id)
        };
        notify.notify_waiters();
    }

    /// Block until outputs for `target` are published, then return them.
    /// Fails immediately with [`WaitError::CircularDependency`] if
    /// `waiter -> target` would close a cycle in the wait graph. Fails with
    /// [`WaitError::TimedOut`] if `cancel` fires first.
    pub async fn wait_for_outputs(
        &self,
        cancel: &CancellationToken,
        waiter: StackId,
        target: StackId,
    ) -> Result<PropertyMap, WaitError> {
        if let Some(existing) = self.inner.lock().outputs.get(&target).cloned() {
            return Ok(existing);
        }

        {
            let mut inner = self.inner.lock();
            if inner.reaches(&target, &waiter) {
                return Err(WaitError::CircularDependency { waiter, target });
            }
            inner.wait_edges.entry(waiter.clone()).or_default().insert(target.clone());
        }

        let result = loop {
            // `notified()` must be created *before* the outputs check below:
            // tokio guarantees a `Notify::notify_waiters` call occurring any
            // time after `notified()` is created (even pre-poll) still wakes
            // it, which is what closes the set-then-wait race.
            let notify = self.inner.lock().notify_for(&target);
            let notified = notify.notified();
            if let Some(outputs) = self.inner.lock().outputs.get(&target).cloned() {
                break Ok(outputs);
            }
            tokio::select! {
                _ = notified => {
                    if let Some(outputs) = self.inner.lock().outputs.get(&target).cloned() {
                        break Ok(outputs);
                    }
                }
                _ = cancel.cancelled() => {
                    break Err(WaitError::TimedOut(target.clone()));
                }
            }
        };

        let mut inner = self.inner.lock();
        if let Some(edges) = inner.wait_edges.get_mut(&waiter) {
            edges.remove(&target);
            if edges.is_empty() {
                inner.wait_edges.remove(&waiter);
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "waiter_tests.rs"]
mod tests;
