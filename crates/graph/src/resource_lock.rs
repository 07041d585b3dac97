// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource Lock (§4.2): three logical locks guarding concurrent mutation of
//! the *news*, *olds*, dependency graph, and step-in-flight tables.
//!
//! A single short-held `parking_lot::Mutex` guards the per-URN semaphore
//! table; the semaphores themselves do the actual waiting. Callers must
//! acquire all the locks they need for one step through `lock_resources` —
//! never by chaining separate `lock_resource` calls — which is what rules
//! out classic AB/BA deadlocks (verified in `deadlock_freedom` tests).

use std::collections::HashMap;
use std::sync::Arc;

use dce_core::Urn;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Default)]
struct LockTable {
    semaphores: HashMap<Urn, Arc<Semaphore>>,
}

impl LockTable {
    fn entry(&mut self, urn: &Urn) -> Arc<Semaphore> {
        self.semaphores.entry(urn.clone()).or_insert_with(|| Arc::new(Semaphore::new(1))).clone()
    }
}

/// A held lock over one or more resources. Dropping it releases every
/// permit it holds.
pub struct ResourceGuard {
    urns: Vec<Urn>,
    permits: Vec<OwnedSemaphorePermit>,
}

impl ResourceGuard {
    pub fn urns(&self) -> &[Urn] {
        &self.urns
    }
}

#[derive(Clone, Default)]
pub struct ResourceLock {
    table: Arc<Mutex<LockTable>>,
}

impl ResourceLock {
    pub fn new() -> Self {
        ResourceLock::default()
    }

    /// Exclusive lock over a single URN.
    pub async fn lock_resource(&self, urn: &Urn) -> ResourceGuard {
        self.lock_many(std::slice::from_ref(urn)).await
    }

    /// Exclusive lock over a set of URNs, acquired atomically. `select` runs
    /// under the short global lock so the resulting set can depend on
    /// current lock-table state, then every semaphore is acquired outside
    /// the global lock (the global lock only ever protects table lookups,
    /// never the potentially-long semaphore wait).
    pub async fn lock_resources<F>(&self, select: F) -> ResourceGuard
    where
        F: FnOnce() -> Vec<Urn>,
    {
        let urns = {
            let _table = self.table.lock();
            select()
        };
        self.lock_many(&urns).await
    }

    async fn lock_many(&self, urns: &[Urn]) -> ResourceGuard {
        // Acquire in a stable order (sorted) regardless of caller-supplied
        // order, so two calls racing over an overlapping set never deadlock
        // against each other.
        let mut sorted: Vec<Urn> = urns.to_vec();
        sorted.sort();
        sorted.dedup();

        let semaphores: Vec<Arc<Semaphore>> = {
            let mut table = self.table.lock();
            sorted.iter().map(|u| table.entry(u)).collect()
        };

        let mut permits = Vec::with_capacity(semaphores.len());
        for sem in semaphores {
            #[allow(clippy::expect_used)]
            let permit = sem.acquire_owned().await.expect("semaphore is never closed");
            permits.push(permit);
        }
        ResourceGuard { urns: sorted, permits }
    }

    /// Release form tailored to replacement chains: a `create-replacement`
    /// step holds the new URN's lock through to `delete-replaced`, at which
    /// point both the old and new copies' locks are released together.
    pub fn unlock_dependent_replaces(&self, guard: ResourceGuard) {
        drop(guard);
    }

    /// Temporarily release all permits in `guard` to run `f`, then
    /// re-acquire the same set before returning.
    pub async fn invert_lock<F, Fut, T>(&self, guard: ResourceGuard, f: F) -> (T, ResourceGuard)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let urns = guard.urns.clone();
        drop(guard);
        let result = f().await;
        let reacquired = self.lock_many(&urns).await;
        (result, reacquired)
    }
}

#[cfg(test)]
#[path = "resource_lock_tests.rs"]
mod tests;
