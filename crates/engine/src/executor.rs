// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step Executor (§4.9): a bounded worker pool that applies step chains in
//! parallel, serializing only what the dependency graph and resource lock
//! require.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dce_core::{PropertyMap, ResourceState, Step, StepChain, Urn};
use dce_graph::{PoolErrors, ResourceLock, WorkerPool};
use dce_registry::Provider;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::step_apply::{apply_step, StepApplyError};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

/// A before/after lifecycle hook. Boxed rather than expressed with
/// `async-trait` so callers can register plain closures.
pub type HookFn = Arc<
    dyn Fn(&Step, bool) -> Pin<Box<dyn Future<Output = Result<(), HookError>> + Send>> + Send + Sync,
>;

struct HookEntry {
    hook: HookFn,
    on_dry_run: bool,
}

/// Named before/after hooks invoked synchronously around each step in a
/// chain. `on_dry_run` mirrors the *onDryRun* flag (§4.9): during preview,
/// hooks without it are skipped.
#[derive(Default)]
pub struct StepHooks {
    before: HashMap<String, HookEntry>,
    after: HashMap<String, HookEntry>,
}

impl StepHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_before(&mut self, name: impl Into<String>, on_dry_run: bool, hook: HookFn) {
        self.before.insert(name.into(), HookEntry { hook, on_dry_run });
    }

    pub fn register_after(&mut self, name: impl Into<String>, on_dry_run: bool, hook: HookFn) {
        self.after.insert(name.into(), HookEntry { hook, on_dry_run });
    }

    fn runs(entry: &HookEntry, preview_only: bool) -> bool {
        !preview_only || entry.on_dry_run
    }

    /// Before-hook errors fail the step.
    async fn run_before(&self, name: &str, step: &Step, preview_only: bool) -> Result<(), HookError> {
        if let Some(entry) = self.before.get(name) {
            if Self::runs(entry, preview_only) {
                (entry.hook)(step, preview_only).await?;
            }
        }
        Ok(())
    }

    /// After-hook errors are logged, not propagated (§4.9).
    async fn run_after(&self, name: &str, step: &Step, preview_only: bool) {
        if let Some(entry) = self.after.get(name) {
            if Self::runs(entry, preview_only) {
                if let Err(e) = (entry.hook)(step, preview_only).await {
                    tracing::warn!(step = %step.op, error = %e.0, "after-hook failed");
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Apply(#[from] StepApplyError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("no plan for resource {0}")]
    NoPlanForResource(Urn),
    #[error("deployment cancelled")]
    Cancelled,
    #[error(transparent)]
    Pool(#[from] PoolErrors),
}

/// In-flight bookkeeping for steps awaiting a matching register-outputs
/// event (§4.9 "Pending-news bookkeeping"). A step's provider-returned
/// outputs land here as soon as it applies; a register-outputs event merges
/// in whatever extra outputs the program computed and clears the entry.
#[derive(Default)]
pub struct PendingNews {
    inner: Mutex<HashMap<Urn, Arc<ResourceState>>>,
}

impl PendingNews {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, urn: Urn, state: Arc<ResourceState>) {
        self.inner.lock().insert(urn, state);
    }

    fn clear(&self, urn: &Urn) {
        self.inner.lock().remove(urn);
    }

    /// Peek the in-flight state for `urn` without consuming it. Used by a
    /// driver answering a `RegisterResource` event once the chain commits.
    pub fn get(&self, urn: &Urn) -> Option<Arc<ResourceState>> {
        self.inner.lock().get(urn).cloned()
    }

    /// Merge a register-outputs event's outputs into the pending entry for
    /// `urn`. Fails with [`ExecutorError::NoPlanForResource`] if no step is
    /// in flight for it — the generator always creates one first.
    pub fn acknowledge_outputs(
        &self,
        urn: &Urn,
        outputs: PropertyMap,
    ) -> Result<Arc<ResourceState>, ExecutorError> {
        let mut guard = self.inner.lock();
        let state = guard.remove(urn).ok_or_else(|| ExecutorError::NoPlanForResource(urn.clone()))?;
        let mut merged = (*state).clone();
        merged.outputs = outputs;
        let merged = Arc::new(merged);
        guard.insert(urn.clone(), merged.clone());
        Ok(merged)
    }
}

fn barrier_for(barriers: &Mutex<HashMap<Urn, Arc<Notify>>>, urn: &Urn) -> Arc<Notify> {
    barriers.lock().entry(urn.clone()).or_insert_with(|| Arc::new(Notify::new())).clone()
}

fn mark_done(barriers: &Mutex<HashMap<Urn, Arc<Notify>>>, done: &Mutex<HashSet<Urn>>, urn: &Urn) {
    done.lock().insert(urn.clone());
    if let Some(notify) = barriers.lock().get(urn) {
        notify.notify_waiters();
    }
}

async fn wait_for_dependencies(
    barriers: &Mutex<HashMap<Urn, Arc<Notify>>>,
    done: &Mutex<HashSet<Urn>>,
    deps: &[Urn],
    cancel: &CancellationToken,
) -> Result<(), ExecutorError> {
    for dep in deps {
        loop {
            if done.lock().contains(dep) {
                break;
            }
            // Create the `Notified` future before the recheck: tokio
            // guarantees a notification sent after creation (not necessarily
            // after polling) is not lost, closing the race between the
            // check above and a `mark_done` firing concurrently.
            let notify = barrier_for(barriers, dep);
            let notified = notify.notified();
            if done.lock().contains(dep) {
                break;
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            }
        }
    }
    Ok(())
}

/// Bounded-concurrency dispatcher over step chains (§4.9). One instance
/// drains an entire deployment: the driver calls [`StepExecutor::submit_chain`]
/// once per chain the generator produces, then [`StepExecutor::wait`] to
/// drain the pool and collect the aggregated error, if any.
pub struct StepExecutor {
    pool: WorkerPool,
    lock: ResourceLock,
    hooks: Arc<StepHooks>,
    pending: Arc<PendingNews>,
    news: Arc<Mutex<HashMap<Urn, Arc<ResourceState>>>>,
    barriers: Arc<Mutex<HashMap<Urn, Arc<Notify>>>>,
    done: Arc<Mutex<HashSet<Urn>>>,
    cancel: CancellationToken,
    continue_on_error: bool,
    failed: Arc<AtomicBool>,
}

impl StepExecutor {
    pub fn new(
        pool_size: usize,
        hooks: StepHooks,
        pending: Arc<PendingNews>,
        cancel: CancellationToken,
        continue_on_error: bool,
    ) -> Self {
        StepExecutor {
            pool: WorkerPool::new(pool_size),
            lock: ResourceLock::new(),
            hooks: Arc::new(hooks),
            pending,
            news: Arc::new(Mutex::new(HashMap::new())),
            barriers: Arc::new(Mutex::new(HashMap::new())),
            done: Arc::new(Mutex::new(HashSet::new())),
            cancel,
            continue_on_error,
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resource states as they stand once every submitted chain has
    /// completed — call after [`StepExecutor::wait`].
    pub fn news(&self) -> HashMap<Urn, Arc<ResourceState>> {
        self.news.lock().clone()
    }

    /// Submit one chain for execution. Blocks until a worker slot is free;
    /// the chain itself then runs in the background. `dependencies` are the
    /// URNs whose steps must reach their post-step event before this chain's
    /// steps may apply.
    pub async fn submit_chain(
        &mut self,
        chain: StepChain,
        dependencies: Vec<Urn>,
        provider: Option<Arc<dyn Provider>>,
        preview_only: bool,
    ) {
        if chain.is_empty() {
            return;
        }
        let urns: Vec<Urn> = chain.iter().map(|s| s.urn.clone()).collect();
        let lock = self.lock.clone();
        let hooks = self.hooks.clone();
        let pending = self.pending.clone();
        let news = self.news.clone();
        let barriers = self.barriers.clone();
        let done = self.done.clone();
        let cancel = self.cancel.clone();
        let continue_on_error = self.continue_on_error;
        let failed = self.failed.clone();

        self.pool
            .submit(move || async move {
                let result = run_chain(
                    &lock, &hooks, &pending, &news, &barriers, &done, &cancel, chain, dependencies,
                    &urns, provider, preview_only,
                )
                .await;
                if let Err(e) = &result {
                    if !matches!(e, ExecutorError::Cancelled) {
                        failed.store(true, Ordering::SeqCst);
                        if !continue_on_error {
                            cancel.cancel();
                        }
                    }
                }
                // Always mark the chain's resources done so dependents
                // waiting on it are not stuck forever behind a failure; with
                // `ContinueOnError=false` the cancellation above will also
                // unblock them with a cancelled error.
                for urn in &urns {
                    mark_done(&barriers, &done, urn);
                }
                result.map_err(|e| Box::new(e) as dce_graph::BoxTaskError)
            })
            .await;
    }

    /// Whether any chain submitted so far has failed (visible before
    /// [`StepExecutor::wait`] returns, for callers that want to stop feeding
    /// new chains early under `ContinueOnError=false`).
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Drain the pool and return the aggregated error, if any.
    pub async fn wait(&mut self) -> Result<(), ExecutorError> {
        self.pool.wait(true).await.map_err(ExecutorError::from)
    }

    /// Block until `urn`'s chain has reached its post-step barrier. A driver
    /// uses this to answer a source's `RegisterResource`/`ReadResource`
    /// callback only once the resource's steps have actually applied.
    pub async fn wait_for_completion(&self, urn: &Urn) -> Result<(), ExecutorError> {
        wait_for_dependencies(&self.barriers, &self.done, std::slice::from_ref(urn), &self.cancel).await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_chain(
    lock: &ResourceLock,
    hooks: &StepHooks,
    pending: &PendingNews,
    news: &Mutex<HashMap<Urn, Arc<ResourceState>>>,
    barriers: &Mutex<HashMap<Urn, Arc<Notify>>>,
    done: &Mutex<HashSet<Urn>>,
    cancel: &CancellationToken,
    chain: StepChain,
    dependencies: Vec<Urn>,
    urns: &[Urn],
    provider: Option<Arc<dyn Provider>>,
    preview_only: bool,
) -> Result<(), ExecutorError> {
    if cancel.is_cancelled() {
        return Err(ExecutorError::Cancelled);
    }

    let guard = lock.lock_resources(|| urns.to_vec()).await;
    wait_for_dependencies(barriers, done, &dependencies, cancel).await?;

    if cancel.is_cancelled() {
        lock.unlock_dependent_replaces(guard);
        return Err(ExecutorError::Cancelled);
    }

    let mut last_state: Option<Arc<ResourceState>> = None;
    for step in &chain {
        let hook_name = step.op.to_string();
        hooks.run_before(&hook_name, step, preview_only).await?;

        let (_status, new_state) = apply_step(step, provider.as_ref(), preview_only).await?;
        if step.op == dce_core::StepOp::DeleteReplaced {
            // This step deletes the physical resource the preceding
            // CreateReplacement/Replace steps already superseded; `urn`'s
            // live state is what those steps recorded, not this one.
            hooks.run_after(&hook_name, step, preview_only).await;
            continue;
        }
        match new_state {
            Some(state) => {
                let state = Arc::new(state);
                news.lock().insert(step.urn.clone(), state.clone());
                last_state = Some(state);
            }
            None => {
                news.lock().remove(&step.urn);
                last_state = None;
            }
        }

        hooks.run_after(&hook_name, step, preview_only).await;
    }

    for urn in urns {
        match &last_state {
            Some(state) => pending.insert(urn.clone(), state.clone()),
            None => pending.clear(urn),
        }
    }

    lock.unlock_dependent_replaces(guard);
    Ok(())
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
