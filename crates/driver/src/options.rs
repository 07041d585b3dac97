// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment knobs (§4.10, §6): the plain configuration a driver run is
//! parameterized over. Kept free of any engine type beyond `TargetOptions`
//! so callers can build one without reaching into `dce-engine`.

use dce_core::TargetSet;
use dce_engine::TargetOptions;

#[derive(Debug, Clone)]
pub struct DeploymentOptions {
    /// Upper bound on concurrently in-flight step chains. Zero means "use
    /// the CPU count", mirroring [`dce_graph::WorkerPool`]'s own
    /// normalization.
    pub parallel: usize,
    /// Refresh resource state against providers before generating steps.
    pub refresh: bool,
    /// Refresh only: do not run the source at all, just reconcile state
    /// against live providers and finalize.
    pub refresh_only: bool,
    /// Keep draining the source and applying independent chains after one
    /// chain fails, rather than cancelling the run immediately.
    pub continue_on_error: bool,
    /// Run every step at preview granularity: no provider mutation calls.
    pub preview_only: bool,
    /// Restrict execution to these URNs (and, if `target_dependents`, their
    /// transitive dependents). Unconstrained by default.
    pub targets: TargetSet,
    pub target_dependents: bool,
    /// Exclude these URNs (and, if `exclude_dependents`, their transitive
    /// dependents) from execution.
    pub excludes: TargetSet,
    pub exclude_dependents: bool,
}

impl Default for DeploymentOptions {
    fn default() -> Self {
        Self {
            parallel: 0,
            refresh: false,
            refresh_only: false,
            continue_on_error: false,
            preview_only: false,
            targets: TargetSet::unconstrained(),
            target_dependents: false,
            excludes: TargetSet::unconstrained(),
            exclude_dependents: false,
        }
    }
}

impl DeploymentOptions {
    pub(crate) fn target_options(&self) -> TargetOptions {
        TargetOptions {
            targets: self.targets.clone(),
            target_dependents: self.target_dependents,
            excludes: self.excludes.clone(),
            exclude_dependents: self.exclude_dependents,
        }
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
