// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot assembly (§4.8 step 6, §8 property 1): turn the executor's
//! per-URN final states into a new, validated [`Snapshot`].
//!
//! A run only touches the URNs it actually submitted a chain for (§4.1
//! targeting can leave the rest of the old snapshot untouched); everything
//! else from the old snapshot, tombstones included, carries forward as-is.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dce_core::{IntegrityError, Manifest, PendingOperation, ResourceState, Snapshot, Urn};
use dce_graph::DependencyGraph;

/// Assemble and validate the post-run snapshot.
///
/// `submitted` is every URN the driver handed a step chain to this run
/// (regardless of outcome); its absence from `news` means that chain's
/// final step deleted the resource. A URN outside `submitted` was never
/// touched (out of `--target` scope, or simply absent from the program)
/// and is carried over from `old` unchanged.
pub fn assemble(
    old: &Snapshot,
    manifest: Manifest,
    submitted: &HashSet<Urn>,
    news: &HashMap<Urn, Arc<ResourceState>>,
    pending_operations: Vec<PendingOperation>,
) -> Result<Snapshot, IntegrityError> {
    let mut merged: Vec<ResourceState> = Vec::with_capacity(old.resources.len() + news.len());

    for r in &old.resources {
        if !submitted.contains(&r.urn) {
            merged.push(r.clone());
        }
    }
    for state in news.values() {
        merged.push(state.as_ref().clone());
    }

    let all_urns: Vec<Urn> = merged.iter().map(|r| r.urn.clone()).collect();
    let graph = DependencyGraph::build(&merged);
    // `reverse_topological` returns a valid *deletion* order (dependents
    // first); a snapshot wants the opposite, dependency-first order so
    // every referent precedes its referrer.
    let mut order = graph.reverse_topological(&all_urns);
    order.reverse();

    let by_urn: HashMap<Urn, ResourceState> = merged.into_iter().map(|r| (r.urn.clone(), r)).collect();
    let resources: Vec<ResourceState> = order
        .into_iter()
        .filter_map(|urn| by_urn.get(&urn).cloned())
        .collect();

    let snapshot = Snapshot {
        manifest,
        secrets_manager: old.secrets_manager.clone(),
        resources,
        pending_operations,
    };
    snapshot.validate()?;
    Ok(snapshot)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
