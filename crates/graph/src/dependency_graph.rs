// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency Graph (§4.4): built once from a snapshot's resource list.
//!
//! Edges: parent, dependencies, property-dependencies, deleted-with,
//! provider. Used to compute delete order (reverse topological), to expand
//! `--target-dependents`, and to gate a step on its dependencies' steps.

use std::collections::{HashMap, HashSet};

use dce_core::{ResourceState, Urn};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// `urn -> urns it directly depends on` (predecessors).
    edges: HashMap<Urn, Vec<Urn>>,
    /// Reverse of `edges`: `urn -> urns that directly depend on it`.
    reverse: HashMap<Urn, Vec<Urn>>,
}

impl DependencyGraph {
    pub fn build(resources: &[ResourceState]) -> Self {
        let mut edges: HashMap<Urn, Vec<Urn>> = HashMap::new();
        let mut reverse: HashMap<Urn, Vec<Urn>> = HashMap::new();

        for r in resources {
            let mut deps: Vec<Urn> = Vec::new();
            if let Some(parent) = &r.parent {
                deps.push(parent.clone());
            }
            deps.extend(r.dependencies.iter().cloned());
            for list in r.property_dependencies.values() {
                deps.extend(list.iter().cloned());
            }
            if let Some(dw) = &r.deleted_with {
                deps.push(dw.clone());
            }
            if let Some(provider) = &r.provider {
                deps.push(provider.urn());
            }
            deps.sort();
            deps.dedup();

            for dep in &deps {
                reverse.entry(dep.clone()).or_default().push(r.urn.clone());
            }
            edges.insert(r.urn.clone(), deps);
        }

        DependencyGraph { edges, reverse }
    }

    /// Direct predecessors of `urn` (what it depends on).
    pub fn dependencies_of(&self, urn: &Urn) -> &[Urn] {
        self.edges.get(urn).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct and transitive successors of `urn` (everything that, directly
    /// or indirectly, depends on it).
    pub fn dependents_of(&self, urn: &Urn) -> HashSet<Urn> {
        let mut seen = HashSet::new();
        let mut stack = vec![urn.clone()];
        while let Some(current) = stack.pop() {
            for dependent in self.reverse.get(&current).into_iter().flatten() {
                if seen.insert(dependent.clone()) {
                    stack.push(dependent.clone());
                }
            }
        }
        seen
    }

    /// Union of the transitive dependency closure of every URN in `urns`.
    pub fn dependencies_of_set(&self, urns: &[Urn]) -> HashSet<Urn> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Urn> = urns.to_vec();
        while let Some(current) = stack.pop() {
            for dep in self.dependencies_of(&current) {
                if seen.insert(dep.clone()) {
                    stack.push(dep.clone());
                }
            }
        }
        seen
    }

    /// A deletion order for `urns` that respects the graph: a resource is
    /// deleted only after everything that depends on it.
    pub fn reverse_topological(&self, urns: &[Urn]) -> Vec<Urn> {
        let wanted: HashSet<&Urn> = urns.iter().collect();
        let mut in_degree: HashMap<Urn, usize> = urns.iter().map(|u| (u.clone(), 0)).collect();
        for urn in urns {
            for dependent in self.reverse.get(urn).into_iter().flatten() {
                if wanted.contains(dependent) {
                    *in_degree.entry(urn.clone()).or_insert(0) += 1;
                }
            }
        }

        let mut ready: Vec<Urn> =
            in_degree.iter().filter(|(_, d)| **d == 0).map(|(u, _)| u.clone()).collect();
        ready.sort();
        let mut order = Vec::with_capacity(urns.len());
        while let Some(urn) = ready.pop() {
            order.push(urn.clone());
            for dep in self.dependencies_of(&urn) {
                if let Some(d) = in_degree.get_mut(dep) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(dep.clone());
                        ready.sort();
                    }
                }
            }
        }
        order
    }
}

#[cfg(test)]
#[path = "dependency_graph_tests.rs"]
mod tests;
