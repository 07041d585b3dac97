// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step Generator (§4.8): turns one incoming goal event into zero or more
//! steps by diffing against the previous snapshot. Source events are
//! consumed serially (§5), so the generator's own bookkeeping — claimed
//! aliases, observed URNs, duplicate detection — needs only a short-lived
//! lock around the synchronous part of each call, not cross-call isolation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dce_core::{
    maps_equal_ignoring, CustomTimeouts, Goal, PropertyMap, ProviderRef, ResourceState, Step,
    StepChain, StepOp, TargetSet, Urn, ValidationError,
};
use dce_graph::DependencyGraph;
use dce_registry::{Provider, ProviderCallError};
use parking_lot::Mutex;

use crate::alias::{resolve_aliases, AliasError};

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Alias(#[from] AliasError),
    #[error(transparent)]
    Provider(#[from] ProviderCallError),
    #[error("provider rejected inputs for {urn}: {failures:?}")]
    CheckFailed { urn: Urn, failures: Vec<String> },
    #[error("could not find parent {parent}")]
    CouldNotFindParent { parent: Urn },
    #[error("step against {0} requires a provider but none is configured")]
    MissingProvider(Urn),
}

/// `--target`/`--exclude` scoping (§4.8 "Targeting with exclusion").
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    pub targets: TargetSet,
    pub target_dependents: bool,
    pub excludes: TargetSet,
    pub exclude_dependents: bool,
}

#[derive(Default)]
struct GenState {
    claimed_aliases: HashSet<Urn>,
    live_urns: HashSet<Urn>,
    observed: HashSet<Urn>,
    alias_candidates: HashMap<Urn, Vec<Urn>>,
}

pub struct StepGenerator {
    stack: String,
    project: String,
    old_by_urn: HashMap<Urn, Arc<ResourceState>>,
    graph: DependencyGraph,
    options: TargetOptions,
    state: Mutex<GenState>,
}

impl StepGenerator {
    /// `old_resources` is the previous snapshot's full resource list,
    /// tombstones included (they feed the dependency graph but are not
    /// themselves eligible `old` matches).
    pub fn new(
        stack: impl Into<String>,
        project: impl Into<String>,
        old_resources: &[ResourceState],
        options: TargetOptions,
    ) -> Self {
        let old_by_urn = old_resources
            .iter()
            .filter(|r| !r.delete)
            .map(|r| (r.urn.clone(), Arc::new(r.clone())))
            .collect();
        let graph = DependencyGraph::build(old_resources);
        StepGenerator {
            stack: stack.into(),
            project: project.into(),
            old_by_urn,
            graph,
            options,
            state: Mutex::new(GenState::default()),
        }
    }

    /// Registers a parent URN this generator never itself produced a step
    /// for — namely a `Construct` sub-stack, intercepted before it reaches
    /// the generator (`dce-driver`'s job) — so resources naming it as their
    /// parent still resolve.
    pub fn adopt_external_parent(&self, urn: &Urn) {
        self.state.lock().live_urns.insert(urn.clone());
    }

    fn resolve_parent(&self, parent: Option<&Urn>) -> Result<Option<Urn>, GeneratorError> {
        match parent {
            None => Ok(None),
            Some(p) if p.as_str().is_empty() => Ok(None),
            Some(p) if *p == Urn::root_stack(&self.stack, &self.project) => Ok(Some(p.clone())),
            Some(p) => {
                let registered =
                    self.old_by_urn.contains_key(p) || self.state.lock().live_urns.contains(p);
                if registered {
                    Ok(Some(p.clone()))
                } else {
                    Err(GeneratorError::CouldNotFindParent { parent: p.clone() })
                }
            }
        }
    }

    fn with_provider(&self, step: Step, provider_ref: &Option<ProviderRef>) -> Step {
        match provider_ref {
            Some(p) => step.with_provider(p.clone()),
            None => step,
        }
    }

    fn is_targeted(&self, urn: &Urn) -> bool {
        let targeted = self.options.targets.is_unconstrained()
            || self.options.targets.contains(urn)
            || (self.options.target_dependents
                && self
                    .old_by_urn
                    .keys()
                    .any(|t| self.options.targets.contains(t) && self.graph.dependents_of(t).contains(urn)));
        targeted && !self.is_excluded(urn)
    }

    fn is_excluded(&self, urn: &Urn) -> bool {
        if self.options.excludes.is_unconstrained() {
            return false;
        }
        if self.options.excludes.contains(urn) {
            return true;
        }
        self.options.exclude_dependents
            && self
                .old_by_urn
                .keys()
                .any(|t| self.options.excludes.contains(t) && self.graph.dependents_of(t).contains(urn))
    }

    /// Suppress `chain` to a no-op `same` (or drop it entirely for a
    /// would-be create) when `urn` falls outside the configured target set.
    fn apply_targeting(
        &self,
        urn: Urn,
        chain: StepChain,
        old_state: Option<Arc<ResourceState>>,
    ) -> StepChain {
        if self.is_targeted(&urn) {
            return chain;
        }
        match old_state {
            Some(old) => vec![Step::new(StepOp::Same, urn).with_old(old.clone()).with_new(old)],
            None => Vec::new(),
        }
    }

    /// Register-resource event (§4.8).
    pub async fn register_resource(
        &self,
        goal: &Goal,
        provider: Option<&Arc<dyn Provider>>,
    ) -> Result<StepChain, GeneratorError> {
        let parent = self.resolve_parent(goal.parent.as_ref())?;
        let parent_qualified_type = parent.as_ref().map(Urn::qualified_type).unwrap_or_default();
        let urn = Urn::new(&self.stack, &self.project, parent_qualified_type, &goal.ty, &goal.name);

        let provider_ref: Option<ProviderRef> = if goal.custom {
            match goal.provider.as_deref() {
                None | Some("") => None,
                Some(raw) => Some(raw.parse::<ProviderRef>().map_err(|e| {
                    ValidationError::BadProviderReference { urn: urn.clone(), reason: e.to_string() }
                })?),
            }
        } else {
            None
        };

        let parent_candidates = match &parent {
            Some(p) => self.state.lock().alias_candidates.get(p).cloned().unwrap_or_default(),
            None => Vec::new(),
        };

        let resolution = {
            let mut state = self.state.lock();
            if !state.live_urns.insert(urn.clone()) {
                return Err(ValidationError::DuplicateUrn(urn).into());
            }
            state.observed.insert(urn.clone());
            let live_urns = state.live_urns.clone();
            let old_urns: HashSet<Urn> = self.old_by_urn.keys().cloned().collect();
            let resolution = resolve_aliases(
                &urn,
                &goal.ty,
                &goal.name,
                parent.as_ref(),
                &parent_candidates,
                &goal.aliases,
                &old_urns,
                &live_urns,
                &mut state.claimed_aliases,
            )?;
            state.alias_candidates.insert(urn.clone(), resolution.candidate_urns.clone());
            resolution
        };

        let old_urn =
            resolution.predecessor.clone().or_else(|| self.old_by_urn.contains_key(&urn).then(|| urn.clone()));
        let old_state = old_urn.as_ref().and_then(|u| self.old_by_urn.get(u)).cloned();

        let new_state = Arc::new(ResourceState {
            urn: urn.clone(),
            ty: goal.ty.clone(),
            name: goal.name.clone(),
            provider: provider_ref.clone(),
            custom: goal.custom,
            external: false,
            id: String::new(),
            inputs: goal.properties.clone(),
            outputs: PropertyMap::new(),
            parent: parent.clone(),
            dependencies: goal.dependencies.clone(),
            property_dependencies: indexmap::IndexMap::new(),
            deleted_with: goal.deleted_with.clone(),
            protect: goal.protect,
            retain_on_delete: goal.retain_on_delete,
            delete: false,
            pending_replacement: false,
            import_id: goal.import_id.clone(),
            aliases: resolution.candidate_urns.clone(),
            custom_timeouts: goal.custom_timeouts,
            additional_secret_outputs: goal.additional_secret_outputs.clone(),
            ignore_changes: goal.ignore_changes.clone(),
            replace_on_changes: goal.replace_on_changes.clone(),
            init_errors: Vec::new(),
            view_of: None,
        });

        let chain = match &old_state {
            None => {
                let op = if goal.import_id.is_some() { StepOp::Import } else { StepOp::Create };
                vec![self.with_provider(Step::new(op, urn.clone()).with_new(new_state.clone()), &provider_ref)]
            }
            Some(old) => {
                let unchanged = old.ty == goal.ty
                    && old.provider == provider_ref
                    && maps_equal_ignoring(&old.inputs, &goal.properties, &goal.ignore_changes);
                if unchanged {
                    vec![Step::new(StepOp::Same, urn.clone()).with_old(old.clone()).with_new(new_state)]
                } else {
                    let provider =
                        provider.ok_or_else(|| GeneratorError::MissingProvider(urn.clone()))?;
                    let checked = provider.check(&urn, &old.inputs, &goal.properties).await?;
                    if !checked.failures.is_empty() {
                        return Err(GeneratorError::CheckFailed {
                            urn: urn.clone(),
                            failures: checked.failures,
                        });
                    }
                    let diff = provider
                        .diff(&urn, &old.inputs, &checked.inputs, &goal.ignore_changes)
                        .await?;

                    let forced_initerror = old.wants_initerror_replace();
                    let is_replace = forced_initerror
                        || diff.replace_requested
                        || !diff.replace_keys.is_empty()
                        || goal
                            .replace_on_changes
                            .iter()
                            .any(|k| diff.changed_keys.iter().any(|c| c == k));

                    if is_replace {
                        if old.protect {
                            return Err(ValidationError::ProtectedResource {
                                urn: urn.clone(),
                                attempted: "replaced",
                            }
                            .into());
                        }
                        let mut replacement = (*new_state).clone();
                        replacement.inputs = checked.inputs;
                        let replacement = Arc::new(replacement);
                        vec![
                            self.with_provider(
                                Step::new(StepOp::CreateReplacement, urn.clone())
                                    .with_new(replacement.clone()),
                                &provider_ref,
                            ),
                            Step::new(StepOp::Replace, urn.clone()).with_new(replacement),
                            self.with_provider(
                                Step::new(StepOp::DeleteReplaced, urn.clone()).with_old(old.clone()),
                                &old.provider,
                            ),
                        ]
                    } else if diff.changed_keys.is_empty() {
                        vec![Step::new(StepOp::Same, urn.clone()).with_old(old.clone()).with_new(new_state)]
                    } else {
                        let mut updated = (*new_state).clone();
                        updated.inputs = checked.inputs;
                        vec![self.with_provider(
                            Step::new(StepOp::Update, urn.clone())
                                .with_old(old.clone())
                                .with_new(Arc::new(updated)),
                            &provider_ref,
                        )]
                    }
                }
            }
        };

        Ok(self.apply_targeting(urn, chain, old_state))
    }

    /// Read-resource event (§4.8).
    #[allow(clippy::too_many_arguments)]
    pub fn read_resource(
        &self,
        id: &str,
        ty: &str,
        name: &str,
        parent: Option<&Urn>,
        props: &PropertyMap,
        provider_ref: Option<ProviderRef>,
    ) -> Result<StepChain, GeneratorError> {
        let parent = self.resolve_parent(parent)?;
        let parent_qualified_type = parent.as_ref().map(Urn::qualified_type).unwrap_or_default();
        let urn = Urn::new(&self.stack, &self.project, parent_qualified_type, ty, name);

        {
            let mut state = self.state.lock();
            state.live_urns.insert(urn.clone());
            state.observed.insert(urn.clone());
        }

        let new_state = Arc::new(ResourceState {
            urn: urn.clone(),
            ty: ty.to_string(),
            name: name.to_string(),
            provider: provider_ref.clone(),
            custom: true,
            external: true,
            id: id.to_string(),
            inputs: props.clone(),
            outputs: PropertyMap::new(),
            parent: parent.clone(),
            dependencies: Vec::new(),
            property_dependencies: indexmap::IndexMap::new(),
            deleted_with: None,
            protect: false,
            retain_on_delete: false,
            delete: false,
            pending_replacement: false,
            import_id: None,
            aliases: Vec::new(),
            custom_timeouts: CustomTimeouts::default(),
            additional_secret_outputs: Vec::new(),
            ignore_changes: Vec::new(),
            replace_on_changes: Vec::new(),
            init_errors: Vec::new(),
            view_of: None,
        });

        let old = self.old_by_urn.get(&urn).cloned();
        let chain = match old {
            Some(old) if !old.external => vec![
                self.with_provider(
                    Step::new(StepOp::ReadReplacement, urn.clone()).with_new(new_state.clone()),
                    &provider_ref,
                ),
                Step::new(StepOp::Replace, urn.clone()).with_new(new_state.clone()),
                Step::new(StepOp::DiscardReplaced, urn.clone()).with_old(old),
            ],
            _ => {
                vec![self.with_provider(Step::new(StepOp::Read, urn.clone()).with_new(new_state), &provider_ref)]
            }
        };

        Ok(chain)
    }

    /// Finalization (§4.8): after the source closes, delete (or discard) any
    /// old resource never observed this run, in reverse topological order.
    pub fn finalize(&self) -> Result<StepChain, GeneratorError> {
        let observed = self.state.lock().observed.clone();
        let to_remove: Vec<Urn> =
            self.old_by_urn.keys().filter(|u| !observed.contains(*u)).cloned().collect();
        let ordered = self.graph.reverse_topological(&to_remove);

        let mut steps = Vec::with_capacity(ordered.len());
        for urn in ordered {
            let Some(old) = self.old_by_urn.get(&urn).cloned() else { continue };
            if old.protect {
                return Err(ValidationError::ProtectedResource { urn, attempted: "deleted" }.into());
            }
            let op = if old.external { StepOp::ReadDiscard } else { StepOp::Delete };
            let provider_ref = old.provider.clone();
            steps.push(self.with_provider(Step::new(op, urn).with_old(old), &provider_ref));
        }
        Ok(steps)
    }
}

/// Rebuild base state after a refresh removed some resources (§4.8): walk
/// the original list in order, dropping removed resources and clearing any
/// reference (parent/dependency/property-dependency/deleted-with) that now
/// points at one, restoring the "references resolve or point at a
/// tombstone" invariant.
pub fn rebuild_base_state(original: &[ResourceState], removed: &HashSet<Urn>) -> Vec<ResourceState> {
    let mut survivors = Vec::with_capacity(original.len());
    for r in original {
        if removed.contains(&r.urn) {
            continue;
        }
        let mut r = r.clone();
        if r.parent.as_ref().is_some_and(|p| removed.contains(p)) {
            r.parent = None;
        }
        r.dependencies.retain(|d| !removed.contains(d));
        for deps in r.property_dependencies.values_mut() {
            deps.retain(|d| !removed.contains(d));
        }
        if r.deleted_with.as_ref().is_some_and(|d| removed.contains(d)) {
            r.deleted_with = None;
        }
        survivors.push(r);
    }
    survivors
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
