// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment driver (§4.10): sequences one stack's run — provider
//! bootstrap, an optional refresh pass, draining the source's events
//! through the generator/executor, finalization, and snapshot assembly.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use dce_builtin::{BackendClient, OutputWaiterStore, StackId, StackReferenceProvider};
use dce_core::{
    Goal, Manifest, PropertyMap, ProviderRef, ResourceState, Snapshot, Step, StepOp, Urn,
};
use dce_engine::{rebuild_base_state, GeneratorError, PendingNews, StepExecutor, StepGenerator, StepHooks};
use dce_graph::DependencyGraph;
use dce_registry::{Provider, ProviderCallError, ProviderLoader, ProviderRegistry, RegistryError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::construct::{ConstructError, ConstructRequest, LanguageHost, SubMonitorProxy};
use crate::options::DeploymentOptions;
use crate::snapshot::assemble;
use crate::source::{ReadResult, RegisterResult, Source, SourceError, SourceEvent};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Executor(#[from] dce_engine::ExecutorError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Integrity(#[from] dce_core::IntegrityError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Construct(#[from] ConstructError),
    #[error("deployment cancelled")]
    Cancelled,
    #[error("provider resources cannot declare a parent: {0}")]
    ProviderResourceHasParent(Urn),
}

/// Wraps an embedder-supplied loader, special-casing the builtin `pulumi`
/// package (§4.6) to return the one pre-built provider instance a
/// deployment shares across every `StackReference`/`Invoke` against it,
/// rather than asking the embedder to know how to construct it.
pub struct EngineLoader<L: ProviderLoader> {
    inner: L,
    builtin: Arc<dyn Provider>,
}

impl<L: ProviderLoader> EngineLoader<L> {
    pub fn new(inner: L, builtin: Arc<dyn Provider>) -> Self {
        EngineLoader { inner, builtin }
    }
}

#[async_trait]
impl<L: ProviderLoader> ProviderLoader for EngineLoader<L> {
    async fn load(
        &self,
        package: &str,
        version: Option<&str>,
        server_url: Option<&str>,
        config: &PropertyMap,
    ) -> Result<Arc<dyn Provider>, ProviderCallError> {
        if package == "pulumi" {
            return Ok(self.builtin.clone());
        }
        self.inner.load(package, version, server_url, config).await
    }
}

fn package_of(ty: &str) -> &str {
    ty.split(':').next().unwrap_or(ty)
}

/// Dependency barrier for a register-resource chain: every URN this goal's
/// steps must not apply before, per `dependency_state()`'s field set (§4.9).
fn goal_dependencies(goal: &Goal, provider: Option<&ProviderRef>) -> Vec<Urn> {
    let mut deps: Vec<Urn> = goal.dependencies.clone();
    deps.extend(goal.parent.clone());
    deps.extend(goal.deleted_with.clone());
    deps.extend(provider.map(ProviderRef::urn));
    deps
}

/// One stack's deployment run. Owns the provider registry, the builtin
/// `pulumi` provider, and the cross-stack output waiter store for the
/// duration of [`Deployment::run`].
pub struct Deployment<L: ProviderLoader, B: BackendClient> {
    stack: String,
    project: String,
    options: DeploymentOptions,
    manifest: Manifest,
    old: Snapshot,
    base: Vec<ResourceState>,
    registry: Arc<ProviderRegistry<EngineLoader<L>>>,
    stack_reference: Arc<StackReferenceProvider<B>>,
    output_store: Arc<OutputWaiterStore>,
    stack_id: StackId,
    cancel: CancellationToken,
    language_host: Option<Arc<dyn LanguageHost>>,
}

impl<L: ProviderLoader, B: BackendClient> Deployment<L, B> {
    /// `old` is the previous snapshot, not yet default-provider-synthesized
    /// (synthesis happens here, once, against `old.resources`).
    pub fn new(
        stack: impl Into<String>,
        project: impl Into<String>,
        old: Snapshot,
        options: DeploymentOptions,
        loader: L,
        backend: B,
        output_store: Arc<OutputWaiterStore>,
        cancel: CancellationToken,
    ) -> Self {
        let stack = stack.into();
        let project = project.into();
        let manifest = old.manifest.clone();
        let base =
            ProviderRegistry::<EngineLoader<L>>::synthesize_default_providers(
                &manifest,
                &stack,
                &project,
                old.resources.clone(),
            );

        let stack_id = StackId::new(project.clone(), stack.clone());
        let stack_reference =
            Arc::new(StackReferenceProvider::new(output_store.clone(), stack_id.clone(), backend, cancel.clone()));
        let builtin: Arc<dyn Provider> = stack_reference.clone();
        let registry = Arc::new(ProviderRegistry::new(EngineLoader::new(loader, builtin)));

        Deployment {
            stack,
            project,
            options,
            manifest,
            old,
            base,
            registry,
            stack_reference,
            output_store,
            stack_id,
            cancel,
            language_host: None,
        }
    }

    /// Wire a language-runtime host so `Construct` (§4.10) can launch
    /// sub-programs for `pulumi:pulumi:Stack` goals. Without one, such a
    /// goal fails rather than silently no-op'ing.
    pub fn with_language_host(mut self, host: Arc<dyn LanguageHost>) -> Self {
        self.language_host = Some(host);
        self
    }

    async fn bootstrap_providers(&self) -> Result<(), DriverError> {
        for r in &self.base {
            if r.urn.is_provider_type() && !r.delete {
                let provider_ref = ProviderRef::new(r.urn.clone(), r.id.clone());
                self.registry.same(r, &provider_ref).await?;
            }
        }
        Ok(())
    }

    async fn resolve_provider(
        &self,
        provider: Option<&ProviderRef>,
    ) -> Result<Option<Arc<dyn Provider>>, DriverError> {
        match provider {
            None => Ok(None),
            Some(p) => Ok(Some(self.registry.get(p)?)),
        }
    }

    /// Refresh every custom, non-component resource against its provider
    /// (§4.8 "rebuild base state"), then drop anything the provider no
    /// longer has and clear references that pointed at it.
    async fn refresh_phase(&self) -> Result<Vec<ResourceState>, DriverError> {
        self.bootstrap_providers().await?;

        let hooks = StepHooks::new();
        let pending = Arc::new(PendingNews::new());
        let mut executor = StepExecutor::new(
            self.options.parallel,
            hooks,
            pending,
            self.cancel.clone(),
            self.options.continue_on_error,
        );

        let mut refreshed: HashSet<Urn> = HashSet::new();
        for r in &self.base {
            if !r.custom || r.is_component() || r.delete || r.urn.is_provider_type() {
                continue;
            }
            let provider = self.resolve_provider(r.provider.as_ref()).await?;
            let step = Step::new(StepOp::Refresh, r.urn.clone()).with_old(Arc::new(r.clone()));
            refreshed.insert(r.urn.clone());
            executor.submit_chain(vec![step], Vec::new(), provider, self.options.preview_only).await;
        }
        executor.wait().await?;

        let news = executor.news();
        let removed: HashSet<Urn> =
            refreshed.into_iter().filter(|urn| !news.contains_key(urn)).collect();

        let merged: Vec<ResourceState> = self
            .base
            .iter()
            .map(|r| news.get(&r.urn).map(|n| (**n).clone()).unwrap_or_else(|| r.clone()))
            .collect();

        Ok(rebuild_base_state(&merged, &removed))
    }

    async fn ensure_default_provider(
        &self,
        package: &str,
        default_providers: &mut HashMap<String, ProviderRef>,
        submitted: &mut HashSet<Urn>,
        extra_news: &mut HashMap<Urn, Arc<ResourceState>>,
    ) -> Result<ProviderRef, DriverError> {
        if let Some(existing) = default_providers.get(package) {
            return Ok(existing.clone());
        }
        let urn = Urn::new(&self.stack, &self.project, "", &format!("pulumi:providers:{package}"), "default");
        if let Some(old) = self.base.iter().find(|r| r.urn == urn && !r.delete) {
            let provider_ref = ProviderRef::new(urn.clone(), old.id.clone());
            self.registry.same(old, &provider_ref).await?;
            default_providers.insert(package.to_string(), provider_ref.clone());
            return Ok(provider_ref);
        }

        let id = Uuid::new_v4().to_string();
        let state = ResourceState {
            urn: urn.clone(),
            ty: format!("pulumi:providers:{package}"),
            name: "default".into(),
            provider: None,
            custom: true,
            external: false,
            id: id.clone(),
            inputs: PropertyMap::new(),
            outputs: PropertyMap::new(),
            parent: None,
            dependencies: Vec::new(),
            property_dependencies: indexmap::IndexMap::new(),
            deleted_with: None,
            protect: false,
            retain_on_delete: false,
            delete: false,
            pending_replacement: false,
            import_id: None,
            aliases: Vec::new(),
            custom_timeouts: dce_core::CustomTimeouts::default(),
            additional_secret_outputs: Vec::new(),
            ignore_changes: Vec::new(),
            replace_on_changes: Vec::new(),
            init_errors: Vec::new(),
            view_of: None,
        };
        let provider_ref = ProviderRef::new(urn.clone(), id);
        self.registry.same(&state, &provider_ref).await?;
        submitted.insert(urn.clone());
        extra_news.insert(urn, Arc::new(state));
        default_providers.insert(package.to_string(), provider_ref.clone());
        Ok(provider_ref)
    }

    /// Register an explicit (non-default) provider resource directly:
    /// bypasses the generic step pipeline, mirroring
    /// [`ProviderRegistry::synthesize_default_providers`]'s own
    /// load-then-record shape (§4.5) since a provider resource has no
    /// meta-provider of its own to diff against.
    async fn register_provider_resource(
        &self,
        goal: &Goal,
        submitted: &mut HashSet<Urn>,
        extra_news: &mut HashMap<Urn, Arc<ResourceState>>,
    ) -> Result<RegisterResult, DriverError> {
        if goal.parent.is_some() {
            let urn = Urn::new(&self.stack, &self.project, "", &goal.ty, &goal.name);
            return Err(DriverError::ProviderResourceHasParent(urn));
        }
        let urn = Urn::new(&self.stack, &self.project, "", &goal.ty, &goal.name);
        let id = Uuid::new_v4().to_string();
        let state = ResourceState {
            urn: urn.clone(),
            ty: goal.ty.clone(),
            name: goal.name.clone(),
            provider: None,
            custom: true,
            external: false,
            id: id.clone(),
            inputs: goal.properties.clone(),
            outputs: PropertyMap::new(),
            parent: None,
            dependencies: goal.dependencies.clone(),
            property_dependencies: indexmap::IndexMap::new(),
            deleted_with: goal.deleted_with.clone(),
            protect: goal.protect,
            retain_on_delete: goal.retain_on_delete,
            delete: false,
            pending_replacement: false,
            import_id: None,
            aliases: Vec::new(),
            custom_timeouts: goal.custom_timeouts,
            additional_secret_outputs: goal.additional_secret_outputs.clone(),
            ignore_changes: goal.ignore_changes.clone(),
            replace_on_changes: goal.replace_on_changes.clone(),
            init_errors: Vec::new(),
            view_of: None,
        };
        let provider_ref = ProviderRef::new(urn.clone(), id.clone());
        self.registry.same(&state, &provider_ref).await?;
        submitted.insert(urn.clone());
        extra_news.insert(urn.clone(), Arc::new(state));
        Ok(RegisterResult { urn, id, outputs: PropertyMap::new() })
    }

    /// Drive `source` to completion and return the resulting snapshot.
    pub async fn run(&self, source: &dyn Source) -> Result<Snapshot, DriverError> {
        let refreshed = if self.options.refresh || self.options.refresh_only {
            Some(self.refresh_phase().await?)
        } else {
            None
        };
        let base: &[ResourceState] = refreshed.as_deref().unwrap_or(&self.base);

        if self.options.refresh_only {
            let snapshot = Snapshot {
                manifest: self.manifest.clone(),
                secrets_manager: self.old.secrets_manager.clone(),
                resources: base.to_vec(),
                pending_operations: Vec::new(),
            };
            snapshot.validate()?;
            return Ok(snapshot);
        }

        let generator =
            StepGenerator::new(&self.stack, &self.project, base, self.options.target_options());
        let graph = DependencyGraph::build(base);

        let hooks = StepHooks::new();
        let pending = Arc::new(PendingNews::new());
        let mut executor = StepExecutor::new(
            self.options.parallel,
            hooks,
            pending.clone(),
            self.cancel.clone(),
            self.options.continue_on_error,
        );

        let mut submitted: HashSet<Urn> = HashSet::new();
        let mut extra_news: HashMap<Urn, Arc<ResourceState>> = HashMap::new();
        let mut default_providers: HashMap<String, ProviderRef> = HashMap::new();

        let mut iter = source.iterate(self.cancel.clone()).await?;
        loop {
            if self.cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            let Some(event) = iter.next().await? else { break };
            match event {
                SourceEvent::RegisterResource { goal, done } => {
                    let result = self
                        .handle_register_resource(
                            &goal,
                            &generator,
                            &mut executor,
                            &pending,
                            &mut submitted,
                            &mut extra_news,
                            &mut default_providers,
                        )
                        .await;
                    let _ = done.send(result.map_err(to_source_error));
                }
                SourceEvent::ReadResource { id, ty, name, parent, properties, provider, done } => {
                    let result = self
                        .handle_read_resource(
                            &id,
                            &ty,
                            &name,
                            parent.as_ref(),
                            &properties,
                            provider,
                            &generator,
                            &mut executor,
                            &pending,
                            &mut submitted,
                            &mut default_providers,
                            &mut extra_news,
                        )
                        .await;
                    let _ = done.send(result.map_err(to_source_error));
                }
                SourceEvent::RegisterResourceOutputs { urn, outputs, done } => {
                    let result = pending
                        .acknowledge_outputs(&urn, outputs)
                        .map(|state| {
                            extra_news.insert(urn, state);
                        })
                        .map_err(|e| SourceError::Failed(e.to_string()));
                    let _ = done.send(result);
                }
                SourceEvent::RegisterResourceExtension { provider, parameterization, done } => {
                    self.registry.register_parameterization(provider, parameterization);
                    let _ = done.send(Ok(()));
                }
            }
        }

        let finalize_steps = generator.finalize()?;
        for step in finalize_steps {
            let urn = step.urn.clone();
            let provider = self.resolve_provider(step.provider.as_ref()).await?;
            let deps: Vec<Urn> =
                graph.dependents_of(&urn).into_iter().filter(|d| submitted.contains(d)).collect();
            submitted.insert(urn.clone());
            executor.submit_chain(vec![step], deps, provider, self.options.preview_only).await;
        }

        executor.wait().await?;

        let mut news = executor.news();
        news.extend(extra_news);

        let old_snapshot = Snapshot {
            manifest: self.manifest.clone(),
            secrets_manager: self.old.secrets_manager.clone(),
            resources: base.to_vec(),
            pending_operations: Vec::new(),
        };
        let snapshot = assemble(&old_snapshot, self.manifest.clone(), &submitted, &news, Vec::new())?;

        if let Some(root) = snapshot.find(&Urn::root_stack(&self.stack, &self.project)) {
            self.output_store.set_outputs(self.stack_id.clone(), root.outputs.clone());
        }

        Ok(snapshot)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn handle_register_resource(
        &self,
        goal: &Goal,
        generator: &StepGenerator,
        executor: &mut StepExecutor,
        pending: &PendingNews,
        submitted: &mut HashSet<Urn>,
        extra_news: &mut HashMap<Urn, Arc<ResourceState>>,
        default_providers: &mut HashMap<String, ProviderRef>,
    ) -> Result<RegisterResult, DriverError> {
        if goal.ty.starts_with("pulumi:providers:") {
            return self.register_provider_resource(goal, submitted, extra_news).await;
        }
        if goal.ty == "pulumi:pulumi:Stack" && !goal.custom {
            return Ok(self
                .construct(goal, generator, executor, pending, submitted, extra_news, default_providers)
                .await?);
        }

        let mut goal = goal.clone();
        if goal.custom && goal.provider.as_deref().unwrap_or("").is_empty() {
            let package = package_of(&goal.ty).to_string();
            let provider_ref =
                self.ensure_default_provider(&package, default_providers, submitted, extra_news).await?;
            goal.provider = Some(provider_ref.as_str().to_string());
        }

        let provider_ref: Option<ProviderRef> = match goal.provider.as_deref() {
            Some(raw) if !raw.is_empty() => {
                Some(raw.parse().map_err(|e: dce_core::BadProviderReference| {
                    GeneratorError::Validation(dce_core::ValidationError::BadProviderReference {
                        urn: Urn::new(&self.stack, &self.project, "", &goal.ty, &goal.name),
                        reason: e.to_string(),
                    })
                })?)
            }
            _ => None,
        };
        let provider = self.resolve_provider(provider_ref.as_ref()).await?;

        let chain = generator.register_resource(&goal, provider.as_ref()).await?;
        if chain.is_empty() {
            // Outside `--target` scope with no prior state: not materialized.
            let parent_qualified_type = goal.parent.as_ref().map(Urn::qualified_type).unwrap_or_default();
            let urn = Urn::new(&self.stack, &self.project, parent_qualified_type, &goal.ty, &goal.name);
            return Ok(RegisterResult { urn, id: String::new(), outputs: PropertyMap::new() });
        }

        let urn = chain[0].urn.clone();
        let deps = goal_dependencies(&goal, provider_ref.as_ref());
        submitted.insert(urn.clone());
        executor.submit_chain(chain, deps, provider, self.options.preview_only).await;
        executor.wait_for_completion(&urn).await?;

        let state = pending.get(&urn).ok_or(dce_engine::ExecutorError::NoPlanForResource(urn.clone()))?;
        self.stack_reference.register_resource(urn.clone(), state.id.clone(), state.outputs.clone());
        Ok(RegisterResult { urn, id: state.id.clone(), outputs: state.outputs.clone() })
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn handle_read_resource(
        &self,
        id: &str,
        ty: &str,
        name: &str,
        parent: Option<&Urn>,
        properties: &PropertyMap,
        provider: Option<ProviderRef>,
        generator: &StepGenerator,
        executor: &mut StepExecutor,
        pending: &PendingNews,
        submitted: &mut HashSet<Urn>,
        default_providers: &mut HashMap<String, ProviderRef>,
        extra_news: &mut HashMap<Urn, Arc<ResourceState>>,
    ) -> Result<ReadResult, DriverError> {
        let provider_ref = match provider {
            Some(p) => Some(p),
            None => {
                let package = package_of(ty).to_string();
                Some(self.ensure_default_provider(&package, default_providers, submitted, extra_news).await?)
            }
        };
        let live_provider = self.resolve_provider(provider_ref.as_ref()).await?;

        let chain = generator.read_resource(id, ty, name, parent, properties, provider_ref.clone())?;
        let urn = chain[0].urn.clone();
        let mut deps: Vec<Urn> = parent.cloned().into_iter().collect();
        deps.extend(provider_ref.as_ref().map(ProviderRef::urn));

        submitted.insert(urn.clone());
        executor.submit_chain(chain, deps, live_provider, self.options.preview_only).await;
        executor.wait_for_completion(&urn).await?;

        let state = pending.get(&urn).ok_or(dce_engine::ExecutorError::NoPlanForResource(urn.clone()))?;
        self.stack_reference.register_resource(urn.clone(), state.id.clone(), state.outputs.clone());
        Ok(ReadResult { urn, outputs: state.outputs.clone() })
    }

    /// `Construct` (§4.10): launch a sub-program behind a [`SubMonitorProxy`]
    /// for a `pulumi:pulumi:Stack` component goal, recursing into this same
    /// deployment's register/read handlers for everything the sub-program
    /// registers so it is subject to the identical dependency/lock
    /// discipline as a top-level resource.
    #[allow(clippy::too_many_arguments)]
    async fn construct(
        &self,
        goal: &Goal,
        generator: &StepGenerator,
        executor: &mut StepExecutor,
        pending: &PendingNews,
        submitted: &mut HashSet<Urn>,
        extra_news: &mut HashMap<Urn, Arc<ResourceState>>,
        default_providers: &mut HashMap<String, ProviderRef>,
    ) -> Result<RegisterResult, ConstructError> {
        let host = self
            .language_host
            .as_ref()
            .ok_or_else(|| ConstructError::Failed("no language host configured for Construct".into()))?;
        let request = ConstructRequest::from_goal(goal)?;

        let parent_qualified_type = goal.parent.as_ref().map(Urn::qualified_type).unwrap_or_default();
        let stack_urn = Urn::new(&self.stack, &self.project, parent_qualified_type, &goal.ty, &goal.name);
        let name_prefix = request.prefix_resource_names.then(|| format!("{}-", goal.name));

        // The sub-stack URN is never itself generated as a step (transform 4
        // intercepts it in the proxy below), so it must be adopted before any
        // child names it as a parent.
        generator.adopt_external_parent(&stack_urn);

        let proxy = SubMonitorProxy::new(
            self,
            generator,
            pending,
            &mut *executor,
            &mut *submitted,
            &mut *extra_news,
            &mut *default_providers,
            stack_urn.clone(),
            name_prefix,
            request.dependencies.clone(),
        );

        // Config/secret-keys forwarding (§4.10 "forwarding the parent's
        // config and secret-keys list") is an embedder concern this core
        // does not itself own configuration for (§1 out of scope); an
        // empty config/secret-keys pair is what a deployment with no stack
        // config at all would forward.
        let config = PropertyMap::new();
        let secret_keys: Vec<String> = Vec::new();
        host.run(&request, &config, &secret_keys, &proxy).await?;

        let outputs = proxy.take_outputs().await.unwrap_or_default();
        let state = ResourceState {
            urn: stack_urn.clone(),
            ty: goal.ty.clone(),
            name: goal.name.clone(),
            provider: None,
            custom: false,
            external: false,
            id: String::new(),
            inputs: request.inputs,
            outputs: outputs.clone(),
            parent: goal.parent.clone(),
            dependencies: goal.dependencies.clone(),
            property_dependencies: indexmap::IndexMap::new(),
            deleted_with: goal.deleted_with.clone(),
            protect: goal.protect,
            retain_on_delete: goal.retain_on_delete,
            delete: false,
            pending_replacement: false,
            import_id: None,
            aliases: Vec::new(),
            custom_timeouts: goal.custom_timeouts,
            additional_secret_outputs: goal.additional_secret_outputs.clone(),
            ignore_changes: goal.ignore_changes.clone(),
            replace_on_changes: goal.replace_on_changes.clone(),
            init_errors: Vec::new(),
            view_of: None,
        };
        submitted.insert(stack_urn.clone());
        extra_news.insert(stack_urn.clone(), Arc::new(state));

        Ok(RegisterResult { urn: stack_urn, id: String::new(), outputs })
    }
}

fn to_source_error(e: DriverError) -> SourceError {
    SourceError::Failed(e.to_string())
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
