// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Construct` for sub-stacks (§4.10): the builtin `pulumi:pulumi:Stack`
//! resource type launches a sub-program as if it were a component. The
//! sub-program speaks to a [`SubMonitorProxy`] that forwards its monitor
//! calls back into the very same generator/executor/lock discipline the
//! outer program runs under, under four rewriting rules:
//!
//! 1. an empty parent URN is rewritten to the sub-stack's own URN;
//! 2. resource names are optionally prefixed with `<sub-stack-name>-`;
//! 3. the sub-stack's declared dependencies are appended to every
//!    registered resource's dependency list;
//! 4. `RegisterResource(type="pulumi:pulumi:Stack")` and
//!    `RegisterResourceOutputs` for the sub-stack URN are intercepted
//!    rather than forwarded, becoming the sub-stack's own identity and
//!    outputs respectively.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dce_core::{Goal, PropertyMap, PropertyValue, ProviderRef, ResourceState, Urn};
use dce_engine::{PendingNews, StepExecutor, StepGenerator};
use dce_registry::ProviderLoader;
use tokio::sync::Mutex;

use crate::driver::Deployment;
use crate::source::{ReadResult, RegisterResult, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum ConstructError {
    #[error("{0}")]
    Failed(String),
    /// The sub-program asked the engine to stop; propagated verbatim (§7).
    #[error("bail")]
    Bail,
}

impl From<SourceError> for ConstructError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Bail => ConstructError::Bail,
            SourceError::Failed(msg) => ConstructError::Failed(msg),
        }
    }
}

/// Where a sub-program's code lives (§4.10 "If `source` is not a local
/// directory, retrieve a template into a temporary directory; ensure
/// project manifest resides directly in the source directory"). Template
/// retrieval itself is the language host's job, an external collaborator
/// per §1 — this module only names which of the two it asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramSource {
    Directory(String),
    Template(String),
}

/// One `Construct` invocation's request, parsed out of the `pulumi:pulumi:Stack`
/// goal's declared properties.
#[derive(Debug, Clone)]
pub struct ConstructRequest {
    pub source: ProgramSource,
    pub prefix_resource_names: bool,
    pub inputs: PropertyMap,
    pub dependencies: Vec<Urn>,
}

impl ConstructRequest {
    /// `prefixResourceNames` defaults to `true` absent an explicit override
    /// (§9/§12: avoids name collisions with the parent program's own
    /// resources, the common case for real sub-stack usage).
    pub fn from_goal(goal: &Goal) -> Result<Self, ConstructError> {
        let source = match goal.properties.get("source") {
            Some(PropertyValue::String(s)) if !s.is_empty() => {
                if s.contains("://") {
                    ProgramSource::Template(s.clone())
                } else {
                    ProgramSource::Directory(s.clone())
                }
            }
            _ => return Err(ConstructError::Failed("Construct requires a \"source\" property".into())),
        };
        let prefix_resource_names = match goal.properties.get("prefixResourceNames") {
            Some(PropertyValue::Bool(b)) => *b,
            _ => true,
        };
        let inputs = match goal.properties.get("inputs") {
            Some(PropertyValue::Object(map)) => map.clone(),
            _ => PropertyMap::new(),
        };
        Ok(ConstructRequest { source, prefix_resource_names, inputs, dependencies: goal.dependencies.clone() })
    }
}

/// The sub-stack's own monitor surface (§6 "an internal resource-monitor
/// RPC surface... Bit-exact compatibility with the outer monitor protocol
/// is required"). One call per program RPC, matching `dce_wire::monitor`'s
/// request shapes but expressed as direct async calls rather than framed
/// messages, since both ends of a `Construct` live in the same process.
#[async_trait]
pub trait SubMonitor: Send + Sync {
    async fn register_resource(&self, goal: Goal) -> Result<RegisterResult, ConstructError>;

    #[allow(clippy::too_many_arguments)]
    async fn read_resource(
        &self,
        id: String,
        ty: String,
        name: String,
        parent: Option<Urn>,
        properties: PropertyMap,
        provider: Option<ProviderRef>,
    ) -> Result<ReadResult, ConstructError>;

    async fn register_resource_outputs(
        &self,
        urn: Urn,
        outputs: PropertyMap,
    ) -> Result<(), ConstructError>;
}

/// The language-runtime host launching a sub-program (§1: "the
/// language-runtime host... treated as an opaque RPC endpoint"). A real
/// implementation execs the program's plugin binary and speaks
/// `dce_wire::monitor` against `monitor`; this workspace only names the
/// shape `dce-driver` depends on.
#[async_trait]
pub trait LanguageHost: Send + Sync {
    async fn run(
        &self,
        request: &ConstructRequest,
        config: &PropertyMap,
        secret_keys: &[String],
        monitor: &dyn SubMonitor,
    ) -> Result<(), ConstructError>;
}

/// Bundles the mutable pieces a [`SubMonitorProxy`] must thread back into
/// [`Deployment`]'s own register/read handlers. Held behind a single
/// `tokio::sync::Mutex` since the trait methods above take `&self`
/// (`async_trait`'s object-safety requirement) but the handlers they call
/// need `&mut` access — mirroring `StepGenerator`'s own short-lived-lock
/// bookkeeping rather than widening every handler to take `&self`.
struct ProxyState<'a> {
    executor: &'a mut StepExecutor,
    submitted: &'a mut HashSet<Urn>,
    extra_news: &'a mut HashMap<Urn, Arc<ResourceState>>,
    default_providers: &'a mut HashMap<String, ProviderRef>,
}

pub struct SubMonitorProxy<'a, L: ProviderLoader, B: dce_builtin::BackendClient> {
    deployment: &'a Deployment<L, B>,
    generator: &'a StepGenerator,
    pending: &'a PendingNews,
    state: Mutex<ProxyState<'a>>,
    stack_urn: Urn,
    name_prefix: Option<String>,
    extra_dependencies: Vec<Urn>,
    /// Populated once the sub-program's `RegisterResourceOutputs` for the
    /// sub-stack URN is intercepted (transformation 5); read back out by
    /// [`Deployment::construct`] once the host returns.
    sub_outputs: Mutex<Option<PropertyMap>>,
}

impl<'a, L: ProviderLoader, B: dce_builtin::BackendClient> SubMonitorProxy<'a, L, B> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        deployment: &'a Deployment<L, B>,
        generator: &'a StepGenerator,
        pending: &'a PendingNews,
        executor: &'a mut StepExecutor,
        submitted: &'a mut HashSet<Urn>,
        extra_news: &'a mut HashMap<Urn, Arc<ResourceState>>,
        default_providers: &'a mut HashMap<String, ProviderRef>,
        stack_urn: Urn,
        name_prefix: Option<String>,
        extra_dependencies: Vec<Urn>,
    ) -> Self {
        SubMonitorProxy {
            deployment,
            generator,
            pending,
            state: Mutex::new(ProxyState { executor, submitted, extra_news, default_providers }),
            stack_urn,
            name_prefix,
            extra_dependencies,
            sub_outputs: Mutex::new(None),
        }
    }

    /// Transformation 2: prefix a resource name, unless this call is the
    /// sub-stack's own `RegisterResource(type="pulumi:pulumi:Stack")`,
    /// which is intercepted before naming ever applies.
    fn prefixed(&self, name: String) -> String {
        match &self.name_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }

    pub(crate) async fn take_outputs(&self) -> Option<PropertyMap> {
        self.sub_outputs.lock().await.take()
    }
}

#[async_trait]
impl<'a, L: ProviderLoader, B: dce_builtin::BackendClient> SubMonitor for SubMonitorProxy<'a, L, B> {
    async fn register_resource(&self, mut goal: Goal) -> Result<RegisterResult, ConstructError> {
        // Transformation 4: the sub-stack registering itself resolves to
        // the URN the outer program already computed; never forwarded.
        if goal.ty == "pulumi:pulumi:Stack" {
            return Ok(RegisterResult { urn: self.stack_urn.clone(), id: String::new(), outputs: PropertyMap::new() });
        }

        // Transformation 1: empty parent becomes the sub-stack's URN.
        if goal.parent.is_none() {
            goal.parent = Some(self.stack_urn.clone());
        }
        goal.name = self.prefixed(goal.name);
        // Transformation 3: the sub-stack's own dependencies apply to every
        // resource it registers, on top of whatever it declared itself.
        goal.dependencies.extend(self.extra_dependencies.iter().cloned());

        let mut state = self.state.lock().await;
        self.deployment
            .handle_register_resource(
                &goal,
                self.generator,
                state.executor,
                self.pending,
                state.submitted,
                state.extra_news,
                state.default_providers,
            )
            .await
            .map_err(|e| ConstructError::Failed(e.to_string()))
    }

    async fn read_resource(
        &self,
        id: String,
        ty: String,
        name: String,
        parent: Option<Urn>,
        properties: PropertyMap,
        provider: Option<ProviderRef>,
    ) -> Result<ReadResult, ConstructError> {
        let parent = Some(parent.unwrap_or_else(|| self.stack_urn.clone()));
        let name = self.prefixed(name);

        let mut state = self.state.lock().await;
        self.deployment
            .handle_read_resource(
                &id,
                &ty,
                &name,
                parent.as_ref(),
                &properties,
                provider,
                self.generator,
                state.executor,
                self.pending,
                state.submitted,
                state.default_providers,
                state.extra_news,
            )
            .await
            .map_err(|e| ConstructError::Failed(e.to_string()))
    }

    async fn register_resource_outputs(&self, urn: Urn, outputs: PropertyMap) -> Result<(), ConstructError> {
        // Transformation 5: the sub-stack's own outputs become this
        // Construct invocation's return value, not a step against `urn`.
        if urn == self.stack_urn {
            *self.sub_outputs.lock().await = Some(outputs);
            return Ok(());
        }
        let mut state = self.state.lock().await;
        let resolved = self
            .pending
            .acknowledge_outputs(&urn, outputs)
            .map_err(|e| ConstructError::Failed(e.to_string()))?;
        state.extra_news.insert(urn, resolved);
        Ok(())
    }
}

#[cfg(test)]
#[path = "construct_tests.rs"]
mod tests;
