// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider Registry (§4.5): a process-wide map from provider reference to a
//! live plug-in, plus default-provider synthesis and deny-default policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dce_core::{CustomTimeouts, Manifest, ProviderRef, ResourceState, Urn};
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use crate::provider::{CreateResult, DiffResult, Provider, ProviderCallError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no provider loaded for {0}")]
    NotLoaded(ProviderRef),
    #[error("provider reference {0} is denied by policy")]
    Denied(ProviderRef),
    #[error(transparent)]
    Call(#[from] ProviderCallError),
}

/// Constructs a live provider for a package, given its version/server URL
/// and config inputs. Supplied by whatever embeds the registry (tests
/// supply a fake; a real deployment would resolve and launch a plug-in
/// binary here).
#[async_trait]
pub trait ProviderLoader: Send + Sync {
    async fn load(
        &self,
        package: &str,
        version: Option<&str>,
        server_url: Option<&str>,
        config: &dce_core::PropertyMap,
    ) -> Result<Arc<dyn Provider>, ProviderCallError>;
}

#[derive(Default)]
struct RegistryState {
    loaded: HashMap<ProviderRef, Arc<dyn Provider>>,
    denied: Vec<String>,
    parameterizations: HashMap<ProviderRef, serde_json::Value>,
}

pub struct ProviderRegistry<L: ProviderLoader> {
    loader: L,
    state: Mutex<RegistryState>,
}

impl<L: ProviderLoader> ProviderRegistry<L> {
    pub fn new(loader: L) -> Self {
        ProviderRegistry { loader, state: Mutex::new(RegistryState::default()) }
    }

    /// Configure the deny-default policy: provider names of the form
    /// `default_<pkg>` listed here fail every operation routed through them.
    pub fn deny_defaults(&self, names: impl IntoIterator<Item = String>) {
        self.state.lock().denied.extend(names);
    }

    /// Register a parameterization for `provider` (§4.5: "a provider may
    /// be *extended* by a parameterization... registered before first
    /// use"). Must be called before the provider's first [`Self::same`]
    /// call — its fields are merged into the load-time config then,
    /// overriding the resource's own inputs.
    pub fn register_parameterization(&self, provider: ProviderRef, blob: serde_json::Value) {
        self.state.lock().parameterizations.insert(provider, blob);
    }

    /// `r.inputs` with any registered parameterization's object fields
    /// merged in on top, if one was registered for `provider`.
    fn merged_config(&self, provider: &ProviderRef, r: &ResourceState) -> dce_core::PropertyMap {
        let blob = self.state.lock().parameterizations.get(provider).cloned();
        let Some(serde_json::Value::Object(fields)) = blob else {
            return r.inputs.clone();
        };
        let mut config = r.inputs.clone();
        for (k, v) in fields {
            config.insert(k, v.into());
        }
        config
    }

    fn check_denied(&self, provider: &ProviderRef) -> Result<(), RegistryError> {
        let package = provider.urn().provider_package().unwrap_or_default().to_string();
        let default_name = format!("default_{package}");
        if self.state.lock().denied.iter().any(|d| d == &default_name) {
            return Err(RegistryError::Denied(provider.clone()));
        }
        Ok(())
    }

    /// Ensure a provider for state `r` is loaded with `r.inputs` as config.
    /// Idempotent: a second call for the same reference is a no-op.
    pub async fn same(
        &self,
        r: &ResourceState,
        provider: &ProviderRef,
    ) -> Result<(), RegistryError> {
        self.check_denied(provider)?;
        if self.state.lock().loaded.contains_key(provider) {
            return Ok(());
        }
        let urn = provider.urn();
        let package = urn.provider_package().unwrap_or_default();
        let config = self.merged_config(provider, r);
        let loaded = self.loader.load(package, None, None, &config).await?;
        self.state.lock().loaded.insert(provider.clone(), loaded);
        Ok(())
    }

    /// Authenticate `provider` (denied-default check, must already be
    /// loaded) and return the live plug-in behind it. The §4.7 step
    /// contracts and the §4.8 generator's `Diff` call both go through this
    /// rather than duplicating a pass-through per `Provider` method.
    pub fn get(&self, provider: &ProviderRef) -> Result<Arc<dyn Provider>, RegistryError> {
        self.check_denied(provider)?;
        self.state
            .lock()
            .loaded
            .get(provider)
            .cloned()
            .ok_or_else(|| RegistryError::NotLoaded(provider.clone()))
    }

    pub async fn check(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        olds: &dce_core::PropertyMap,
        news: &dce_core::PropertyMap,
    ) -> Result<crate::provider::CheckResult, RegistryError> {
        Ok(self.get(provider)?.check(urn, olds, news).await?)
    }

    pub async fn diff(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        olds: &dce_core::PropertyMap,
        news: &dce_core::PropertyMap,
        ignore_changes: &[String],
    ) -> Result<DiffResult, RegistryError> {
        Ok(self.get(provider)?.diff(urn, olds, news, ignore_changes).await?)
    }

    pub async fn create(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        properties: &dce_core::PropertyMap,
    ) -> Result<CreateResult, RegistryError> {
        Ok(self.get(provider)?.create(urn, properties).await?)
    }

    pub async fn update(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        id: &str,
        olds: &dce_core::PropertyMap,
        news: &dce_core::PropertyMap,
    ) -> Result<crate::provider::UpdateResult, RegistryError> {
        Ok(self.get(provider)?.update(urn, id, olds, news).await?)
    }

    pub async fn delete(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        id: &str,
        properties: &dce_core::PropertyMap,
    ) -> Result<(), RegistryError> {
        Ok(self.get(provider)?.delete(urn, id, properties).await?)
    }

    pub async fn read(
        &self,
        provider: &ProviderRef,
        urn: &Urn,
        id: &str,
        inputs: &dce_core::PropertyMap,
    ) -> Result<CreateResult, RegistryError> {
        Ok(self.get(provider)?.read(urn, id, inputs).await?)
    }

    pub async fn invoke(
        &self,
        provider: &ProviderRef,
        token: &str,
        args: &dce_core::PropertyMap,
    ) -> Result<dce_core::PropertyMap, RegistryError> {
        Ok(self.get(provider)?.invoke(token, args).await?)
    }

    /// Default-provider synthesis (§4.5): for any custom resource in the old
    /// snapshot lacking a provider reference, synthesize a default provider
    /// resource for its package and rewrite the resource's provider field.
    /// Synthetic providers are prepended to the resource list (in first-seen
    /// package order) to preserve topological order, and get a UUID v4 id.
    pub fn synthesize_default_providers(
        manifest: &Manifest,
        stack: &str,
        project: &str,
        resources: Vec<ResourceState>,
    ) -> Vec<ResourceState> {
        let mut synthesized: Vec<ResourceState> = Vec::new();
        let mut by_package: HashMap<String, ProviderRef> = HashMap::new();

        let mut rewritten: Vec<ResourceState> = Vec::with_capacity(resources.len());
        for mut r in resources {
            if r.custom && !r.is_component() && r.provider.is_none() {
                let package = r.ty.split(':').next().unwrap_or(&r.ty).to_string();
                let provider_ref = by_package.entry(package.clone()).or_insert_with(|| {
                    let id = Uuid::new_v4().to_string();
                    let provider_urn = Urn::new(
                        stack,
                        project,
                        "",
                        &format!("pulumi:providers:{package}"),
                        "default",
                    );
                    let plugin = manifest.plugins.iter().find(|p| p.name == package);
                    let mut inputs = dce_core::PropertyMap::new();
                    if let Some(plugin) = plugin {
                        if let Some(v) = &plugin.version {
                            inputs.insert("version".into(), dce_core::PropertyValue::string(v.clone()));
                        }
                        if let Some(url) = &plugin.server_url {
                            inputs.insert(
                                "pluginDownloadURL".into(),
                                dce_core::PropertyValue::string(url.clone()),
                            );
                        }
                    }
                    let provider_state = ResourceState {
                        urn: provider_urn.clone(),
                        ty: format!("pulumi:providers:{package}"),
                        name: "default".into(),
                        provider: None,
                        custom: true,
                        external: false,
                        id: id.clone(),
                        inputs,
                        outputs: dce_core::PropertyMap::new(),
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
                        custom_timeouts: CustomTimeouts::default(),
                        additional_secret_outputs: Vec::new(),
                        ignore_changes: Vec::new(),
                        replace_on_changes: Vec::new(),
                        init_errors: Vec::new(),
                        view_of: None,
                    };
                    synthesized.push(provider_state);
                    ProviderRef::new(provider_urn, id)
                });
                r.provider = Some(provider_ref.clone());
            }
            rewritten.push(r);
        }

        synthesized.into_iter().chain(rewritten).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
