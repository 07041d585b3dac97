// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process `pulumi` package provider (§4.6): `StackReference`
//! check/create/read/delete, plus the `readStackOutputs`,
//! `readStackResourceOutputs`, and `getResource` invokes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dce_core::{PropertyMap, PropertyValue, Urn};
use dce_registry::{CheckResult, CreateResult, DiffResult, Provider, ProviderCallError, UpdateResult};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::waiter::{OutputWaiterStore, StackId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("stack {0} not found")]
    NotFound(String),
    #[error("failed to decrypt stack outputs: {0}")]
    Decrypt(String),
    #[error("{0}")]
    Other(String),
}

/// External collaborator for stacks that are *not* co-deployed in this
/// process (§6 BackendClient contract).
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// `on_decrypt_error` may rewrite the error or swallow it by returning
    /// substitute outputs.
    async fn get_stack_outputs(
        &self,
        name: &str,
        on_decrypt_error: &(dyn Fn(BackendError) -> Result<PropertyMap, BackendError> + Sync),
    ) -> Result<PropertyMap, BackendError>;

    async fn get_stack_resource_outputs(
        &self,
        stack_name: &str,
    ) -> Result<Vec<(Urn, PropertyMap)>, BackendError>;
}

fn secret_output_names(outputs: &PropertyMap) -> Vec<String> {
    let mut names: Vec<String> =
        outputs.iter().filter(|(_, v)| v.is_secret()).map(|(k, _)| k.clone()).collect();
    names.sort();
    names
}

fn reference_outputs(name: &str, outputs: PropertyMap) -> PropertyMap {
    let mut result = PropertyMap::new();
    result.insert("name".into(), PropertyValue::string(name));
    let secret_names = secret_output_names(&outputs);
    result.insert("outputs".into(), PropertyValue::Object(outputs));
    result.insert(
        "secretOutputNames".into(),
        PropertyValue::Array(secret_names.into_iter().map(PropertyValue::string).collect()),
    );
    result
}

/// Provider for `pulumi:pulumi:StackReference` and the package-level
/// `pulumi:pulumi:*` invokes. One instance is configured with `(store,
/// own_id, backend)`; reads for a co-deployed stack resolve against `store`,
/// everything else falls through to `backend`.
pub struct StackReferenceProvider<B: BackendClient> {
    store: Arc<OutputWaiterStore>,
    own: StackId,
    backend: B,
    cancel: CancellationToken,
    /// Resources registered so far this deployment, for `getResource`. The
    /// driver calls [`Self::register_resource`] as each step completes.
    registered: Mutex<HashMap<Urn, (String, PropertyMap)>>,
}

impl<B: BackendClient> StackReferenceProvider<B> {
    pub fn new(store: Arc<OutputWaiterStore>, own: StackId, backend: B, cancel: CancellationToken) -> Self {
        StackReferenceProvider { store, own, backend, cancel, registered: Mutex::new(HashMap::new()) }
    }

    pub fn register_resource(&self, urn: Urn, id: String, outputs: PropertyMap) {
        self.registered.lock().insert(urn, (id, outputs));
    }

    async fn resolve(&self, name: &str) -> Result<PropertyMap, ProviderCallError> {
        let target = StackId::new(self.own.project.clone(), name.to_string());
        if self.store.is_co_deployed(&target) {
            return self
                .store
                .wait_for_outputs(&self.cancel, self.own.clone(), target)
                .await
                .map_err(|e| ProviderCallError::Failed(e.to_string()));
        }
        self.backend
            .get_stack_outputs(name, &|e| Err(e))
            .await
            .map_err(|e| ProviderCallError::Failed(e.to_string()))
    }

    fn require_name(inputs: &PropertyMap) -> Result<String, ProviderCallError> {
        match inputs.get("name") {
            Some(PropertyValue::String(s)) => Ok(s.clone()),
            _ => Err(ProviderCallError::Failed("StackReference requires a string \"name\" input".into())),
        }
    }
}

#[async_trait]
impl<B: BackendClient> Provider for StackReferenceProvider<B> {
    async fn check(
        &self,
        _urn: &Urn,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<CheckResult, ProviderCallError> {
        Self::require_name(news)?;
        Ok(CheckResult { inputs: news.clone(), failures: Vec::new() })
    }

    async fn diff(
        &self,
        _urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        _ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderCallError> {
        let changed = olds.get("name") != news.get("name");
        Ok(DiffResult {
            changed_keys: if changed { vec!["name".into()] } else { Vec::new() },
            replace_keys: if changed { vec!["name".into()] } else { Vec::new() },
            stables: Vec::new(),
            replace_requested: false,
        })
    }

    async fn configure(&self, _inputs: &PropertyMap) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn create(
        &self,
        _urn: &Urn,
        properties: &PropertyMap,
    ) -> Result<CreateResult, ProviderCallError> {
        let name = Self::require_name(properties)?;
        let outputs = self.resolve(&name).await?;
        Ok(CreateResult { id: name.clone(), outputs: reference_outputs(&name, outputs) })
    }

    async fn update(
        &self,
        urn: &Urn,
        _id: &str,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<UpdateResult, ProviderCallError> {
        let created = self.create(urn, news).await?;
        Ok(UpdateResult { outputs: created.outputs })
    }

    async fn delete(
        &self,
        _urn: &Urn,
        _id: &str,
        _properties: &PropertyMap,
    ) -> Result<(), ProviderCallError> {
        Ok(())
    }

    async fn read(
        &self,
        urn: &Urn,
        id: &str,
        inputs: &PropertyMap,
    ) -> Result<CreateResult, ProviderCallError> {
        let name = if inputs.contains_key("name") { Self::require_name(inputs)? } else { id.to_string() };
        let outputs = self.resolve(&name).await?;
        Ok(CreateResult { id: name.clone(), outputs: reference_outputs(&name, outputs) })
    }

    async fn invoke(
        &self,
        token: &str,
        args: &PropertyMap,
    ) -> Result<PropertyMap, ProviderCallError> {
        match token {
            "pulumi:pulumi:readStackOutputs" => {
                let name = Self::require_name(args)?;
                let outputs = self.resolve(&name).await?;
                Ok(reference_outputs(&name, outputs))
            }
            "pulumi:pulumi:readStackResourceOutputs" => {
                let stack_name = match args.get("stackName") {
                    Some(PropertyValue::String(s)) => s.clone(),
                    _ => {
                        return Err(ProviderCallError::Failed(
                            "readStackResourceOutputs requires \"stackName\"".into(),
                        ))
                    }
                };
                let resources = self
                    .backend
                    .get_stack_resource_outputs(&stack_name)
                    .await
                    .map_err(|e| ProviderCallError::Failed(e.to_string()))?;
                let mut result = PropertyMap::new();
                for (urn, outputs) in resources {
                    result.insert(urn.to_string(), PropertyValue::Object(outputs));
                }
                Ok(result)
            }
            "pulumi:pulumi:getResource" => {
                let urn_str = match args.get("urn") {
                    Some(PropertyValue::String(s)) => s.clone(),
                    _ => {
                        return Err(ProviderCallError::Failed("getResource requires \"urn\"".into()))
                    }
                };
                let urn = Urn::parse(urn_str)
                    .map_err(|e| ProviderCallError::Failed(format!("invalid urn: {e}")))?;
                let (id, outputs) = self
                    .registered
                    .lock()
                    .get(&urn)
                    .cloned()
                    .ok_or_else(|| ProviderCallError::Failed(format!("unknown resource {urn}")))?;
                let mut result = PropertyMap::new();
                result.insert("urn".into(), PropertyValue::string(urn.to_string()));
                result.insert("id".into(), PropertyValue::string(id));
                result.insert("state".into(), PropertyValue::Object(outputs));
                Ok(result)
            }
            other => Err(ProviderCallError::Failed(format!("unknown invoke {other}"))),
        }
    }

    async fn get_plugin_info(&self) -> Result<Option<String>, ProviderCallError> {
        Ok(None)
    }
}

#[cfg(test)]
#[path = "stack_reference_tests.rs"]
mod tests;
