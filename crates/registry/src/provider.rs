// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The provider capability set (§6): every plug-in implements this trait;
//! the registry is generic over it so a fake can stand in during tests.

use async_trait::async_trait;
use dce_core::{PropertyMap, Urn};
use dce_wire::InitErrorPayload;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderCallError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    InitError(#[from] InitErrorPayload),
}

#[derive(Debug, Clone, Default)]
pub struct CheckResult {
    pub inputs: PropertyMap,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub changed_keys: Vec<String>,
    pub replace_keys: Vec<String>,
    pub stables: Vec<String>,
    pub replace_requested: bool,
}

#[derive(Debug, Clone)]
pub struct CreateResult {
    pub id: String,
    pub outputs: PropertyMap,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    pub outputs: PropertyMap,
}

/// A live plug-in for resources of one package. Thin pass-throughs through
/// the registry authenticate the provider reference before reaching here.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn check(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<CheckResult, ProviderCallError>;

    async fn diff(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        ignore_changes: &[String],
    ) -> Result<DiffResult, ProviderCallError>;

    async fn configure(&self, inputs: &PropertyMap) -> Result<(), ProviderCallError>;

    async fn create(
        &self,
        urn: &Urn,
        properties: &PropertyMap,
    ) -> Result<CreateResult, ProviderCallError>;

    async fn update(
        &self,
        urn: &Urn,
        id: &str,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> Result<UpdateResult, ProviderCallError>;

    async fn delete(
        &self,
        urn: &Urn,
        id: &str,
        properties: &PropertyMap,
    ) -> Result<(), ProviderCallError>;

    async fn read(
        &self,
        urn: &Urn,
        id: &str,
        inputs: &PropertyMap,
    ) -> Result<CreateResult, ProviderCallError>;

    async fn invoke(
        &self,
        token: &str,
        args: &PropertyMap,
    ) -> Result<PropertyMap, ProviderCallError>;

    async fn get_plugin_info(&self) -> Result<Option<String>, ProviderCallError>;

    /// Request the provider abandon any in-flight operations. Best-effort;
    /// the registry does not block on its completion.
    async fn signal_cancellation(&self) {}
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
