// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider capability set (§6): the structured request/response pairs a
//! plug-in exchanges with the registry and executor.

use dce_core::{PropertyMap, Urn};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorRequest;

/// A distinguished error kind carrying partial-failure reasons without
/// discarding whatever outputs the provider did manage to produce (§7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{} init error(s) reported for {urn}", reasons.len())]
pub struct InitErrorPayload {
    pub urn: Urn,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum ProviderRequest {
    Check { urn: Urn, olds: PropertyMap, news: PropertyMap },
    Diff { urn: Urn, olds: PropertyMap, news: PropertyMap, ignore_changes: Vec<String> },
    Configure { inputs: PropertyMap },
    Create { urn: Urn, properties: PropertyMap, timeout_secs: Option<f64> },
    Update { urn: Urn, id: String, olds: PropertyMap, news: PropertyMap, timeout_secs: Option<f64> },
    Delete { urn: Urn, id: String, properties: PropertyMap, timeout_secs: Option<f64> },
    Read { urn: Urn, id: String, inputs: PropertyMap },
    Construct { ty: String, name: String, parent: Option<Urn>, inputs: PropertyMap, monitor: MonitorRequest },
    Invoke { token: String, args: PropertyMap },
    StreamInvoke { token: String, args: PropertyMap },
    Call { token: String, args: PropertyMap },
    GetSchema { subpackage_name: Option<String>, subpackage_version: Option<String> },
    GetMapping { key: String },
    GetMappings,
    GetPluginInfo,
    SignalCancellation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result")]
pub enum ProviderResponse {
    Checked { inputs: PropertyMap, failures: Vec<String> },
    Diffed { changed_keys: Vec<String>, replace_keys: Vec<String>, stables: Vec<String>, replace_requested: bool },
    Configured,
    Created { id: String, outputs: PropertyMap },
    Updated { outputs: PropertyMap },
    Deleted,
    ReadResult { id: String, outputs: PropertyMap },
    Constructed { urn: Urn, outputs: PropertyMap },
    Invoked { outputs: PropertyMap, failures: Vec<String> },
    SchemaJson { schema: serde_json::Value },
    Mapping { data: Vec<u8> },
    Mappings { keys: Vec<String> },
    PluginInfo { version: Option<String> },
    CancellationAcknowledged,
    InitError(InitErrorPayload),
    Error { message: String },
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
