// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-monitor RPC surface (§6 Wire protocol).
//!
//! Both the outer engine-to-program socket and the `Construct` sub-monitor
//! proxy (§4.10) speak this surface bit-exact — a provider or program
//! cannot distinguish one from the other.

use dce_core::{Goal, PropertyMap, Urn};
use serde::{Deserialize, Serialize};

/// One call a program makes against its monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum MonitorRequest {
    RegisterResource { goal: Box<Goal> },
    ReadResource { id: String, ty: String, name: String, parent: Option<Urn>, properties: PropertyMap, provider: Option<String> },
    RegisterResourceOutputs { urn: Urn, outputs: PropertyMap },
    RegisterResourceExtension { provider: String, parameterization: serde_json::Value },
    SupportsFeature { feature: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result")]
pub enum MonitorResponse {
    ResourceRegistered { urn: Urn, id: String, outputs: PropertyMap },
    ResourceRead { urn: Urn, outputs: PropertyMap },
    OutputsAcknowledged,
    ExtensionRegistered { provider: String },
    FeatureSupport { supported: bool },
    Error { message: String },
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
