// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Goal: the desired state a program declares for one resource.

use serde::{Deserialize, Serialize};

use crate::property::PropertyMap;
use crate::resource::{Alias, CustomTimeouts};
use crate::urn::Urn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub ty: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    pub custom: bool,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub dependencies: Vec<Urn>,
    /// Raw, unparsed provider reference string declared by the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub additional_secret_outputs: Vec<String>,
    #[serde(default)]
    pub custom_timeouts: CustomTimeouts,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    #[serde(default)]
    pub ignore_changes: Vec<String>,
    #[serde(default)]
    pub replace_on_changes: Vec<String>,
    #[serde(default)]
    pub retain_on_delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_with: Option<Urn>,
}

impl Goal {
    pub fn is_partial(&self) -> bool {
        self.properties.values().any(|v| v.contains_unknowns())
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct GoalBuilder => Goal {
        into {
            ty: String = "pkg:index:Widget",
            name: String = "r",
        }
        set {
            parent: Option<Urn> = None,
            custom: bool = true,
            properties: PropertyMap = PropertyMap::new(),
            dependencies: Vec<Urn> = Vec::new(),
            provider: Option<String> = None,
            protect: bool = false,
            additional_secret_outputs: Vec<String> = Vec::new(),
            custom_timeouts: CustomTimeouts = CustomTimeouts::default(),
            aliases: Vec<Alias> = Vec::new(),
            import_id: Option<String> = None,
            ignore_changes: Vec<String> = Vec::new(),
            replace_on_changes: Vec<String> = Vec::new(),
            retain_on_delete: bool = false,
            deleted_with: Option<Urn> = None,
        }
    }
}

#[cfg(test)]
#[path = "goal_tests.rs"]
mod tests;
