// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource state: the mutable record tracked in a snapshot for one URN.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::property::PropertyMap;
use crate::urn::Urn;

/// A provider reference: the URN of the provider resource plus its
/// provider-assigned ID, e.g. `urn:pulumi:dev::proj::pulumi:providers:aws::default::4c2d1e`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRef(String);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("bad provider reference: {0:?}")]
pub struct BadProviderReference(pub String);

impl ProviderRef {
    pub fn new(urn: Urn, id: impl Into<String>) -> Self {
        ProviderRef(format!("{urn}::{}", id.into()))
    }

    pub fn urn(&self) -> Urn {
        // Constructed only via `new`/`FromStr`, both of which validate the split.
        let (urn, _) = self.0.rsplit_once("::").expect("validated at construction");
        Urn::parse(urn).expect("validated at construction")
    }

    pub fn id(&self) -> &str {
        self.0.rsplit_once("::").expect("validated at construction").1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderRef {
    type Err = BadProviderReference;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (urn, id) = s.rsplit_once("::").ok_or_else(|| BadProviderReference(s.to_string()))?;
        if id.is_empty() || Urn::parse(urn).is_err() {
            return Err(BadProviderReference(s.to_string()));
        }
        Ok(ProviderRef(s.to_string()))
    }
}

/// A `default_<pkg>` style provider reference denied by policy fails every
/// operation routed through it with this reason.
pub fn is_denied_default(provider_name: &str, denied: &[String]) -> bool {
    denied.iter().any(|d| d == provider_name)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomTimeouts {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_secs")]
    pub create: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_secs")]
    pub update: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_duration_secs")]
    pub delete: Option<Duration>,
}

mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_secs_f64()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.map(Duration::from_secs_f64))
    }
}

/// A prior URN under which a logically identical resource used to be known.
/// `None` fields inherit the current goal's own value — e.g. an alias that
/// only overrides `parent` keeps the goal's type and name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    /// When set, the aliased resource had no parent regardless of `parent`.
    #[serde(default)]
    pub no_parent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alias {
    /// A literal prior URN.
    Urn(Urn),
    /// A partial specification resolved against the owning goal at alias time.
    Spec(AliasSpec),
}

/// Mutable record tracked for one URN across a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub urn: Urn,
    pub ty: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderRef>,
    pub custom: bool,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub inputs: PropertyMap,
    #[serde(default)]
    pub outputs: PropertyMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Urn>,
    #[serde(default)]
    pub dependencies: Vec<Urn>,
    #[serde(default)]
    pub property_dependencies: indexmap::IndexMap<String, Vec<Urn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_with: Option<Urn>,
    #[serde(default)]
    pub protect: bool,
    #[serde(default)]
    pub retain_on_delete: bool,
    /// Marks a tombstone: this copy of the URN is pending deletion.
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub pending_replacement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_id: Option<String>,
    #[serde(default)]
    pub aliases: Vec<Urn>,
    #[serde(default)]
    pub custom_timeouts: CustomTimeouts,
    #[serde(default)]
    pub additional_secret_outputs: Vec<String>,
    #[serde(default)]
    pub ignore_changes: Vec<String>,
    #[serde(default)]
    pub replace_on_changes: Vec<String>,
    #[serde(default)]
    pub init_errors: Vec<String>,
    /// Set for provider-materialized child resources: the parent whose
    /// provider produced this resource as a side effect of `Construct`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_of: Option<Urn>,
}

impl ResourceState {
    /// A component resource performs no provider operations; it only aggregates children.
    pub fn is_component(&self) -> bool {
        !self.custom
    }

    pub fn has_init_errors(&self) -> bool {
        !self.init_errors.is_empty()
    }

    /// Whether `replace_on_changes` requests a forced replace on init errors
    /// via the `*` wildcard, per the `#initerror` sentinel behavior.
    pub fn wants_initerror_replace(&self) -> bool {
        self.has_init_errors() && self.replace_on_changes.iter().any(|k| k == "*")
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct ResourceStateBuilder => ResourceState {
        into {
            urn: Urn = Urn::parse("urn:pulumi:dev::proj::pkg:index:Widget::r").unwrap(),
            ty: String = "pkg:index:Widget",
            name: String = "r",
            id: String = "",
        }
        set {
            provider: Option<ProviderRef> = None,
            custom: bool = true,
            external: bool = false,
            inputs: PropertyMap = PropertyMap::new(),
            outputs: PropertyMap = PropertyMap::new(),
            parent: Option<Urn> = None,
            dependencies: Vec<Urn> = Vec::new(),
            property_dependencies: indexmap::IndexMap<String, Vec<Urn>> = indexmap::IndexMap::new(),
            deleted_with: Option<Urn> = None,
            protect: bool = false,
            retain_on_delete: bool = false,
            delete: bool = false,
            pending_replacement: bool = false,
            import_id: Option<String> = None,
            aliases: Vec<Urn> = Vec::new(),
            custom_timeouts: CustomTimeouts = CustomTimeouts::default(),
            additional_secret_outputs: Vec<String> = Vec::new(),
            ignore_changes: Vec<String> = Vec::new(),
            replace_on_changes: Vec<String> = Vec::new(),
            init_errors: Vec<String> = Vec::new(),
            view_of: Option<Urn> = None,
        }
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
