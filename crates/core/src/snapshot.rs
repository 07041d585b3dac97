// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot: the persisted record of resources at a point in time.
//!
//! Persistence itself is an external collaborator's job; this module only
//! owns the shape of the record and the integrity invariants the rest of the
//! engine relies on.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;
use crate::resource::ResourceState;
use crate::step::StepOp;
use crate::urn::Urn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub tool_version: String,
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub resource: ResourceState,
    pub op: StepOp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub manifest: Manifest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_manager: Option<String>,
    /// Topologically sorted: every reference in `resources[i]` that is not a
    /// tombstone points at some `resources[j]` with `j < i`.
    pub resources: Vec<ResourceState>,
    #[serde(default)]
    pub pending_operations: Vec<PendingOperation>,
}

impl Snapshot {
    pub fn new(manifest: Manifest) -> Self {
        Snapshot { manifest, secrets_manager: None, resources: Vec::new(), pending_operations: Vec::new() }
    }

    pub fn find(&self, urn: &Urn) -> Option<&ResourceState> {
        // Prefer the live copy over a tombstone when both are present.
        self.resources.iter().filter(|r| &r.urn == urn).min_by_key(|r| r.delete)
    }

    /// Validate the topological-ordering and referential invariants a valid
    /// snapshot must hold (§3, §8 property 1).
    pub fn validate(&self) -> Result<(), IntegrityError> {
        let mut seen_live: HashSet<&Urn> = HashSet::new();

        for (self_idx, r) in self.resources.iter().enumerate() {
            if !r.delete && !seen_live.insert(&r.urn) {
                return Err(IntegrityError {
                    urn: r.urn.clone(),
                    reason: "duplicate non-tombstone urn in snapshot".into(),
                });
            }

            let check_ref = |referent: &Urn, field: &'static str| -> Result<(), IntegrityError> {
                let earlier_copy = self.resources[..self_idx].iter().any(|x| &x.urn == referent);
                let tombstone_copy = self.resources.iter().any(|x| &x.urn == referent && x.delete);
                if earlier_copy || tombstone_copy {
                    return Ok(());
                }
                if self.resources.iter().any(|x| &x.urn == referent) {
                    Err(IntegrityError {
                        urn: r.urn.clone(),
                        reason: format!(
                            "{field} {referent} does not precede its referent in topological order"
                        ),
                    })
                } else {
                    Err(IntegrityError {
                        urn: r.urn.clone(),
                        reason: format!("{field} {referent} does not resolve"),
                    })
                }
            };

            if let Some(parent) = &r.parent {
                check_ref(parent, "parent")?;
            }
            for dep in &r.dependencies {
                check_ref(dep, "dependency")?;
            }
            for deps in r.property_dependencies.values() {
                for dep in deps {
                    check_ref(dep, "property-dependency")?;
                }
            }
            if let Some(dw) = &r.deleted_with {
                check_ref(dw, "deleted-with")?;
            }
            if r.custom && !r.is_component() {
                if let Some(provider) = &r.provider {
                    check_ref(&provider.urn(), "provider")?;
                }
            }
            if r.urn.is_provider_type() && r.ty != r.urn.ty() {
                return Err(IntegrityError {
                    urn: r.urn.clone(),
                    reason: "provider resource type does not satisfy IsProviderType".into(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
