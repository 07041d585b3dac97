// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan: the machine-readable record of what a deployment decided to do.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::goal::Goal;
use crate::property::PropertyMap;
use crate::step::StepOp;
use crate::urn::Urn;

/// Whether a provider's diff calls for an in-place update or a destructive replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChanges {
    None,
    Some,
    Unknown,
}

/// Result of a provider's `Diff` call, carried into the plan for replay/inspection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDiff {
    pub changed_keys: Vec<String>,
    pub replace_keys: Vec<String>,
    pub stables: Vec<String>,
    /// Provider requested replacement outright (independent of replace_keys).
    #[serde(default)]
    pub replace_requested: bool,
}

impl PropertyDiff {
    pub fn changes(&self) -> DiffChanges {
        if self.changed_keys.is_empty() && !self.replace_requested {
            DiffChanges::None
        } else {
            DiffChanges::Some
        }
    }

    pub fn requires_replace(&self) -> bool {
        self.replace_requested || !self.replace_keys.is_empty()
    }
}

/// Recorded decision for one resource: its step ops, the goal that produced
/// them, and (when a diff ran) the diff result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    pub ops: Vec<StepOp>,
    pub goal: Goal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<PropertyDiff>,
}

/// Mapping from URN to its plan entry, plus the stack config in effect when
/// the plan was computed. Partial if any input contained unknown values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub entries: IndexMap<Urn, PlanEntry>,
    pub config: PropertyMap,
    pub partial: bool,
}

impl Plan {
    pub fn new(config: PropertyMap) -> Self {
        Plan { entries: IndexMap::new(), config, partial: false }
    }

    pub fn record(&mut self, urn: Urn, ops: Vec<StepOp>, goal: Goal, diff: Option<PropertyDiff>) {
        if goal.is_partial() {
            self.partial = true;
        }
        self.entries.insert(urn, PlanEntry { ops, goal, diff });
    }

    pub fn entry(&self, urn: &Urn) -> Option<&PlanEntry> {
        self.entries.get(urn)
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
