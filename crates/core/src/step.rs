// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Steps: the closed set of operations the executor can apply to a resource.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::resource::ProviderRef;
use crate::resource::ResourceState;
use crate::urn::Urn;

/// The closed set of resource operations the step generator can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepOp {
    Same,
    Create,
    Update,
    Replace,
    CreateReplacement,
    DeleteReplaced,
    Delete,
    Refresh,
    Read,
    ReadReplacement,
    DiscardReplaced,
    ReadDiscard,
    RemovePendingReplace,
    Import,
    ImportReplacement,
}

crate::simple_display! {
    StepOp {
        Same => "same",
        Create => "create",
        Update => "update",
        Replace => "replace",
        CreateReplacement => "create-replacement",
        DeleteReplaced => "delete-replaced",
        Delete => "delete",
        Refresh => "refresh",
        Read => "read",
        ReadReplacement => "read-replacement",
        DiscardReplaced => "discard-replaced",
        ReadDiscard => "read-discard",
        RemovePendingReplace => "remove-pending-replace",
        Import => "import",
        ImportReplacement => "import-replacement",
    }
}

impl StepOp {
    /// Whether this step op mutates provider-managed state (vs. bookkeeping-only).
    pub fn touches_provider(self) -> bool {
        !matches!(
            self,
            StepOp::Replace
                | StepOp::DiscardReplaced
                | StepOp::ReadDiscard
                | StepOp::RemovePendingReplace
        )
    }

    /// Whether this op logically creates the `new` state (affects dependency barriers).
    pub fn is_creating(self) -> bool {
        matches!(
            self,
            StepOp::Create | StepOp::CreateReplacement | StepOp::Import | StepOp::ImportReplacement
        )
    }

    /// Whether this op removes the `old` state from the snapshot on success.
    pub fn is_deleting(self) -> bool {
        matches!(
            self,
            StepOp::Delete | StepOp::DeleteReplaced | StepOp::DiscardReplaced | StepOp::ReadDiscard
        )
    }
}

/// Outcome of applying one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    PartialFailure,
    Unknown,
}

/// One atomic operation over a resource URN, carrying the before/after state
/// pointers the executor needs to apply it and update the snapshot.
#[derive(Debug, Clone)]
pub struct Step {
    pub op: StepOp,
    pub urn: Urn,
    pub old: Option<Arc<ResourceState>>,
    pub new: Option<Arc<ResourceState>>,
    pub provider: Option<ProviderRef>,
}

impl Step {
    pub fn new(op: StepOp, urn: Urn) -> Self {
        Step { op, urn, old: None, new: None, provider: None }
    }

    pub fn with_old(mut self, old: Arc<ResourceState>) -> Self {
        self.old = Some(old);
        self
    }

    pub fn with_new(mut self, new: Arc<ResourceState>) -> Self {
        self.new = Some(new);
        self
    }

    pub fn with_provider(mut self, provider: ProviderRef) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The resource this step's dependency barrier and locks should key off.
    pub fn dependency_state(&self) -> Option<&Arc<ResourceState>> {
        self.new.as_ref().or(self.old.as_ref())
    }
}

/// A list of steps against one URN that must run serially, in order — e.g.
/// `create-replacement` → `replace` → `delete-replaced`.
pub type StepChain = Vec<Step>;

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
