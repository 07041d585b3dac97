// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared across the engine (§7).
//!
//! These are the narrow, structured errors individual components raise;
//! `dce-engine` wraps them into whatever top-level error its driver returns.

use thiserror::Error;

use crate::urn::Urn;

/// Snapshot post-condition violated. Always fatal — the driver cannot
/// safely write a snapshot it cannot prove is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("snapshot integrity violated at {urn}: {reason}")]
pub struct IntegrityError {
    pub urn: Urn,
    pub reason: String,
}

/// Raised by the step generator before any provider is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate urn in program output: {0}")]
    DuplicateUrn(Urn),
    #[error("resource {urn} declares parent {parent} which does not exist")]
    MissingParent { urn: Urn, parent: Urn },
    #[error("resource {urn} has an invalid provider reference: {reason}")]
    BadProviderReference { urn: Urn, reason: String },
    #[error("aliases of {urn} conflict: {reason}")]
    AliasConflict { urn: Urn, reason: String },
    #[error("resource {urn} is protected and cannot be {attempted}")]
    ProtectedResource { urn: Urn, attempted: &'static str },
}

/// Substrings that indicate a provider's `Create`/`Update` error actually
/// means "this resource already exists" rather than a genuine failure.
const ALREADY_EXISTS_MARKERS: &[&str] =
    &["already exists", "conflict", "status code 409", "alreadyexists", "entityalreadyexists"];

/// Raised by the step executor when a provider call fails.
#[derive(Debug, Clone, Error)]
#[error("provider error for {urn} during {operation}: {message}")]
pub struct ProviderError {
    pub urn: Urn,
    pub operation: &'static str,
    pub message: String,
}

impl ProviderError {
    pub fn new(urn: Urn, operation: &'static str, message: impl Into<String>) -> Self {
        ProviderError { urn, operation, message: message.into() }
    }

    /// Whether the message indicates the resource already exists at the
    /// provider, in which case the executor attaches an import hint.
    pub fn looks_like_already_exists(&self) -> bool {
        let lower = self.message.to_lowercase();
        ALREADY_EXISTS_MARKERS.iter().any(|m| lower.contains(m))
    }

    /// Guidance appended to the error when `looks_like_already_exists` holds.
    pub fn import_hint(&self) -> String {
        format!(
            "resource {} may already exist; import it with `pulumi import {} {} <id>`",
            self.urn,
            self.urn.ty(),
            self.urn.name(),
        )
    }
}

/// `InitError`: a resource was created but failed post-creation
/// initialization checks. Treated as partial success: the new state,
/// its outputs, and the recorded reasons are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{urn} reported {} init error(s)", reasons.len())]
pub struct InitError {
    pub urn: Urn,
    pub reasons: Vec<String>,
}

/// Top-level error a deployment run can fail with.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Init(#[from] InitError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    /// The program explicitly asked the engine to stop; not a user-facing
    /// failure and must propagate unchanged.
    #[error("bail")]
    Bail,
    /// The driver's context was cancelled; not reported as a user error.
    #[error("cancelled")]
    Cancelled,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
