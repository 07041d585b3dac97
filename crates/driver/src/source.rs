// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source contract (§6): the program-facing event stream a deployment
//! drains. A `Source` is one running program (or sub-program, for
//! `Construct` — see `construct.rs`); an `EventIterator` is the live stream
//! of monitor calls it makes while running.
//!
//! The language-runtime host behind a `Source` is an opaque external
//! collaborator (§1): this module only names the shape the driver consumes,
//! not how a program is launched or how its RPCs are transported.

use async_trait::async_trait;
use dce_core::{Goal, PropertyMap, ProviderRef, Urn};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Failed(String),
    /// The program asked the engine to stop; propagated verbatim (§7).
    #[error("bail")]
    Bail,
}

/// Handed back to a register-resource event's `Done` callback once the
/// resource's chain has reached its post-step barrier.
#[derive(Debug, Clone)]
pub struct RegisterResult {
    pub urn: Urn,
    pub id: String,
    pub outputs: PropertyMap,
}

/// Handed back to a read-resource event's `Done` callback.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub urn: Urn,
    pub outputs: PropertyMap,
}

/// One call the running program makes against its monitor (§6 Event
/// variants). Each variant blocks the program (via its `done` channel)
/// until the driver has processed it.
pub enum SourceEvent {
    RegisterResource {
        goal: Box<Goal>,
        done: oneshot::Sender<Result<RegisterResult, SourceError>>,
    },
    ReadResource {
        id: String,
        ty: String,
        name: String,
        parent: Option<Urn>,
        properties: PropertyMap,
        provider: Option<ProviderRef>,
        done: oneshot::Sender<Result<ReadResult, SourceError>>,
    },
    RegisterResourceOutputs {
        urn: Urn,
        outputs: PropertyMap,
        done: oneshot::Sender<Result<(), SourceError>>,
    },
    RegisterResourceExtension {
        provider: ProviderRef,
        parameterization: serde_json::Value,
        done: oneshot::Sender<Result<(), SourceError>>,
    },
}

/// A live stream of events from one running program (§6 "an object exposing
/// `Next() -> event | nil` and `Cancel(ctx)`"). The generator closes the
/// iterator on a successful drain; on error it is abandoned to avoid
/// deadlock, per §6.
#[async_trait]
pub trait EventIterator: Send {
    /// Returns `None` once the program has finished emitting events.
    async fn next(&mut self) -> Result<Option<SourceEvent>, SourceError>;

    /// Best-effort: ask the program to stop. Does not need to be awaited to
    /// completion by callers that are themselves abandoning the iterator.
    async fn cancel(&mut self);
}

/// The running program whose desired state a deployment is driven against
/// (§6 "an object exposing `Project() -> name`, `Iterate(ctx, providers) ->
/// iterator`"). The provider registry a real host would need to resolve
/// default providers against is reached through the driver, not through
/// this trait, to keep `Source` free of a type parameter over the loader.
#[async_trait]
pub trait Source: Send + Sync {
    fn project(&self) -> &str;

    async fn iterate(&self, cancel: CancellationToken) -> Result<Box<dyn EventIterator>, SourceError>;
}
