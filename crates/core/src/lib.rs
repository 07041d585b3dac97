// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dce-core: data model shared by every component of the deployment engine.
//!
//! URNs, resource state, goals, steps, plans, and snapshots live here with
//! no knowledge of concurrency, providers, or the wire protocol — those
//! belong to `dce-graph`, `dce-registry`, and `dce-wire` respectively.

pub mod macros;

pub mod clock;
pub mod error;
pub mod goal;
pub mod id;
pub mod plan;
pub mod property;
pub mod resource;
pub mod snapshot;
pub mod step;
pub mod target;
pub mod urn;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{EngineError, InitError, IntegrityError, ProviderError, ValidationError};
#[cfg(any(test, feature = "test-support"))]
pub use goal::GoalBuilder;
pub use goal::Goal;
pub use id::{short, IdBuf};
pub use plan::{DiffChanges, Plan, PlanEntry, PropertyDiff};
pub use property::{maps_equal_ignoring, PropertyMap, PropertyValue};
#[cfg(any(test, feature = "test-support"))]
pub use resource::ResourceStateBuilder;
pub use resource::{
    Alias, AliasSpec, BadProviderReference, CustomTimeouts, ProviderRef, ResourceState,
};
pub use snapshot::{Manifest, PendingOperation, PluginSpec, Snapshot};
pub use step::{Step, StepChain, StepOp, StepStatus};
pub use target::TargetSet;
pub use urn::{Urn, UrnError};
