// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dce-driver: the deployment driver (§4.10) — refresh, generate, execute,
//! finalize, snapshot assembly — plus `Construct` for sub-stacks and the
//! source/event contracts a running program is driven through.

mod construct;
mod driver;
mod options;
mod snapshot;
mod source;

pub use construct::{
    ConstructError, ConstructRequest, LanguageHost, ProgramSource, SubMonitor, SubMonitorProxy,
};
pub use driver::{Deployment, DriverError, EngineLoader};
pub use options::DeploymentOptions;
pub use snapshot::assemble;
pub use source::{
    EventIterator, ReadResult, RegisterResult, Source, SourceError, SourceEvent,
};
