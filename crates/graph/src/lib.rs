// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dce-graph: concurrency primitives and the resource dependency graph.

mod dependency_graph;
mod resource_lock;
mod worker_pool;

pub use dependency_graph::DependencyGraph;
pub use resource_lock::{ResourceGuard, ResourceLock};
pub use worker_pool::{BoxTaskError, PoolErrors, WorkerPool};
