// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-executor: the durable task worker that drives one container
//! through its lifecycle.
//!
//! Tasks arrive through the spool (at-most-once submission); a worker
//! claims a task, resolves parameters, stages inputs, launches the
//! hardened container, reduces log chunks into milestone progress, and
//! records the terminal state, retrying transient failures with
//! exponential backoff. Redelivered tasks are handled re-entrantly:
//! terminal rows short-circuit, running rows resume by label lookup.

pub mod layout;
pub mod params;
pub mod progress;
pub mod run;
pub mod runtime;
pub mod staging;
pub mod worker;

pub use layout::{JobDirs, CONTAINER_INPUTS, CONTAINER_OUTPUTS};
pub use progress::MilestoneTracker;
pub use run::{Executor, ExecutorConfig, RetryPolicy};
pub use runtime::{ContainerRuntime, ContainerState, DockerRuntime, LogChunk, LogStreamKind, RunSpec, RuntimeInfo};
#[cfg(any(test, feature = "test-support"))]
pub use runtime::{FakeRuntime, Script};
pub use worker::WorkerPool;
