// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-backends: the execution-backend contract and its three
//! implementations: local Docker, remote Docker over SSH, and SLURM.
//!
//! Every backend satisfies [`ExecutionBackend`] exactly; the HTTP layer
//! and the job executor depend on nothing else.

pub mod backend;
pub mod local;
pub mod remote_docker;
pub mod slurm;

pub use backend::{BackendHealth, ExecutionBackend};
pub use local::LocalDockerBackend;
pub use remote_docker::RemoteDockerBackend;
pub use slurm::SlurmBackend;
