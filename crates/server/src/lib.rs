// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-server: configuration, component wiring, and the typed API
//! surface the HTTP layer calls into.
//!
//! The request/response plumbing itself is an external collaborator;
//! this crate defines the operations, their inputs/outputs, and the
//! error-to-status mapping, plus the `nid` daemon binary.

pub mod api;
pub mod config;
pub mod deid;
pub mod error;
pub mod handlers;
pub mod presets;
pub mod probe;
pub mod server;

pub use api::SubmitRequest;
pub use config::{BackendType, Config, ConfigError};
pub use deid::{DeidReport, Deidentifier, NoopDeidentifier};
pub use error::ServerError;
pub use presets::resource_presets;
pub use probe::{SysinfoProbe, SystemProbe, SystemResources};
pub use server::{Deps, Server};
