// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ni-registry: plugin & workflow registry.
//!
//! Plugins are single-tool execution units loaded from YAML; workflows
//! are curated sequences of plugin steps. All computation lives in
//! plugins; workflows only orchestrate. Hidden utility plugins
//! (`user_selectable: false`) are only reachable through workflows.

pub mod images;
pub mod lockfile;
pub mod plugin;
pub mod registry;
pub mod template;
pub mod workflow;

pub use images::{image_allowed, image_base, ALLOWED_IMAGE_PREFIXES};
pub use lockfile::{
    Lockfile, LockedPlugin, LockedWorkflow, Mismatch, MismatchIssue, VerifyReport, VerifyStatus,
};
pub use plugin::{InputDef, ParameterDef, ParameterType, Plugin};
pub use registry::{Registry, RegistryError, Snapshot};
pub use template::{render_command, sanitize_param};
pub use workflow::{Workflow, WorkflowStep};
