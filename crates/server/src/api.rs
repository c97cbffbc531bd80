// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response shapes for the HTTP surface.
//!
//! The HTTP plumbing (routing, serialisation, status codes) is an
//! external collaborator; these are the types it carries.

use ni_core::{JobInfo, JobStatus, ResourceSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `POST /api/plugins/{id}/submit` and
/// `POST /api/workflows/{id}/submit`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub input_files: Vec<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    /// Explicit resources win over `resource_profile`.
    #[serde(default)]
    pub resources: Option<ResourceSpec>,
    /// Named preset or plugin profile (small/medium/large/max).
    #[serde(default)]
    pub resource_profile: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<JobInfo>,
    pub total: usize,
}

/// One row of the lightweight progress poll.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEntry {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub current_phase: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressResponse {
    pub jobs: Vec<ProgressEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub job_id: String,
    pub deleted: bool,
}

/// Aggregate service health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub backend_type: String,
    pub healthy: bool,
    pub message: String,
}
