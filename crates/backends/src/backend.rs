// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution-backend contract.

use async_trait::async_trait;
use ni_core::{ExecutionError, JobInfo, JobLogs, JobSpec, JobStatus};
use serde::Serialize;

/// Backend health report. [`ExecutionBackend::health`] never errors;
/// problems land in `healthy = false` plus a readable message.
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub message: String,
    pub details: serde_json::Value,
}

impl BackendHealth {
    pub fn unhealthy(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self { healthy: false, message: message.into(), details }
    }

    pub fn healthy(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self { healthy: true, message: message.into(), details }
    }
}

/// Common contract for job execution backends.
///
/// Deployment-agnostic: local Docker, remote Docker over SSH, and
/// SLURM all behave identically from the caller's side.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Backend type identifier: `local`, `remote_docker`, or `slurm`.
    fn backend_type(&self) -> &'static str;

    /// Submit a job.
    ///
    /// On success the job row exists as `pending` or `running` and
    /// durable work has been enqueued (or the container launched).
    async fn submit(&self, spec: JobSpec, job_id: Option<String>) -> Result<String, ExecutionError>;

    /// Current job status.
    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutionError>;

    /// Full job snapshot: status, progress, phase, timing, exit code.
    async fn info(&self, job_id: &str) -> Result<JobInfo, ExecutionError>;

    /// Cancel a running or pending job.
    ///
    /// Returns true when a live process was signalled or a queued task
    /// revoked; a second cancel of the same job returns false.
    async fn cancel(&self, job_id: &str) -> Result<bool, ExecutionError>;

    /// Best-effort logs; missing logs are empty strings, not errors.
    async fn logs(&self, job_id: &str) -> Result<JobLogs, ExecutionError>;

    /// Jobs sorted `submitted_at DESC`, optionally filtered by status.
    async fn list(
        &self,
        status_filter: Option<&[JobStatus]>,
        limit: usize,
    ) -> Result<Vec<JobInfo>, ExecutionError>;

    /// Remove backend artefacts and soft-delete the row.
    async fn cleanup(&self, job_id: &str) -> Result<bool, ExecutionError>;

    /// Probe backend availability. Never raises.
    async fn health(&self) -> BackendHealth;
}
