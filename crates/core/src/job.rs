// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job row model and lifecycle state machine.
//!
//! A job is a persisted, soft-deletable record of one pipeline execution.
//! Transitions are strictly forward:
//!
//! ```text
//! pending ──▶ running ──▶ completed | failed | cancelled
//! pending ──▶ cancelled | failed            (before the container starts)
//! ```

use crate::spec::{JobInfo, JobSpec, ResourceSpec};
use crate::time_fmt::format_elapsed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Universal job status across all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
        Unknown => "unknown",
    }
}

impl JobStatus {
    /// Parse a status string, mapping anything unrecognised to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Unknown,
        }
    }

    /// Terminal states absorb: no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Pending or running.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition(self, next: JobStatus) -> bool {
        match self {
            JobStatus::Pending => matches!(
                next,
                JobStatus::Running | JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            ),
            JobStatus::Running => matches!(
                next,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            ),
            JobStatus::Unknown => true,
            _ => false,
        }
    }
}

/// Whether the job runs a single plugin or a linear workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Plugin,
    Workflow,
}

crate::simple_display! {
    ExecutionMode {
        Plugin => "plugin",
        Workflow => "workflow",
    }
}

/// A persisted job row.
///
/// One row per submission; all writes after insert go through the
/// executor except the initial insert and the cancel handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID v4).
    pub id: String,
    /// Execution backend: local, remote_docker or slurm.
    pub backend_type: String,
    /// Scheduler-specific id: container id, SLURM job id, or remote
    /// container name. None until the backend reports it.
    pub backend_job_id: Option<String>,
    pub pipeline_name: String,
    pub pipeline_version: Option<String>,
    pub container_image: String,
    pub input_files: Vec<String>,
    pub parameters: HashMap<String, serde_json::Value>,
    pub resources: ResourceSpec,
    pub status: JobStatus,
    /// Estimated progress percentage (0-100), monotone non-decreasing.
    pub progress: u8,
    /// Current pipeline phase label.
    pub current_phase: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output_dir: String,
    pub exit_code: Option<i64>,
    pub error_message: Option<String>,
    pub execution_mode: ExecutionMode,
    pub plugin_id: Option<String>,
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a fresh `pending` row from a validated submission.
    pub fn from_spec(
        job_id: impl Into<String>,
        backend_type: impl Into<String>,
        spec: &JobSpec,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: job_id.into(),
            backend_type: backend_type.into(),
            backend_job_id: None,
            pipeline_name: spec.pipeline_name.clone(),
            pipeline_version: spec.pipeline_version.clone(),
            container_image: spec.container_image.clone(),
            input_files: spec.input_files.clone(),
            parameters: spec.parameters.clone(),
            resources: spec.resources.clone(),
            status: JobStatus::Pending,
            progress: 0,
            current_phase: None,
            submitted_at: now,
            started_at: None,
            completed_at: None,
            output_dir: spec.output_dir.clone(),
            exit_code: None,
            error_message: None,
            execution_mode: spec.execution_mode,
            plugin_id: spec.plugin_id.clone(),
            workflow_id: spec.workflow_id.clone(),
            user_id: None,
            created_by: None,
            tags: Vec::new(),
            deleted: false,
            deleted_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Completed with exit code 0.
    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Completed && self.exit_code == Some(0)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_retry(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Job runtime in whole seconds.
    ///
    /// For running jobs: start to `now`. For finished jobs: start to
    /// completion. None until the job starts.
    pub fn runtime_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or(now);
        Some((end - started).num_seconds().max(0))
    }

    /// Human-readable runtime like `2h 34m 12s`.
    pub fn runtime_formatted(&self, now: DateTime<Utc>) -> String {
        match self.runtime_seconds(now) {
            Some(secs) => format_elapsed(secs as u64),
            None => "Not started".to_string(),
        }
    }

    pub fn mark_started(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Running;
        self.started_at = Some(now);
    }

    pub fn mark_completed(&mut self, exit_code: i64, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(now);
        self.exit_code = Some(exit_code);
        self.progress = 100;
        self.current_phase = Some("Completed".to_string());
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>, exit_code: i64, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(now);
        self.error_message = Some(error_message.into());
        self.exit_code = Some(exit_code);
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Cancelled;
        self.completed_at = Some(now);
    }

    /// Soft delete: the row stays, queries skip it.
    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(now);
    }

    /// Snapshot for API responses and backend `info()` calls.
    pub fn to_info(&self) -> JobInfo {
        JobInfo {
            job_id: self.id.clone(),
            status: self.status,
            pipeline_name: self.pipeline_name.clone(),
            container_image: self.container_image.clone(),
            backend_job_id: self.backend_job_id.clone(),
            progress: self.progress,
            current_phase: self.current_phase.clone(),
            submitted_at: Some(self.submitted_at),
            started_at: self.started_at,
            completed_at: self.completed_at,
            exit_code: self.exit_code,
            error_message: self.error_message.clone(),
            output_dir: Some(self.output_dir.clone()),
        }
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: String = "job-1",
            backend_type: String = "local",
            pipeline_name: String = "test-pipeline",
            container_image: String = "freesurfer/freesurfer:7.4.1",
            output_dir: String = "/tmp/data/outputs/job-1",
        }
        set {
            input_files: Vec<String> = Vec::new(),
            parameters: HashMap<String, serde_json::Value> = HashMap::new(),
            resources: ResourceSpec = ResourceSpec::default(),
            status: JobStatus = JobStatus::Pending,
            progress: u8 = 0,
            execution_mode: ExecutionMode = ExecutionMode::Plugin,
            tags: Vec<String> = Vec::new(),
            deleted: bool = false,
        }
        option {
            backend_job_id: String = None,
            pipeline_version: String = None,
            current_phase: String = None,
            started_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
            exit_code: i64 = None,
            error_message: String = None,
            plugin_id: String = None,
            workflow_id: String = None,
            user_id: String = None,
            created_by: String = None,
            deleted_at: DateTime<Utc> = None,
        }
        computed {
            submitted_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
