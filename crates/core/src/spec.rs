// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission and query types shared by every execution backend.

use crate::job::{ExecutionMode, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Computational resource requirements for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub memory_gb: u32,
    pub cpus: u32,
    pub time_hours: u32,
    pub gpu: bool,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self { memory_gb: 8, cpus: 4, time_hours: 6, gpu: false }
    }
}

impl ResourceSpec {
    /// Threads left for the pipeline after reserving one core for
    /// orchestration. Never below 1.
    pub fn omp_nthreads(&self) -> u32 {
        self.cpus.saturating_sub(1).max(1)
    }

    /// Parse a loose map of resource values, falling back to defaults
    /// for anything absent or malformed.
    pub fn from_map(map: &HashMap<String, serde_json::Value>) -> Self {
        let defaults = Self::default();
        let as_u32 = |key: &str, fallback: u32| {
            map.get(key).and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(fallback)
        };
        Self {
            memory_gb: as_u32("memory_gb", defaults.memory_gb),
            cpus: as_u32("cpus", defaults.cpus),
            time_hours: as_u32("time_hours", defaults.time_hours),
            gpu: map.get("gpu").and_then(|v| v.as_bool()).unwrap_or(false),
        }
    }
}

/// Complete specification for submitting a job.
///
/// Serialisable so it can travel through the durable task spool intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub pipeline_name: String,
    pub container_image: String,
    pub input_files: Vec<String>,
    /// Canonical output directory for the job (under the data dir).
    pub output_dir: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub resources: ResourceSpec,
    pub pipeline_version: Option<String>,
    pub plugin_id: Option<String>,
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Resolved command template; None for legacy container-default jobs.
    #[serde(default)]
    pub command_template: Option<String>,
    /// Ordered plugin ids for workflow jobs; empty for plugin jobs.
    #[serde(default)]
    pub workflow_steps: Vec<String>,
    /// Base data directory the output tree lives under.
    #[serde(default)]
    pub data_dir: String,
}

crate::builder! {
    pub struct JobSpecBuilder => JobSpec {
        into {
            pipeline_name: String = "FastSurfer",
            container_image: String = "deepmi/fastsurfer:latest",
            output_dir: String = "/tmp/data/outputs/job-1",
            data_dir: String = "/tmp/data",
        }
        set {
            input_files: Vec<String> = Vec::new(),
            parameters: HashMap<String, serde_json::Value> = HashMap::new(),
            resources: ResourceSpec = ResourceSpec::default(),
            execution_mode: ExecutionMode = ExecutionMode::Plugin,
            workflow_steps: Vec<String> = Vec::new(),
        }
        option {
            pipeline_version: String = None,
            plugin_id: String = Some("fastsurfer".to_string()),
            workflow_id: String = None,
            command_template: String = None,
        }
    }
}

/// Detailed information about a job, as reported by a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: String,
    pub status: JobStatus,
    pub pipeline_name: String,
    #[serde(default)]
    pub container_image: String,
    pub backend_job_id: Option<String>,
    #[serde(default)]
    pub progress: u8,
    pub current_phase: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i64>,
    pub error_message: Option<String>,
    pub output_dir: Option<String>,
}

/// Captured job output streams. Best-effort: absent logs are empty
/// strings, not errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobLogs {
    pub job_id: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl JobLogs {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self { job_id: job_id.into(), stdout: String::new(), stderr: String::new() }
    }
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
