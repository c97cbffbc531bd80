// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical job-directory layout.
//!
//! ```text
//! <data_dir>/outputs/<job_id>/
//!   _inputs/           staged, renamed input files
//!   native/            primary pipeline outputs
//!   bundle/volumes/    viewer-ready NIfTI derived from native
//!   bundle/metrics/    JSON/CSV summaries
//!   bundle/qc/         images/HTML reports
//!   logs/              container.log, stdout.log, stderr.log, <step>.log
//!   job_spec.json      auditable submission record
//! ```

use ni_core::JobSpec;
use std::path::{Path, PathBuf};

/// Input mount point inside the container (read-only).
pub const CONTAINER_INPUTS: &str = "/data/inputs";
/// Output mount point inside the container (read-write).
pub const CONTAINER_OUTPUTS: &str = "/data/outputs";

/// Paths within one job's output tree.
#[derive(Debug, Clone)]
pub struct JobDirs {
    root: PathBuf,
}

impl JobDirs {
    pub fn new(data_dir: &Path, job_id: &str) -> Self {
        Self { root: data_dir.join("outputs").join(job_id) }
    }

    /// Wrap an existing output root directly.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inputs(&self) -> PathBuf {
        self.root.join("_inputs")
    }

    pub fn native(&self) -> PathBuf {
        self.root.join("native")
    }

    pub fn bundle_volumes(&self) -> PathBuf {
        self.root.join("bundle").join("volumes")
    }

    pub fn bundle_metrics(&self) -> PathBuf {
        self.root.join("bundle").join("metrics")
    }

    pub fn bundle_qc(&self) -> PathBuf {
        self.root.join("bundle").join("qc")
    }

    pub fn bundle(&self) -> PathBuf {
        self.root.join("bundle")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn container_log(&self) -> PathBuf {
        self.logs().join("container.log")
    }

    pub fn stdout_log(&self) -> PathBuf {
        self.logs().join("stdout.log")
    }

    pub fn stderr_log(&self) -> PathBuf {
        self.logs().join("stderr.log")
    }

    pub fn step_log(&self, step: &str) -> PathBuf {
        self.logs().join(format!("{step}.log"))
    }

    pub fn job_spec(&self) -> PathBuf {
        self.root.join("job_spec.json")
    }

    /// Create the whole canonical tree.
    pub fn create(&self) -> std::io::Result<()> {
        for dir in [
            self.inputs(),
            self.native(),
            self.bundle_volumes(),
            self.bundle_metrics(),
            self.bundle_qc(),
            self.logs(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Write the auditable submission record.
///
/// Placeholder-prefixed (`_`) parameters are filtered out.
pub fn write_job_spec(dirs: &JobDirs, spec: &JobSpec) -> std::io::Result<()> {
    let safe_params: serde_json::Map<String, serde_json::Value> = spec
        .parameters
        .iter()
        .filter(|(k, _)| !k.starts_with('_'))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let record = serde_json::json!({
        "pipeline_name": spec.pipeline_name,
        "container_image": spec.container_image,
        "input_files": spec.input_files,
        "parameters": safe_params,
        "resources": spec.resources,
        "plugin_id": spec.plugin_id,
        "workflow_id": spec.workflow_id,
        "execution_mode": spec.execution_mode,
        "has_command_template": spec.command_template.is_some(),
    });

    std::fs::write(dirs.job_spec(), serde_json::to_vec_pretty(&record)?)
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
