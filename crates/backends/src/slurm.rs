// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SLURM HPC backend: sbatch over SSH, squeue/sacct polling, SFTP log
//! tailing. Data and processing stay on the cluster; only metadata
//! travels.

use crate::backend::{BackendHealth, ExecutionBackend};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use ni_core::{
    milestones_for, ExecutionError, Job, JobInfo, JobLogs, JobSpec, JobStatus, PhaseMilestone,
};
use ni_executor::params::{as_template_vars, resolve_parameters};
use ni_registry::{render_command, Registry};
use ni_remote::{SshError, SshSession};
use ni_storage::JobStore;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;

/// Map a SLURM state token to the universal status.
///
/// Suffixes like `CANCELLED+` are stripped by the caller.
pub fn map_slurm_state(state: &str) -> JobStatus {
    match state {
        "PENDING" | "CONFIGURING" | "SUSPENDED" => JobStatus::Pending,
        "RUNNING" | "COMPLETING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "CANCELLED" => JobStatus::Cancelled,
        "FAILED" | "TIMEOUT" | "OUT_OF_MEMORY" | "NODE_FAIL" | "PREEMPTED" => JobStatus::Failed,
        _ => JobStatus::Unknown,
    }
}

fn clean_state(raw: &str) -> String {
    raw.trim().to_uppercase().split('+').next().unwrap_or_default().to_string()
}

fn ssh_err(e: SshError) -> ExecutionError {
    ExecutionError::BackendUnavailable(format!("Cannot reach HPC: {e}"))
}

/// Detail parsed from one `sacct` line.
#[derive(Debug, Default, Clone)]
pub struct SacctDetail {
    pub status: Option<JobStatus>,
    pub exit_code: Option<i64>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Parse `sacct -P --format=JobID,State,ExitCode,Start,End,...` output.
pub fn parse_sacct_line(line: &str) -> SacctDetail {
    let parts: Vec<&str> = line.trim().split('|').collect();
    let mut detail = SacctDetail::default();
    if parts.len() < 5 {
        return detail;
    }

    detail.status = Some(map_slurm_state(&clean_state(parts[1])));

    // ExitCode is "code:signal".
    if let Some(code) = parts[2].split(':').next().and_then(|c| c.parse().ok()) {
        detail.exit_code = Some(code);
    }

    let parse_time = |raw: &str| -> Option<DateTime<Utc>> {
        if raw.is_empty() || raw == "Unknown" {
            return None;
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|t| t.and_utc())
    };
    detail.start_time = parse_time(parts[3]);
    detail.end_time = parse_time(parts[4]);
    detail
}

/// Parse the job id out of `Submitted batch job 12345`.
pub fn parse_sbatch_job_id(output: &str) -> Result<String, ExecutionError> {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new(r"Submitted batch job (\d+)").expect("constant regex pattern is valid");
    pattern
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ExecutionError::SubmitFailed(format!("Failed to parse SLURM job id from: {output}"))
        })
}

/// Scan a whole log for the highest-percentage milestone present.
///
/// SLURM progress is derived from the full `container.log` on every
/// poll. No cached cursor: O(file size) per poll, kept deliberately.
pub fn parse_log_progress(log: &str, milestones: &[PhaseMilestone]) -> (u8, String) {
    let mut best = 0;
    let mut label = "Running".to_string();
    for milestone in milestones {
        if milestone.pct <= best {
            continue;
        }
        let matched = match Regex::new(milestone.marker) {
            Ok(pattern) => pattern.is_match(log),
            Err(_) => log.contains(milestone.marker),
        };
        if matched {
            best = milestone.pct;
            label = milestone.label.to_string();
        }
    }
    (best, label)
}

/// Static settings for a SLURM deployment.
#[derive(Debug, Clone)]
pub struct SlurmSettings {
    pub host: String,
    pub user: String,
    /// Working directory on the cluster (e.g. `/scratch/user01`).
    pub work_dir: String,
    pub partition: String,
    pub account: Option<String>,
    pub qos: Option<String>,
    /// Environment modules loaded before the run.
    pub modules: Vec<String>,
    /// `singularity` or `apptainer`.
    pub container_runtime: String,
    /// FreeSurfer license path on the cluster, if any.
    pub license_path: Option<String>,
}

impl SlurmSettings {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            work_dir: "/scratch".to_string(),
            partition: "general".to_string(),
            account: None,
            qos: None,
            modules: Vec::new(),
            container_runtime: "singularity".to_string(),
            license_path: None,
        }
    }

    ni_core::setters! {
        into {
            work_dir: String,
            partition: String,
            container_runtime: String,
        }
        set {
            modules: Vec<String>,
        }
        option {
            account: String,
            qos: String,
            license_path: String,
        }
    }
}

pub struct SlurmBackend {
    settings: SlurmSettings,
    session: SshSession,
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
}

impl SlurmBackend {
    pub fn new(
        settings: SlurmSettings,
        session: SshSession,
        store: Arc<dyn JobStore>,
        registry: Arc<Registry>,
    ) -> Self {
        tracing::info!(
            host = %settings.host,
            user = %settings.user,
            partition = %settings.partition,
            work_dir = %settings.work_dir,
            "SLURM backend initialized"
        );
        Self { settings, session, store, registry }
    }

    fn job_dir(&self, job_id: &str) -> String {
        format!("{}/neuroinsight/jobs/{}", self.settings.work_dir, job_id)
    }

    async fn exec(
        &self,
        command: String,
        timeout: Duration,
    ) -> Result<(i32, String, String), ExecutionError> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.execute(&command, Some(timeout), false))
            .await
            .map_err(|e| ExecutionError::Transient(format!("ssh task join: {e}")))?
            .map_err(ssh_err)
    }

    async fn exec_check(&self, command: String, timeout: Duration) -> Result<String, ExecutionError> {
        let (exit_code, stdout, stderr) = self.exec(command.clone(), timeout).await?;
        if exit_code != 0 {
            let stderr: String = stderr.chars().take(500).collect();
            return Err(ExecutionError::SubmitFailed(format!(
                "Remote command failed (exit {exit_code}): {command}\nstderr: {stderr}"
            )));
        }
        Ok(stdout)
    }

    async fn write_remote(&self, path: String, content: String, mode: i32) -> Result<(), ExecutionError> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.write_file(&path, &content, mode))
            .await
            .map_err(|e| ExecutionError::Transient(format!("ssh task join: {e}")))?
            .map_err(ssh_err)
    }

    async fn read_remote(&self, path: String) -> Option<String> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || {
            if !session.file_exists(&path).unwrap_or(false) {
                return None;
            }
            session.read_file(&path).ok()
        })
        .await
        .ok()
        .flatten()
    }

    /// Generate the sbatch script for one job.
    ///
    /// Resource directives come from the spec; the pipeline command is
    /// written into a here-doc on the compute node so the login shell
    /// never interpolates it, and runs inside the container runtime.
    pub fn generate_sbatch_script(
        &self,
        spec: &JobSpec,
        job_id: &str,
        job_dir: &str,
        command_template: &str,
    ) -> String {
        let settings = &self.settings;
        let res = &spec.resources;
        let short_name: String = spec.pipeline_name.chars().take(20).collect();
        let short_id: String = job_id.chars().take(8).collect();

        let mut lines = vec![
            "#!/bin/bash".to_string(),
            format!("#SBATCH --job-name=ni-{short_name}-{short_id}"),
            format!("#SBATCH --partition={}", settings.partition),
            format!("#SBATCH --mem={}G", res.memory_gb),
            format!("#SBATCH --cpus-per-task={}", res.cpus),
            format!("#SBATCH --time={}:00:00", res.time_hours),
            format!("#SBATCH --output={job_dir}/logs/slurm-%j.out"),
            format!("#SBATCH --error={job_dir}/logs/slurm-%j.err"),
        ];
        if let Some(account) = &settings.account {
            lines.push(format!("#SBATCH --account={account}"));
        }
        if let Some(qos) = &settings.qos {
            lines.push(format!("#SBATCH --qos={qos}"));
        }
        if res.gpu {
            lines.push("#SBATCH --gpus-per-node=1".to_string());
        }

        lines.push(String::new());
        lines.push("set -euo pipefail".to_string());
        lines.push(String::new());

        if !settings.modules.is_empty() {
            lines.push("# Load environment modules".to_string());
            for module in &settings.modules {
                lines.push(format!("module load {module}"));
            }
            lines.push(String::new());
        }

        lines.push("# Ensure container runtime is available".to_string());
        lines.push(format!("module load {} 2>/dev/null || true", settings.container_runtime));
        lines.push(String::new());

        lines.push("# Job environment".to_string());
        lines.push(format!("export NEUROINSIGHT_JOB_ID=\"{job_id}\""));
        lines.push(format!("export OMP_NUM_THREADS={}", res.cpus));
        lines.push(format!("export ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS={}", res.cpus));
        lines.push(String::new());

        lines.push("# Prepare directories".to_string());
        lines.push(format!(
            "mkdir -p {job_dir}/outputs/native {job_dir}/outputs/bundle {job_dir}/outputs/logs"
        ));
        lines.push(String::new());

        let mut bind_mounts = vec![
            format!("{job_dir}/inputs:/data/inputs:ro"),
            format!("{job_dir}/outputs:/data/outputs:rw"),
        ];
        if let Some(license) = &settings.license_path {
            bind_mounts.push(format!("{license}:/license/license.txt:ro"));
        }
        let binds: String = bind_mounts
            .iter()
            .map(|b| format!("--bind {b}"))
            .collect::<Vec<_>>()
            .join(" ");

        let runtime = &settings.container_runtime;
        let image = &spec.container_image;

        if !command_template.is_empty() {
            let plugin = spec.plugin_id.as_deref().and_then(|id| self.registry.get_plugin(id));
            let resolved = resolve_parameters(spec, plugin.as_ref());
            let command = render_command(command_template, &as_template_vars(&resolved));

            lines.push("# Write pipeline command script".to_string());
            lines.push(format!(
                "cat > {job_dir}/scripts/pipeline_cmd.sh << 'NEUROINSIGHT_CMD_EOF'"
            ));
            lines.push(command);
            lines.push("NEUROINSIGHT_CMD_EOF".to_string());
            lines.push(format!("chmod +x {job_dir}/scripts/pipeline_cmd.sh"));
            lines.push(String::new());
            lines.push("# Run pipeline in container".to_string());
            lines.push(format!(
                "{runtime} exec {binds} --bind {job_dir}/scripts/pipeline_cmd.sh:/run_pipeline.sh:ro docker://{image} bash /run_pipeline.sh 2>&1 | tee {job_dir}/outputs/logs/container.log"
            ));
        } else {
            lines.push("# Run container (default command)".to_string());
            lines.push(format!(
                "{runtime} run {binds} docker://{image} 2>&1 | tee {job_dir}/outputs/logs/container.log"
            ));
        }

        lines.push(String::new());
        lines.push("echo \"NeuroInsight job completed with exit code $?\"".to_string());
        lines.push(String::new());

        lines.join("\n")
    }

    fn slurm_id(&self, job: &Job) -> Result<String, ExecutionError> {
        job.backend_job_id
            .clone()
            .ok_or_else(|| ExecutionError::NotFound(format!("job {} has no SLURM id", job.id)))
    }

    async fn query_sacct(&self, slurm_id: &str) -> SacctDetail {
        let command = format!(
            "sacct -j {slurm_id} --noheader -P --format=JobID,State,ExitCode,Start,End,Elapsed,MaxRSS,NNodes,NCPUS 2>/dev/null | head -1"
        );
        match self.exec(command, Duration::from_secs(30)).await {
            Ok((_, stdout, _)) if !stdout.trim().is_empty() => parse_sacct_line(&stdout),
            _ => SacctDetail::default(),
        }
    }

    /// Current progress for a running job: read the container log over
    /// SFTP and match the plugin's milestones.
    async fn parse_progress(&self, job: &Job) -> (u8, String) {
        let log_path = format!("{}/outputs/logs/container.log", self.job_dir(&job.id));
        let Some(log) = self.read_remote(log_path).await else {
            return (0, "Running".to_string());
        };
        let milestones = milestones_for(job.plugin_id.as_deref().unwrap_or_default());
        parse_log_progress(&log, milestones)
    }
}

#[async_trait]
impl ExecutionBackend for SlurmBackend {
    fn backend_type(&self) -> &'static str {
        "slurm"
    }

    async fn submit(&self, spec: JobSpec, job_id: Option<String>) -> Result<String, ExecutionError> {
        let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let job_dir = self.job_dir(&job_id);

        for sub in ["scripts", "logs", "inputs", "outputs/native", "outputs/bundle", "outputs/logs"] {
            self.exec_check(format!("mkdir -p {job_dir}/{sub}"), Duration::from_secs(30))
                .await?;
        }

        let command_template = spec
            .command_template
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                spec.plugin_id
                    .as_deref()
                    .and_then(|id| self.registry.get_plugin(id))
                    .map(|p| p.effective_command().to_string())
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_default();

        let script = self.generate_sbatch_script(&spec, &job_id, &job_dir, &command_template);
        let script_path = format!("{job_dir}/scripts/run.sh");
        self.write_remote(script_path.clone(), script, 0o755).await?;

        // Submission record for the audit trail.
        let safe_params: serde_json::Map<String, serde_json::Value> = spec
            .parameters
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let spec_json = serde_json::json!({
            "job_id": job_id,
            "pipeline_name": spec.pipeline_name,
            "container_image": spec.container_image,
            "input_files": spec.input_files,
            "parameters": safe_params,
            "resources": spec.resources,
            "plugin_id": spec.plugin_id,
            "workflow_id": spec.workflow_id,
        });
        self.write_remote(
            format!("{job_dir}/scripts/job_spec.json"),
            serde_json::to_string_pretty(&spec_json).unwrap_or_default(),
            0o644,
        )
        .await?;

        let stdout = self
            .exec_check(format!("sbatch {script_path}"), Duration::from_secs(60))
            .await?;
        let slurm_id = parse_sbatch_job_id(&stdout)?;
        tracing::info!(job_id = %job_id, slurm_id = %slurm_id, "submitted SLURM job");

        let mut row = Job::from_spec(&job_id, self.backend_type(), &spec, Utc::now());
        row.backend_job_id = Some(slurm_id);
        row.output_dir = format!("{job_dir}/outputs");
        row.current_phase = Some("Queued in SLURM".to_string());
        self.store
            .insert(row)
            .map_err(|e| ExecutionError::SubmitFailed(e.to_string()))?;

        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let slurm_id = self.slurm_id(&job)?;

        // squeue covers live jobs.
        if let Ok((_, stdout, _)) = self
            .exec(
                format!("squeue -j {slurm_id} --noheader -o '%T' 2>/dev/null || true"),
                Duration::from_secs(30),
            )
            .await
        {
            let state = clean_state(&stdout);
            if !state.is_empty() {
                return Ok(map_slurm_state(&state));
            }
        }

        // sacct covers finished jobs.
        if let Ok((_, stdout, _)) = self
            .exec(
                format!("sacct -j {slurm_id} --noheader --format=State -P 2>/dev/null | head -1"),
                Duration::from_secs(30),
            )
            .await
        {
            let state = clean_state(&stdout);
            if !state.is_empty() {
                return Ok(map_slurm_state(&state));
            }
        }

        Ok(job.status)
    }

    async fn info(&self, job_id: &str) -> Result<JobInfo, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let slurm_id = self.slurm_id(&job)?;

        let detail = self.query_sacct(&slurm_id).await;
        let mut info = job.to_info();
        if let Some(status) = detail.status {
            if status != JobStatus::Unknown {
                info.status = status;
            }
        }
        info.started_at = detail.start_time.or(info.started_at);
        info.completed_at = detail.end_time.or(info.completed_at);
        info.exit_code = detail.exit_code.or(info.exit_code);

        if info.status == JobStatus::Running {
            let (progress, phase) = self.parse_progress(&job).await;
            info.progress = info.progress.max(progress);
            info.current_phase = Some(phase);
        }
        Ok(info)
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        if job.is_terminal() {
            return Ok(false);
        }
        let slurm_id = self.slurm_id(&job)?;

        match self
            .exec_check(format!("scancel {slurm_id}"), Duration::from_secs(30))
            .await
        {
            Ok(_) => {
                let _ = self.store.mark_cancelled(job_id, Utc::now());
                tracing::info!(job_id, slurm_id = %slurm_id, "SLURM job cancelled");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(job_id, slurm_id = %slurm_id, error = %e, "scancel failed");
                Ok(false)
            }
        }
    }

    async fn logs(&self, job_id: &str) -> Result<JobLogs, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let slurm_id = job.backend_job_id.clone().unwrap_or_default();
        let job_dir = self.job_dir(job_id);

        let mut logs = JobLogs::new(job_id);
        if let Some(stdout) = self.read_remote(format!("{job_dir}/logs/slurm-{slurm_id}.out")).await {
            logs.stdout = stdout;
        }
        // The .err file is surfaced verbatim.
        if let Some(stderr) = self.read_remote(format!("{job_dir}/logs/slurm-{slurm_id}.err")).await {
            logs.stderr = stderr;
        }
        if logs.stdout.is_empty() {
            if let Some(container) = self
                .read_remote(format!("{job_dir}/outputs/logs/container.log"))
                .await
            {
                logs.stdout = container;
            }
        }
        Ok(logs)
    }

    async fn list(
        &self,
        status_filter: Option<&[JobStatus]>,
        limit: usize,
    ) -> Result<Vec<JobInfo>, ExecutionError> {
        let jobs = self
            .store
            .list(status_filter, limit)
            .map_err(|e| ExecutionError::Store(e.to_string()))?;
        Ok(jobs
            .iter()
            .filter(|j| j.backend_type == self.backend_type() && j.backend_job_id.is_some())
            .map(Job::to_info)
            .collect())
    }

    async fn cleanup(&self, job_id: &str) -> Result<bool, ExecutionError> {
        let job_dir = self.job_dir(job_id);
        self.store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;

        self.exec_check(format!("rm -rf {job_dir}"), Duration::from_secs(60))
            .await?;
        let deleted = self
            .store
            .soft_delete(job_id, Utc::now())
            .map_err(|e| ExecutionError::Store(e.to_string()))?;
        tracing::info!(job_id, "SLURM job directory cleaned up");
        Ok(deleted)
    }

    async fn health(&self) -> BackendHealth {
        let mut details = serde_json::json!({
            "backend_type": self.backend_type(),
            "host": self.settings.host,
            "username": self.settings.user,
            "partition": self.settings.partition,
        });

        let version = match self
            .exec("sinfo --version 2>/dev/null || echo 'not found'".to_string(), Duration::from_secs(15))
            .await
        {
            Ok((_, stdout, _)) => stdout.trim().to_string(),
            Err(e) => {
                details["ssh_connected"] = serde_json::json!(false);
                return BackendHealth::unhealthy(format!("SSH connection failed: {e}"), details);
            }
        };
        details["ssh_connected"] = serde_json::json!(true);

        if version.contains("not found") {
            details["slurm_available"] = serde_json::json!(false);
            return BackendHealth::unhealthy("SLURM not available on remote host", details);
        }
        details["slurm_available"] = serde_json::json!(true);
        details["slurm_version"] = serde_json::json!(version);

        let partitions = self.partitions().await;
        let partition_names: Vec<String> =
            partitions.iter().filter_map(|p| p["name"].as_str().map(String::from)).collect();
        details["partitions"] = serde_json::json!(partitions);
        if !partition_names.is_empty() && !partition_names.contains(&self.settings.partition) {
            details["partition_valid"] = serde_json::json!(false);
            return BackendHealth::unhealthy(
                format!(
                    "Partition '{}' not found. Available: {}",
                    self.settings.partition,
                    partition_names.join(", ")
                ),
                details,
            );
        }
        details["partition_valid"] = serde_json::json!(true);

        if let Ok((_, stdout, _)) = self
            .exec(
                format!("which {} 2>/dev/null || echo 'not found'", self.settings.container_runtime),
                Duration::from_secs(10),
            )
            .await
        {
            let available = !stdout.contains("not found");
            details["container_runtime"] = serde_json::json!(self.settings.container_runtime);
            details["container_runtime_available"] = serde_json::json!(available);
        }

        if let Ok((exit_code, _, _)) = self
            .exec(
                format!("test -d {} && echo exists", self.settings.work_dir),
                Duration::from_secs(10),
            )
            .await
        {
            details["work_dir_accessible"] = serde_json::json!(exit_code == 0);
        }

        BackendHealth::healthy(
            format!("Connected to {} (SLURM {version})", self.settings.host),
            details,
        )
    }
}

impl SlurmBackend {
    // ------------------------------------------------------------------
    // Cluster introspection (HTTP layer extras)
    // ------------------------------------------------------------------

    /// Available partitions with capacity details.
    pub async fn partitions(&self) -> Vec<serde_json::Value> {
        let Ok((_, stdout, _)) = self
            .exec(
                "sinfo --noheader -o '%P|%a|%l|%D|%C|%m|%G' 2>/dev/null".to_string(),
                Duration::from_secs(30),
            )
            .await
        else {
            return Vec::new();
        };

        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                let raw_name = parts.first().copied().unwrap_or_default();
                serde_json::json!({
                    "name": raw_name.trim_end_matches('*'),
                    "is_default": raw_name.ends_with('*'),
                    "available": parts.get(1).copied().unwrap_or("unknown"),
                    "timelimit": parts.get(2).copied().unwrap_or("unknown"),
                    "nodes": parts.get(3).copied().unwrap_or("0"),
                    "cpus": parts.get(4).copied().unwrap_or("0/0/0/0"),
                    "memory_mb": parts.get(5).copied().unwrap_or("0"),
                    "gpus": parts.get(6).copied().unwrap_or("(null)"),
                })
            })
            .collect()
    }

    /// Queue entries, optionally limited to this user.
    pub async fn queue(&self, user_only: bool) -> Vec<serde_json::Value> {
        let user_flag = if user_only {
            format!("-u {}", self.settings.user)
        } else {
            String::new()
        };
        let Ok((_, stdout, _)) = self
            .exec(
                format!("squeue {user_flag} --noheader -o '%i|%j|%T|%M|%P|%l|%D|%R' 2>/dev/null"),
                Duration::from_secs(30),
            )
            .await
        else {
            return Vec::new();
        };

        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                serde_json::json!({
                    "slurm_id": parts.first().copied().unwrap_or_default(),
                    "name": parts.get(1).copied().unwrap_or_default(),
                    "state": parts.get(2).copied().unwrap_or_default(),
                    "time": parts.get(3).copied().unwrap_or_default(),
                    "partition": parts.get(4).copied().unwrap_or_default(),
                    "timelimit": parts.get(5).copied().unwrap_or_default(),
                    "nodes": parts.get(6).copied().unwrap_or_default(),
                    "reason": parts.get(7).copied().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// The user's accounts and QoS levels from sacctmgr.
    pub async fn accounts(&self) -> serde_json::Value {
        let mut accounts: Vec<String> = Vec::new();
        let mut qos: Vec<String> = Vec::new();

        if let Ok((_, stdout, _)) = self
            .exec(
                format!(
                    "sacctmgr show assoc where user={} format=Account,QOS,DefaultQOS --noheader -P 2>/dev/null",
                    self.settings.user
                ),
                Duration::from_secs(30),
            )
            .await
        {
            for line in stdout.lines() {
                let parts: Vec<&str> = line.split('|').collect();
                if let Some(account) = parts.first().map(|a| a.trim()).filter(|a| !a.is_empty()) {
                    if !accounts.contains(&account.to_string()) {
                        accounts.push(account.to_string());
                    }
                }
                if let Some(levels) = parts.get(1) {
                    for level in levels.split(',').map(|q| q.trim()).filter(|q| !q.is_empty()) {
                        if !qos.contains(&level.to_string()) {
                            qos.push(level.to_string());
                        }
                    }
                }
            }
        }

        serde_json::json!({
            "accounts": accounts,
            "qos": qos,
            "default_account": accounts.first(),
        })
    }
}

#[cfg(test)]
#[path = "slurm_tests.rs"]
mod tests;
