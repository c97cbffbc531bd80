// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote Docker backend: plain `docker run` on any SSH-accessible
//! Linux host. Works with cloud VMs and lab servers alike: no
//! scheduler, no Singularity, just Docker over the shared SSH session.

use crate::backend::{BackendHealth, ExecutionBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ni_core::{ExecutionError, Job, JobInfo, JobLogs, JobSpec, JobStatus};
use ni_executor::params::{as_template_vars, resolve_parameters};
use ni_registry::{render_command, Registry};
use ni_remote::{SshError, SshSession};
use ni_storage::JobStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Map a raw `docker inspect .State.Status` value onto the universal
/// enum; `exited` is disambiguated by the exit code.
fn map_docker_state(state: &str, exit_code: i64) -> JobStatus {
    match state {
        "created" => JobStatus::Pending,
        "running" | "paused" | "restarting" | "removing" => JobStatus::Running,
        "exited" => {
            if exit_code == 0 {
                JobStatus::Completed
            } else {
                JobStatus::Failed
            }
        }
        "dead" => JobStatus::Failed,
        _ => JobStatus::Unknown,
    }
}

fn ssh_err(e: SshError) -> ExecutionError {
    match e {
        SshError::Command { .. } => ExecutionError::Transient(e.to_string()),
        other => ExecutionError::BackendUnavailable(format!("SSH command failed: {other}")),
    }
}

pub struct RemoteDockerBackend {
    host: String,
    user: String,
    work_dir: String,
    gpu_flag: String,
    session: SshSession,
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
}

impl RemoteDockerBackend {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        work_dir: impl Into<String>,
        session: SshSession,
        store: Arc<dyn JobStore>,
        registry: Arc<Registry>,
    ) -> Self {
        let host = host.into();
        let user = user.into();
        let work_dir = work_dir.into();
        tracing::info!(host = %host, user = %user, work_dir = %work_dir, "remote Docker backend initialized");
        Self {
            host,
            user,
            work_dir,
            gpu_flag: "--gpus all".to_string(),
            session,
            store,
            registry,
        }
    }

    /// Container name for a job: `neuroinsight_` plus the first 12 hex
    /// characters of the job id.
    pub fn container_name(job_id: &str) -> String {
        let short: String = job_id.replace('-', "").chars().take(12).collect();
        format!("neuroinsight_{short}")
    }

    fn job_dir(&self, job_id: &str) -> String {
        format!("{}/jobs/{}", self.work_dir, job_id)
    }

    async fn run_remote(
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

    async fn put_file(&self, local: &Path, remote: String) -> Result<(), ExecutionError> {
        let session = self.session.clone();
        let local = local.to_path_buf();
        tokio::task::spawn_blocking(move || session.put_file(&local, &remote))
            .await
            .map_err(|e| ExecutionError::Transient(format!("ssh task join: {e}")))?
            .map_err(ssh_err)
    }

    async fn write_remote_file(&self, remote: String, content: String) -> Result<(), ExecutionError> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.write_file(&remote, &content, 0o644))
            .await
            .map_err(|e| ExecutionError::Transient(format!("ssh task join: {e}")))?
            .map_err(ssh_err)
    }

    async fn read_remote_file(&self, remote: String) -> Option<String> {
        let session = self.session.clone();
        tokio::task::spawn_blocking(move || session.read_file(&remote))
            .await
            .ok()?
            .ok()
    }

    fn container_name_for(&self, job: &Job) -> String {
        job.backend_job_id
            .clone()
            .unwrap_or_else(|| Self::container_name(&job.id))
    }
}

#[async_trait]
impl ExecutionBackend for RemoteDockerBackend {
    fn backend_type(&self) -> &'static str {
        "remote_docker"
    }

    async fn submit(&self, spec: JobSpec, job_id: Option<String>) -> Result<String, ExecutionError> {
        let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let container_name = Self::container_name(&job_id);
        let job_dir = self.job_dir(&job_id);

        // Remote working tree.
        self.run_remote(
            format!("mkdir -p {job_dir}/inputs {job_dir}/outputs {job_dir}/logs"),
            Duration::from_secs(30),
        )
        .await?;

        // Upload local input files.
        for input in &spec.input_files {
            let local = Path::new(input);
            if local.is_file() {
                let name = local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.put_file(local, format!("{job_dir}/inputs/{name}")).await?;
                tracing::info!(job_id = %job_id, file = %name, "uploaded input to remote");
            }
        }

        // Make sure the image exists on the remote host.
        let image = &spec.container_image;
        self.run_remote(
            format!("docker image inspect {image} > /dev/null 2>&1 || docker pull {image}"),
            Duration::from_secs(600),
        )
        .await?;

        // Build the docker run command.
        let res = &spec.resources;
        let mut args = vec![
            "docker run -d".to_string(),
            format!("--name {container_name}"),
            format!("--cpus={}", res.cpus),
            format!("--memory={}g", res.memory_gb),
            format!("-v {job_dir}/inputs:/data/inputs:ro"),
            format!("-v {job_dir}/outputs:/data/outputs:rw"),
        ];
        if res.gpu {
            args.push(self.gpu_flag.clone());
        }
        args.push(format!("-e OMP_NUM_THREADS={}", res.cpus));
        args.push(format!("-e ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS={}", res.cpus));
        args.push(format!("-e NEUROINSIGHT_JOB_ID={job_id}"));

        let plugin = spec.plugin_id.as_deref().and_then(|id| self.registry.get_plugin(id));
        let template = spec
            .command_template
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                plugin
                    .as_ref()
                    .map(|p| p.effective_command().to_string())
                    .filter(|t| !t.is_empty())
            });

        args.push(image.clone());
        if let Some(template) = template {
            let resolved = resolve_parameters(&spec, plugin.as_ref());
            let command = render_command(&template, &as_template_vars(&resolved));
            args.push(format!("bash -c \"{command}\""));
        }

        let full_command = args.join(" ");
        tracing::info!(job_id = %job_id, container = %container_name, "submitting remote Docker job");

        let (exit_code, stdout, stderr) =
            self.run_remote(full_command, Duration::from_secs(30)).await?;
        if exit_code != 0 {
            return Err(ExecutionError::SubmitFailed(format!(
                "Failed to start container on remote: {}",
                stderr.trim()
            )));
        }
        let container_id: String = stdout.trim().chars().take(12).collect();
        tracing::info!(job_id = %job_id, container = %container_name, id = %container_id, "remote container started");

        // Persist metadata on the remote host alongside the inputs.
        let meta = serde_json::json!({
            "job_id": job_id,
            "container_name": container_name,
            "pipeline_name": spec.pipeline_name,
            "image": image,
            "submitted_at": Utc::now().to_rfc3339(),
        });
        self.write_remote_file(
            format!("{job_dir}/job_meta.json"),
            serde_json::to_string_pretty(&meta).unwrap_or_default(),
        )
        .await?;

        let mut row = Job::from_spec(&job_id, self.backend_type(), &spec, Utc::now());
        row.backend_job_id = Some(container_name);
        row.output_dir = format!("{job_dir}/outputs");
        row.mark_started(Utc::now());
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
        let container = self.container_name_for(&job);

        let (exit_code, stdout, _) = self
            .run_remote(
                format!(
                    "docker inspect --format '{{{{.State.Status}}}} {{{{.State.ExitCode}}}}' {container} 2>/dev/null"
                ),
                Duration::from_secs(10),
            )
            .await?;
        if exit_code != 0 {
            return Ok(job.status);
        }

        let mut parts = stdout.split_whitespace();
        let state = parts.next().unwrap_or_default().to_lowercase();
        let container_exit: i64 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(-1);
        Ok(map_docker_state(&state, container_exit))
    }

    async fn info(&self, job_id: &str) -> Result<JobInfo, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let container = self.container_name_for(&job);
        let mut info = job.to_info();
        info.status = self.status(job_id).await.unwrap_or(job.status);

        let (exit_code, stdout, _) = self
            .run_remote(
                format!("docker inspect {container} 2>/dev/null"),
                Duration::from_secs(10),
            )
            .await?;
        if exit_code == 0 && !stdout.trim().is_empty() {
            if let Ok(serde_json::Value::Array(entries)) = serde_json::from_str(&stdout) {
                if let Some(state) = entries.first().and_then(|e| e.get("State")) {
                    let parse_time = |key: &str| -> Option<DateTime<Utc>> {
                        let raw = state.get(key)?.as_str()?;
                        if raw.starts_with("0001") {
                            return None;
                        }
                        DateTime::parse_from_rfc3339(raw)
                            .ok()
                            .map(|t| t.with_timezone(&Utc))
                    };
                    info.started_at = parse_time("StartedAt").or(info.started_at);
                    info.completed_at = parse_time("FinishedAt").or(info.completed_at);
                    if let Some(code) = state.get("ExitCode").and_then(|c| c.as_i64()) {
                        info.exit_code = Some(code);
                        if code != 0 {
                            info.error_message = state
                                .get("Error")
                                .and_then(|e| e.as_str())
                                .filter(|e| !e.is_empty())
                                .map(|e| e.to_string())
                                .or_else(|| Some(format!("Exit code {code}")));
                        }
                    }
                }
            }
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
        let container = self.container_name_for(&job);

        let (exit_code, _, _) = self
            .run_remote(
                format!("docker stop {container} 2>/dev/null"),
                Duration::from_secs(30),
            )
            .await?;

        let _ = self.store.mark_cancelled(job_id, Utc::now());
        tracing::info!(job_id, container = %container, "remote job cancelled");
        Ok(exit_code == 0)
    }

    async fn logs(&self, job_id: &str) -> Result<JobLogs, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let container = self.container_name_for(&job);

        let (exit_code, stdout, stderr) = self
            .run_remote(
                format!("docker logs --tail 1000 {container} 2>&1"),
                Duration::from_secs(15),
            )
            .await?;

        let mut logs = JobLogs::new(job_id);
        if exit_code == 0 {
            logs.stdout = stdout;
        }
        logs.stderr = stderr;
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
            .filter(|j| j.backend_type == self.backend_type())
            .map(Job::to_info)
            .collect())
    }

    async fn cleanup(&self, job_id: &str) -> Result<bool, ExecutionError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ExecutionError::NotFound(job_id.to_string()))?;
        let container = self.container_name_for(&job);
        let job_dir = self.job_dir(job_id);

        let _ = self
            .run_remote(format!("docker rm -f {container} 2>/dev/null"), Duration::from_secs(15))
            .await;
        let _ = self
            .run_remote(format!("rm -rf {job_dir} 2>/dev/null"), Duration::from_secs(15))
            .await;

        let deleted = self
            .store
            .soft_delete(job_id, Utc::now())
            .map_err(|e| ExecutionError::Store(e.to_string()))?;
        tracing::info!(job_id, "remote job cleaned up");
        Ok(deleted)
    }

    async fn health(&self) -> BackendHealth {
        let version = match self
            .run_remote(
                "docker info --format '{{.ServerVersion}}'".to_string(),
                Duration::from_secs(10),
            )
            .await
        {
            Ok((0, stdout, _)) => stdout.trim().to_string(),
            Ok((_, _, stderr)) => {
                return BackendHealth::unhealthy(
                    "Docker not available on remote server",
                    serde_json::json!({"error": stderr.trim()}),
                );
            }
            Err(e) => {
                return BackendHealth::unhealthy(
                    "SSH not connected",
                    serde_json::json!({"error": e.to_string()}),
                );
            }
        };

        let probe = |cmd: &str| {
            let cmd = cmd.to_string();
            async move {
                self.run_remote(cmd, Duration::from_secs(5))
                    .await
                    .map(|(_, stdout, _)| stdout.trim().to_string())
                    .unwrap_or_default()
            }
        };
        let cpus = probe("nproc").await;
        let memory_gb = probe("free -g | awk '/^Mem:/{print $2}'").await;
        let gpus = probe("nvidia-smi --query-gpu=name --format=csv,noheader 2>/dev/null | wc -l").await;

        BackendHealth::healthy(
            format!("Remote Docker {version} on {}", self.host),
            serde_json::json!({
                "docker_version": version,
                "host": self.host,
                "username": self.user,
                "cpus": cpus,
                "memory_gb": memory_gb,
                "gpus": gpus,
                "work_dir": self.work_dir,
            }),
        )
    }
}

impl RemoteDockerBackend {
    /// Remote machine capabilities for the system-info endpoint.
    pub async fn system_info(&self) -> serde_json::Value {
        let mut info = serde_json::json!({
            "host": self.host,
            "user": self.user,
        });

        let probe = |cmd: &str| {
            let cmd = cmd.to_string();
            async move {
                self.run_remote(cmd, Duration::from_secs(5))
                    .await
                    .ok()
                    .map(|(_, stdout, _)| stdout.trim().to_string())
                    .unwrap_or_default()
            }
        };

        let os = probe("cat /etc/os-release 2>/dev/null | head -2").await;
        for line in os.lines() {
            if let Some(name) = line.strip_prefix("PRETTY_NAME=") {
                info["os"] = serde_json::json!(name.trim_matches('"'));
            }
        }

        info["cpu_model"] =
            serde_json::json!(probe("lscpu | grep 'Model name' | sed 's/Model name:\\s*//'").await);
        info["cpu_count"] =
            serde_json::json!(probe("nproc").await.parse::<u64>().unwrap_or(0));
        info["memory_gb"] = serde_json::json!(probe("free -g | awk '/^Mem:/{print $2}'")
            .await
            .parse::<u64>()
            .unwrap_or(0));
        let disk = probe(&format!(
            "df -BG {} 2>/dev/null | tail -1 | awk '{{print $4}}'",
            self.work_dir
        ))
        .await;
        info["disk_free_gb"] =
            serde_json::json!(disk.trim_end_matches('G').parse::<u64>().unwrap_or(0));

        let gpu_out =
            probe("nvidia-smi --query-gpu=name,memory.total --format=csv,noheader 2>/dev/null").await;
        let gpus: Vec<serde_json::Value> = gpu_out
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let mut parts = line.splitn(2, ',');
                serde_json::json!({
                    "name": parts.next().unwrap_or_default().trim(),
                    "memory": parts.next().unwrap_or("unknown").trim(),
                })
            })
            .collect();
        info["gpus"] = serde_json::json!(gpus);

        info["docker_version"] = serde_json::json!(probe("docker --version 2>/dev/null").await);
        info["running_jobs"] = serde_json::json!(probe(
            "docker ps --filter \"name=neuroinsight_\" -q | wc -l"
        )
        .await
        .parse::<u64>()
        .unwrap_or(0));

        info
    }
}

#[cfg(test)]
#[path = "remote_docker_tests.rs"]
mod tests;
