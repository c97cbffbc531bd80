// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job executor: drives one container (or a chain of them) through
//! its lifecycle with retries, milestone progress, and post-processing.

use crate::layout::{self, JobDirs, CONTAINER_INPUTS, CONTAINER_OUTPUTS};
use crate::params::{as_template_vars, resolve_parameters};
use crate::progress::MilestoneTracker;
use crate::runtime::{Bind, ContainerRuntime, LogStreamKind, RunSpec};
use crate::staging::stage_inputs;
use chrono::Utc;
use futures_util::StreamExt;
use ni_core::{milestones_for, ExecutionError, ExecutionMode, JobSpec, JobStatus, ResourceSpec};
use ni_registry::{image_allowed, render_command, Plugin, Registry};
use ni_storage::{AuditLog, JobStore, ObjectStore, Task, TaskKind};
use rand::Rng;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Label carrying the job id, used for crash-recovery discovery and
/// cleanup.
pub const JOB_LABEL: &str = "neuroinsight.job_id";
pub const MANAGED_BY_LABEL: &str = "managed-by";
pub const MANAGED_BY: &str = "neuroinsight";

/// Hard ceiling on one container run (the soft per-job limit comes
/// from the resource spec's time_hours).
const CONTAINER_WAIT_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Exponential backoff with jitter for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// No retries: used by the inline submit fallback.
    pub fn none() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Delay before retry `retry` (0-based): 60s -> ~120s -> ~240s,
    /// jittered ±20%, capped at `backoff_max`.
    fn delay(&self, retry: u32) -> Duration {
        let exp = self.backoff_base.as_secs_f64() * 2f64.powi(retry as i32);
        let capped = exp.min(self.backoff_max.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.8..1.2);
        Duration::from_secs_f64(capped * jitter)
    }
}

pub struct ExecutorConfig {
    pub data_dir: PathBuf,
    /// Read-only single-file mounts (FreeSurfer/MELD licenses):
    /// `(host_path, container_path)`. Missing files are skipped.
    pub license_mounts: Vec<(PathBuf, String)>,
    pub retry: RetryPolicy,
}

impl ExecutorConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), license_mounts: Vec::new(), retry: RetryPolicy::default() }
    }
}

/// Drives claimed tasks to a terminal job state.
pub struct Executor {
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
    runtime: Arc<dyn ContainerRuntime>,
    object_store: Option<Arc<dyn ObjectStore>>,
    audit: Option<Arc<AuditLog>>,
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<Registry>,
        runtime: Arc<dyn ContainerRuntime>,
        config: ExecutorConfig,
    ) -> Self {
        Self { store, registry, runtime, object_store: None, audit: None, config }
    }

    pub fn with_object_store(mut self, object_store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = Some(object_store);
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn audit_record(&self, event: &str, details: serde_json::Value) {
        if let Some(audit) = &self.audit {
            audit.record(event, details);
        }
    }

    /// Process one claimed task to completion.
    ///
    /// Re-entrant: a redelivered task for a terminal job returns
    /// immediately; a running job is resumed from its live container.
    pub async fn run_task(&self, task: &Task) {
        let job = match self.store.get(&task.job_id) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %task.job_id, error = %e, "task for unknown job dropped");
                return;
            }
        };
        if job.is_terminal() {
            tracing::debug!(job_id = %task.job_id, status = %job.status, "redelivered task for finished job");
            return;
        }
        if job.status == JobStatus::Running && self.try_resume(task).await {
            return;
        }
        let policy = self.config.retry.clone();
        self.run_with_retries(task, &policy).await;
    }

    /// Run a task with no retries: the inline fallback when the spool
    /// is unavailable at submit time.
    pub async fn run_task_once(&self, task: &Task) {
        match self.store.get(&task.job_id) {
            Ok(job) if job.is_terminal() => return,
            Ok(_) => {}
            Err(_) => return,
        }
        self.run_with_retries(task, &RetryPolicy::none()).await;
    }

    async fn run_with_retries(&self, task: &Task, policy: &RetryPolicy) {
        let mut retry = 0;
        loop {
            let result = match task.kind {
                TaskKind::RunPlugin => self.run_plugin_job(&task.job_id, &task.spec).await,
                TaskKind::RunWorkflow => self.run_workflow_job(&task.job_id, &task.spec).await,
            };

            match result {
                Ok(()) => return,
                Err(e) if e.is_retryable() && retry < policy.max_retries => {
                    retry += 1;
                    let total = policy.max_retries + 1;
                    let delay = policy.delay(retry - 1);
                    tracing::warn!(
                        job_id = %task.job_id,
                        attempt = retry,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "transient failure, retrying"
                    );
                    let phase = format!("Retrying (attempt {}/{})", retry + 1, total);
                    let message = format!("Retry {retry}: {e}");
                    let _ = self.store.update(&task.job_id, &move |job| {
                        job.current_phase = Some(phase.clone());
                        job.error_message = Some(message.clone());
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let message = if retry > 0 {
                        format!("Failed after {} attempts: {e}", retry + 1)
                    } else {
                        e.to_string()
                    };
                    tracing::error!(job_id = %task.job_id, error = %message, "job failed");
                    let _ = self.store.mark_failed(&task.job_id, &message, -1, Utc::now());
                    self.audit_record(
                        "job_failed",
                        serde_json::json!({"job_id": task.job_id, "error": message}),
                    );
                    return;
                }
            }
        }
    }

    /// Pick a running job's container back up after a worker loss.
    ///
    /// Plugin jobs re-tail the container found by label and finish
    /// normally. Workflow jobs wait out the orphaned step container and
    /// report `false` so the chain re-runs from the start (staging and
    /// completed steps are effectively idempotent).
    async fn try_resume(&self, task: &Task) -> bool {
        let containers = self
            .runtime
            .find_by_label(JOB_LABEL, &task.job_id)
            .await
            .unwrap_or_default();
        let Some(container_id) = containers.into_iter().next() else {
            return false;
        };

        tracing::info!(job_id = %task.job_id, container = %container_id, "resuming running job");

        if task.kind == TaskKind::RunWorkflow {
            let _ = self.runtime.wait(&container_id).await;
            let _ = self.runtime.remove(&container_id).await;
            return false;
        }

        let job = match self.store.get(&task.job_id) {
            Ok(job) => job,
            Err(_) => return false,
        };
        let dirs = JobDirs::new(&self.config.data_dir, &task.job_id);
        let milestones = milestones_for(task.spec.plugin_id.as_deref().unwrap_or_default());
        let mut tracker = MilestoneTracker::new(milestones, job.progress);

        match self
            .drive_container(&task.job_id, &container_id, &dirs, &mut tracker, None)
            .await
        {
            Ok(exit_code) => {
                self.finish_plugin(&task.job_id, &task.spec, &dirs, exit_code).await;
                true
            }
            Err(e) => {
                tracing::warn!(job_id = %task.job_id, error = %e, "resume failed, restarting job");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Plugin jobs
    // ------------------------------------------------------------------

    async fn run_plugin_job(&self, job_id: &str, spec: &JobSpec) -> Result<(), ExecutionError> {
        let dirs = JobDirs::new(&self.config.data_dir, job_id);
        dirs.create()?;
        layout::write_job_spec(&dirs, spec)?;

        let job = self.store.mark_running(job_id, Utc::now()).map_err(store_err)?;
        // A cancel that lands before pickup must win.
        if job.status == JobStatus::Cancelled {
            tracing::info!(job_id, "job cancelled before start");
            return Ok(());
        }
        self.store.set_progress(job_id, 1, Some("Queued")).map_err(store_err)?;

        let plugin = spec.plugin_id.as_deref().and_then(|id| self.registry.get_plugin(id));
        let command_template = effective_template(spec, plugin.as_ref());
        validate_plugin_spec(spec, command_template.as_deref())?;

        self.store
            .set_progress(job_id, 2, Some("Pulling Docker image"))
            .map_err(store_err)?;
        self.runtime.ensure_image(&spec.container_image).await?;

        let resolved = resolve_parameters(spec, plugin.as_ref());
        let expected_keys = plugin
            .as_ref()
            .map(|p| p.expected_input_keys().iter().map(|k| k.to_string()).collect::<Vec<_>>())
            .unwrap_or_default();
        let key_refs: Vec<&str> = expected_keys.iter().map(|k| k.as_str()).collect();
        stage_inputs(&dirs.inputs(), &spec.input_files, &key_refs)?;

        let command = command_template
            .as_deref()
            .map(|template| render_command(template, &as_template_vars(&resolved)));

        self.store
            .set_progress(job_id, 3, Some("Starting container"))
            .map_err(store_err)?;
        let run_spec =
            self.hardened_run_spec(job_id, &spec.container_image, command, &spec.resources, &dirs);
        let container_id = self.runtime.run(run_spec).await?;
        let short_id: String = container_id.chars().take(12).collect();
        self.store.set_backend_job_id(job_id, &short_id).map_err(store_err)?;
        tracing::info!(job_id, container = %short_id, image = %spec.container_image, "container started");

        let milestones = milestones_for(
            spec.plugin_id
                .as_deref()
                .or_else(|| spec.workflow_steps.first().map(|s| s.as_str()))
                .unwrap_or_default(),
        );
        let mut tracker = MilestoneTracker::new(milestones, 3);

        let outcome = self
            .drive_container(job_id, &container_id, &dirs, &mut tracker, None)
            .await;
        let _ = self.runtime.remove(&container_id).await;

        let exit_code = outcome?;
        self.finish_plugin(job_id, spec, &dirs, exit_code).await;
        Ok(())
    }

    async fn finish_plugin(&self, job_id: &str, spec: &JobSpec, dirs: &JobDirs, exit_code: i64) {
        if exit_code == 0 {
            self.post_process(job_id, &spec.container_image, &spec.resources, dirs).await;
            let _ = self.store.mark_completed(job_id, 0, Utc::now());
            self.audit_record("job_completed", serde_json::json!({"job_id": job_id}));
            tracing::info!(job_id, "job completed");
        } else {
            let message = format!("Container exited with code {exit_code}");
            let _ = self.store.mark_failed(job_id, &message, exit_code, Utc::now());
            self.audit_record(
                "job_failed",
                serde_json::json!({"job_id": job_id, "exit_code": exit_code}),
            );
            tracing::error!(job_id, exit_code, "job failed");
        }
    }

    // ------------------------------------------------------------------
    // Workflow jobs
    // ------------------------------------------------------------------

    async fn run_workflow_job(&self, job_id: &str, spec: &JobSpec) -> Result<(), ExecutionError> {
        let dirs = JobDirs::new(&self.config.data_dir, job_id);
        dirs.create()?;
        layout::write_job_spec(&dirs, spec)?;

        let job = self.store.mark_running(job_id, Utc::now()).map_err(store_err)?;
        if job.status == JobStatus::Cancelled {
            tracing::info!(job_id, "job cancelled before start");
            return Ok(());
        }
        self.store
            .set_progress(job_id, 1, Some("Preparing workflow"))
            .map_err(store_err)?;

        if spec.workflow_steps.is_empty() {
            return Err(ExecutionError::Validation("No workflow steps defined".to_string()));
        }

        // Validate every step up front; a dangling reference or a
        // disallowed image fails the whole submission fast.
        let mut plugins = Vec::new();
        for step_id in &spec.workflow_steps {
            let plugin = self.registry.get_plugin(step_id).ok_or_else(|| {
                ExecutionError::Validation(format!(
                    "Workflow step references unknown plugin: {step_id}"
                ))
            })?;
            if !image_allowed(&plugin.container_image) {
                return Err(ExecutionError::Validation(format!(
                    "Image '{}' is not in the allowed list. Contact admin to add it.",
                    plugin.container_image
                )));
            }
            plugins.push(plugin);
        }
        for input in &spec.input_files {
            if !Path::new(input).exists() {
                return Err(ExecutionError::Validation(format!("Input file not found: {input}")));
            }
        }

        let total = plugins.len();
        let mut current_inputs = spec.input_files.clone();

        for (index, plugin) in plugins.iter().enumerate() {
            let base = (index * 90 / total) as u8;
            let range = (90 / total) as u8;
            let step_label = if plugin.name.is_empty() { &plugin.id } else { &plugin.name };

            self.store
                .set_progress(
                    job_id,
                    base + 1,
                    Some(&format!("Step {}/{}: {}", index + 1, total, step_label)),
                )
                .map_err(store_err)?;
            tracing::info!(job_id, step = index + 1, total, plugin = %plugin.id, "workflow step starting");

            let mut step_spec = spec.clone();
            step_spec.plugin_id = Some(plugin.id.clone());
            step_spec.container_image = plugin.container_image.clone();
            step_spec.input_files = current_inputs.clone();

            self.runtime.ensure_image(&plugin.container_image).await?;

            let resolved = resolve_parameters(&step_spec, Some(plugin));
            let expected: Vec<&str> = plugin.expected_input_keys();
            stage_inputs(&dirs.inputs(), &step_spec.input_files, &expected)?;

            let template = plugin.effective_command();
            let command = (!template.is_empty())
                .then(|| render_command(template, &as_template_vars(&resolved)));

            let run_spec = self.hardened_run_spec(
                job_id,
                &plugin.container_image,
                command,
                &spec.resources,
                &dirs,
            );
            let before = native_subdirs(&dirs.native());
            let container_id = self.runtime.run(run_spec).await?;
            let short_id: String = container_id.chars().take(12).collect();
            self.store.set_backend_job_id(job_id, &short_id).map_err(store_err)?;

            let mut tracker =
                MilestoneTracker::with_band(milestones_for(&plugin.id), base + 2, base, range);
            let outcome = self
                .drive_container(job_id, &container_id, &dirs, &mut tracker, Some(&plugin.id))
                .await;
            let _ = self.runtime.remove(&container_id).await;
            let exit_code = outcome?;

            if exit_code != 0 {
                let message = format!(
                    "Step {}/{} ({}) exited with code {exit_code}",
                    index + 1,
                    total,
                    plugin.id
                );
                let _ = self.store.mark_failed(job_id, &message, exit_code, Utc::now());
                self.audit_record(
                    "job_failed",
                    serde_json::json!({"job_id": job_id, "step": plugin.id, "exit_code": exit_code}),
                );
                tracing::error!(job_id, step = %plugin.id, exit_code, "workflow step failed");
                return Ok(());
            }

            // The directories this step created under native/ feed the
            // next step; when nothing new appeared the inputs carry over.
            let after = native_subdirs(&dirs.native());
            let created: Vec<String> = after.difference(&before).cloned().collect();
            if !created.is_empty() {
                let mut sorted = created;
                sorted.sort();
                current_inputs = sorted;
            }
            tracing::info!(job_id, step = index + 1, next_inputs = ?current_inputs, "workflow step completed");
        }

        // Final 10%: upload and bundle extraction.
        self.store
            .set_progress(job_id, 92, Some("Post-processing"))
            .map_err(store_err)?;
        let last_image = plugins
            .last()
            .map(|p| p.container_image.clone())
            .unwrap_or_else(|| spec.container_image.clone());
        self.post_process(job_id, &last_image, &spec.resources, &dirs).await;

        let _ = self.store.mark_completed(job_id, 0, Utc::now());
        self.audit_record("job_completed", serde_json::json!({"job_id": job_id}));
        tracing::info!(job_id, steps = total, "workflow completed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Container driving
    // ------------------------------------------------------------------

    /// Stream a running container's output: append every chunk to
    /// `logs/container.log` (and the step log for workflow steps), feed
    /// the milestone reducer, then wait for the exit code and persist
    /// the separated stdout/stderr capture.
    async fn drive_container(
        &self,
        job_id: &str,
        container_id: &str,
        dirs: &JobDirs,
        tracker: &mut MilestoneTracker,
        step: Option<&str>,
    ) -> Result<i64, ExecutionError> {
        std::fs::create_dir_all(dirs.logs())?;
        let mut container_log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.container_log())?;
        let mut step_log = match step {
            Some(name) => Some(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dirs.step_log(name))?,
            ),
            None => None,
        };

        let mut stdout_capture = String::new();
        let mut stderr_capture = String::new();

        let mut stream = self.runtime.stream_logs(container_id).await?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            container_log.write_all(chunk.text.as_bytes())?;
            if let Some(log) = step_log.as_mut() {
                log.write_all(chunk.text.as_bytes())?;
            }
            match chunk.stream {
                LogStreamKind::Stdout => stdout_capture.push_str(&chunk.text),
                LogStreamKind::Stderr => stderr_capture.push_str(&chunk.text),
            }

            if let Some((pct, label)) = tracker.observe(&chunk.text) {
                let phase = match step {
                    Some(name) => format!("{name}: {label}"),
                    None => label,
                };
                self.store
                    .set_progress(job_id, pct, Some(&phase))
                    .map_err(store_err)?;
            }
        }

        let exit_code = tokio::time::timeout(CONTAINER_WAIT_TIMEOUT, self.runtime.wait(container_id))
            .await
            .map_err(|_| ExecutionError::Transient("container wait timed out".to_string()))??;

        let mut stdout_log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.stdout_log())?;
        stdout_log.write_all(stdout_capture.as_bytes())?;
        let mut stderr_log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.stderr_log())?;
        stderr_log.write_all(stderr_capture.as_bytes())?;

        Ok(exit_code)
    }

    /// Mandatory container hardening: no privilege escalation, no
    /// network, mounts restricted to staged inputs (ro), the job's
    /// output tree (rw), and single-file license mounts (ro).
    fn hardened_run_spec(
        &self,
        job_id: &str,
        image: &str,
        command: Option<String>,
        resources: &ResourceSpec,
        dirs: &JobDirs,
    ) -> RunSpec {
        let mut binds = vec![
            Bind::ro(dirs.inputs().display().to_string(), CONTAINER_INPUTS),
            Bind::rw(dirs.root().display().to_string(), CONTAINER_OUTPUTS),
        ];
        for (host, container) in &self.config.license_mounts {
            if host.is_file() {
                binds.push(Bind::ro(host.display().to_string(), container.clone()));
            }
        }

        let mut spec = RunSpec::new(image)
            .binds(binds)
            .env(vec![
                ("OMP_NUM_THREADS".to_string(), resources.cpus.to_string()),
                (
                    "ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS".to_string(),
                    resources.cpus.to_string(),
                ),
            ])
            .memory_gb(resources.memory_gb)
            .cpus(resources.cpus)
            .gpu(resources.gpu)
            .labels(vec![
                (JOB_LABEL.to_string(), job_id.to_string()),
                (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
            ])
            .security_opt(vec!["no-new-privileges".to_string()])
            .network_mode("none");
        spec.command = command;
        spec
    }

    // ------------------------------------------------------------------
    // Post-processing (best-effort; never fails the job)
    // ------------------------------------------------------------------

    async fn post_process(&self, job_id: &str, image: &str, resources: &ResourceSpec, dirs: &JobDirs) {
        if let Some(object_store) = &self.object_store {
            let mut uploaded = 0;
            match object_store.upload_dir(job_id, &dirs.native(), "native") {
                Ok(count) => uploaded += count,
                Err(e) => tracing::warn!(job_id, error = %e, "output upload failed"),
            }
            match object_store.upload_dir(job_id, &dirs.bundle(), "bundle") {
                Ok(count) => uploaded += count,
                Err(e) => tracing::warn!(job_id, error = %e, "bundle upload failed"),
            }
            tracing::info!(job_id, files = uploaded, "outputs mirrored to object store");
        }

        if let Err(e) = self.convert_artifacts(job_id, image, resources, dirs).await {
            tracing::warn!(job_id, error = %e, "bundle extraction failed");
        }
    }

    /// Convert FreeSurfer `.mgz` volumes under `native/` into NIfTI for
    /// the viewer, using `mri_convert` from the pipeline's own image
    /// with the same hardening as the main run.
    async fn convert_artifacts(
        &self,
        job_id: &str,
        image: &str,
        resources: &ResourceSpec,
        dirs: &JobDirs,
    ) -> Result<(), ExecutionError> {
        let native = dirs.native();
        let volumes = dirs.bundle_volumes();
        let mgz_files = find_by_extension(&native, "mgz");
        if mgz_files.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(&volumes)?;

        for mgz in mgz_files {
            let stem = mgz.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            let nii_name = format!("{stem}.nii.gz");
            if volumes.join(&nii_name).exists() {
                continue;
            }
            let Ok(rel) = mgz.strip_prefix(&native) else { continue };

            let spec = RunSpec::new(image)
                .command(format!("mri_convert /input/{} /output/{nii_name}", rel.display()))
                .binds(vec![
                    Bind::ro(native.display().to_string(), "/input"),
                    Bind::rw(volumes.display().to_string(), "/output"),
                ])
                .memory_gb(resources.memory_gb)
                .cpus(resources.cpus)
                .labels(vec![
                    (JOB_LABEL.to_string(), job_id.to_string()),
                    (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
                ])
                .security_opt(vec!["no-new-privileges".to_string()])
                .network_mode("none");

            let container_id = self.runtime.run(spec).await?;
            let exit = self.runtime.wait(&container_id).await;
            let _ = self.runtime.remove(&container_id).await;
            match exit {
                Ok(0) => tracing::debug!(job_id, file = %nii_name, "converted volume"),
                Ok(code) => tracing::warn!(job_id, file = %nii_name, code, "conversion failed"),
                Err(e) => tracing::warn!(job_id, file = %nii_name, error = %e, "conversion failed"),
            }
        }
        Ok(())
    }
}

fn store_err(e: ni_storage::StoreError) -> ExecutionError {
    ExecutionError::Store(e.to_string())
}

/// Command template for a spec, considering the registry fallback.
fn effective_template(spec: &JobSpec, plugin: Option<&Plugin>) -> Option<String> {
    if let Some(template) = &spec.command_template {
        if !template.is_empty() {
            return Some(template.clone());
        }
    }
    plugin
        .map(|p| p.effective_command().to_string())
        .filter(|t| !t.is_empty())
}

/// Non-retryable submission validation.
fn validate_plugin_spec(spec: &JobSpec, command_template: Option<&str>) -> Result<(), ExecutionError> {
    if spec.container_image.is_empty() {
        return Err(ExecutionError::Validation("No container image specified".to_string()));
    }
    if !image_allowed(&spec.container_image) {
        return Err(ExecutionError::Validation(format!(
            "Image '{}' is not in the allowed list. Contact admin to add it.",
            spec.container_image
        )));
    }
    for input in &spec.input_files {
        if !Path::new(input).exists() {
            return Err(ExecutionError::Validation(format!("Input file not found: {input}")));
        }
    }
    if spec.execution_mode == ExecutionMode::Plugin && command_template.is_none() {
        let plugin_id = spec.plugin_id.as_deref().unwrap_or("unknown");
        return Err(ExecutionError::Validation(format!(
            "Plugin '{plugin_id}' has no command_template -- cannot execute"
        )));
    }
    Ok(())
}

/// Absolute paths of the immediate subdirectories of `native/`.
fn native_subdirs(native: &Path) -> HashSet<String> {
    let Ok(entries) = std::fs::read_dir(native) else {
        return HashSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .map(|p| p.display().to_string())
        .collect()
}

/// Recursive search for files with the given extension.
fn find_by_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            found.extend(find_by_extension(&path, extension));
        } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
            found.push(path);
        }
    }
    found.sort();
    found
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
