// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local Docker backend: containers on this host, work dispatched
//! through the durable task spool.

use crate::backend::{BackendHealth, ExecutionBackend};
use async_trait::async_trait;
use chrono::Utc;
use ni_core::{ExecutionError, ExecutionMode, Job, JobInfo, JobLogs, JobSpec, JobStatus};
use ni_executor::run::{JOB_LABEL, MANAGED_BY, MANAGED_BY_LABEL};
use ni_executor::runtime::ContainerRuntime;
use ni_executor::{Executor, JobDirs};
use ni_registry::Registry;
use ni_storage::{JobStore, Task, TaskKind, TaskSpool};
use std::path::PathBuf;
use std::sync::Arc;

pub struct LocalDockerBackend {
    data_dir: PathBuf,
    max_concurrent_jobs: usize,
    store: Arc<dyn JobStore>,
    registry: Arc<Registry>,
    runtime: Arc<dyn ContainerRuntime>,
    spool: Arc<TaskSpool>,
    executor: Arc<Executor>,
}

impl LocalDockerBackend {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        max_concurrent_jobs: usize,
        store: Arc<dyn JobStore>,
        registry: Arc<Registry>,
        runtime: Arc<dyn ContainerRuntime>,
        spool: Arc<TaskSpool>,
        executor: Arc<Executor>,
    ) -> Self {
        let data_dir = data_dir.into();
        tracing::info!(
            data_dir = %data_dir.display(),
            max_concurrent_jobs,
            "local Docker backend initialized"
        );
        Self { data_dir, max_concurrent_jobs, store, registry, runtime, spool, executor }
    }

    fn store_err(e: ni_storage::StoreError) -> ExecutionError {
        match e {
            ni_storage::StoreError::NotFound(id) => ExecutionError::NotFound(id),
            other => ExecutionError::Store(other.to_string()),
        }
    }

    /// Stop any container carrying the job label; true when one was
    /// signalled.
    async fn stop_job_containers(&self, job_id: &str, grace_secs: u32) -> bool {
        let containers = self
            .runtime
            .find_by_label(JOB_LABEL, job_id)
            .await
            .unwrap_or_default();
        let mut stopped = false;
        for container_id in containers {
            match self.runtime.stop(&container_id, grace_secs).await {
                Ok(()) => {
                    tracing::info!(job_id, container = %container_id, "container stopped");
                    stopped = true;
                }
                Err(e) => {
                    tracing::warn!(job_id, container = %container_id, error = %e, "container stop failed");
                }
            }
        }
        stopped
    }
}

#[async_trait]
impl ExecutionBackend for LocalDockerBackend {
    fn backend_type(&self) -> &'static str {
        "local"
    }

    async fn submit(&self, mut spec: JobSpec, job_id: Option<String>) -> Result<String, ExecutionError> {
        let job_id = job_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let dirs = JobDirs::new(&self.data_dir, &job_id);
        dirs.create().map_err(|e| {
            ExecutionError::SubmitFailed(format!("cannot create output directory: {e}"))
        })?;
        spec.output_dir = dirs.root().display().to_string();
        spec.data_dir = self.data_dir.display().to_string();

        // Inject the plugin's command template so the task is
        // self-contained on the queue.
        if spec.command_template.as_deref().unwrap_or_default().is_empty() {
            if let Some(plugin) = spec.plugin_id.as_deref().and_then(|id| self.registry.get_plugin(id)) {
                let template = plugin.effective_command();
                if !template.is_empty() {
                    spec.command_template = Some(template.to_string());
                }
            }
        }

        self.store
            .insert(Job::from_spec(&job_id, self.backend_type(), &spec, Utc::now()))
            .map_err(|e| ExecutionError::SubmitFailed(e.to_string()))?;

        let kind = match spec.execution_mode {
            ExecutionMode::Plugin => TaskKind::RunPlugin,
            ExecutionMode::Workflow => TaskKind::RunWorkflow,
        };
        let task = Task::new(&job_id, kind, spec);

        match self.spool.enqueue(&task) {
            Ok(()) => {
                tracing::info!(job_id, kind = %task.kind, "job dispatched to task spool");
            }
            Err(e) => {
                // Degraded mode: run the same logic inline in a
                // detached worker, without retries.
                tracing::warn!(job_id, error = %e, "spool enqueue failed, running inline");
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move {
                    executor.run_task_once(&task).await;
                });
            }
        }

        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutionError> {
        Ok(self.store.get(job_id).map_err(Self::store_err)?.status)
    }

    async fn info(&self, job_id: &str) -> Result<JobInfo, ExecutionError> {
        Ok(self.store.get(job_id).map_err(Self::store_err)?.to_info())
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ExecutionError> {
        let job = self.store.get(job_id).map_err(Self::store_err)?;
        if job.is_terminal() {
            return Ok(false);
        }

        let container_stopped = self.stop_job_containers(job_id, 10).await;
        let task_revoked = self.spool.revoke(job_id).unwrap_or(false);

        self.store
            .mark_cancelled(job_id, Utc::now())
            .map_err(Self::store_err)?;
        tracing::info!(job_id, container_stopped, task_revoked, "job cancelled");
        Ok(container_stopped || task_revoked || job.status == JobStatus::Running)
    }

    async fn logs(&self, job_id: &str) -> Result<JobLogs, ExecutionError> {
        let job = self.store.get(job_id).map_err(Self::store_err)?;
        let dirs = JobDirs::from_root(&job.output_dir);

        let mut logs = JobLogs::new(job_id);
        if let Ok(text) = std::fs::read_to_string(dirs.stdout_log()) {
            logs.stdout = text;
        } else if let Ok(text) = std::fs::read_to_string(dirs.container_log()) {
            logs.stdout = text;
        }
        if let Ok(text) = std::fs::read_to_string(dirs.stderr_log()) {
            logs.stderr = text;
        }

        // No files yet: ask the container directly.
        if logs.stdout.is_empty() {
            if let Some(container_id) = &job.backend_job_id {
                if let Ok(text) = self.runtime.logs(container_id, true, false, None).await {
                    logs.stdout = text;
                }
                if let Ok(text) = self.runtime.logs(container_id, false, true, None).await {
                    logs.stderr = text;
                }
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
            .map_err(Self::store_err)?;
        Ok(jobs.iter().map(Job::to_info).collect())
    }

    async fn cleanup(&self, job_id: &str) -> Result<bool, ExecutionError> {
        let job = self.store.get(job_id).map_err(Self::store_err)?;

        let containers = self
            .runtime
            .find_by_label(JOB_LABEL, job_id)
            .await
            .unwrap_or_default();
        for container_id in containers {
            let _ = self.runtime.stop(&container_id, 5).await;
            let _ = self.runtime.remove(&container_id).await;
        }

        let output_dir = PathBuf::from(&job.output_dir);
        if output_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&output_dir) {
                tracing::warn!(job_id, error = %e, "failed to remove output directory");
            }
        }

        let deleted = self
            .store
            .soft_delete(job_id, Utc::now())
            .map_err(Self::store_err)?;
        tracing::info!(job_id, "job cleaned up");
        Ok(deleted)
    }

    async fn health(&self) -> BackendHealth {
        match self.runtime.info().await {
            Ok(info) => {
                let managed = self
                    .runtime
                    .find_by_label(MANAGED_BY_LABEL, MANAGED_BY)
                    .await
                    .map(|c| c.len())
                    .unwrap_or(0);
                BackendHealth::healthy(
                    "Docker is available",
                    serde_json::json!({
                        "backend_type": self.backend_type(),
                        "docker_version": info.server_version,
                        "containers_running": info.containers_running,
                        "active_job_containers": managed,
                        "max_concurrent_jobs": self.max_concurrent_jobs,
                        "data_dir": self.data_dir.display().to_string(),
                        "images_cached": info.images,
                    }),
                )
            }
            Err(e) => BackendHealth::unhealthy(
                format!("Docker is not available: {e}"),
                serde_json::json!({
                    "backend_type": self.backend_type(),
                    "error": e.to_string(),
                }),
            ),
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
