// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operations behind the HTTP surface, one method per endpoint.

use crate::api::{
    CancelResponse, DeleteResponse, JobsResponse, ProgressEntry, ProgressResponse, SubmitRequest,
    SubmitResponse,
};
use crate::config::BackendType;
use crate::error::ServerError;
use crate::presets;
use crate::server::Server;
use ni_core::{ExecutionMode, JobInfo, JobLogs, JobSpec, JobStatus, ResourceSpec};
use ni_registry::{Lockfile, Plugin, VerifyReport};
use ni_results::Projection;
use std::path::PathBuf;

impl Server {
    // ------------------------------------------------------------------
    // Registry endpoints
    // ------------------------------------------------------------------

    /// `GET /api/plugins`
    pub fn list_plugins(&self, user_selectable_only: bool) -> serde_json::Value {
        let plugins: Vec<serde_json::Value> = self
            .registry
            .list_plugins(user_selectable_only)
            .iter()
            .map(Plugin::to_api)
            .collect();
        serde_json::json!({ "plugins": plugins, "total": plugins.len() })
    }

    /// `GET /api/plugins/{id}`
    pub fn get_plugin(&self, plugin_id: &str) -> Result<serde_json::Value, ServerError> {
        self.registry
            .get_plugin(plugin_id)
            .map(|p| p.to_api())
            .ok_or_else(|| ServerError::NotFound(format!("Plugin '{plugin_id}' not found")))
    }

    /// `GET /api/workflows`
    pub fn list_workflows(&self) -> serde_json::Value {
        let snapshot = self.registry.snapshot();
        let workflows: Vec<serde_json::Value> = self
            .registry
            .list_workflows()
            .iter()
            .map(|w| w.to_api(&snapshot.plugins))
            .collect();
        serde_json::json!({ "workflows": workflows, "total": workflows.len() })
    }

    /// `GET /api/workflows/{id}`
    pub fn get_workflow(&self, workflow_id: &str) -> Result<serde_json::Value, ServerError> {
        let snapshot = self.registry.snapshot();
        self.registry
            .get_workflow(workflow_id)
            .map(|w| w.to_api(&snapshot.plugins))
            .ok_or_else(|| ServerError::NotFound(format!("Workflow '{workflow_id}' not found")))
    }

    /// `GET /api/registry/lockfile`
    pub fn lockfile(&self) -> Lockfile {
        self.registry.generate_lockfile()
    }

    /// `POST /api/registry/verify`
    pub fn verify_lockfile(&self, lockfile: &Lockfile) -> VerifyReport {
        self.registry.verify_lockfile(lockfile)
    }

    /// `POST /api/registry/reload`
    pub fn reload_registry(&self) -> serde_json::Value {
        self.registry.reload();
        let snapshot = self.registry.snapshot();
        self.audit().record(
            "registry_reloaded",
            serde_json::json!({
                "plugins": snapshot.plugins.len(),
                "workflows": snapshot.workflows.len(),
            }),
        );
        serde_json::json!({
            "status": "reloaded",
            "plugins": snapshot.plugins.len(),
            "workflows": snapshot.workflows.len(),
        })
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    fn resolve_resources(
        &self,
        request: &SubmitRequest,
        plugin: &Plugin,
    ) -> ResourceSpec {
        if let Some(resources) = &request.resources {
            return resources.clone();
        }
        if let Some(profile) = &request.resource_profile {
            if let Some(spec) = plugin.resource_profiles.get(profile) {
                return spec.clone();
            }
            if let Some(spec) = presets::preset(profile) {
                return spec;
            }
        }
        plugin.resources.clone()
    }

    /// `POST /api/plugins/{id}/submit`
    pub async fn submit_plugin(
        &self,
        plugin_id: &str,
        request: SubmitRequest,
    ) -> Result<SubmitResponse, ServerError> {
        let plugin = self
            .registry
            .get_plugin(plugin_id)
            .ok_or_else(|| ServerError::NotFound(format!("Plugin '{plugin_id}' not found")))?;

        // User-selectable plugins must carry a runnable template.
        let template = plugin.effective_command();
        if plugin.user_selectable && template.is_empty() {
            return Err(ServerError::BadRequest(format!(
                "Plugin '{plugin_id}' has no command_template -- cannot execute"
            )));
        }

        let resources = self.resolve_resources(&request, &plugin);
        let spec = JobSpec {
            pipeline_name: plugin.name.clone(),
            container_image: plugin.container_image.clone(),
            input_files: request.input_files,
            output_dir: String::new(),
            parameters: request.parameters,
            resources,
            pipeline_version: Some(plugin.version.clone()),
            plugin_id: Some(plugin.id.clone()),
            workflow_id: None,
            execution_mode: ExecutionMode::Plugin,
            command_template: (!template.is_empty()).then(|| template.to_string()),
            workflow_steps: Vec::new(),
            data_dir: self.config.data_dir.display().to_string(),
        };

        let job_id = self.backend().submit(spec, None).await?;
        self.audit().record(
            "job_submitted",
            serde_json::json!({ "job_id": job_id, "plugin_id": plugin_id }),
        );
        Ok(SubmitResponse {
            job_id,
            status: JobStatus::Pending,
            plugin: Some(plugin.id),
            workflow: None,
        })
    }

    /// `POST /api/workflows/{id}/submit`
    pub async fn submit_workflow(
        &self,
        workflow_id: &str,
        request: SubmitRequest,
    ) -> Result<SubmitResponse, ServerError> {
        let workflow = self
            .registry
            .get_workflow(workflow_id)
            .ok_or_else(|| ServerError::NotFound(format!("Workflow '{workflow_id}' not found")))?;

        // Every referenced step must resolve before anything persists.
        let snapshot = self.registry.snapshot();
        let step_ids = workflow.step_plugin_ids();
        if step_ids.is_empty() {
            return Err(ServerError::BadRequest(format!(
                "Workflow '{workflow_id}' has no steps"
            )));
        }
        for step in &step_ids {
            if !snapshot.plugins.contains_key(step) {
                return Err(ServerError::BadRequest(format!(
                    "Workflow '{workflow_id}' references unknown plugin '{step}'"
                )));
            }
        }

        // The first step's plugin supplies the workflow's image and
        // default resources.
        let Some(first) = snapshot.plugins.get(&step_ids[0]) else {
            return Err(ServerError::BadRequest(format!(
                "Workflow '{workflow_id}' has no resolvable first step"
            )));
        };
        let resources = self.resolve_resources(&request, first);
        let spec = JobSpec {
            pipeline_name: workflow.name.clone(),
            container_image: first.container_image.clone(),
            input_files: request.input_files,
            output_dir: String::new(),
            parameters: request.parameters,
            resources,
            pipeline_version: Some(workflow.version.clone()),
            plugin_id: None,
            workflow_id: Some(workflow.id.clone()),
            execution_mode: ExecutionMode::Workflow,
            command_template: None,
            workflow_steps: step_ids,
            data_dir: self.config.data_dir.display().to_string(),
        };

        let job_id = self.backend().submit(spec, None).await?;
        self.audit().record(
            "job_submitted",
            serde_json::json!({ "job_id": job_id, "workflow_id": workflow_id }),
        );
        Ok(SubmitResponse {
            job_id,
            status: JobStatus::Pending,
            plugin: None,
            workflow: Some(workflow.id),
        })
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// `GET /api/jobs`
    pub async fn jobs(
        &self,
        status_filter: Option<&[JobStatus]>,
        limit: usize,
    ) -> Result<JobsResponse, ServerError> {
        let jobs = self.backend().list(status_filter, limit).await?;
        Ok(JobsResponse { total: jobs.len(), jobs })
    }

    /// `GET /api/jobs/progress`, the lightweight poll for active jobs.
    pub async fn jobs_progress(&self) -> Result<ProgressResponse, ServerError> {
        let active = self
            .backend()
            .list(Some(&[JobStatus::Pending, JobStatus::Running]), usize::MAX)
            .await?;
        Ok(ProgressResponse {
            jobs: active
                .into_iter()
                .map(|info| ProgressEntry {
                    job_id: info.job_id,
                    status: info.status,
                    progress: info.progress,
                    current_phase: info.current_phase,
                })
                .collect(),
        })
    }

    /// `GET /api/jobs/{id}`
    pub async fn job(&self, job_id: &str) -> Result<JobInfo, ServerError> {
        Ok(self.backend().info(job_id).await?)
    }

    /// `POST /api/jobs/{id}/cancel`
    pub async fn cancel_job(&self, job_id: &str) -> Result<CancelResponse, ServerError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ServerError::NotFound(format!("Job {job_id} not found")))?;
        if job.is_terminal() {
            return Err(ServerError::BadRequest(format!(
                "Job {job_id} is already {} and cannot be cancelled",
                job.status
            )));
        }
        let cancelled = self.backend().cancel(job_id).await?;
        self.audit().record(
            "job_cancelled",
            serde_json::json!({ "job_id": job_id, "signalled": cancelled }),
        );
        Ok(CancelResponse { job_id: job_id.to_string(), cancelled })
    }

    /// `GET /api/jobs/{id}/logs`
    pub async fn job_logs(&self, job_id: &str) -> Result<JobLogs, ServerError> {
        Ok(self.backend().logs(job_id).await?)
    }

    /// `DELETE /api/jobs/{id}`
    pub async fn delete_job(&self, job_id: &str) -> Result<DeleteResponse, ServerError> {
        let deleted = self.backend().cleanup(job_id).await?;
        Ok(DeleteResponse { job_id: job_id.to_string(), deleted })
    }

    // ------------------------------------------------------------------
    // Results
    // ------------------------------------------------------------------

    fn projection(&self, job_id: &str) -> Result<Projection, ServerError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ServerError::NotFound(format!("Job {job_id} not found")))?;
        Ok(Projection::new(job_id, PathBuf::from(job.output_dir)))
    }

    /// `GET /api/results/{id}/files`
    pub fn results_files(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        let files = self.projection(job_id)?.list_files()?;
        let total = files.len();
        Ok(serde_json::json!({ "job_id": job_id, "files": files, "total": total }))
    }

    /// `GET /api/results/{id}/volume`
    pub fn results_volume(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        let volumes = self.projection(job_id)?.volumes()?;
        Ok(serde_json::json!({ "job_id": job_id, "volumes": volumes }))
    }

    /// `GET /api/results/{id}/segmentation`
    pub fn results_segmentation(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        let segmentations = self.projection(job_id)?.segmentations()?;
        Ok(serde_json::json!({ "job_id": job_id, "segmentations": segmentations }))
    }

    /// `GET /api/results/{id}/labels`
    pub fn results_labels(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        match self.projection(job_id)?.labels()? {
            Some((labels, source)) => {
                Ok(serde_json::json!({ "job_id": job_id, "labels": labels, "source": source }))
            }
            None => Err(ServerError::NotFound(
                "No label definitions found in job output".to_string(),
            )),
        }
    }

    /// `GET /api/results/{id}/metrics`
    pub fn results_metrics(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        let (metrics, csv_files, sources) = self.projection(job_id)?.metrics()?;
        if metrics.is_empty() && csv_files.is_empty() {
            return Err(ServerError::NotFound("No metrics found in job output".to_string()));
        }
        Ok(serde_json::json!({
            "job_id": job_id,
            "metrics": metrics,
            "csv_files": csv_files,
            "sources": sources,
        }))
    }

    /// `GET /api/results/{id}/download?file_path=...`
    ///
    /// Returns the absolute path and media type for the plumbing to
    /// stream.
    pub fn results_download(
        &self,
        job_id: &str,
        file_path: &str,
    ) -> Result<(PathBuf, &'static str), ServerError> {
        Ok(self.projection(job_id)?.resolve_download(file_path)?)
    }

    /// `GET /api/results/{id}/export`: writes the archive and returns
    /// the suggested filename.
    pub fn results_export<W: std::io::Write>(
        &self,
        job_id: &str,
        writer: W,
    ) -> Result<String, ServerError> {
        let projection = self.projection(job_id)?;
        projection.export(writer)?;
        self.audit()
            .record("results_exported", serde_json::json!({ "job_id": job_id }));
        Ok(projection.export_filename())
    }

    /// `GET /api/results/{id}/provenance`
    pub fn results_provenance(&self, job_id: &str) -> Result<serde_json::Value, ServerError> {
        let job = self
            .store
            .get(job_id)
            .map_err(|_| ServerError::NotFound(format!("Job {job_id} not found")))?;
        Ok(self.projection(job_id)?.provenance(Some(&job)))
    }

    // ------------------------------------------------------------------
    // HPC / backend endpoints
    // ------------------------------------------------------------------

    /// `GET /api/hpc/backend/current`
    pub async fn current_backend(&self) -> crate::api::BackendInfo {
        let health = self.backend().health().await;
        crate::api::BackendInfo {
            backend_type: self.backend_type().to_string(),
            healthy: health.healthy,
            message: health.message,
        }
    }

    /// `POST /api/hpc/backend/switch`
    pub fn switch_backend_to(&self, kind: &str) -> Result<crate::api::BackendInfo, ServerError> {
        let kind = BackendType::parse(kind).map_err(|e| ServerError::BadRequest(e.to_string()))?;
        self.switch_backend(kind)
    }

    fn slurm_backend(&self) -> Result<std::sync::Arc<ni_backends::SlurmBackend>, ServerError> {
        self.slurm.read().clone().ok_or_else(|| {
            ServerError::BadRequest("SLURM backend has not been activated".to_string())
        })
    }

    /// `GET /api/hpc/partitions`
    pub async fn hpc_partitions(&self) -> Result<serde_json::Value, ServerError> {
        let partitions = self.slurm_backend()?.partitions().await;
        Ok(serde_json::json!({ "partitions": partitions }))
    }

    /// `GET /api/hpc/queue`
    pub async fn hpc_queue(&self, user_only: bool) -> Result<serde_json::Value, ServerError> {
        let queue = self.slurm_backend()?.queue(user_only).await;
        Ok(serde_json::json!({ "jobs": queue }))
    }

    /// `GET /api/hpc/accounts`
    pub async fn hpc_accounts(&self) -> Result<serde_json::Value, ServerError> {
        Ok(self.slurm_backend()?.accounts().await)
    }

    /// `GET /api/hpc/system-info`
    pub async fn system_info(&self) -> serde_json::Value {
        if let Some(remote) = self.remote_docker.read().clone() {
            if self.backend_type() == BackendType::RemoteDocker {
                return remote.system_info().await;
            }
        }
        serde_json::to_value(self.probe.resources(&self.config.data_dir))
            .unwrap_or_else(|_| serde_json::json!({}))
    }

    /// `GET /api/hpc/resource-presets`
    pub fn resource_presets(&self) -> serde_json::Value {
        let presets: serde_json::Map<String, serde_json::Value> = presets::resource_presets()
            .into_iter()
            .filter_map(|(name, spec)| {
                serde_json::to_value(spec).ok().map(|v| (name.to_string(), v))
            })
            .collect();
        serde_json::json!({ "presets": presets })
    }
}
