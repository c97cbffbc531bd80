// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component wiring: one `Server` owns the registry, stores, executor,
//! SSH session, and the switchable current backend.

use crate::api::{BackendInfo, HealthResponse};
use crate::config::{BackendType, Config};
use crate::error::ServerError;
use crate::probe::{SysinfoProbe, SystemProbe};
use ni_backends::{ExecutionBackend, LocalDockerBackend, RemoteDockerBackend, SlurmBackend};
use ni_backends::slurm::SlurmSettings;
use ni_executor::runtime::ContainerRuntime;
use ni_executor::{Executor, ExecutorConfig, WorkerPool};
use ni_registry::Registry;
use ni_remote::{SshConfig, SshSession};
use ni_storage::{AuditLog, JobStore, ObjectStore, TaskSpool};
use parking_lot::RwLock;
use std::sync::Arc;

/// Injectable collaborators, so tests can substitute stubs.
pub struct Deps {
    pub store: Arc<dyn JobStore>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub probe: Arc<dyn SystemProbe>,
}

impl Deps {
    pub fn new(store: Arc<dyn JobStore>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { store, runtime, object_store: None, probe: Arc::new(SysinfoProbe) }
    }

    ni_core::setters! {
        set {
            probe: Arc<dyn SystemProbe>,
        }
        option {
            object_store: Arc<dyn ObjectStore>,
        }
    }
}

pub struct Server {
    pub(crate) config: Config,
    pub(crate) registry: Arc<Registry>,
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) spool: Arc<TaskSpool>,
    pub(crate) object_store: Option<Arc<dyn ObjectStore>>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) session: SshSession,
    pub(crate) executor: Arc<Executor>,
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
    pub(crate) probe: Arc<dyn SystemProbe>,
    backend: RwLock<(BackendType, Arc<dyn ExecutionBackend>)>,
    pub(crate) slurm: RwLock<Option<Arc<SlurmBackend>>>,
    pub(crate) remote_docker: RwLock<Option<Arc<RemoteDockerBackend>>>,
}

impl Server {
    /// Assemble all components from configuration.
    pub fn build(config: Config, deps: Deps) -> Result<Self, ServerError> {
        let registry = Arc::new(Registry::load(&config.plugins_dir, &config.workflows_dir));
        let audit = Arc::new(
            AuditLog::open(config.data_dir.join("audit"))
                .map_err(|e| ServerError::Internal(format!("cannot open audit log: {e}")))?,
        );
        let spool = Arc::new(
            TaskSpool::open(config.data_dir.join("spool"))
                .map_err(|e| ServerError::Internal(format!("cannot open task spool: {e}")))?,
        );

        let mut executor_config = ExecutorConfig::new(&config.data_dir);
        executor_config.license_mounts = config.license_mounts();
        let mut executor = Executor::new(
            Arc::clone(&deps.store),
            Arc::clone(&registry),
            Arc::clone(&deps.runtime),
            executor_config,
        )
        .with_audit(Arc::clone(&audit));
        if let Some(object_store) = &deps.object_store {
            executor = executor.with_object_store(Arc::clone(object_store));
        }
        let executor = Arc::new(executor);

        let session = SshSession::new();
        {
            let audit_hook = Arc::clone(&audit);
            session.set_idle_hook(Arc::new(move |idle_seconds| {
                audit_hook.record(
                    "ssh_idle_timeout",
                    serde_json::json!({ "idle_seconds": idle_seconds }),
                );
            }));
        }

        let server = Self {
            registry,
            store: deps.store,
            spool,
            object_store: deps.object_store,
            audit,
            session,
            executor,
            runtime: deps.runtime,
            probe: deps.probe,
            backend: RwLock::new((
                BackendType::Local,
                Arc::new(PlaceholderBackend) as Arc<dyn ExecutionBackend>,
            )),
            slurm: RwLock::new(None),
            remote_docker: RwLock::new(None),
            config,
        };

        let initial = server.config.backend_type;
        let backend = server.make_backend(initial)?;
        *server.backend.write() = (initial, backend);
        Ok(server)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// The currently selected backend.
    pub fn backend(&self) -> Arc<dyn ExecutionBackend> {
        self.backend.read().1.clone()
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.read().0
    }

    fn make_backend(&self, kind: BackendType) -> Result<Arc<dyn ExecutionBackend>, ServerError> {
        self.config
            .validate_backend(kind)
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;

        match kind {
            BackendType::Local => Ok(Arc::new(LocalDockerBackend::new(
                &self.config.data_dir,
                self.config.max_concurrent_jobs,
                Arc::clone(&self.store),
                Arc::clone(&self.registry),
                Arc::clone(&self.runtime),
                Arc::clone(&self.spool),
                Arc::clone(&self.executor),
            ))),
            BackendType::RemoteDocker => {
                // validate_backend guarantees these are set.
                let host = self.config.remote.host.clone().unwrap_or_default();
                let user = self.config.remote.user.clone().unwrap_or_default();
                self.session
                    .configure(SshConfig::new(host.clone(), user.clone()));
                let backend = Arc::new(RemoteDockerBackend::new(
                    host,
                    user,
                    self.config.remote.work_dir.clone(),
                    self.session.clone(),
                    Arc::clone(&self.store),
                    Arc::clone(&self.registry),
                ));
                *self.remote_docker.write() = Some(Arc::clone(&backend));
                Ok(backend)
            }
            BackendType::Slurm => {
                let hpc = &self.config.hpc;
                let host = hpc.host.clone().unwrap_or_default();
                let user = hpc.user.clone().unwrap_or_default();
                let mut ssh_config =
                    SshConfig::new(host.clone(), user.clone()).port(hpc.ssh_port);
                if let Some(key_path) = &hpc.ssh_key_path {
                    ssh_config = ssh_config.key_path(key_path.clone());
                }
                self.session.configure(ssh_config);

                let mut settings = SlurmSettings::new(host, user)
                    .work_dir(hpc.work_dir.clone())
                    .partition(hpc.partition.clone())
                    .container_runtime(hpc.container_runtime.clone())
                    .modules(hpc.modules.clone());
                if let Some(account) = &hpc.account {
                    settings = settings.account(account.clone());
                }
                if let Some(qos) = &hpc.qos {
                    settings = settings.qos(qos.clone());
                }
                let backend = Arc::new(SlurmBackend::new(
                    settings,
                    self.session.clone(),
                    Arc::clone(&self.store),
                    Arc::clone(&self.registry),
                ));
                *self.slurm.write() = Some(Arc::clone(&backend));
                Ok(backend)
            }
        }
    }

    /// Switch the active backend at runtime, validating the target
    /// configuration first.
    pub fn switch_backend(&self, kind: BackendType) -> Result<BackendInfo, ServerError> {
        let backend = self.make_backend(kind)?;
        let previous = {
            let mut current = self.backend.write();
            let previous = current.0;
            *current = (kind, backend);
            previous
        };
        self.audit.record(
            "backend_switched",
            serde_json::json!({
                "from": previous.to_string(),
                "to": kind.to_string(),
            }),
        );
        tracing::info!(from = %previous, to = %kind, "backend switched");
        Ok(BackendInfo {
            backend_type: kind.to_string(),
            healthy: true,
            message: format!("Switched to {kind}"),
        })
    }

    /// Spawn the durable task workers.
    pub fn spawn_workers(&self) -> WorkerPool {
        WorkerPool::spawn(
            Arc::clone(&self.executor),
            Arc::clone(&self.spool),
            self.config.max_concurrent_jobs,
        )
    }

    /// Aggregate health: store, spool, object store, SSH, and the
    /// current backend. Never fails.
    pub async fn health(&self) -> HealthResponse {
        let store_ok = self.store.list(None, 1).is_ok();
        let backend_health = self.backend().health().await;
        let snapshot = self.registry.snapshot();

        let mut components = serde_json::json!({
            "store": { "healthy": store_ok },
            "queue": {
                "healthy": true,
                "pending": self.spool.pending_count(),
                "claimed": self.spool.claimed_count(),
            },
            "object_store": { "configured": self.object_store.is_some() },
            "registry": {
                "plugins": snapshot.plugins.len(),
                "workflows": snapshot.workflows.len(),
            },
            "backend": {
                "type": self.backend_type().to_string(),
                "healthy": backend_health.healthy,
                "message": backend_health.message,
                "details": backend_health.details,
            },
        });
        if self.backend_type() != BackendType::Local {
            components["ssh"] = serde_json::to_value(self.session.connection_info())
                .unwrap_or_else(|_| serde_json::json!({}));
        }

        let healthy = store_ok && backend_health.healthy;
        HealthResponse { status: if healthy { "ok" } else { "degraded" }, components }
    }
}

/// Stand-in used only during construction, before the first
/// `make_backend` call replaces it.
struct PlaceholderBackend;

#[async_trait::async_trait]
impl ExecutionBackend for PlaceholderBackend {
    fn backend_type(&self) -> &'static str {
        "uninitialized"
    }

    async fn submit(
        &self,
        _spec: ni_core::JobSpec,
        _job_id: Option<String>,
    ) -> Result<String, ni_core::ExecutionError> {
        Err(ni_core::ExecutionError::BackendUnavailable("backend not initialized".into()))
    }

    async fn status(&self, job_id: &str) -> Result<ni_core::JobStatus, ni_core::ExecutionError> {
        Err(ni_core::ExecutionError::NotFound(job_id.to_string()))
    }

    async fn info(&self, job_id: &str) -> Result<ni_core::JobInfo, ni_core::ExecutionError> {
        Err(ni_core::ExecutionError::NotFound(job_id.to_string()))
    }

    async fn cancel(&self, job_id: &str) -> Result<bool, ni_core::ExecutionError> {
        Err(ni_core::ExecutionError::NotFound(job_id.to_string()))
    }

    async fn logs(&self, job_id: &str) -> Result<ni_core::JobLogs, ni_core::ExecutionError> {
        Ok(ni_core::JobLogs::new(job_id))
    }

    async fn list(
        &self,
        _status_filter: Option<&[ni_core::JobStatus]>,
        _limit: usize,
    ) -> Result<Vec<ni_core::JobInfo>, ni_core::ExecutionError> {
        Ok(Vec::new())
    }

    async fn cleanup(&self, job_id: &str) -> Result<bool, ni_core::ExecutionError> {
        Err(ni_core::ExecutionError::NotFound(job_id.to_string()))
    }

    async fn health(&self) -> ni_backends::BackendHealth {
        ni_backends::BackendHealth::unhealthy("backend not initialized", serde_json::json!({}))
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
