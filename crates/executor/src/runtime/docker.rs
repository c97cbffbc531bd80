// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker implementation of the container-runtime seam via bollard.

use super::{
    Bind, ContainerRuntime, ContainerState, LogChunk, LogStream, LogStreamKind, RunSpec,
    RuntimeInfo,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::{DeviceRequest, HostConfig};
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use ni_core::ExecutionError;
use std::collections::HashMap;

fn docker_err(e: bollard::errors::Error) -> ExecutionError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, message } => {
            ExecutionError::NotFound(message.clone())
        }
        _ => ExecutionError::Transient(format!("docker: {e}")),
    }
}

fn parse_docker_time(raw: &str) -> Option<DateTime<Utc>> {
    // Docker reports the epoch (0001-01-01...) for never-finished
    // containers.
    if raw.is_empty() || raw.starts_with("0001") {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

/// Bollard-backed Docker runtime on the local daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect with the standard environment defaults.
    pub fn connect() -> Result<Self, ExecutionError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ExecutionError::BackendUnavailable(format!("Docker is not available: {e}")))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<(), ExecutionError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| ExecutionError::BackendUnavailable(format!("Docker is not available: {e}")))
    }

    async fn ensure_image(&self, image: &str) -> Result<(), ExecutionError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                tracing::debug!(image, "image already present");
                return Ok(());
            }
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {}
            Err(e) => return Err(docker_err(e)),
        }

        tracing::info!(image, "pulling image");
        let options = CreateImageOptions { from_image: image, ..Default::default() };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| ExecutionError::Transient(format!("image pull: {e}")))?;
        }
        Ok(())
    }

    async fn run(&self, spec: RunSpec) -> Result<String, ExecutionError> {
        let binds: Vec<String> = spec.binds.iter().map(Bind::to_bind_string).collect();
        let device_requests = spec.gpu.then(|| {
            vec![DeviceRequest {
                driver: Some(String::new()),
                count: Some(-1),
                device_ids: None,
                capabilities: Some(vec![vec!["gpu".to_string()]]),
                options: Some(HashMap::new()),
            }]
        });

        let host_config = HostConfig {
            binds: Some(binds),
            memory: Some(spec.memory_gb as i64 * 1024 * 1024 * 1024),
            nano_cpus: Some(spec.cpus as i64 * 1_000_000_000),
            security_opt: if spec.security_opt.is_empty() {
                None
            } else {
                Some(spec.security_opt.clone())
            },
            network_mode: spec.network_mode.clone(),
            device_requests,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: spec
                .command
                .as_ref()
                .map(|c| vec!["/bin/sh".to_string(), "-c".to_string(), c.clone()]),
            env: Some(spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect()),
            labels: Some(spec.labels.iter().cloned().collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec
            .name
            .as_ref()
            .map(|name| CreateContainerOptions { name: name.clone(), platform: None });

        let created = self
            .docker
            .create_container(options, config)
            .await
            .map_err(docker_err)?;
        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(docker_err)?;
        Ok(created.id)
    }

    async fn stream_logs(&self, id: &str) -> Result<LogStream, ExecutionError> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let stream = self.docker.logs(id, Some(options)).map(|item| {
            item.map(|output| match output {
                LogOutput::StdErr { message } => LogChunk {
                    stream: LogStreamKind::Stderr,
                    text: String::from_utf8_lossy(&message).into_owned(),
                },
                other => LogChunk {
                    stream: LogStreamKind::Stdout,
                    text: String::from_utf8_lossy(&other.into_bytes()).into_owned(),
                },
            })
            .map_err(|e| ExecutionError::Transient(format!("log stream: {e}")))
        });
        Ok(stream.boxed())
    }

    async fn wait(&self, id: &str) -> Result<i64, ExecutionError> {
        let mut stream = self.docker.wait_container::<String>(id, None);
        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit surfaces as a server error carrying the
            // status code; fall back to inspect.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(docker_err(e)),
            None => {
                let state = self.inspect(id).await?;
                Ok(state.exit_code.unwrap_or(-1))
            }
        }
    }

    async fn logs(
        &self,
        id: &str,
        stdout: bool,
        stderr: bool,
        tail: Option<usize>,
    ) -> Result<String, ExecutionError> {
        let options = LogsOptions::<String> {
            follow: false,
            stdout,
            stderr,
            tail: tail.map(|n| n.to_string()).unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));
        let mut collected = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(output) => {
                    collected.push_str(&String::from_utf8_lossy(&output.into_bytes()));
                }
                Err(e) => return Err(docker_err(e)),
            }
        }
        Ok(collected)
    }

    async fn stop(&self, id: &str, grace_secs: u32) -> Result<(), ExecutionError> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: grace_secs as i64 }))
            .await
            .map_err(docker_err)
    }

    async fn remove(&self, id: &str) -> Result<(), ExecutionError> {
        self.docker
            .remove_container(id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
            .map_err(docker_err)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, ExecutionError> {
        let details = self.docker.inspect_container(id, None).await.map_err(docker_err)?;
        let state = details.state.unwrap_or_default();
        Ok(ContainerState {
            status: state
                .status
                .map(|s| s.to_string())
                .unwrap_or_default(),
            exit_code: state.exit_code,
            started_at: state.started_at.as_deref().and_then(parse_docker_time),
            finished_at: state.finished_at.as_deref().and_then(parse_docker_time),
            error: state.error.filter(|e| !e.is_empty()),
        })
    }

    async fn find_by_label(&self, label: &str, value: &str) -> Result<Vec<String>, ExecutionError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{label}={value}")]);
        let options = ListContainersOptions { all: true, filters, ..Default::default() };
        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(docker_err)?;
        Ok(containers.into_iter().filter_map(|c| c.id).collect())
    }

    async fn info(&self) -> Result<RuntimeInfo, ExecutionError> {
        let info = self.docker.info().await.map_err(docker_err)?;
        Ok(RuntimeInfo {
            server_version: info.server_version.unwrap_or_else(|| "unknown".to_string()),
            containers_running: info.containers_running.unwrap_or(0).max(0) as u64,
            images: info.images.unwrap_or(0).max(0) as u64,
        })
    }
}
