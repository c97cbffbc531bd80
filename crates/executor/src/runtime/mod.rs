// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container-runtime seam.
//!
//! The executor and the local backend talk to containers exclusively
//! through [`ContainerRuntime`], so tests run against the scripted
//! [`FakeRuntime`] instead of a Docker daemon.

mod docker;
#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use docker::DockerRuntime;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRuntime, Script};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use ni_core::ExecutionError;

/// A host-to-container bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub host: String,
    pub container: String,
    pub read_only: bool,
}

impl Bind {
    pub fn ro(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self { host: host.into(), container: container.into(), read_only: true }
    }

    pub fn rw(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self { host: host.into(), container: container.into(), read_only: false }
    }

    /// Docker bind string: `host:container[:ro]`.
    pub fn to_bind_string(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.host, self.container)
        } else {
            format!("{}:{}", self.host, self.container)
        }
    }
}

/// Everything needed to launch one detached container.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub image: String,
    /// Shell command body; None runs the image's default CMD.
    pub command: Option<String>,
    pub binds: Vec<Bind>,
    pub env: Vec<(String, String)>,
    pub memory_gb: u32,
    pub cpus: u32,
    pub gpu: bool,
    pub labels: Vec<(String, String)>,
    pub name: Option<String>,
    /// `no-new-privileges` and friends.
    pub security_opt: Vec<String>,
    /// `none` for offline pipelines.
    pub network_mode: Option<String>,
}

impl RunSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            command: None,
            binds: Vec::new(),
            env: Vec::new(),
            memory_gb: 8,
            cpus: 4,
            gpu: false,
            labels: Vec::new(),
            name: None,
            security_opt: Vec::new(),
            network_mode: None,
        }
    }

    ni_core::setters! {
        set {
            binds: Vec<Bind>,
            env: Vec<(String, String)>,
            memory_gb: u32,
            cpus: u32,
            gpu: bool,
            labels: Vec<(String, String)>,
            security_opt: Vec<String>,
        }
        option {
            command: String,
            name: String,
            network_mode: String,
        }
    }
}

/// Which stream a log chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStreamKind {
    Stdout,
    Stderr,
}

/// One chunk of container output.
#[derive(Debug, Clone)]
pub struct LogChunk {
    pub stream: LogStreamKind,
    pub text: String,
}

/// Container state snapshot from `inspect`.
#[derive(Debug, Clone, Default)]
pub struct ContainerState {
    /// Raw runtime status: created, running, paused, restarting,
    /// removing, exited, dead.
    pub status: String,
    pub exit_code: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Daemon-level details for health reporting.
#[derive(Debug, Clone, Default)]
pub struct RuntimeInfo {
    pub server_version: String,
    pub containers_running: u64,
    pub images: u64,
}

pub type LogStream = BoxStream<'static, Result<LogChunk, ExecutionError>>;

/// The container operations the executor and backends rely on.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fail fast when the daemon is unreachable.
    async fn ping(&self) -> Result<(), ExecutionError>;

    /// Pull the image unless it is already present.
    async fn ensure_image(&self, image: &str) -> Result<(), ExecutionError>;

    /// Start a detached container; returns its id.
    async fn run(&self, spec: RunSpec) -> Result<String, ExecutionError>;

    /// Follow the container's combined output from the beginning.
    async fn stream_logs(&self, id: &str) -> Result<LogStream, ExecutionError>;

    /// Block until the container exits; returns the exit code.
    async fn wait(&self, id: &str) -> Result<i64, ExecutionError>;

    /// Collected (non-follow) logs.
    async fn logs(&self, id: &str, stdout: bool, stderr: bool, tail: Option<usize>)
        -> Result<String, ExecutionError>;

    /// SIGTERM, then SIGKILL after the grace period.
    async fn stop(&self, id: &str, grace_secs: u32) -> Result<(), ExecutionError>;

    /// Force-remove the container.
    async fn remove(&self, id: &str) -> Result<(), ExecutionError>;

    async fn inspect(&self, id: &str) -> Result<ContainerState, ExecutionError>;

    /// Ids of containers carrying `label=value`, including stopped ones.
    async fn find_by_label(&self, label: &str, value: &str) -> Result<Vec<String>, ExecutionError>;

    async fn info(&self) -> Result<RuntimeInfo, ExecutionError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
