// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted container runtime for tests.
//!
//! Each image is given a [`Script`]: the log chunks the "container"
//! prints and the exit code it finishes with. Containers marked
//! `hold_until_stopped` stay running until [`ContainerRuntime::stop`]
//! is called, which is how cancellation paths are exercised.

use super::{
    ContainerRuntime, ContainerState, LogChunk, LogStream, LogStreamKind, RunSpec, RuntimeInfo,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use ni_core::ExecutionError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

/// What a fake container does when launched.
#[derive(Debug, Clone)]
pub struct Script {
    pub chunks: Vec<String>,
    pub exit_code: i64,
    /// Keep the container "running" after its chunks until `stop`.
    pub hold_until_stopped: bool,
    /// Directories created on the host when the container "exits",
    /// simulating pipeline outputs.
    pub create_dirs: Vec<std::path::PathBuf>,
}

impl Script {
    pub fn succeeding(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            exit_code: 0,
            hold_until_stopped: false,
            create_dirs: Vec::new(),
        }
    }

    pub fn failing(chunks: &[&str], exit_code: i64) -> Self {
        Self { exit_code, ..Self::succeeding(chunks) }
    }

    pub fn hanging(chunks: &[&str]) -> Self {
        Self { exit_code: 137, hold_until_stopped: true, ..Self::succeeding(chunks) }
    }

    /// Create `dir` on exit, like a pipeline writing its output tree.
    pub fn creating(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.create_dirs.push(dir.into());
        self
    }
}

struct FakeContainer {
    spec: RunSpec,
    script: Script,
    stopped: bool,
    removed: bool,
    stop_signal: Arc<Notify>,
}

#[derive(Default)]
struct FakeState {
    scripts: HashMap<String, Script>,
    /// Scripts consumed in order per image, overriding `scripts`.
    queued_scripts: HashMap<String, Vec<Script>>,
    containers: HashMap<String, FakeContainer>,
    counter: u64,
    missing_images: Vec<String>,
    unavailable: bool,
}

/// In-memory [`ContainerRuntime`] with scripted containers.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script every container launched from `image`.
    pub fn script_image(&self, image: &str, script: Script) {
        self.state.lock().scripts.insert(image.to_string(), script);
    }

    /// Queue scripts consumed one per launch of `image` (for
    /// workflows whose steps share an image).
    pub fn queue_script(&self, image: &str, script: Script) {
        self.state
            .lock()
            .queued_scripts
            .entry(image.to_string())
            .or_default()
            .push(script);
    }

    /// Simulate a daemon outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Pretend `image` is not pullable.
    pub fn set_image_missing(&self, image: &str) {
        self.state.lock().missing_images.push(image.to_string());
    }

    /// Specs of every launched container, in launch order.
    pub fn launched(&self) -> Vec<RunSpec> {
        let state = self.state.lock();
        let mut ids: Vec<&String> = state.containers.keys().collect();
        ids.sort();
        ids.iter().map(|id| state.containers[*id].spec.clone()).collect()
    }

    /// The single launched container id, for single-run tests.
    pub fn only_container_id(&self) -> Option<String> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state.containers.keys().cloned().collect();
        ids.sort();
        ids.into_iter().next()
    }

    fn check_available(&self) -> Result<(), ExecutionError> {
        if self.state.lock().unavailable {
            return Err(ExecutionError::BackendUnavailable("Docker is not available: fake outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), ExecutionError> {
        self.check_available()
    }

    async fn ensure_image(&self, image: &str) -> Result<(), ExecutionError> {
        self.check_available()?;
        if self.state.lock().missing_images.iter().any(|m| m == image) {
            return Err(ExecutionError::Transient(format!("image pull: {image} timed out")));
        }
        Ok(())
    }

    async fn run(&self, spec: RunSpec) -> Result<String, ExecutionError> {
        self.check_available()?;
        let mut state = self.state.lock();
        state.counter += 1;
        let id = format!("fake{:08}", state.counter);

        let script = match state
            .queued_scripts
            .get_mut(&spec.image)
            .filter(|q| !q.is_empty())
        {
            Some(queue) => queue.remove(0),
            None => state
                .scripts
                .get(&spec.image)
                .cloned()
                .unwrap_or_else(|| Script::succeeding(&[])),
        };

        state.containers.insert(
            id.clone(),
            FakeContainer {
                spec,
                script,
                stopped: false,
                removed: false,
                stop_signal: Arc::new(Notify::new()),
            },
        );
        Ok(id)
    }

    async fn stream_logs(&self, id: &str) -> Result<LogStream, ExecutionError> {
        let (chunks, hold, signal) = {
            let state = self.state.lock();
            let container = state
                .containers
                .get(id)
                .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
            (
                container.script.chunks.clone(),
                container.script.hold_until_stopped && !container.stopped,
                Arc::clone(&container.stop_signal),
            )
        };

        let chunk_stream = futures_util::stream::iter(chunks.into_iter().map(|text| {
            Ok(LogChunk { stream: LogStreamKind::Stdout, text })
        }));

        if !hold {
            return Ok(chunk_stream.boxed());
        }

        // Keep the stream open until stop() fires, like `logs --follow`
        // on a live container.
        let tail = futures_util::stream::once(async move {
            signal.notified().await;
            Ok(LogChunk { stream: LogStreamKind::Stdout, text: String::new() })
        });
        Ok(chunk_stream.chain(tail).boxed())
    }

    async fn wait(&self, id: &str) -> Result<i64, ExecutionError> {
        let (hold, signal) = {
            let state = self.state.lock();
            let container = state
                .containers
                .get(id)
                .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
            (
                container.script.hold_until_stopped && !container.stopped,
                Arc::clone(&container.stop_signal),
            )
        };
        if hold {
            signal.notified().await;
        }
        let state = self.state.lock();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
        for dir in &container.script.create_dirs {
            let _ = std::fs::create_dir_all(dir);
        }
        Ok(container.script.exit_code)
    }

    async fn logs(
        &self,
        id: &str,
        _stdout: bool,
        _stderr: bool,
        _tail: Option<usize>,
    ) -> Result<String, ExecutionError> {
        let state = self.state.lock();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
        Ok(container.script.chunks.concat())
    }

    async fn stop(&self, id: &str, _grace_secs: u32) -> Result<(), ExecutionError> {
        let mut state = self.state.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
        container.stopped = true;
        container.stop_signal.notify_waiters();
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), ExecutionError> {
        let mut state = self.state.lock();
        let container = state
            .containers
            .get_mut(id)
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
        container.removed = true;
        Ok(())
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, ExecutionError> {
        let state = self.state.lock();
        let container = state
            .containers
            .get(id)
            .ok_or_else(|| ExecutionError::NotFound(id.to_string()))?;
        let running = container.script.hold_until_stopped && !container.stopped;
        Ok(ContainerState {
            status: if running { "running" } else { "exited" }.to_string(),
            exit_code: if running { None } else { Some(container.script.exit_code) },
            started_at: None,
            finished_at: None,
            error: None,
        })
    }

    async fn find_by_label(&self, label: &str, value: &str) -> Result<Vec<String>, ExecutionError> {
        let state = self.state.lock();
        let mut ids: Vec<String> = state
            .containers
            .iter()
            .filter(|(_, c)| {
                !c.removed
                    && c.spec
                        .labels
                        .iter()
                        .any(|(k, v)| k == label && v == value)
            })
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn info(&self) -> Result<RuntimeInfo, ExecutionError> {
        self.check_available()?;
        let state = self.state.lock();
        let running = state
            .containers
            .values()
            .filter(|c| c.script.hold_until_stopped && !c.stopped)
            .count() as u64;
        Ok(RuntimeInfo {
            server_version: "fake-24.0".to_string(),
            containers_running: running,
            images: state.scripts.len() as u64,
        })
    }
}
