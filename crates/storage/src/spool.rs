// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable task spool: at-most-once submission, at-least-once execution.
//!
//! Tasks are JSON files under `<dir>/pending/`; a worker claims a task
//! by renaming it into `<dir>/claimed/` and acks it (file removed) only
//! after the run finishes. A crashed worker leaves the file behind and
//! `open()` requeues it on the next start. One active task per job is
//! enforced at enqueue time, which keeps row writes for a job totally
//! ordered by the single worker that owns its task.

use chrono::{DateTime, Utc};
use ni_core::JobSpec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("job {0} already has a queued or claimed task")]
    AlreadyQueued(String),

    #[error("spool io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spool serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// The work a task carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    RunPlugin,
    RunWorkflow,
}

ni_core::simple_display! {
    TaskKind {
        RunPlugin => "run_plugin",
        RunWorkflow => "run_workflow",
    }
}

/// One durable unit of work: drive a single job to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub job_id: String,
    pub kind: TaskKind,
    pub spec: JobSpec,
    /// Redelivery counter, bumped each time the task is requeued after
    /// a worker loss.
    #[serde(default)]
    pub delivery: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(job_id: impl Into<String>, kind: TaskKind, spec: JobSpec) -> Self {
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            kind,
            spec,
            delivery: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// Filesystem-backed task queue with acks-late semantics.
pub struct TaskSpool {
    pending: PathBuf,
    claimed: PathBuf,
    // Serialises enqueue/claim so two workers never claim one file.
    lock: Mutex<()>,
}

fn read_task(path: &Path) -> Result<Task, SpoolError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, SpoolError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

impl TaskSpool {
    /// Open the spool, requeueing tasks a dead worker left claimed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SpoolError> {
        let dir = dir.into();
        let pending = dir.join("pending");
        let claimed = dir.join("claimed");
        std::fs::create_dir_all(&pending)?;
        std::fs::create_dir_all(&claimed)?;

        let spool = Self { pending, claimed, lock: Mutex::new(()) };

        // Redelivery: whatever is still claimed belonged to a worker
        // that never acked.
        let orphans = sorted_files(&spool.claimed)?;
        for path in orphans {
            let mut task = match read_task(&path) {
                Ok(task) => task,
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "dropping unreadable claimed task");
                    std::fs::remove_file(&path)?;
                    continue;
                }
            };
            task.delivery += 1;
            let target = spool.pending.join(path.file_name().unwrap_or_default());
            std::fs::write(&target, serde_json::to_vec_pretty(&task)?)?;
            std::fs::remove_file(&path)?;
            tracing::warn!(
                job_id = %task.job_id,
                delivery = task.delivery,
                "requeued task from lost worker"
            );
        }

        Ok(spool)
    }

    fn file_name(task: &Task) -> String {
        format!("{}_{}.json", task.enqueued_at.timestamp_millis(), task.task_id)
    }

    fn job_has_task(&self, job_id: &str) -> Result<bool, SpoolError> {
        for dir in [&self.pending, &self.claimed] {
            for path in sorted_files(dir)? {
                if let Ok(task) = read_task(&path) {
                    if task.job_id == job_id {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Persist a task. Rejects a second task for the same job.
    pub fn enqueue(&self, task: &Task) -> Result<(), SpoolError> {
        let _guard = self.lock.lock();
        if self.job_has_task(&task.job_id)? {
            return Err(SpoolError::AlreadyQueued(task.job_id.clone()));
        }
        let path = self.pending.join(Self::file_name(task));
        std::fs::write(&path, serde_json::to_vec_pretty(task)?)?;
        tracing::debug!(job_id = %task.job_id, kind = %task.kind, "task enqueued");
        Ok(())
    }

    /// Claim the oldest pending task, moving it to `claimed/`.
    pub fn claim(&self) -> Result<Option<Task>, SpoolError> {
        let _guard = self.lock.lock();
        for path in sorted_files(&self.pending)? {
            let task = match read_task(&path) {
                Ok(task) => task,
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "dropping unreadable task");
                    std::fs::remove_file(&path)?;
                    continue;
                }
            };
            let target = self.claimed.join(path.file_name().unwrap_or_default());
            std::fs::rename(&path, &target)?;
            return Ok(Some(task));
        }
        Ok(None)
    }

    /// Acknowledge a finished task; its claim file is removed.
    pub fn ack(&self, task: &Task) -> Result<(), SpoolError> {
        let _guard = self.lock.lock();
        let path = self.claimed.join(Self::file_name(task));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Remove a job's queued task before any worker picks it up.
    ///
    /// Returns true when a pending entry was revoked. A claimed task is
    /// not touched; its worker observes the cancelled row and aborts.
    pub fn revoke(&self, job_id: &str) -> Result<bool, SpoolError> {
        let _guard = self.lock.lock();
        for path in sorted_files(&self.pending)? {
            if let Ok(task) = read_task(&path) {
                if task.job_id == job_id {
                    std::fs::remove_file(&path)?;
                    tracing::info!(job_id, "queued task revoked");
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    pub fn pending_count(&self) -> usize {
        sorted_files(&self.pending).map(|f| f.len()).unwrap_or(0)
    }

    pub fn claimed_count(&self) -> usize {
        sorted_files(&self.claimed).map(|f| f.len()).unwrap_or(0)
    }
}

#[cfg(test)]
#[path = "spool_tests.rs"]
mod tests;
