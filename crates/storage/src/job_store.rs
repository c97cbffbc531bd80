// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job rows: one per submission, atomic single-row updates.
//!
//! Required queries: by id, active jobs, and the deleted-excluding
//! listing sorted `submitted_at DESC` (a relational implementation
//! indexes `(status, submitted_at DESC)` for it). Soft-delete is a
//! flag, never a row removal.

use chrono::{DateTime, Utc};
use ni_core::{Job, JobStatus};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job {id} already exists")]
    Duplicate { id: String },

    #[error("illegal transition {from} -> {to} for job {id}")]
    IllegalTransition { id: String, from: JobStatus, to: JobStatus },

    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persisted job rows keyed by id.
///
/// Every mutation is a single atomic row update. Status changes are
/// guarded by the state machine, and `progress` never decreases:
/// a lower value commits the rest of the update but keeps the old
/// percentage.
pub trait JobStore: Send + Sync {
    /// Insert a fresh row. Fails on duplicate id.
    fn insert(&self, job: Job) -> Result<(), StoreError>;

    /// Fetch one row, including soft-deleted rows.
    fn get(&self, job_id: &str) -> Result<Job, StoreError>;

    /// Atomically update one row through a closure.
    ///
    /// Illegal status transitions roll the whole update back; progress
    /// decreases are clamped to the previous value.
    fn update(&self, job_id: &str, apply: &dyn Fn(&mut Job)) -> Result<Job, StoreError>;

    /// Rows with `deleted = false`, optionally filtered by status,
    /// sorted `submitted_at DESC`, capped at `limit`.
    fn list(&self, status_filter: Option<&[JobStatus]>, limit: usize)
        -> Result<Vec<Job>, StoreError>;

    /// Pending and running rows, `submitted_at DESC`.
    fn active(&self) -> Result<Vec<Job>, StoreError> {
        self.list(Some(&[JobStatus::Pending, JobStatus::Running]), usize::MAX)
    }

    /// Flag the row deleted. Returns false when already flagged.
    fn soft_delete(&self, job_id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let before = self.get(job_id)?;
        if before.deleted {
            return Ok(false);
        }
        self.update(job_id, &|job| job.soft_delete(now))?;
        Ok(true)
    }

    // -- transition conveniences used by the executor -------------------

    fn mark_running(&self, job_id: &str, now: DateTime<Utc>) -> Result<Job, StoreError> {
        self.update(job_id, &|job| {
            if job.status == JobStatus::Pending {
                job.mark_started(now);
            }
        })
    }

    fn mark_completed(&self, job_id: &str, exit_code: i64, now: DateTime<Utc>) -> Result<Job, StoreError> {
        self.update(job_id, &|job| job.mark_completed(exit_code, now))
    }

    fn mark_failed(
        &self,
        job_id: &str,
        error_message: &str,
        exit_code: i64,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        self.update(job_id, &|job| job.mark_failed(error_message, exit_code, now))
    }

    fn mark_cancelled(&self, job_id: &str, now: DateTime<Utc>) -> Result<Job, StoreError> {
        self.update(job_id, &|job| job.mark_cancelled(now))
    }

    fn set_backend_job_id(&self, job_id: &str, backend_job_id: &str) -> Result<Job, StoreError> {
        let backend_job_id = backend_job_id.to_string();
        self.update(job_id, &move |job| {
            job.backend_job_id = Some(backend_job_id.clone());
        })
    }

    /// Lightweight progress update; commits even when status is
    /// unchanged and never decreases.
    fn set_progress(&self, job_id: &str, progress: u8, phase: Option<&str>) -> Result<(), StoreError> {
        let phase = phase.map(|p| p.to_string());
        self.update(job_id, &move |job| {
            job.progress = job.progress.max(progress.min(100));
            if let Some(p) = &phase {
                job.current_phase = Some(p.clone());
            }
        })?;
        Ok(())
    }
}

fn guarded_update(
    rows: &mut HashMap<String, Job>,
    job_id: &str,
    apply: &dyn Fn(&mut Job),
) -> Result<Job, StoreError> {
    let job = rows
        .get_mut(job_id)
        .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

    let before_status = job.status;
    let before_progress = job.progress;

    let mut draft = job.clone();
    apply(&mut draft);

    if draft.status != before_status && !before_status.can_transition(draft.status) {
        return Err(StoreError::IllegalTransition {
            id: job_id.to_string(),
            from: before_status,
            to: draft.status,
        });
    }
    // Milestones may race; progress only moves forward.
    if draft.progress < before_progress {
        draft.progress = before_progress;
    }

    *job = draft.clone();
    Ok(draft)
}

fn filtered(
    rows: &HashMap<String, Job>,
    status_filter: Option<&[JobStatus]>,
    limit: usize,
) -> Vec<Job> {
    let mut jobs: Vec<Job> = rows
        .values()
        .filter(|j| !j.deleted)
        .filter(|j| match status_filter {
            Some(statuses) => statuses.contains(&j.status),
            None => true,
        })
        .cloned()
        .collect();
    jobs.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    jobs.truncate(limit);
    jobs
}

/// In-memory store for tests and embedded use.
#[derive(Default)]
pub struct MemoryJobStore {
    rows: RwLock<HashMap<String, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: Job) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&job.id) {
            return Err(StoreError::Duplicate { id: job.id });
        }
        rows.insert(job.id.clone(), job);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Job, StoreError> {
        self.rows
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    fn update(&self, job_id: &str, apply: &dyn Fn(&mut Job)) -> Result<Job, StoreError> {
        guarded_update(&mut self.rows.write(), job_id, apply)
    }

    fn list(
        &self,
        status_filter: Option<&[JobStatus]>,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError> {
        Ok(filtered(&self.rows.read(), status_filter, limit))
    }
}

/// JSON-snapshot store: the in-memory map persisted to one file on
/// every mutation. Snapshot writes go through a temp file + rename.
pub struct FileJobStore {
    path: PathBuf,
    rows: RwLock<HashMap<String, Job>>,
}

impl FileJobStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let rows = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_json::from_str(&text)?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            HashMap::new()
        };
        tracing::info!(path = %path.display(), jobs = rows.len(), "job store opened");
        Ok(Self { path, rows: RwLock::new(rows) })
    }

    fn persist(&self, rows: &HashMap<String, Job>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(rows)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl JobStore for FileJobStore {
    fn insert(&self, job: Job) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&job.id) {
            return Err(StoreError::Duplicate { id: job.id });
        }
        rows.insert(job.id.clone(), job);
        self.persist(&rows)
    }

    fn get(&self, job_id: &str) -> Result<Job, StoreError> {
        self.rows
            .read()
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    fn update(&self, job_id: &str, apply: &dyn Fn(&mut Job)) -> Result<Job, StoreError> {
        let mut rows = self.rows.write();
        let job = guarded_update(&mut rows, job_id, apply)?;
        self.persist(&rows)?;
        Ok(job)
    }

    fn list(
        &self,
        status_filter: Option<&[JobStatus]>,
        limit: usize,
    ) -> Result<Vec<Job>, StoreError> {
        Ok(filtered(&self.rows.read(), status_filter, limit))
    }
}

#[cfg(test)]
#[path = "job_store_tests.rs"]
mod tests;
