// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error kinds shared by the execution backends and the job executor.

use thiserror::Error;

/// Errors surfaced by execution backends and the job executor.
///
/// The split between [`ExecutionError::Validation`] and
/// [`ExecutionError::Transient`] drives the retry policy: validation
/// failures move the job straight to `failed`, transient failures are
/// retried with backoff.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Bad submission: unknown plugin, missing input, disallowed image,
    /// empty command template. Never retried.
    #[error("{0}")]
    Validation(String),

    /// The requested job does not exist.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The backend cannot be reached (Docker daemon offline, SSH down).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Submission was attempted and failed.
    #[error("submission failed: {0}")]
    SubmitFailed(String),

    /// Transient failure worth retrying (pull timeout, OOM kill).
    #[error("{0}")]
    Transient(String),

    /// Job store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Filesystem failure while preparing or capturing job data.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Whether the executor should schedule another attempt for this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::Transient(_) | ExecutionError::BackendUnavailable(_)
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
