// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API error kinds and their HTTP status mapping.
//!
//! Conventions: 404 for missing entities, 400 for malformed inputs and
//! path traversal, 503 for a missing SSH connection, 500 for
//! unexpected backend errors. Cancelling an already-terminal job is a
//! 400.

use ni_core::ExecutionError;
use ni_results::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    /// The HTTP status the plumbing should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::NotFound(_) => 404,
            ServerError::BadRequest(_) => 400,
            ServerError::Unavailable(_) => 503,
            ServerError::Internal(_) => 500,
        }
    }

    /// Response body shape: `{"detail": ...}`.
    pub fn detail(&self) -> serde_json::Value {
        serde_json::json!({ "detail": self.to_string() })
    }
}

impl From<ExecutionError> for ServerError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::NotFound(id) => ServerError::NotFound(format!("Job {id} not found")),
            ExecutionError::Validation(message) => ServerError::BadRequest(message),
            ExecutionError::BackendUnavailable(message) => ServerError::Unavailable(message),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl From<ProjectionError> for ServerError {
    fn from(e: ProjectionError) -> Self {
        match e {
            ProjectionError::NoResults(_) | ProjectionError::FileNotFound(_) => {
                ServerError::NotFound(e.to_string())
            }
            ProjectionError::PathTraversal | ProjectionError::NotAFile(_) => {
                ServerError::BadRequest(e.to_string())
            }
            ProjectionError::Io(inner) => ServerError::Internal(inner.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
