// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object-store interface: best-effort mirror of job outputs.
//!
//! Upload failures raise to the executor, which logs a warning and
//! continues; they never change a job's status.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Remote mirror for job outputs.
pub trait ObjectStore: Send + Sync {
    /// Recursively upload a directory under `<job_id>/<prefix>/`.
    ///
    /// Returns the number of files uploaded.
    fn upload_dir(&self, job_id: &str, local_dir: &Path, prefix: &str)
        -> Result<usize, ObjectStoreError>;
}

/// Filesystem-backed mirror for tests and single-node deployments.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Where one object would land, for assertions.
    pub fn object_path(&self, job_id: &str, prefix: &str, rel: &Path) -> PathBuf {
        self.root.join(job_id).join(prefix).join(rel)
    }

    fn copy_tree(
        src: &Path,
        dest: &Path,
        count: &mut usize,
    ) -> Result<(), ObjectStoreError> {
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            let path = entry.path();
            let target = dest.join(entry.file_name());
            if path.is_dir() {
                Self::copy_tree(&path, &target, count)?;
            } else {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&path, &target)?;
                *count += 1;
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn upload_dir(
        &self,
        job_id: &str,
        local_dir: &Path,
        prefix: &str,
    ) -> Result<usize, ObjectStoreError> {
        if !local_dir.exists() {
            return Ok(0);
        }
        let dest = self.root.join(job_id).join(prefix);
        std::fs::create_dir_all(&dest)?;
        let mut count = 0;
        Self::copy_tree(local_dir, &dest, &mut count)?;
        tracing::debug!(job_id, prefix, files = count, "mirrored output directory");
        Ok(count)
    }
}

#[cfg(test)]
#[path = "object_store_tests.rs"]
mod tests;
