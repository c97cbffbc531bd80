// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit sink: structured JSON lines, one file per day.
//!
//! Records security-relevant events (job submission and terminal
//! transitions, backend switches, SSH connect/disconnect/idle-timeout,
//! results export, registry reloads). Write failures are logged and
//! swallowed; auditing never takes the service down.

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Debug, Serialize)]
struct Entry<'a> {
    timestamp: String,
    event: &'a str,
    severity: &'a str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    details: serde_json::Value,
}

/// Thread-safe JSONL audit logger with daily files and size rotation.
pub struct AuditLog {
    dir: PathBuf,
    max_file_size: u64,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_file_size: DEFAULT_MAX_FILE_SIZE, lock: Mutex::new(()) })
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn current_path(&self) -> PathBuf {
        let today = Utc::now().format("%Y-%m-%d");
        self.dir.join(format!("audit-{today}.jsonl"))
    }

    fn rotate_if_needed(&self, path: &Path) {
        let Ok(meta) = std::fs::metadata(path) else { return };
        if meta.len() <= self.max_file_size {
            return;
        }
        let ts = Utc::now().format("%H%M%S");
        let rotated = path.with_extension(format!("{ts}.jsonl"));
        if let Err(e) = std::fs::rename(path, &rotated) {
            tracing::error!(error = %e, "failed to rotate audit log");
        }
    }

    /// Append one event at `info` severity.
    pub fn record(&self, event: &str, details: serde_json::Value) {
        self.record_with_severity(event, "info", details);
    }

    /// Append one event with explicit severity.
    pub fn record_with_severity(&self, event: &str, severity: &str, details: serde_json::Value) {
        let entry = Entry {
            timestamp: Utc::now().to_rfc3339(),
            event,
            severity,
            details,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, event, "failed to serialise audit entry");
                return;
            }
        };

        let _guard = self.lock.lock();
        let path = self.current_path();
        self.rotate_if_needed(&path);
        use std::io::Write;
        let appended = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = appended {
            tracing::error!(error = %e, event, "failed to write audit log");
        }
    }

    /// Read the most recent entries (newest last), optionally filtered
    /// by event name.
    pub fn recent(&self, limit: usize, event_filter: Option<&str>) -> Vec<serde_json::Value> {
        let _guard = self.lock.lock();
        let path = self.current_path();
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        let entries: Vec<serde_json::Value> = text
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .filter(|entry: &serde_json::Value| match event_filter {
                Some(wanted) => entry.get("event").and_then(|e| e.as_str()) == Some(wanted),
                None => true,
            })
            .collect();
        let skip = entries.len().saturating_sub(limit);
        entries.into_iter().skip(skip).collect()
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
