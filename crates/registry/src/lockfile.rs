// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry lockfiles: reproducibility snapshots with drift detection.
//!
//! A lockfile pins every plugin and workflow to its version and a
//! content hash of the canonicalised source document. Verifying a
//! lockfile against the live registry reports three mismatch kinds:
//! `missing`, `version_changed`, `content_changed`.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Hash of a canonicalised document: keys sorted, SHA-256, first 16 hex
/// characters.
///
/// `serde_json` maps are ordered, so serialising the JSON value yields
/// the same string regardless of the key order in the source YAML.
pub fn content_hash(raw: &serde_json::Value) -> String {
    let canonical = raw.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(16);
    hash
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPlugin {
    pub version: String,
    pub container_image: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedWorkflow {
    pub version: String,
    pub step_plugins: Vec<String>,
    pub content_hash: String,
}

/// Snapshot of the registry at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    /// RFC 3339 UTC generation timestamp.
    pub generated_at: String,
    pub plugins: BTreeMap<String, LockedPlugin>,
    pub workflows: BTreeMap<String, LockedWorkflow>,
}

impl Lockfile {
    pub fn new(
        plugins: BTreeMap<String, LockedPlugin>,
        workflows: BTreeMap<String, LockedWorkflow>,
    ) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            plugins,
            workflows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    Ok,
    Mismatch,
}

ni_core::simple_display! {
    VerifyStatus {
        Ok => "ok",
        Mismatch => "mismatch",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchIssue {
    Missing,
    VersionChanged,
    ContentChanged,
}

ni_core::simple_display! {
    MismatchIssue {
        Missing => "missing",
        VersionChanged => "version_changed",
        ContentChanged => "content_changed",
    }
}

/// One lockfile entry that no longer matches the live registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub id: String,
    pub issue: MismatchIssue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl Mismatch {
    pub fn missing(id: impl Into<String>) -> Self {
        Self { id: id.into(), issue: MismatchIssue::Missing, expected: None, actual: None }
    }

    pub fn version_changed(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            issue: MismatchIssue::VersionChanged,
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }

    pub fn content_changed(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            issue: MismatchIssue::ContentChanged,
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }
}

/// Outcome of verifying a lockfile against the live registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub status: VerifyStatus,
    pub plugins: Vec<Mismatch>,
    pub workflows: Vec<Mismatch>,
}

impl VerifyReport {
    pub fn ok() -> Self {
        Self { status: VerifyStatus::Ok, plugins: Vec::new(), workflows: Vec::new() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == VerifyStatus::Ok
    }

    pub fn push_plugin(&mut self, mismatch: Mismatch) {
        self.status = VerifyStatus::Mismatch;
        self.plugins.push(mismatch);
    }

    pub fn push_workflow(&mut self, mismatch: Mismatch) {
        self.status = VerifyStatus::Mismatch;
        self.workflows.push(mismatch);
    }
}

#[cfg(test)]
#[path = "lockfile_tests.rs"]
mod tests;
