// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry loading, snapshots, and atomic reload.
//!
//! Every `*.yaml|*.yml` file in the plugins and workflows directories
//! is a single document whose `type` field selects the deserialiser.
//! Malformed files are logged and skipped; they never prevent startup.
//! Readers take an `Arc` snapshot, so a concurrent `reload()` is
//! observed either fully-old or fully-new.

use crate::lockfile::{content_hash, LockedPlugin, LockedWorkflow, Lockfile, Mismatch, VerifyReport};
use crate::plugin::Plugin;
use crate::workflow::Workflow;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),
}

/// Immutable view of the loaded registry.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub plugins: HashMap<String, Plugin>,
    pub workflows: HashMap<String, Workflow>,
}

/// Registry that loads and manages plugins and workflows.
pub struct Registry {
    plugins_dir: PathBuf,
    workflows_dir: PathBuf,
    snapshot: RwLock<Arc<Snapshot>>,
}

/// Convert a YAML value to JSON, stringifying non-string mapping keys.
fn yaml_to_json(value: serde_yaml::Value) -> serde_json::Value {
    match value {
        serde_yaml::Value::Null => serde_json::Value::Null,
        serde_yaml::Value::Bool(b) => serde_json::Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                serde_json::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                serde_json::Value::from(u)
            } else {
                serde_json::Value::from(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_yaml::Value::String(s) => serde_json::Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            serde_json::Value::Array(seq.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut object = serde_json::Map::new();
            for (key, val) in map {
                let key = match key {
                    serde_yaml::Value::String(s) => s,
                    other => yaml_to_json(other).to_string(),
                };
                object.insert(key, yaml_to_json(val));
            }
            serde_json::Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

/// Load every YAML document of the wanted `type` from a directory.
///
/// Returns `(file_stem, document)` pairs. Unreadable or malformed files
/// are logged and skipped.
fn load_documents(dir: &Path, want_type: &str) -> Vec<(String, serde_json::Value)> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "registry directory not found");
        return Vec::new();
    }

    let mut paths: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect(),
        Err(e) => {
            tracing::error!(dir = %dir.display(), error = %e, "cannot read registry directory");
            return Vec::new();
        }
    };
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "failed to read document");
                continue;
            }
        };
        let parsed: serde_yaml::Value = match serde_yaml::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "failed to parse document");
                continue;
            }
        };
        let doc = yaml_to_json(parsed);
        if !doc.is_object() {
            continue;
        }
        if doc.get("type").and_then(|t| t.as_str()) != Some(want_type) {
            continue;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        documents.push((stem, doc));
    }
    documents
}

impl Registry {
    /// Load the registry from the given directories.
    ///
    /// Never fails: load problems are logged per file.
    pub fn load(plugins_dir: impl Into<PathBuf>, workflows_dir: impl Into<PathBuf>) -> Self {
        let registry = Self {
            plugins_dir: plugins_dir.into(),
            workflows_dir: workflows_dir.into(),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        };
        registry.reload();
        registry
    }

    fn build_snapshot(&self) -> Snapshot {
        let mut plugins = HashMap::new();
        for (stem, doc) in load_documents(&self.plugins_dir, "plugin") {
            let plugin = Plugin::from_value(doc, &stem);
            tracing::debug!(plugin = %plugin.id, "loaded plugin");
            plugins.insert(plugin.id.clone(), plugin);
        }

        let mut workflows = HashMap::new();
        for (stem, doc) in load_documents(&self.workflows_dir, "workflow") {
            let workflow = Workflow::from_value(doc, &stem);
            tracing::debug!(workflow = %workflow.id, "loaded workflow");
            workflows.insert(workflow.id.clone(), workflow);
        }

        // Validate step references; unresolved refs are reported but
        // do not abort the load.
        for workflow in workflows.values() {
            for step in &workflow.steps {
                if !step.uses.is_empty() && !plugins.contains_key(&step.uses) {
                    tracing::warn!(
                        workflow = %workflow.id,
                        step = %step.id,
                        plugin = %step.uses,
                        "workflow step references unknown plugin"
                    );
                }
            }
        }

        tracing::info!(
            plugins = plugins.len(),
            workflows = workflows.len(),
            "registry loaded"
        );
        Snapshot { plugins, workflows }
    }

    /// Reload all plugins and workflows from disk, swapping the
    /// snapshot atomically.
    pub fn reload(&self) {
        let fresh = Arc::new(self.build_snapshot());
        *self.snapshot.write() = fresh;
    }

    /// Current registry snapshot. Cheap to clone, stable for the
    /// caller's lifetime.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().clone()
    }

    pub fn get_plugin(&self, plugin_id: &str) -> Option<Plugin> {
        self.snapshot().plugins.get(plugin_id).cloned()
    }

    pub fn list_plugins(&self, user_selectable_only: bool) -> Vec<Plugin> {
        let snapshot = self.snapshot();
        let mut plugins: Vec<Plugin> = snapshot
            .plugins
            .values()
            .filter(|p| !user_selectable_only || p.user_selectable)
            .cloned()
            .collect();
        plugins.sort_by(|a, b| a.id.cmp(&b.id));
        plugins
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().plugins.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Option<Workflow> {
        self.snapshot().workflows.get(workflow_id).cloned()
    }

    pub fn list_workflows(&self) -> Vec<Workflow> {
        let snapshot = self.snapshot();
        let mut workflows: Vec<Workflow> = snapshot.workflows.values().cloned().collect();
        workflows.sort_by(|a, b| a.id.cmp(&b.id));
        workflows
    }

    pub fn workflow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().workflows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Mapping of plugin id → version for all loaded plugins.
    pub fn plugin_versions(&self) -> BTreeMap<String, String> {
        self.snapshot()
            .plugins
            .iter()
            .map(|(id, p)| (id.clone(), p.version.clone()))
            .collect()
    }

    /// Mapping of workflow id → version for all loaded workflows.
    pub fn workflow_versions(&self) -> BTreeMap<String, String> {
        self.snapshot()
            .workflows
            .iter()
            .map(|(id, w)| (id.clone(), w.version.clone()))
            .collect()
    }

    /// Generate a lockfile capturing all current versions and content
    /// hashes.
    pub fn generate_lockfile(&self) -> Lockfile {
        let snapshot = self.snapshot();

        let plugins = snapshot
            .plugins
            .iter()
            .map(|(id, plugin)| {
                (
                    id.clone(),
                    LockedPlugin {
                        version: plugin.version.clone(),
                        container_image: plugin.container_image.clone(),
                        content_hash: content_hash(&plugin.raw),
                    },
                )
            })
            .collect();

        let workflows = snapshot
            .workflows
            .iter()
            .map(|(id, workflow)| {
                (
                    id.clone(),
                    LockedWorkflow {
                        version: workflow.version.clone(),
                        step_plugins: workflow.step_plugin_ids(),
                        content_hash: content_hash(&workflow.raw),
                    },
                )
            })
            .collect();

        Lockfile::new(plugins, workflows)
    }

    /// Verify the live registry against a lockfile.
    pub fn verify_lockfile(&self, lockfile: &Lockfile) -> VerifyReport {
        let snapshot = self.snapshot();
        let mut report = VerifyReport::ok();

        for (id, locked) in &lockfile.plugins {
            match snapshot.plugins.get(id) {
                None => report.push_plugin(Mismatch::missing(id)),
                Some(plugin) if plugin.version != locked.version => {
                    report.push_plugin(Mismatch::version_changed(
                        id,
                        &locked.version,
                        &plugin.version,
                    ));
                }
                Some(plugin) => {
                    let actual = content_hash(&plugin.raw);
                    if actual != locked.content_hash {
                        report.push_plugin(Mismatch::content_changed(
                            id,
                            &locked.content_hash,
                            actual,
                        ));
                    }
                }
            }
        }

        for (id, locked) in &lockfile.workflows {
            match snapshot.workflows.get(id) {
                None => report.push_workflow(Mismatch::missing(id)),
                Some(workflow) if workflow.version != locked.version => {
                    report.push_workflow(Mismatch::version_changed(
                        id,
                        &locked.version,
                        &workflow.version,
                    ));
                }
                Some(workflow) => {
                    let actual = content_hash(&workflow.raw);
                    if actual != locked.content_hash {
                        report.push_workflow(Mismatch::content_changed(
                            id,
                            &locked.content_hash,
                            actual,
                        ));
                    }
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "Registry({} plugins, {} workflows)",
            snapshot.plugins.len(),
            snapshot.workflows.len()
        )
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
