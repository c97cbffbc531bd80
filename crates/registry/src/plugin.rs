// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin definitions: single-tool execution units loaded from YAML.

use ni_core::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One declared input slot. `key` is the staged filename inside the
/// container's input directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub format: String,
}

/// Declared parameter type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    Int,
    Float,
    #[default]
    String,
    Bool,
    Choice,
}

/// One declared parameter with optional bounds and choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: ParameterType,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// A single-tool execution unit loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub version: String,
    pub domain: String,
    pub description: String,
    pub user_selectable: bool,
    pub ui_category: String,
    pub ui_label: String,
    pub container_image: String,
    pub container_digest: String,
    pub container_runtime: String,
    pub inputs_required: Vec<InputDef>,
    pub inputs_optional: Vec<InputDef>,
    pub parameters: Vec<ParameterDef>,
    pub resources: ResourceSpec,
    pub resource_profiles: HashMap<String, ResourceSpec>,
    pub outputs: Vec<serde_json::Value>,
    /// Effective command: stage template, execution template, or the
    /// legacy top-level `command`, whichever resolves first.
    pub command: String,
    /// Template from the execution block only (empty for legacy plugins).
    pub command_template: String,
    pub authors: Vec<String>,
    pub references: Vec<String>,
    /// Full document as canonical JSON, kept for content hashing.
    pub raw: serde_json::Value,
}

fn get_str(doc: &serde_json::Value, key: &str) -> String {
    doc.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

fn get_str_or(doc: &serde_json::Value, key: &str, fallback: &str) -> String {
    match doc.get(key).and_then(|v| v.as_str()) {
        Some(s) => s.to_string(),
        None => fallback.to_string(),
    }
}

fn get_list<T: serde::de::DeserializeOwned>(doc: &serde_json::Value, path: &[&str]) -> Vec<T> {
    let mut node = doc;
    for key in path {
        match node.get(key) {
            Some(next) => node = next,
            None => return Vec::new(),
        }
    }
    serde_json::from_value(node.clone()).unwrap_or_default()
}

fn resource_map(node: Option<&serde_json::Value>) -> HashMap<String, serde_json::Value> {
    node.and_then(|v| v.as_object())
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

impl Plugin {
    /// Build a plugin from a parsed YAML document (as canonical JSON).
    ///
    /// Missing fields fall back to defaults; the file stem supplies the
    /// id when the document has none.
    pub fn from_value(doc: serde_json::Value, fallback_id: &str) -> Self {
        let id = get_str_or(&doc, "id", fallback_id);
        let visibility = doc.get("visibility").cloned().unwrap_or_default();
        let container = doc.get("container").cloned().unwrap_or_default();

        // Command template lookup order:
        //   1. execution.stages[0].command_template
        //   2. execution.command_template
        //   3. top-level "command" (legacy fallback)
        let execution = doc.get("execution").cloned().unwrap_or_default();
        let mut command_template = execution
            .get("stages")
            .and_then(|s| s.as_array())
            .and_then(|stages| stages.first())
            .map(|stage| get_str(stage, "command_template"))
            .unwrap_or_default();
        if command_template.is_empty() {
            command_template = get_str(&execution, "command_template");
        }
        let top_level_command = get_str(&doc, "command");
        let command = if command_template.is_empty() {
            top_level_command
        } else {
            command_template.clone()
        };

        // resources: {default: {...}, profiles: {...}} or a flat map
        let resources_node = doc.get("resources");
        let default_node = resources_node.and_then(|r| r.get("default"));
        let resources =
            ResourceSpec::from_map(&resource_map(default_node.or(resources_node)));
        let resource_profiles = resources_node
            .and_then(|r| r.get("profiles"))
            .and_then(|p| p.as_object())
            .map(|profiles| {
                profiles
                    .iter()
                    .map(|(name, spec)| {
                        (name.clone(), ResourceSpec::from_map(&resource_map(Some(spec))))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: get_str_or(&doc, "name", &id),
            version: get_str_or(&doc, "version", "1.0.0"),
            domain: get_str(&doc, "domain"),
            description: get_str(&doc, "description"),
            user_selectable: visibility
                .get("user_selectable")
                .and_then(|v| v.as_bool())
                .unwrap_or(true),
            ui_category: get_str_or(&visibility, "ui_category", "primary"),
            ui_label: get_str(&visibility, "ui_label"),
            container_image: get_str(&container, "image"),
            container_digest: get_str(&container, "digest"),
            container_runtime: get_str_or(&container, "runtime", "docker"),
            inputs_required: get_list(&doc, &["inputs", "required"]),
            inputs_optional: get_list(&doc, &["inputs", "optional"]),
            parameters: get_list(&doc, &["parameters"]),
            resources,
            resource_profiles,
            outputs: get_list(&doc, &["outputs"]),
            command,
            command_template,
            authors: get_list(&doc, &["authors"]),
            references: get_list(&doc, &["references"]),
            raw: doc,
            id,
        }
    }

    /// The command template to execute, considering the legacy fallback.
    pub fn effective_command(&self) -> &str {
        if self.command_template.is_empty() {
            &self.command
        } else {
            &self.command_template
        }
    }

    /// Declared parameter defaults keyed by name.
    pub fn default_parameters(&self) -> HashMap<String, serde_json::Value> {
        self.parameters
            .iter()
            .filter(|p| !p.name.is_empty())
            .filter_map(|p| p.default.clone().map(|d| (p.name.clone(), d)))
            .collect()
    }

    /// Expected staged filenames for required inputs, in order.
    pub fn expected_input_keys(&self) -> Vec<&str> {
        self.inputs_required
            .iter()
            .filter(|i| !i.key.is_empty())
            .map(|i| i.key.as_str())
            .collect()
    }

    /// Serialise for API responses.
    pub fn to_api(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "version": self.version,
            "type": "plugin",
            "domain": self.domain,
            "description": self.description,
            "user_selectable": self.user_selectable,
            "ui_category": self.ui_category,
            "ui_label": self.ui_label,
            "container_image": self.container_image,
            "container_digest": self.container_digest,
            "inputs": {
                "required": self.inputs_required,
                "optional": self.inputs_optional,
            },
            "parameters": self.parameters,
            "resources": self.resources,
            "resource_profiles": self.resource_profiles,
            "outputs": self.outputs,
            "authors": self.authors,
            "references": self.references,
        })
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
