// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definitions: curated, strictly linear sequences of plugins.

use crate::plugin::{InputDef, Plugin};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single step in a workflow, referencing a plugin by id.
///
/// `depends_on` is informational; execution follows `steps` order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uses: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A curated sequence of plugin steps loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub version: String,
    pub domain: String,
    pub description: String,
    pub inputs_required: Vec<InputDef>,
    pub inputs_optional: Vec<InputDef>,
    pub steps: Vec<WorkflowStep>,
    pub outputs: Vec<serde_json::Value>,
    pub authors: Vec<String>,
    pub references: Vec<String>,
    /// Full document as canonical JSON, kept for content hashing.
    pub raw: serde_json::Value,
}

impl Workflow {
    /// Build a workflow from a parsed YAML document (as canonical JSON).
    pub fn from_value(doc: serde_json::Value, fallback_id: &str) -> Self {
        let get = |key: &str| -> String {
            doc.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
        };
        let id = match doc.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => fallback_id.to_string(),
        };
        let name = match doc.get("name").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => id.clone(),
        };
        let version = match doc.get("version").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => "1.0.0".to_string(),
        };
        let list = |node: Option<&serde_json::Value>| -> Vec<serde_json::Value> {
            node.and_then(|v| v.as_array()).cloned().unwrap_or_default()
        };

        let steps = doc
            .get("steps")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.is_object())
                    .map(|e| serde_json::from_value(e.clone()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default();

        let inputs = doc.get("inputs");
        let input_list = |key: &str| -> Vec<InputDef> {
            inputs
                .and_then(|i| i.get(key))
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default()
        };

        Self {
            name,
            version,
            domain: get("domain"),
            description: get("description"),
            inputs_required: input_list("required"),
            inputs_optional: input_list("optional"),
            steps,
            outputs: list(doc.get("outputs")),
            authors: doc
                .get("authors")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            references: doc
                .get("references")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default(),
            raw: doc,
            id,
        }
    }

    /// Flat ordered list of plugin ids referenced by steps.
    pub fn step_plugin_ids(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| !s.uses.is_empty())
            .map(|s| s.uses.clone())
            .collect()
    }

    /// Serialise for API responses, enriching steps with plugin metadata.
    pub fn to_api(&self, plugins: &HashMap<String, Plugin>) -> serde_json::Value {
        let steps: Vec<serde_json::Value> = self
            .steps
            .iter()
            .map(|step| {
                let mut value = serde_json::json!({
                    "id": step.id,
                    "uses": step.uses,
                    "label": step.label,
                    "inputs": step.inputs,
                    "parameters": step.parameters,
                    "depends_on": step.depends_on,
                });
                if let Some(plugin) = plugins.get(&step.uses) {
                    value["plugin_name"] = serde_json::json!(plugin.name);
                    value["plugin_description"] = serde_json::json!(plugin.description);
                }
                value
            })
            .collect();

        serde_json::json!({
            "id": self.id,
            "name": self.name,
            "version": self.version,
            "type": "workflow",
            "domain": self.domain,
            "description": self.description,
            "inputs": {
                "required": self.inputs_required,
                "optional": self.inputs_optional,
            },
            "steps": steps,
            "plugin_ids": self.step_plugin_ids(),
            "outputs": self.outputs,
            "authors": self.authors,
            "references": self.references,
        })
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
