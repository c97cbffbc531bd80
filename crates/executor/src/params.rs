// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parameter resolution: user values, plugin defaults, resource-derived
//! variables, and the `input_file` autofill.

use ni_core::JobSpec;
use ni_registry::template::param_to_string;
use ni_registry::Plugin;
use std::collections::HashMap;

/// Merge user-provided parameters with plugin defaults and inject the
/// resource-derived variables command templates rely on
/// (`{threads}`, `{mem_gb}`, `{omp_nthreads}`, ...).
pub fn resolve_parameters(
    spec: &JobSpec,
    plugin: Option<&Plugin>,
) -> HashMap<String, serde_json::Value> {
    let mut resolved = spec.parameters.clone();

    // Plugin YAML defaults fill anything the user left unset.
    if let Some(plugin) = plugin {
        for (name, default) in plugin.default_parameters() {
            resolved.entry(name).or_insert(default);
        }
    }

    // Auto-set the primary input path.
    if let Some(first) = spec.input_files.first() {
        resolved
            .entry("input_file".to_string())
            .or_insert_with(|| serde_json::json!(first));
    }

    let cpus = spec.resources.cpus;
    let mem_gb = spec.resources.memory_gb;
    let resource_vars: [(&str, String); 6] = [
        ("threads", cpus.to_string()),
        ("nthreads", cpus.to_string()),
        // One core stays reserved for orchestration.
        ("omp_nthreads", spec.resources.omp_nthreads().to_string()),
        ("mem_gb", mem_gb.to_string()),
        ("mem_mb", (mem_gb as u64 * 1024).to_string()),
        ("cpus", cpus.to_string()),
    ];
    for (key, value) in resource_vars {
        resolved
            .entry(key.to_string())
            .or_insert_with(|| serde_json::json!(value));
    }

    resolved
}

/// Render resolved parameters as template substitution values.
pub fn as_template_vars(resolved: &HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    resolved
        .iter()
        .map(|(k, v)| (k.clone(), param_to_string(v)))
        .collect()
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
