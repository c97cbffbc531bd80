// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named resource presets offered by the submission UI.

use ni_core::ResourceSpec;

/// The four standard presets: small, medium, large, max.
pub fn resource_presets() -> Vec<(&'static str, ResourceSpec)> {
    vec![
        ("small", ResourceSpec { memory_gb: 8, cpus: 4, time_hours: 6, gpu: false }),
        ("medium", ResourceSpec { memory_gb: 16, cpus: 8, time_hours: 12, gpu: false }),
        ("large", ResourceSpec { memory_gb: 32, cpus: 16, time_hours: 24, gpu: false }),
        ("max", ResourceSpec { memory_gb: 64, cpus: 32, time_hours: 48, gpu: true }),
    ]
}

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<ResourceSpec> {
    resource_presets()
        .into_iter()
        .find(|(preset_name, _)| *preset_name == name)
        .map(|(_, spec)| spec)
}

#[cfg(test)]
#[path = "presets_tests.rs"]
mod tests;
