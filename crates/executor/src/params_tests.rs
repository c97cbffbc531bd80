// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ni_core::ResourceSpec;

fn plugin_with_defaults() -> Plugin {
    let yaml = r#"
type: plugin
id: fastsurfer
parameters:
  - name: threads
    type: int
    default: 2
  - name: seg_only
    type: bool
    default: false
  - name: subject
    type: string
"#;
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    Plugin::from_value(serde_json::to_value(parsed).unwrap(), "fastsurfer")
}

#[test]
fn user_values_win_over_defaults() {
    let mut spec = ni_core::JobSpec::builder().build();
    spec.parameters.insert("threads".into(), serde_json::json!(16));

    let resolved = resolve_parameters(&spec, Some(&plugin_with_defaults()));
    assert_eq!(resolved["threads"], serde_json::json!(16));
    assert_eq!(resolved["seg_only"], serde_json::json!(false));
    assert!(!resolved.contains_key("subject"), "no default, nothing injected");
}

#[test]
fn resource_vars_are_injected() {
    let mut spec = ni_core::JobSpec::builder().build();
    spec.resources = ResourceSpec { memory_gb: 16, cpus: 8, time_hours: 4, gpu: false };

    let resolved = resolve_parameters(&spec, None);
    assert_eq!(resolved["threads"], serde_json::json!("8"));
    assert_eq!(resolved["nthreads"], serde_json::json!("8"));
    assert_eq!(resolved["omp_nthreads"], serde_json::json!("7"));
    assert_eq!(resolved["mem_gb"], serde_json::json!("16"));
    assert_eq!(resolved["mem_mb"], serde_json::json!("16384"));
    assert_eq!(resolved["cpus"], serde_json::json!("8"));
}

#[test]
fn resource_vars_do_not_override_user_values() {
    let mut spec = ni_core::JobSpec::builder().build();
    spec.parameters.insert("threads".into(), serde_json::json!(1));
    let resolved = resolve_parameters(&spec, None);
    assert_eq!(resolved["threads"], serde_json::json!(1));
}

#[test]
fn input_file_autofilled_from_first_input() {
    let mut spec = ni_core::JobSpec::builder().build();
    spec.input_files = vec!["/tmp/T1.nii.gz".into(), "/tmp/FLAIR.nii.gz".into()];

    let resolved = resolve_parameters(&spec, None);
    assert_eq!(resolved["input_file"], serde_json::json!("/tmp/T1.nii.gz"));
}

#[test]
fn explicit_input_file_is_kept() {
    let mut spec = ni_core::JobSpec::builder().build();
    spec.input_files = vec!["/tmp/T1.nii.gz".into()];
    spec.parameters.insert("input_file".into(), serde_json::json!("/custom/path.nii"));

    let resolved = resolve_parameters(&spec, None);
    assert_eq!(resolved["input_file"], serde_json::json!("/custom/path.nii"));
}

#[test]
fn template_vars_render_scalars_without_quotes() {
    let mut resolved = HashMap::new();
    resolved.insert("threads".to_string(), serde_json::json!(8));
    resolved.insert("subject".to_string(), serde_json::json!("sub-01"));
    resolved.insert("flag".to_string(), serde_json::json!(true));

    let vars = as_template_vars(&resolved);
    assert_eq!(vars["threads"], "8");
    assert_eq!(vars["subject"], "sub-01");
    assert_eq!(vars["flag"], "true");
}
