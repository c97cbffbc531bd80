// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn doc(yaml: &str) -> serde_json::Value {
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    serde_json::to_value(parsed).unwrap()
}

const FASTSURFER_YAML: &str = r#"
type: plugin
id: fastsurfer
name: FastSurfer
version: 2.2.0
domain: structural
description: Deep-learning cortical parcellation
visibility:
  user_selectable: true
  ui_category: primary
  ui_label: FastSurfer (fast)
container:
  image: deepmi/fastsurfer:cpu-v2.2.0
  runtime: docker
inputs:
  required:
    - key: T1w
      label: T1-weighted scan
      format: nifti
  optional:
    - key: FLAIR
      label: FLAIR scan
      format: nifti
parameters:
  - name: threads
    type: int
    default: 4
    min: 1
    max: 32
  - name: seg_only
    type: bool
    default: false
resources:
  default:
    memory_gb: 16
    cpus: 8
    time_hours: 4
    gpu: false
  profiles:
    small:
      memory_gb: 8
      cpus: 4
    large:
      memory_gb: 32
      cpus: 16
      gpu: true
execution:
  stages:
    - id: segment
      command_template: "run_fastsurfer.sh --t1 /data/inputs/T1w.nii.gz --threads {threads}"
authors: [DeepMI Lab]
references: [https://doi.org/10.1016/j.neuroimage.2020.117012]
"#;

#[test]
fn parses_full_plugin() {
    let plugin = Plugin::from_value(doc(FASTSURFER_YAML), "fallback");

    assert_eq!(plugin.id, "fastsurfer");
    assert_eq!(plugin.name, "FastSurfer");
    assert_eq!(plugin.version, "2.2.0");
    assert!(plugin.user_selectable);
    assert_eq!(plugin.ui_label, "FastSurfer (fast)");
    assert_eq!(plugin.container_image, "deepmi/fastsurfer:cpu-v2.2.0");
    assert_eq!(plugin.container_runtime, "docker");
    assert_eq!(plugin.inputs_required.len(), 1);
    assert_eq!(plugin.inputs_required[0].key, "T1w");
    assert_eq!(plugin.inputs_optional.len(), 1);
    assert_eq!(plugin.parameters.len(), 2);
    assert_eq!(plugin.parameters[0].param_type, ParameterType::Int);
    assert_eq!(plugin.resources.memory_gb, 16);
    assert_eq!(plugin.resources.cpus, 8);
    assert_eq!(plugin.resource_profiles["large"].gpu, true);
    assert_eq!(plugin.authors, vec!["DeepMI Lab"]);
}

#[test]
fn stage_template_wins() {
    let plugin = Plugin::from_value(doc(FASTSURFER_YAML), "x");
    assert!(plugin.command_template.starts_with("run_fastsurfer.sh"));
    assert_eq!(plugin.effective_command(), plugin.command_template);
}

#[test]
fn execution_template_without_stages() {
    let plugin = Plugin::from_value(
        doc(
            r#"
type: plugin
id: p1
execution:
  command_template: "tool --x {x}"
"#,
        ),
        "p1",
    );
    assert_eq!(plugin.command_template, "tool --x {x}");
}

#[test]
fn top_level_command_is_legacy_fallback() {
    let plugin = Plugin::from_value(
        doc(
            r#"
type: plugin
id: legacy
command: "old-tool --run"
"#,
        ),
        "legacy",
    );
    assert!(plugin.command_template.is_empty());
    assert_eq!(plugin.command, "old-tool --run");
    assert_eq!(plugin.effective_command(), "old-tool --run");
}

#[test]
fn missing_fields_fall_back_to_defaults() {
    let plugin = Plugin::from_value(doc("type: plugin"), "from-stem");
    assert_eq!(plugin.id, "from-stem");
    assert_eq!(plugin.name, "from-stem");
    assert_eq!(plugin.version, "1.0.0");
    assert!(plugin.user_selectable);
    assert_eq!(plugin.ui_category, "primary");
    assert_eq!(plugin.container_runtime, "docker");
    assert_eq!(plugin.resources.memory_gb, 8);
    assert!(plugin.effective_command().is_empty());
}

#[test]
fn flat_resources_map_is_accepted() {
    let plugin = Plugin::from_value(
        doc(
            r#"
type: plugin
id: flat
resources:
  memory_gb: 64
  cpus: 24
"#,
        ),
        "flat",
    );
    assert_eq!(plugin.resources.memory_gb, 64);
    assert_eq!(plugin.resources.cpus, 24);
}

#[test]
fn default_parameters_skip_unset() {
    let plugin = Plugin::from_value(doc(FASTSURFER_YAML), "x");
    let defaults = plugin.default_parameters();
    assert_eq!(defaults["threads"], serde_json::json!(4));
    assert_eq!(defaults["seg_only"], serde_json::json!(false));

    let bare = Plugin::from_value(
        doc("type: plugin\nid: bare\nparameters:\n  - name: subject\n    type: string"),
        "bare",
    );
    assert!(bare.default_parameters().is_empty());
}

#[test]
fn expected_input_keys_in_order() {
    let plugin = Plugin::from_value(doc(FASTSURFER_YAML), "x");
    assert_eq!(plugin.expected_input_keys(), vec!["T1w"]);
}

#[test]
fn to_api_shape() {
    let api = Plugin::from_value(doc(FASTSURFER_YAML), "x").to_api();
    assert_eq!(api["type"], "plugin");
    assert_eq!(api["id"], "fastsurfer");
    assert!(api["inputs"]["required"].is_array());
    assert!(api["parameters"].is_array());
    assert!(api.get("command").is_none(), "command template is not exposed over the API");
}

#[test]
fn hidden_utility_plugin() {
    let plugin = Plugin::from_value(
        doc(
            r#"
type: plugin
id: bundle_extract
visibility:
  user_selectable: false
  ui_category: internal
"#,
        ),
        "bundle_extract",
    );
    assert!(!plugin.user_selectable);
    assert_eq!(plugin.ui_category, "internal");
}
