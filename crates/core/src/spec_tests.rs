// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn resource_defaults() {
    let res = ResourceSpec::default();
    assert_eq!(res.memory_gb, 8);
    assert_eq!(res.cpus, 4);
    assert_eq!(res.time_hours, 6);
    assert!(!res.gpu);
}

#[test]
fn omp_nthreads_reserves_one_core() {
    let mut res = ResourceSpec::default();
    res.cpus = 8;
    assert_eq!(res.omp_nthreads(), 7);

    res.cpus = 1;
    assert_eq!(res.omp_nthreads(), 1);

    res.cpus = 0;
    assert_eq!(res.omp_nthreads(), 1);
}

#[test]
fn from_map_reads_known_keys() {
    let mut map = HashMap::new();
    map.insert("memory_gb".to_string(), serde_json::json!(32));
    map.insert("cpus".to_string(), serde_json::json!(16));
    map.insert("gpu".to_string(), serde_json::json!(true));

    let res = ResourceSpec::from_map(&map);
    assert_eq!(res.memory_gb, 32);
    assert_eq!(res.cpus, 16);
    assert_eq!(res.time_hours, 6);
    assert!(res.gpu);
}

#[test]
fn from_map_ignores_malformed_values() {
    let mut map = HashMap::new();
    map.insert("memory_gb".to_string(), serde_json::json!("lots"));
    let res = ResourceSpec::from_map(&map);
    assert_eq!(res.memory_gb, 8);
}

#[test]
fn job_spec_survives_json_round_trip() {
    let spec = JobSpec::builder()
        .command_template("run --in {input_file} --threads {threads}")
        .workflow_steps(vec!["step_a".to_string(), "step_b".to_string()])
        .build();

    let json = serde_json::to_string(&spec).unwrap();
    let back: JobSpec = serde_json::from_str(&json).unwrap();

    assert_eq!(back.pipeline_name, "FastSurfer");
    assert_eq!(back.workflow_steps.len(), 2);
    assert_eq!(
        back.command_template.as_deref(),
        Some("run --in {input_file} --threads {threads}")
    );
}

#[test]
fn job_logs_default_to_empty() {
    let logs = JobLogs::new("j1");
    assert_eq!(logs.job_id, "j1");
    assert!(logs.stdout.is_empty());
    assert!(logs.stderr.is_empty());
}
