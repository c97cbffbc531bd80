// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ni_core::{ResourceSpec, GENERIC_MILESTONES};
use ni_storage::MemoryJobStore;

// =============================================================================
// State mapping
// =============================================================================

#[test]
fn slurm_state_mapping() {
    assert_eq!(map_slurm_state("PENDING"), JobStatus::Pending);
    assert_eq!(map_slurm_state("CONFIGURING"), JobStatus::Pending);
    assert_eq!(map_slurm_state("SUSPENDED"), JobStatus::Pending);
    assert_eq!(map_slurm_state("RUNNING"), JobStatus::Running);
    assert_eq!(map_slurm_state("COMPLETING"), JobStatus::Running);
    assert_eq!(map_slurm_state("COMPLETED"), JobStatus::Completed);
    assert_eq!(map_slurm_state("CANCELLED"), JobStatus::Cancelled);
    for failed in ["FAILED", "TIMEOUT", "OUT_OF_MEMORY", "NODE_FAIL", "PREEMPTED"] {
        assert_eq!(map_slurm_state(failed), JobStatus::Failed, "{failed}");
    }
    assert_eq!(map_slurm_state("MYSTERY"), JobStatus::Unknown);
}

#[test]
fn cancelled_plus_suffix_is_stripped() {
    assert_eq!(clean_state(" CANCELLED+ \n"), "CANCELLED");
    assert_eq!(map_slurm_state(&clean_state("CANCELLED+")), JobStatus::Cancelled);
}

// =============================================================================
// sbatch / sacct parsing
// =============================================================================

#[test]
fn parses_sbatch_output() {
    assert_eq!(
        parse_sbatch_job_id("Submitted batch job 123456\n").unwrap(),
        "123456"
    );
    assert!(parse_sbatch_job_id("sbatch: error: invalid partition").is_err());
}

#[test]
fn parses_sacct_detail_line() {
    let line = "123456|COMPLETED|0:0|2026-03-01T10:00:00|2026-03-01T12:30:00|02:30:00|8G|1|8";
    let detail = parse_sacct_line(line);
    assert_eq!(detail.status, Some(JobStatus::Completed));
    assert_eq!(detail.exit_code, Some(0));
    assert!(detail.start_time.is_some());
    assert!(detail.end_time.unwrap() > detail.start_time.unwrap());
}

#[test]
fn sacct_unknown_times_are_none() {
    let line = "123456|RUNNING|0:0|2026-03-01T10:00:00|Unknown|00:10:00|8G|1|8";
    let detail = parse_sacct_line(line);
    assert_eq!(detail.status, Some(JobStatus::Running));
    assert!(detail.end_time.is_none());
}

#[test]
fn sacct_failed_exit_code() {
    let line = "123456|FAILED|137:9|2026-03-01T10:00:00|2026-03-01T10:05:00|00:05:00|8G|1|8";
    let detail = parse_sacct_line(line);
    assert_eq!(detail.status, Some(JobStatus::Failed));
    assert_eq!(detail.exit_code, Some(137));
}

#[test]
fn short_sacct_lines_parse_empty() {
    let detail = parse_sacct_line("garbage");
    assert!(detail.status.is_none());
    assert!(detail.exit_code.is_none());
}

// =============================================================================
// Log-based progress
// =============================================================================

#[test]
fn log_progress_picks_highest_milestone() {
    let log = "Starting pipeline\nsome noise\nProcessing volume\nRunning step 3\n";
    let (pct, label) = parse_log_progress(log, GENERIC_MILESTONES);
    assert_eq!(pct, 50);
    assert_eq!(label, "Running");
}

#[test]
fn log_progress_empty_log() {
    let (pct, label) = parse_log_progress("", GENERIC_MILESTONES);
    assert_eq!(pct, 0);
    assert_eq!(label, "Running");
}

// =============================================================================
// sbatch script generation
// =============================================================================

fn backend_for_script() -> SlurmBackend {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::load(dir.path().join("p"), dir.path().join("w")));
    let settings = SlurmSettings::new("hpc.example.edu", "user01")
        .work_dir("/scratch/user01")
        .partition("gpu")
        .account("lab123")
        .qos("normal")
        .modules(vec!["singularity/3.8".to_string()])
        .license_path("/scratch/user01/license.txt");
    // The session is never connected in these tests.
    SlurmBackend::new(settings, SshSession::new(), Arc::new(MemoryJobStore::new()), registry)
}

fn script_spec() -> JobSpec {
    let mut spec = JobSpec::builder()
        .pipeline_name("FastSurfer Segmentation")
        .container_image("deepmi/fastsurfer:latest")
        .plugin_id("fastsurfer")
        .build();
    spec.resources = ResourceSpec { memory_gb: 32, cpus: 16, time_hours: 8, gpu: true };
    spec.parameters.insert("subject".into(), serde_json::json!("sub-01"));
    spec
}

#[test]
fn sbatch_script_directives() {
    let backend = backend_for_script();
    let script = backend.generate_sbatch_script(
        &script_spec(),
        "a1b2c3d4-ffff-0000-1111-222233334444",
        "/scratch/user01/neuroinsight/jobs/a1b2c3d4",
        "run --subject {subject} --threads {threads}",
    );

    assert!(script.starts_with("#!/bin/bash"));
    assert!(script.contains("#SBATCH --job-name=ni-FastSurfer Segmentat-a1b2c3d4"));
    assert!(script.contains("#SBATCH --partition=gpu"));
    assert!(script.contains("#SBATCH --mem=32G"));
    assert!(script.contains("#SBATCH --cpus-per-task=16"));
    assert!(script.contains("#SBATCH --time=8:00:00"));
    assert!(script.contains("#SBATCH --account=lab123"));
    assert!(script.contains("#SBATCH --qos=normal"));
    assert!(script.contains("#SBATCH --gpus-per-node=1"));
    assert!(script.contains("set -euo pipefail"));
    assert!(script.contains("module load singularity/3.8"));
    assert!(script.contains("export OMP_NUM_THREADS=16"));
}

#[test]
fn sbatch_script_heredoc_command() {
    let backend = backend_for_script();
    let script = backend.generate_sbatch_script(
        &script_spec(),
        "a1b2c3d4-ffff-0000-1111-222233334444",
        "/scratch/jobs/a1",
        "run --subject {subject} --threads {threads}",
    );

    // Command goes through a quoted here-doc, never the login shell.
    assert!(script.contains("<< 'NEUROINSIGHT_CMD_EOF'"));
    assert!(script.contains("run --subject sub-01 --threads 16"));
    assert!(script.contains("singularity exec"));
    assert!(script.contains("docker://deepmi/fastsurfer:latest"));
    assert!(script.contains("--bind /scratch/jobs/a1/inputs:/data/inputs:ro"));
    assert!(script.contains("--bind /scratch/jobs/a1/outputs:/data/outputs:rw"));
    assert!(script.contains("--bind /scratch/user01/license.txt:/license/license.txt:ro"));
    assert!(script.contains("tee /scratch/jobs/a1/outputs/logs/container.log"));
}

#[test]
fn sbatch_script_sanitises_parameters() {
    let backend = backend_for_script();
    let mut spec = script_spec();
    spec.parameters
        .insert("subject".into(), serde_json::json!("sub-01; rm -rf /"));
    let script = backend.generate_sbatch_script(
        &spec,
        "a1b2c3d4-ffff-0000-1111-222233334444",
        "/scratch/jobs/a1",
        "run --subject {subject}",
    );
    assert!(script.contains("run --subject sub-01 rm -rf /"));
    assert!(!script.contains("subject; rm"));
}

#[test]
fn sbatch_script_without_template_runs_default_cmd() {
    let backend = backend_for_script();
    let script = backend.generate_sbatch_script(
        &script_spec(),
        "a1b2c3d4-ffff-0000-1111-222233334444",
        "/scratch/jobs/a1",
        "",
    );
    assert!(script.contains("singularity run"));
    assert!(!script.contains("NEUROINSIGHT_CMD_EOF"));
}
