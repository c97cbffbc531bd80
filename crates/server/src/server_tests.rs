// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::api::SubmitRequest;
use crate::config::Config;
use ni_core::JobStatus;
use ni_executor::{FakeRuntime, Script};
use ni_storage::MemoryJobStore;
use serial_test::serial;

struct Fixture {
    _dirs: Vec<tempfile::TempDir>,
    runtime: FakeRuntime,
    store: Arc<MemoryJobStore>,
    server: Server,
    input_file: String,
}

fn fixture() -> Fixture {
    let registry_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();

    let plugins = registry_dir.path().join("plugins");
    let workflows = registry_dir.path().join("workflows");
    std::fs::create_dir_all(&plugins).unwrap();
    std::fs::create_dir_all(&workflows).unwrap();
    std::fs::write(
        plugins.join("toyseg.yaml"),
        "type: plugin\nid: toyseg\nname: ToySeg\nversion: 1.2.0\ncontainer:\n  image: deepmi/fastsurfer:latest\nresources:\n  default:\n    memory_gb: 16\n    cpus: 8\nexecution:\n  command_template: \"run {input_file} --threads {threads}\"\n",
    )
    .unwrap();
    std::fs::write(
        plugins.join("hidden_util.yaml"),
        "type: plugin\nid: hidden_util\nvisibility:\n  user_selectable: false\ncontainer:\n  image: nipreps/mriqc:latest\nexecution:\n  command_template: \"collect\"\n",
    )
    .unwrap();
    std::fs::write(
        plugins.join("broken_visible.yaml"),
        "type: plugin\nid: broken_visible\nvisibility:\n  user_selectable: true\ncontainer:\n  image: nipreps/mriqc:latest\n",
    )
    .unwrap();
    std::fs::write(
        workflows.join("toy_flow.yaml"),
        "type: workflow\nid: toy_flow\nname: Toy Flow\nversion: 1.0.0\nsteps:\n  - id: seg\n    uses: toyseg\n  - id: qc\n    uses: hidden_util\n",
    )
    .unwrap();

    let input_file = data_dir.path().join("T1.nii.gz");
    std::fs::write(&input_file, b"scan").unwrap();

    let mut config = Config::from_env().unwrap();
    config.backend_type = BackendType::Local;
    config.data_dir = data_dir.path().to_path_buf();
    config.plugins_dir = plugins;
    config.workflows_dir = workflows;

    let store = Arc::new(MemoryJobStore::new());
    let runtime = FakeRuntime::new();
    let server = Server::build(
        config,
        Deps::new(
            Arc::clone(&store) as Arc<dyn JobStore>,
            Arc::new(runtime.clone()),
        ),
    )
    .unwrap();

    Fixture {
        input_file: input_file.to_string_lossy().into_owned(),
        runtime,
        store,
        server,
        _dirs: vec![registry_dir, data_dir],
    }
}

fn request(fix: &Fixture) -> SubmitRequest {
    SubmitRequest {
        input_files: vec![fix.input_file.clone()],
        ..SubmitRequest::default()
    }
}

// =============================================================================
// Registry surface
// =============================================================================

#[test]
#[serial]
fn plugin_listing_filters_visibility() {
    let fix = fixture();
    let all = fix.server.list_plugins(false);
    assert_eq!(all["total"], 3);
    let selectable = fix.server.list_plugins(true);
    assert_eq!(selectable["total"], 2);

    let plugin = fix.server.get_plugin("toyseg").unwrap();
    assert_eq!(plugin["version"], "1.2.0");
    assert_eq!(fix.server.get_plugin("ghost").unwrap_err().status_code(), 404);
}

#[test]
#[serial]
fn workflow_listing_enriches_steps() {
    let fix = fixture();
    let workflow = fix.server.get_workflow("toy_flow").unwrap();
    assert_eq!(workflow["plugin_ids"], serde_json::json!(["toyseg", "hidden_util"]));
    assert_eq!(workflow["steps"][0]["plugin_name"], "ToySeg");
}

#[test]
#[serial]
fn lockfile_round_trip_through_handlers() {
    let fix = fixture();
    let lockfile = fix.server.lockfile();
    assert!(fix.server.verify_lockfile(&lockfile).is_ok());
    let reloaded = fix.server.reload_registry();
    assert_eq!(reloaded["status"], "reloaded");
    assert!(fix.server.verify_lockfile(&lockfile).is_ok());
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
#[serial]
async fn submit_plugin_creates_pending_job() {
    let fix = fixture();
    let response = fix.server.submit_plugin("toyseg", request(&fix)).await.unwrap();
    assert_eq!(response.status, JobStatus::Pending);
    assert_eq!(response.plugin.as_deref(), Some("toyseg"));

    let job = fix.store.get(&response.job_id).unwrap();
    assert_eq!(job.pipeline_name, "ToySeg");
    assert_eq!(job.resources.memory_gb, 16);
    assert_eq!(job.pipeline_version.as_deref(), Some("1.2.0"));
}

#[tokio::test]
#[serial]
async fn submit_unknown_plugin_is_404() {
    let fix = fixture();
    let err = fix.server.submit_plugin("ghost", request(&fix)).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
#[serial]
async fn selectable_plugin_without_template_fails_fast() {
    let fix = fixture();
    let err = fix
        .server
        .submit_plugin("broken_visible", request(&fix))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("has no command_template"));
    // No row was created.
    assert_eq!(fix.store.list(None, 10).unwrap().len(), 0);
}

#[tokio::test]
#[serial]
async fn submit_workflow_uses_first_step_defaults() {
    let fix = fixture();
    let response = fix.server.submit_workflow("toy_flow", request(&fix)).await.unwrap();
    assert_eq!(response.workflow.as_deref(), Some("toy_flow"));

    let job = fix.store.get(&response.job_id).unwrap();
    assert_eq!(job.container_image, "deepmi/fastsurfer:latest");
    assert_eq!(job.resources.cpus, 8);
    assert_eq!(job.execution_mode, ni_core::ExecutionMode::Workflow);
}

#[tokio::test]
#[serial]
async fn resource_profile_applies_preset() {
    let fix = fixture();
    let mut req = request(&fix);
    req.resource_profile = Some("max".to_string());
    let response = fix.server.submit_plugin("toyseg", req).await.unwrap();
    let job = fix.store.get(&response.job_id).unwrap();
    assert_eq!(job.resources.memory_gb, 64);
    assert!(job.resources.gpu);
}

// =============================================================================
// Job surface
// =============================================================================

#[tokio::test]
#[serial]
async fn job_endpoints_round_trip() {
    let fix = fixture();
    let submitted = fix.server.submit_plugin("toyseg", request(&fix)).await.unwrap();

    let jobs = fix.server.jobs(None, 10).await.unwrap();
    assert_eq!(jobs.total, 1);

    let progress = fix.server.jobs_progress().await.unwrap();
    assert_eq!(progress.jobs.len(), 1);
    assert_eq!(progress.jobs[0].progress, 0);

    let info = fix.server.job(&submitted.job_id).await.unwrap();
    assert_eq!(info.status, JobStatus::Pending);

    assert_eq!(fix.server.job("ghost").await.unwrap_err().status_code(), 404);
}

#[tokio::test]
#[serial]
async fn cancel_terminal_job_is_400() {
    let fix = fixture();
    let submitted = fix.server.submit_plugin("toyseg", request(&fix)).await.unwrap();

    let first = fix.server.cancel_job(&submitted.job_id).await.unwrap();
    assert!(first.cancelled);

    let err = fix.server.cancel_job(&submitted.job_id).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

// =============================================================================
// Backend switching & health
// =============================================================================

#[tokio::test]
#[serial]
async fn switch_to_unconfigured_backend_is_rejected() {
    let fix = fixture();
    let err = fix.server.switch_backend_to("slurm").unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(err.to_string().contains("HPC_HOST"));
    // Still on local.
    assert_eq!(fix.server.backend_type(), BackendType::Local);

    assert_eq!(
        fix.server.switch_backend_to("pbs").unwrap_err().status_code(),
        400
    );
}

#[tokio::test]
#[serial]
async fn hpc_endpoints_require_slurm() {
    let fix = fixture();
    let err = fix.server.hpc_partitions().await.unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
#[serial]
async fn health_aggregates_components() {
    let fix = fixture();
    let health = fix.server.health().await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.components["backend"]["type"], "local");
    assert!(health.components["store"]["healthy"].as_bool().unwrap());

    fix.runtime.set_unavailable(true);
    let health = fix.server.health().await;
    assert_eq!(health.status, "degraded");
}

#[test]
#[serial]
fn presets_endpoint_shape() {
    let fix = fixture();
    let presets = fix.server.resource_presets();
    assert_eq!(presets["presets"]["small"]["cpus"], 4);
    assert_eq!(presets["presets"]["max"]["gpu"], true);
}

// =============================================================================
// End-to-end through the worker (submission to results)
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn full_pipeline_to_results_projection() {
    let fix = fixture();
    fix.runtime.script_image(
        "deepmi/fastsurfer:latest",
        Script::succeeding(&["Starting\n", "Processing\n", "completed\n"]),
    );

    let submitted = fix.server.submit_plugin("toyseg", request(&fix)).await.unwrap();
    let pool = fix.server.spawn_workers();

    let mut status = JobStatus::Pending;
    for _ in 0..200 {
        status = fix.store.get(&submitted.job_id).unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(status, JobStatus::Completed);
    pool.shutdown().await;

    // The results projection sees the output tree.
    let files = fix.server.results_files(&submitted.job_id).unwrap();
    assert!(files["total"].as_u64().unwrap() > 0);

    let provenance = fix.server.results_provenance(&submitted.job_id).unwrap();
    assert_eq!(provenance["execution"]["exit_code"], 0);

    let mut archive = Vec::new();
    let name = fix
        .server
        .results_export(&submitted.job_id, &mut archive)
        .unwrap();
    assert!(name.starts_with("neuroinsight_"));
    assert!(!archive.is_empty());

    // Download path safety through the handler layer.
    let err = fix
        .server
        .results_download(&submitted.job_id, "../escape")
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}
