// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios.
//!
//! Each test drives a full stack (registry, job store, task spool,
//! executor, and the scripted container runtime) through one of the
//! canonical job-lifecycle scenarios: happy plugin run, parameter
//! injection, disallowed image, two-step workflow, mid-run cancel,
//! and lockfile drift.

use ni_backends::{ExecutionBackend, LocalDockerBackend};
use ni_core::{Job, JobSpec, JobStatus};
use ni_executor::{Executor, ExecutorConfig, FakeRuntime, JobDirs, Script, WorkerPool};
use ni_registry::Registry;
use ni_storage::{JobStore, MemoryJobStore, TaskSpool};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const SPEC_WAIT_MAX_MS: u64 = 5_000;

struct Stack {
    _dirs: Vec<tempfile::TempDir>,
    data_dir: PathBuf,
    store: Arc<MemoryJobStore>,
    runtime: FakeRuntime,
    backend: LocalDockerBackend,
    executor: Arc<Executor>,
    spool: Arc<TaskSpool>,
    registry: Arc<Registry>,
    input_file: String,
}

const SEG_TEMPLATE: &str = "run --in {input_file} --out /data/outputs --threads {threads}";

fn stack() -> Stack {
    let registry_dir = tempfile::tempdir().expect("tempdir");
    let data_dir = tempfile::tempdir().expect("tempdir");
    let spool_dir = tempfile::tempdir().expect("tempdir");

    let plugins = registry_dir.path().join("plugins");
    let workflows = registry_dir.path().join("workflows");
    std::fs::create_dir_all(&plugins).expect("mkdir");
    std::fs::create_dir_all(&workflows).expect("mkdir");

    std::fs::write(
        plugins.join("toyseg.yaml"),
        format!(
            "type: plugin\nid: toyseg\nname: ToySeg\nversion: 1.0.0\ncontainer:\n  image: deepmi/fastsurfer:latest\ninputs:\n  required:\n    - key: T1w\n      label: T1\n      format: nifti\nparameters:\n  - name: threads\n    type: int\n    default: 4\nexecution:\n  command_template: \"{SEG_TEMPLATE}\"\n"
        ),
    )
    .expect("write plugin");
    std::fs::write(
        plugins.join("toystats.yaml"),
        "type: plugin\nid: toystats\nname: ToyStats\nversion: 1.0.0\ncontainer:\n  image: nipreps/mriqc:latest\nexecution:\n  command_template: \"analyze --in {input_file}\"\n",
    )
    .expect("write plugin");
    std::fs::write(
        workflows.join("toy_flow.yaml"),
        "type: workflow\nid: toy_flow\nname: Toy Flow\nversion: 1.0.0\nsteps:\n  - id: seg\n    uses: toyseg\n  - id: stats\n    uses: toystats\n",
    )
    .expect("write workflow");

    let registry = Arc::new(Registry::load(&plugins, &workflows));
    let store = Arc::new(MemoryJobStore::new());
    let runtime = FakeRuntime::new();
    let spool = Arc::new(TaskSpool::open(spool_dir.path()).expect("spool"));
    let executor = Arc::new(Executor::new(
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&registry),
        Arc::new(runtime.clone()),
        ExecutorConfig::new(data_dir.path()),
    ));
    let backend = LocalDockerBackend::new(
        data_dir.path(),
        2,
        Arc::clone(&store) as Arc<dyn JobStore>,
        Arc::clone(&registry),
        Arc::new(runtime.clone()),
        Arc::clone(&spool),
        Arc::clone(&executor),
    );

    let input_file = data_dir.path().join("T1.nii.gz");
    std::fs::write(&input_file, b"fake scan bytes").expect("write input");

    Stack {
        data_dir: data_dir.path().to_path_buf(),
        input_file: input_file.to_string_lossy().into_owned(),
        store,
        runtime,
        backend,
        executor,
        spool,
        registry,
        _dirs: vec![registry_dir, data_dir, spool_dir],
    }
}

fn seg_spec(stack: &Stack) -> JobSpec {
    let mut spec = JobSpec {
        pipeline_name: "ToySeg".to_string(),
        container_image: "deepmi/fastsurfer:latest".to_string(),
        input_files: vec![stack.input_file.clone()],
        output_dir: String::new(),
        parameters: Default::default(),
        resources: Default::default(),
        pipeline_version: Some("1.0.0".to_string()),
        plugin_id: Some("toyseg".to_string()),
        workflow_id: None,
        execution_mode: ni_core::ExecutionMode::Plugin,
        command_template: Some(SEG_TEMPLATE.to_string()),
        workflow_steps: Vec::new(),
        data_dir: String::new(),
    };
    spec.parameters.insert("threads".to_string(), serde_json::json!(8));
    spec
}

async fn wait_for_terminal(store: &MemoryJobStore, job_id: &str) -> Job {
    let deadline = std::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    loop {
        let job = store.get(job_id).expect("job row");
        if job.is_terminal() {
            return job;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "job {job_id} stuck in {}",
            job.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    while !check() {
        assert!(std::time::Instant::now() < deadline, "condition never became true");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Scenario: happy single-plugin run
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn happy_plugin_run_reaches_100() {
    let stack = stack();
    stack.runtime.script_image(
        "deepmi/fastsurfer:latest",
        Script::succeeding(&["Starting pipeline\n", "Processing volume\n", "completed\n"]),
    );

    let job_id = stack.backend.submit(seg_spec(&stack), None).await.expect("submit");
    assert_eq!(stack.store.get(&job_id).expect("row").status, JobStatus::Pending);

    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 2);
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert_eq!(job.progress, 100);
    assert!(job.completed_at.expect("completed_at") >= job.started_at.expect("started_at"));

    let dirs = JobDirs::new(&stack.data_dir, &job_id);
    assert!(dirs.job_spec().exists(), "job_spec.json must exist");
    assert!(dirs.native().is_dir(), "native/ must exist");
    assert!(dirs.container_log().exists());

    // The rendered command carries the resolved threads parameter.
    let launched = stack.runtime.launched();
    assert_eq!(launched.len(), 1);
    let command = launched[0].command.as_deref().expect("command");
    assert!(command.ends_with("--threads 8"), "unexpected command: {command}");
}

// =============================================================================
// Scenario: parameter injection is neutralised
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn injection_attempt_is_stripped_not_executed() {
    let stack = stack();
    stack
        .runtime
        .script_image("deepmi/fastsurfer:latest", Script::succeeding(&["completed\n"]));

    let mut spec = seg_spec(&stack);
    spec.parameters
        .insert("threads".to_string(), serde_json::json!("; rm -rf / ;"));
    let job_id = stack.backend.submit(spec, None).await.expect("submit");

    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 1);
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Completed);
    let command = stack.runtime.launched()[0].command.clone().expect("command");
    assert_eq!(
        command,
        format!("run --in {} --out /data/outputs --threads  rm -rf / ", stack.input_file)
    );
    for c in [';', '|', '&', '`', '$'] {
        let tail = command.split("--threads").nth(1).expect("threads arg");
        assert!(!tail.contains(c), "{c} survived sanitising: {command}");
    }
}

// =============================================================================
// Scenario: disallowed image
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disallowed_image_is_rejected_before_launch() {
    let stack = stack();
    let mut spec = seg_spec(&stack);
    spec.container_image = "evil.io/miner:latest".to_string();

    let job_id = stack.backend.submit(spec, None).await.expect("submit");
    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 1);
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .expect("error message")
        .starts_with("Image 'evil.io/miner:latest' is not in the allowed list"));
    assert!(stack.runtime.launched().is_empty(), "no container may be launched");
}

// =============================================================================
// Scenario: two-step workflow
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_step_workflow_chains_outputs() {
    let stack = stack();
    let job_id = "11111111-2222-3333-4444-555555555555".to_string();
    let dirs = JobDirs::new(&stack.data_dir, &job_id);
    stack.runtime.script_image(
        "deepmi/fastsurfer:latest",
        Script::succeeding(&["Starting\n", "completed\n"]).creating(dirs.native().join("a_out")),
    );
    stack.runtime.script_image(
        "nipreps/mriqc:latest",
        Script::succeeding(&["Starting\n", "completed\n"]),
    );

    let mut spec = seg_spec(&stack);
    spec.pipeline_name = "Toy Flow".to_string();
    spec.execution_mode = ni_core::ExecutionMode::Workflow;
    spec.plugin_id = None;
    spec.workflow_id = Some("toy_flow".to_string());
    spec.workflow_steps = vec!["toyseg".to_string(), "toystats".to_string()];
    spec.command_template = None;

    let submitted = stack
        .backend
        .submit(spec, Some(job_id.clone()))
        .await
        .expect("submit");
    assert_eq!(submitted, job_id);

    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 1);
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);

    let launched = stack.runtime.launched();
    assert_eq!(launched.len(), 2, "both steps must run");
    assert_eq!(launched[0].image, "deepmi/fastsurfer:latest");
    assert_eq!(launched[1].image, "nipreps/mriqc:latest");
    // Step B consumed the directory step A created under native/.
    let step_b_command = launched[1].command.as_deref().expect("command");
    assert!(
        step_b_command.contains("a_out"),
        "step B must read step A's output: {step_b_command}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn workflow_step_failure_stops_the_chain() {
    let stack = stack();
    stack.runtime.script_image(
        "deepmi/fastsurfer:latest",
        Script::failing(&["Starting\n", "model blew up\n"], 3),
    );

    let mut spec = seg_spec(&stack);
    spec.execution_mode = ni_core::ExecutionMode::Workflow;
    spec.workflow_steps = vec!["toyseg".to_string(), "toystats".to_string()];
    let job_id = stack.backend.submit(spec, None).await.expect("submit");

    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 1);
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.exit_code, Some(3), "the failing step's exit code is preserved");
    assert_eq!(stack.runtime.launched().len(), 1, "the second step never runs");
}

// =============================================================================
// Scenario: cancel mid-run
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_mid_run_stops_the_container() {
    let stack = stack();
    stack.runtime.script_image(
        "deepmi/fastsurfer:latest",
        Script::hanging(&["Starting pipeline\n", "Processing volume\n"]),
    );

    let job_id = stack.backend.submit(seg_spec(&stack), None).await.expect("submit");
    let pool = WorkerPool::spawn(Arc::clone(&stack.executor), Arc::clone(&stack.spool), 1);

    // Wait until the job is live and has made progress.
    wait_until(|| {
        stack
            .store
            .get(&job_id)
            .map(|j| j.status == JobStatus::Running && j.progress >= 5)
            .unwrap_or(false)
    })
    .await;

    assert!(stack.backend.cancel(&job_id).await.expect("cancel"));
    let job = wait_for_terminal(&stack.store, &job_id).await;
    pool.shutdown().await;

    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.completed_at.is_some());

    // A second cancel finds nothing to signal.
    assert!(!stack.backend.cancel(&job_id).await.expect("second cancel"));
}

// =============================================================================
// Scenario: lockfile drift
// =============================================================================

#[test]
fn lockfile_detects_version_drift() {
    let stack = stack();
    let lockfile = stack.registry.generate_lockfile();
    assert!(stack.registry.verify_lockfile(&lockfile).is_ok());

    // Bump one plugin's version on disk and reload.
    let plugin_path = stack._dirs[0].path().join("plugins").join("toyseg.yaml");
    let text = std::fs::read_to_string(&plugin_path).expect("read plugin");
    std::fs::write(&plugin_path, text.replace("version: 1.0.0", "version: 1.0.1"))
        .expect("write plugin");
    stack.registry.reload();

    let report = stack.registry.verify_lockfile(&lockfile);
    assert!(!report.is_ok());
    assert_eq!(report.plugins.len(), 1);
    let mismatch = &report.plugins[0];
    assert_eq!(mismatch.id, "toyseg");
    assert_eq!(mismatch.issue, ni_registry::MismatchIssue::VersionChanged);
    assert_eq!(mismatch.expected.as_deref(), Some("1.0.0"));
    assert_eq!(mismatch.actual.as_deref(), Some("1.0.1"));
}
