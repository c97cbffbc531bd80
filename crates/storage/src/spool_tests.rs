// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn task(job_id: &str) -> Task {
    Task::new(job_id, TaskKind::RunPlugin, JobSpec::builder().build())
}

#[test]
fn enqueue_claim_ack_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let spool = TaskSpool::open(dir.path()).unwrap();

    let t = task("job-1");
    spool.enqueue(&t).unwrap();
    assert_eq!(spool.pending_count(), 1);

    let claimed = spool.claim().unwrap().unwrap();
    assert_eq!(claimed.job_id, "job-1");
    assert_eq!(spool.pending_count(), 0);
    assert_eq!(spool.claimed_count(), 1);

    spool.ack(&claimed).unwrap();
    assert_eq!(spool.claimed_count(), 0);
}

#[test]
fn claim_order_is_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let spool = TaskSpool::open(dir.path()).unwrap();

    let mut first = task("job-1");
    first.enqueued_at = Utc::now() - chrono::Duration::seconds(10);
    let second = task("job-2");
    spool.enqueue(&second).unwrap();
    spool.enqueue(&first).unwrap();

    assert_eq!(spool.claim().unwrap().unwrap().job_id, "job-1");
    assert_eq!(spool.claim().unwrap().unwrap().job_id, "job-2");
    assert!(spool.claim().unwrap().is_none());
}

#[test]
fn at_most_one_task_per_job() {
    let dir = tempfile::tempdir().unwrap();
    let spool = TaskSpool::open(dir.path()).unwrap();

    spool.enqueue(&task("job-1")).unwrap();
    let err = spool.enqueue(&task("job-1")).unwrap_err();
    assert!(matches!(err, SpoolError::AlreadyQueued(_)));

    // Still enforced while the task is claimed but unacked.
    let claimed = spool.claim().unwrap().unwrap();
    assert!(matches!(
        spool.enqueue(&task("job-1")),
        Err(SpoolError::AlreadyQueued(_))
    ));

    // After ack a new task may be enqueued (manual retry path).
    spool.ack(&claimed).unwrap();
    spool.enqueue(&task("job-1")).unwrap();
}

#[test]
fn reopen_requeues_claimed_tasks() {
    let dir = tempfile::tempdir().unwrap();
    {
        let spool = TaskSpool::open(dir.path()).unwrap();
        spool.enqueue(&task("job-1")).unwrap();
        let _claimed = spool.claim().unwrap().unwrap();
        // Worker "crashes" here: no ack.
    }

    let spool = TaskSpool::open(dir.path()).unwrap();
    assert_eq!(spool.pending_count(), 1);
    let redelivered = spool.claim().unwrap().unwrap();
    assert_eq!(redelivered.job_id, "job-1");
    assert_eq!(redelivered.delivery, 1);
}

#[test]
fn revoke_removes_pending_only() {
    let dir = tempfile::tempdir().unwrap();
    let spool = TaskSpool::open(dir.path()).unwrap();

    spool.enqueue(&task("job-1")).unwrap();
    assert!(spool.revoke("job-1").unwrap());
    assert!(!spool.revoke("job-1").unwrap());
    assert_eq!(spool.pending_count(), 0);

    spool.enqueue(&task("job-2")).unwrap();
    let _claimed = spool.claim().unwrap().unwrap();
    // Claimed work cannot be revoked from the spool.
    assert!(!spool.revoke("job-2").unwrap());
    assert_eq!(spool.claimed_count(), 1);
}

#[test]
fn workflow_tasks_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let spool = TaskSpool::open(dir.path()).unwrap();

    let mut spec = JobSpec::builder().build();
    spec.workflow_steps = vec!["step_a".into(), "step_b".into()];
    let t = Task::new("job-wf", TaskKind::RunWorkflow, spec);
    spool.enqueue(&t).unwrap();

    let claimed = spool.claim().unwrap().unwrap();
    assert_eq!(claimed.kind, TaskKind::RunWorkflow);
    assert_eq!(claimed.spec.workflow_steps, vec!["step_a", "step_b"]);
}
