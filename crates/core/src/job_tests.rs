// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;

// =============================================================================
// State machine tests
// =============================================================================

#[test]
fn pending_can_start_cancel_or_fail() {
    assert!(JobStatus::Pending.can_transition(JobStatus::Running));
    assert!(JobStatus::Pending.can_transition(JobStatus::Cancelled));
    assert!(JobStatus::Pending.can_transition(JobStatus::Failed));
}

#[test]
fn running_can_only_finish() {
    assert!(JobStatus::Running.can_transition(JobStatus::Completed));
    assert!(JobStatus::Running.can_transition(JobStatus::Failed));
    assert!(JobStatus::Running.can_transition(JobStatus::Cancelled));
    assert!(!JobStatus::Running.can_transition(JobStatus::Pending));
}

#[test]
fn terminal_states_are_absorbing() {
    for status in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
        assert!(status.is_terminal());
        for next in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(!status.can_transition(next), "{status} -> {next} must be rejected");
        }
    }
}

#[test]
fn status_parse_round_trips() {
    for status in [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        assert_eq!(JobStatus::parse(&status.to_string()), status);
    }
    assert_eq!(JobStatus::parse("COMPLETING"), JobStatus::Unknown);
}

// =============================================================================
// Row lifecycle tests
// =============================================================================

#[test]
fn from_spec_creates_pending_row() {
    let spec = JobSpec::builder().build();
    let now = Utc::now();
    let job = Job::from_spec("abc-123", "local", &spec, now);

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);
    assert_eq!(job.submitted_at, now);
    assert!(job.started_at.is_none());
    assert!(job.backend_job_id.is_none());
    assert!(!job.deleted);
}

#[test]
fn mark_completed_sets_exit_and_progress() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    let now = Utc::now();
    job.mark_started(now);
    job.mark_completed(0, now + Duration::seconds(30));

    assert!(job.succeeded());
    assert_eq!(job.progress, 100);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.completed_at.unwrap() >= job.started_at.unwrap());
}

#[test]
fn mark_failed_preserves_exit_code() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    job.mark_failed("Container exited with code 137", 137, Utc::now());

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.exit_code, Some(137));
    assert!(!job.succeeded());
    assert!(job.can_retry());
}

#[test]
fn cancelled_job_sets_completed_at() {
    let mut job = Job::builder().status(JobStatus::Running).build();
    assert!(job.can_cancel());
    job.mark_cancelled(Utc::now());
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.completed_at.is_some());
    assert!(!job.can_cancel());
}

#[test]
fn soft_delete_keeps_the_row() {
    let mut job = Job::builder().build();
    job.soft_delete(Utc::now());
    assert!(job.deleted);
    assert!(job.deleted_at.is_some());
    assert_eq!(job.id, "job-1");
}

#[test]
fn runtime_uses_now_for_running_jobs() {
    let mut job = Job::builder().build();
    let start = Utc::now();
    job.mark_started(start);

    let later = start + Duration::seconds(125);
    assert_eq!(job.runtime_seconds(later), Some(125));
    assert_eq!(job.runtime_formatted(later), "2m 5s");
}

#[test]
fn runtime_none_before_start() {
    let job = Job::builder().build();
    assert_eq!(job.runtime_seconds(Utc::now()), None);
    assert_eq!(job.runtime_formatted(Utc::now()), "Not started");
}

#[test]
fn to_info_mirrors_row_fields() {
    let job = Job::builder()
        .status(JobStatus::Running)
        .progress(42)
        .current_phase("Skull stripping")
        .backend_job_id("abc123def456")
        .build();
    let info = job.to_info();

    assert_eq!(info.job_id, "job-1");
    assert_eq!(info.status, JobStatus::Running);
    assert_eq!(info.progress, 42);
    assert_eq!(info.current_phase.as_deref(), Some("Skull stripping"));
    assert_eq!(info.backend_job_id.as_deref(), Some("abc123def456"));
}

#[test]
fn serde_round_trip() {
    let job = Job::builder()
        .status(JobStatus::Completed)
        .exit_code(0)
        .build();
    let json = serde_json::to_string(&job).unwrap();
    assert!(json.contains("\"status\":\"completed\""));
    let back: Job = serde_json::from_str(&json).unwrap();
    assert_eq!(back.status, JobStatus::Completed);
    assert_eq!(back.exit_code, Some(0));
}
