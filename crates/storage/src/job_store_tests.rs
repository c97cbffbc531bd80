// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;
use ni_core::Job;

fn store_with(jobs: Vec<Job>) -> MemoryJobStore {
    let store = MemoryJobStore::new();
    for job in jobs {
        store.insert(job).unwrap();
    }
    store
}

// =============================================================================
// Insert / get
// =============================================================================

#[test]
fn insert_and_get() {
    let store = store_with(vec![Job::builder().id("a").build()]);
    assert_eq!(store.get("a").unwrap().id, "a");
    assert!(matches!(store.get("missing"), Err(StoreError::NotFound(_))));
}

#[test]
fn duplicate_insert_rejected() {
    let store = store_with(vec![Job::builder().id("a").build()]);
    let err = store.insert(Job::builder().id("a").build()).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { .. }));
}

// =============================================================================
// Transition guards
// =============================================================================

#[test]
fn forward_transitions_commit() {
    let store = store_with(vec![Job::builder().id("a").build()]);
    let now = Utc::now();

    let job = store.mark_running("a", now).unwrap();
    assert_eq!(job.status, JobStatus::Running);

    let job = store.mark_completed("a", 0, now).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
}

#[test]
fn backward_transition_rolls_back() {
    let store = store_with(vec![Job::builder()
        .id("a")
        .status(JobStatus::Completed)
        .build()]);

    let err = store
        .update("a", &|job| job.status = JobStatus::Running)
        .unwrap_err();
    assert!(matches!(err, StoreError::IllegalTransition { .. }));
    // Nothing committed.
    assert_eq!(store.get("a").unwrap().status, JobStatus::Completed);
}

#[test]
fn terminal_state_rejects_further_finishes() {
    let store = store_with(vec![Job::builder()
        .id("a")
        .status(JobStatus::Cancelled)
        .build()]);
    let err = store.mark_completed("a", 0, Utc::now()).unwrap_err();
    assert!(matches!(err, StoreError::IllegalTransition { .. }));
}

// =============================================================================
// Progress monotonicity
// =============================================================================

#[test]
fn progress_never_decreases() {
    let store = store_with(vec![Job::builder()
        .id("a")
        .status(JobStatus::Running)
        .build()]);

    store.set_progress("a", 40, Some("Skull stripping")).unwrap();
    assert_eq!(store.get("a").unwrap().progress, 40);

    // A late-arriving lower milestone keeps the higher value but the
    // update itself still commits (phase label changes).
    store.set_progress("a", 20, Some("Late phase")).unwrap();
    let job = store.get("a").unwrap();
    assert_eq!(job.progress, 40);
    assert_eq!(job.current_phase.as_deref(), Some("Late phase"));

    store.set_progress("a", 90, None).unwrap();
    assert_eq!(store.get("a").unwrap().progress, 90);
}

#[test]
fn progress_caps_at_100() {
    let store = store_with(vec![Job::builder()
        .id("a")
        .status(JobStatus::Running)
        .build()]);
    store.set_progress("a", 250, None).unwrap();
    assert_eq!(store.get("a").unwrap().progress, 100);
}

// =============================================================================
// Listing
// =============================================================================

#[test]
fn list_sorts_by_submitted_desc_and_limits() {
    let base = Utc::now();
    let store = MemoryJobStore::new();
    for (i, id) in ["old", "mid", "new"].iter().enumerate() {
        let mut job = Job::builder().id(*id).build();
        job.submitted_at = base + Duration::seconds(i as i64);
        store.insert(job).unwrap();
    }

    let jobs = store.list(None, 2).unwrap();
    let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid"]);
}

#[test]
fn list_filters_status_and_skips_deleted() {
    let store = store_with(vec![
        Job::builder().id("p").status(JobStatus::Pending).build(),
        Job::builder().id("r").status(JobStatus::Running).build(),
        Job::builder().id("c").status(JobStatus::Completed).build(),
        Job::builder().id("gone").deleted(true).build(),
    ]);

    let active = store.active().unwrap();
    let ids: Vec<&str> = active.iter().map(|j| j.id.as_str()).collect();
    assert!(ids.contains(&"p") && ids.contains(&"r"));
    assert!(!ids.contains(&"c"));
    assert!(!ids.contains(&"gone"));

    let all = store.list(None, usize::MAX).unwrap();
    assert_eq!(all.len(), 3);
}

#[test]
fn soft_delete_is_idempotent_flagging() {
    let store = store_with(vec![Job::builder().id("a").build()]);
    assert!(store.soft_delete("a", Utc::now()).unwrap());
    assert!(!store.soft_delete("a", Utc::now()).unwrap());
    // Row still present by id.
    assert!(store.get("a").unwrap().deleted);
}

// =============================================================================
// FileJobStore persistence
// =============================================================================

#[test]
fn file_store_round_trips_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.json");

    {
        let store = FileJobStore::open(&path).unwrap();
        store.insert(Job::builder().id("a").build()).unwrap();
        store.mark_running("a", Utc::now()).unwrap();
        store.set_progress("a", 55, Some("Running")).unwrap();
    }

    let store = FileJobStore::open(&path).unwrap();
    let job = store.get("a").unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.progress, 55);
}

#[test]
fn file_store_rejects_illegal_transition_without_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jobs.json");
    let store = FileJobStore::open(&path).unwrap();
    store
        .insert(Job::builder().id("a").status(JobStatus::Completed).build())
        .unwrap();

    assert!(store
        .update("a", &|job| job.status = JobStatus::Pending)
        .is_err());

    let reopened = FileJobStore::open(&path).unwrap();
    assert_eq!(reopened.get("a").unwrap().status, JobStatus::Completed);
}

#[test]
fn backend_job_id_update() {
    let store = store_with(vec![Job::builder().id("a").build()]);
    store.set_backend_job_id("a", "slurm-42").unwrap();
    assert_eq!(store.get("a").unwrap().backend_job_id.as_deref(), Some("slurm-42"));
}
