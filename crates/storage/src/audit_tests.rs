// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn records_structured_entries() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::open(dir.path()).unwrap();

    log.record("job_submitted", serde_json::json!({"job_id": "abc", "plugin_id": "fastsurfer"}));
    log.record_with_severity("job_failed", "error", serde_json::json!({"job_id": "abc"}));

    let entries = log.recent(10, None);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["event"], "job_submitted");
    assert_eq!(entries[0]["severity"], "info");
    assert_eq!(entries[0]["details"]["plugin_id"], "fastsurfer");
    assert_eq!(entries[1]["severity"], "error");
    assert!(entries[0]["timestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn recent_filters_by_event_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::open(dir.path()).unwrap();

    for i in 0..5 {
        log.record("ssh_connected", serde_json::json!({"n": i}));
        log.record("job_submitted", serde_json::json!({"n": i}));
    }

    let ssh = log.recent(10, Some("ssh_connected"));
    assert_eq!(ssh.len(), 5);
    assert!(ssh.iter().all(|e| e["event"] == "ssh_connected"));

    let last_two = log.recent(2, Some("job_submitted"));
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[1]["details"]["n"], 4);
}

#[test]
fn rotates_when_file_grows() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::open(dir.path()).unwrap().with_max_file_size(64);

    for i in 0..20 {
        log.record("event", serde_json::json!({"padding": "x".repeat(32), "n": i}));
    }

    let files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(files.len() > 1, "expected rotated files, got {}", files.len());
}

#[test]
fn missing_log_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::open(dir.path()).unwrap();
    assert!(log.recent(10, None).is_empty());
}
