// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn container_name_is_stable_and_short() {
    let name = RemoteDockerBackend::container_name("a1b2c3d4-e5f6-7890-abcd-ef0123456789");
    assert_eq!(name, "neuroinsight_a1b2c3d4e5f6");
    // Deterministic.
    assert_eq!(
        name,
        RemoteDockerBackend::container_name("a1b2c3d4-e5f6-7890-abcd-ef0123456789")
    );
}

#[test]
fn docker_state_mapping() {
    assert_eq!(map_docker_state("created", -1), JobStatus::Pending);
    assert_eq!(map_docker_state("running", -1), JobStatus::Running);
    assert_eq!(map_docker_state("paused", -1), JobStatus::Running);
    assert_eq!(map_docker_state("restarting", -1), JobStatus::Running);
    assert_eq!(map_docker_state("removing", -1), JobStatus::Running);
    assert_eq!(map_docker_state("dead", -1), JobStatus::Failed);
    assert_eq!(map_docker_state("garbage", -1), JobStatus::Unknown);
}

#[test]
fn exited_state_uses_exit_code() {
    assert_eq!(map_docker_state("exited", 0), JobStatus::Completed);
    assert_eq!(map_docker_state("exited", 1), JobStatus::Failed);
    assert_eq!(map_docker_state("exited", 137), JobStatus::Failed);
}
