// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn status_codes() {
    assert_eq!(ServerError::NotFound("x".into()).status_code(), 404);
    assert_eq!(ServerError::BadRequest("x".into()).status_code(), 400);
    assert_eq!(ServerError::Unavailable("x".into()).status_code(), 503);
    assert_eq!(ServerError::Internal("x".into()).status_code(), 500);
}

#[test]
fn execution_errors_map_to_statuses() {
    let e: ServerError = ExecutionError::NotFound("abc".into()).into();
    assert_eq!(e.status_code(), 404);

    let e: ServerError = ExecutionError::Validation("bad".into()).into();
    assert_eq!(e.status_code(), 400);

    let e: ServerError = ExecutionError::BackendUnavailable("ssh down".into()).into();
    assert_eq!(e.status_code(), 503);

    let e: ServerError = ExecutionError::SubmitFailed("boom".into()).into();
    assert_eq!(e.status_code(), 500);
}

#[test]
fn projection_errors_map_to_statuses() {
    let e: ServerError = ProjectionError::PathTraversal.into();
    assert_eq!(e.status_code(), 400);

    let e: ServerError = ProjectionError::NoResults("j".into()).into();
    assert_eq!(e.status_code(), 404);
}

#[test]
fn detail_body_shape() {
    let body = ServerError::NotFound("Job abc not found".into()).detail();
    assert_eq!(body["detail"], "Job abc not found");
}
