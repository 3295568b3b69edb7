//! Operation logging boundaries for engine commands

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use tempfile::TempDir;
use tessera_core::logging_facility::test_capture::init_test_capture;
use tessera_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_COMPONENT, FIELD_DURATION_MS, FIELD_REQUEST_ID,
};
use tessera_engine::commands::apply::{apply_patch, ApplyOptions};
use tessera_engine::commands::diff::diff_commits;

#[test]
fn test_apply_logs_start_and_end() {
    let capture = init_test_capture();

    let dir = TempDir::new().unwrap();
    let mut repo = points_repo(&dir, false);
    apply_patch(&mut repo, &retitle_patch("Old", "New"), &ApplyOptions::default()).unwrap();

    capture.assert_event_exists("apply_patch", EVENT_START);
    capture.assert_event_exists("apply_patch", EVENT_END);
    let end = capture
        .events_for_op("apply_patch")
        .into_iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .unwrap();
    assert!(end.field(FIELD_DURATION_MS).is_some());
    assert!(end
        .field(FIELD_COMPONENT)
        .is_some_and(|c| c.starts_with("tessera_engine")));
    assert!(end.field(FIELD_REQUEST_ID).is_some());
}

#[test]
fn test_failed_apply_logs_error_with_request_id() {
    let capture = init_test_capture();

    // GIVEN: a patch that conflicts
    let dir = TempDir::new().unwrap();
    let mut repo = points_repo(&dir, false);
    let err = apply_patch(
        &mut repo,
        &retitle_patch("Wrong", "New"),
        &ApplyOptions::default(),
    )
    .unwrap_err();

    // THEN: the error event carries the error's request id, kind and code
    let request_id = err.request_id().unwrap().as_str().to_string();
    let logged = capture
        .events_for_op("apply_patch")
        .into_iter()
        .filter(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .find(|e| e.field(FIELD_REQUEST_ID) == Some(request_id.as_str()))
        .unwrap();
    assert_eq!(logged.field("err_code"), Some(err.code()));
    let kind = format!("{:?}", err.kind());
    assert_eq!(logged.field("err_kind"), Some(kind.as_str()));
}

#[test]
fn test_diff_commits_logs_boundaries() {
    let capture = init_test_capture();

    let dir = TempDir::new().unwrap();
    let repo = points_repo(&dir, false);
    let head = repo.resolve("HEAD").unwrap();
    diff_commits(&repo, None, &head).unwrap();

    capture.assert_event_exists("diff_commits", EVENT_START);
    capture.assert_event_exists("diff_commits", EVENT_END);
}
