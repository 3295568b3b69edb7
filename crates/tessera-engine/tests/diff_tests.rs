//! Integration tests for diff_commits, feature_change_counts, show and
//! create_patch, including the annotation cache they consult.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use serde_json::json;
use tempfile::TempDir;
use tessera_core::annotations::DIFF_ANNOTATION;
use tessera_core::diff::{FeatureChange, PatchType, DIFF_KEY, HEADER_KEY};
use tessera_core::errors::ExErrorKind;
use tessera_engine::commands::apply::{apply_patch, ApplyOptions};
use tessera_engine::commands::diff::{create_patch, diff_commits, feature_change_counts, show};
use tessera_engine::Repository;
use tessera_store::annotations::row_count;

fn edited_repo(dir: &TempDir) -> Repository {
    let mut repo = points_repo(dir, false);
    let patch = patch_bytes(
        json!({DATASET: {
            "meta": {"title": {"-": "Old", "+": "New"}},
            "feature": [
                {"-": point(2, "point 2"), "+": point(2, "renamed")},
                {"+": point(9, "nine")}
            ]
        }}),
        "Edit points",
    );
    apply_patch(&mut repo, &patch, &ApplyOptions::default()).unwrap();
    repo
}

#[test]
fn test_diff_is_cached_and_reused() {
    // GIVEN: a commit on top of the import
    let dir = TempDir::new().unwrap();
    let repo = edited_repo(&dir);
    let head = repo.resolve("HEAD").unwrap();
    let parent = repo.resolve("HEAD^").unwrap();

    // WHEN: the same diff is asked for twice
    let first = diff_commits(&repo, Some(&parent), &head).unwrap();
    let second = diff_commits(&repo, Some(&parent), &head).unwrap();

    // THEN: one annotation row was written and both answers agree
    assert_eq!(first, second);
    assert_eq!(row_count(&repo.annotations_path()).unwrap(), 1);
    assert_eq!(first.datasets[DATASET].feature.len(), 2);
}

#[test]
fn test_cached_diff_read_in_reverse() {
    // GIVEN: the forward diff is cached
    let dir = TempDir::new().unwrap();
    let repo = edited_repo(&dir);
    let head = repo.resolve("HEAD").unwrap();
    let parent = repo.resolve("HEAD^").unwrap();
    let forward = diff_commits(&repo, Some(&parent), &head).unwrap();

    // WHEN: the reverse diff is asked for
    let backward = diff_commits(&repo, Some(&head), &parent).unwrap();

    // THEN: it comes from the same row, reversed
    assert_eq!(row_count(&repo.annotations_path()).unwrap(), 1);
    assert_eq!(backward, forward.reversed());
    assert!(matches!(
        backward.datasets[DATASET].feature[1].change,
        FeatureChange::Deleted { .. }
    ));
}

#[test]
fn test_cache_hit_skips_computation() {
    // GIVEN: a planted annotation for the pair of trees
    let dir = TempDir::new().unwrap();
    let repo = edited_repo(&dir);
    let head = repo.resolve("HEAD").unwrap();
    let parent = repo.resolve("HEAD^").unwrap();
    let old_tree = repo.read_commit(&parent).unwrap().tree;
    let new_tree = repo.read_commit(&head).unwrap().tree;
    let planted = json!({"base": old_tree.as_str(), "diff": {"datasets": {}}});
    repo.annotations()
        .store(
            old_tree.as_str(),
            new_tree.as_str(),
            DIFF_ANNOTATION,
            planted.as_object().unwrap(),
        )
        .unwrap();

    // WHEN / THEN: the planted value is returned as-is
    let diff = diff_commits(&repo, Some(&parent), &head).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn test_feature_change_counts() {
    let dir = TempDir::new().unwrap();
    let repo = edited_repo(&dir);
    let head = repo.resolve("HEAD").unwrap();
    let parent = repo.resolve("HEAD^").unwrap();

    let counts = feature_change_counts(&repo, Some(&parent), &head).unwrap();
    assert_eq!(counts[DATASET], 2);

    // The counts are symmetric and served from the cache
    let reverse = feature_change_counts(&repo, Some(&head), &parent).unwrap();
    assert_eq!(reverse, counts);
    assert_eq!(row_count(&repo.annotations_path()).unwrap(), 2);
}

#[test]
fn test_disabled_annotations_never_touch_disk() {
    // GIVEN: annotations switched off in config.toml
    let dir = TempDir::new().unwrap();
    drop(edited_repo(&dir));
    std::fs::write(
        dir.path().join(".tessera").join("config.toml"),
        "[user]\nname = \"Test User\"\nemail = \"test@example.com\"\n\n[annotations]\nenabled = false\n",
    )
    .unwrap();
    let repo = Repository::open(dir.path()).unwrap();

    // WHEN
    let head = repo.resolve("HEAD").unwrap();
    diff_commits(&repo, None, &head).unwrap();

    // THEN
    assert!(!repo.annotations_path().exists());
}

#[test]
fn test_show_root_commit_diffs_against_nothing() {
    let dir = TempDir::new().unwrap();
    let repo = points_repo(&dir, false);

    let shown = show(&repo, "HEAD").unwrap();
    assert_eq!(shown.commit.message, "Import points");
    assert_eq!(shown.diff.datasets[DATASET].feature.len(), 5);

    let root = show(&repo, "HEAD^").unwrap();
    assert!(root.commit.parents.is_empty());
    assert!(root.diff.is_empty());
}

#[test]
fn test_show_unknown_ref() {
    let dir = TempDir::new().unwrap();
    let repo = points_repo(&dir, false);
    let err = show(&repo, "no-such-branch").unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::UnknownRef);
}

#[test]
fn test_create_patch_header_and_types() {
    // GIVEN: a commit made from a patch with a known author
    let dir = TempDir::new().unwrap();
    let repo = edited_repo(&dir);
    let parent = repo.resolve("HEAD^").unwrap();

    // WHEN: full and minimal patches are created
    let full = create_patch(&repo, "HEAD", PatchType::Full).unwrap();
    let minimal = create_patch(&repo, "HEAD", PatchType::Minimal).unwrap();

    // THEN: the header describes the commit
    let header = &full[HEADER_KEY];
    assert_eq!(header["message"], "Edit points");
    assert_eq!(header["authorName"], "Patch Author");
    assert_eq!(header["authorEmail"], "author@example.com");
    assert_eq!(header["authorTime"], "2019-06-20T14:28:33Z");
    assert_eq!(header["authorTimeOffset"], "+12:00");
    assert_eq!(header["base"], parent.as_str());

    // AND: updates carry both sides only in the full patch
    assert_eq!(
        full[DIFF_KEY][DATASET]["meta"]["title"],
        json!({"-": "Old", "+": "New"})
    );
    assert_eq!(
        minimal[DIFF_KEY][DATASET]["meta"]["title"],
        json!({"*": "New"})
    );
    assert_eq!(
        minimal[DIFF_KEY][DATASET]["feature"][1],
        json!({"+": point(9, "nine")})
    );
}
