//! Shared fixtures for engine integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use serde_json::{json, Value};
use tempfile::TempDir;
use tessera_core::dataset::{write_dataset, DatasetState, Feature, PrimaryKey};
use tessera_core::diff::{DIFF_KEY, HEADER_KEY};
use tessera_core::object::ObjectId;
use tessera_core::tree::TreeBuilder;
use tessera_engine::{InitOptions, Repository};

pub const DATASET: &str = "nz_pa_points_topo_150k";
pub const GEOM: &str = "0101000000000000000000F03F000000000000F03F";

pub fn init_repo(dir: &TempDir, working_copy: bool) -> Repository {
    Repository::init(
        dir.path(),
        &InitOptions {
            user_name: Some("Test User".to_string()),
            user_email: Some("test@example.com".to_string()),
            working_copy,
            ..InitOptions::default()
        },
    )
    .unwrap()
}

pub fn schema() -> Value {
    json!([
        {"name": "fid", "dataType": "integer", "primaryKeyIndex": 0},
        {"name": "geom", "dataType": "geometry", "geometryType": "POINT"},
        {"name": "name", "dataType": "text"}
    ])
}

pub fn point(fid: i64, name: &str) -> Feature {
    serde_json::from_value(json!({"fid": fid, "geom": GEOM, "name": name})).unwrap()
}

pub fn points_state(title: &str, fids: impl IntoIterator<Item = i64>) -> DatasetState {
    let mut state = DatasetState::default();
    state.meta.insert("title".to_string(), json!(title));
    state.meta.insert("schema.json".to_string(), schema());
    for fid in fids {
        state
            .features
            .insert(PrimaryKey::Int(fid), point(fid, &format!("point {}", fid)));
    }
    state
}

/// Commit `state` as dataset `name` on top of HEAD and check it out
pub fn commit_dataset(
    repo: &mut Repository,
    name: &str,
    state: &DatasetState,
    message: &str,
) -> ObjectId {
    let head = repo.resolve("HEAD").unwrap();
    let base_tree = repo.read_commit(&head).unwrap().tree;
    let tree = {
        let mut builder = TreeBuilder::new(repo.store(), Some(base_tree));
        write_dataset(&mut builder, name, state).unwrap();
        builder.write().unwrap()
    };
    let id = repo.commit_on_head(tree, message).unwrap();
    repo.reset_working_copy().unwrap();
    id
}

/// A repository holding one points dataset with features 1 to 5
pub fn points_repo(dir: &TempDir, working_copy: bool) -> Repository {
    let mut repo = init_repo(dir, working_copy);
    commit_dataset(&mut repo, DATASET, &points_state("Old", 1..=5), "Import points");
    repo
}

pub fn patch_bytes(datasets: Value, message: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        DIFF_KEY: datasets,
        HEADER_KEY: {
            "message": message,
            "authorName": "Patch Author",
            "authorEmail": "author@example.com",
            "authorTime": "2019-06-20T14:28:33Z",
            "authorTimeOffset": "+12:00"
        }
    }))
    .unwrap()
}

pub fn retitle_patch(old: &str, new: &str) -> Vec<u8> {
    patch_bytes(
        json!({DATASET: {"meta": {"title": {"-": old, "+": new}}}}),
        "Retitle",
    )
}
