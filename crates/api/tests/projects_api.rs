//! Integration tests for project upsert, listing, and cascade deletion.

mod common;

use axum::http::StatusCode;
use common::{body_json, delete, error_code, get, post_json, seed_commit};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: POST /projects creates then upserts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upsert_reports_creation_exactly_once() {
    let harness = common::build_test_app();

    let response = post_json(&harness.app, "/projects", json!({"project_id": "p", "name": "Demo"})).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["project_id"], "p");
    assert_eq!(json["name"], "Demo");
    assert_eq!(json["created"], true);
    assert!(json["active_baseline_commit_id"].is_null());

    let response = post_json(&harness.app, "/projects", json!({"project_id": "p"})).await;
    let json = body_json(response).await;
    assert_eq!(json["created"], false);
    assert_eq!(json["name"], "Demo");
}

// ---------------------------------------------------------------------------
// Test: GET /projects lists what exists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_contains_upserted_projects() {
    let harness = common::build_test_app();
    post_json(&harness.app, "/projects", json!({"project_id": "a"})).await;
    post_json(&harness.app, "/projects", json!({"project_id": "b"})).await;

    let json = body_json(get(&harness.app, "/projects").await).await;
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
}

// ---------------------------------------------------------------------------
// Test: validation failures use the error envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_project_id_is_invalid_request() {
    let harness = common::build_test_app();
    let response = post_json(&harness.app, "/projects", json!({"project_id": "  "})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_REQUEST");
}

#[tokio::test]
async fn malformed_body_is_invalid_request() {
    let harness = common::build_test_app();
    let response = post_json(&harness.app, "/projects", json!({"name": 42})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "INVALID_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: DELETE /projects/{id} cascades
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_project_cascades_commits_and_blobs() {
    let harness = common::build_test_app();
    let root = seed_commit(&harness.repository, "p", None, [10, 20, 30]);
    seed_commit(&harness.repository, "p", Some(&root.commit_id), [40, 50, 60]);

    let response = delete(&harness.app, "/projects/p").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["project_id"], "p");
    assert_eq!(json["deleted_commit_ids"].as_array().unwrap().len(), 2);
    assert!(json["deleted_image_objects"].as_u64().unwrap() >= 2);

    // The project is gone: history now 404s.
    let response = get(&harness.app, "/history?project_id=p").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "PROJECT_NOT_FOUND");
}

#[tokio::test]
async fn delete_missing_project_is_not_found() {
    let harness = common::build_test_app();
    let response = delete(&harness.app, "/projects/ghost").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "PROJECT_NOT_FOUND");
}
