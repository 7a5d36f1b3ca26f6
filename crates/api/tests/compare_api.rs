//! Integration tests for the compare pipeline.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, error_code, post_json, seed_commit, FailingSemantic, FailingStructural};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: identical images pass with near-zero drift
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_images_pass() {
    let harness = common::build_test_app();
    let baseline = seed_commit(&harness.repository, "p", None, [120, 40, 200]);
    let candidate = seed_commit(&harness.repository, "p", Some(&baseline.commit_id), [120, 40, 200]);
    post_json(
        &harness.app,
        "/baseline",
        json!({"project_id": "p", "commit_id": baseline.commit_id}),
    )
    .await;

    let response = post_json(
        &harness.app,
        "/compare",
        json!({"project_id": "p", "candidate_commit_id": candidate.commit_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["report_id"], "r0001");
    assert_eq!(json["baseline_commit_id"], baseline.commit_id.as_str());
    assert_eq!(json["verdict"], "pass");
    assert_eq!(json["degraded"], false);
    assert!(json["scores"]["pixel_diff_score"].as_f64().unwrap() <= 0.05);
    assert!(json["scores"]["drift_score"].as_f64().unwrap() <= 0.30);
    assert_eq!(json["scores"]["threshold"], 0.3);

    // Artifacts were persisted before the record and resolve to real files.
    for key in ["diff_heatmap", "overlay"] {
        let url = json["artifacts"][key].as_str().unwrap();
        let bytes = harness.repository.blobs().read_url(url).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    // Report ids are monotonic.
    let second = body_json(
        post_json(
            &harness.app,
            "/compare",
            json!({"project_id": "p", "candidate_commit_id": candidate.commit_id}),
        )
        .await,
    )
    .await;
    assert_eq!(second["report_id"], "r0002");
}

// ---------------------------------------------------------------------------
// Test: explicit baseline overrides the active one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn explicit_baseline_wins() {
    let harness = common::build_test_app();
    let active = seed_commit(&harness.repository, "p", None, [0, 0, 0]);
    let explicit = seed_commit(&harness.repository, "p", None, [255, 255, 255]);
    let candidate = seed_commit(&harness.repository, "p", None, [255, 255, 255]);
    post_json(
        &harness.app,
        "/baseline",
        json!({"project_id": "p", "commit_id": active.commit_id}),
    )
    .await;

    let json = body_json(
        post_json(
            &harness.app,
            "/compare",
            json!({
                "project_id": "p",
                "candidate_commit_id": candidate.commit_id,
                "baseline_commit_id": explicit.commit_id,
            }),
        )
        .await,
    )
    .await;
    assert_eq!(json["baseline_commit_id"], explicit.commit_id.as_str());
    assert_eq!(json["verdict"], "pass");
}

// ---------------------------------------------------------------------------
// Test: missing baseline is a 400
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_baseline_is_reported() {
    let harness = common::build_test_app();
    let candidate = seed_commit(&harness.repository, "p", None, [5, 5, 5]);

    let response = post_json(
        &harness.app,
        "/compare",
        json!({"project_id": "p", "candidate_commit_id": candidate.commit_id}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "BASELINE_NOT_SET");
}

// ---------------------------------------------------------------------------
// Test: missing semantic signal + high pixel drift fails, degraded
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_semantic_with_high_pixel_drift_fails() {
    let mut adapters = common::stub_adapters();
    adapters.semantic = Arc::new(FailingSemantic);
    let harness = common::build_test_app_with(adapters);

    // White baseline vs black candidate: pixel drift far above 0.70.
    let baseline = seed_commit(&harness.repository, "p", None, [255, 255, 255]);
    let candidate = seed_commit(&harness.repository, "p", None, [0, 0, 0]);
    post_json(
        &harness.app,
        "/baseline",
        json!({"project_id": "p", "commit_id": baseline.commit_id}),
    )
    .await;

    let json = body_json(
        post_json(
            &harness.app,
            "/compare",
            json!({"project_id": "p", "candidate_commit_id": candidate.commit_id}),
        )
        .await,
    )
    .await;
    assert_eq!(json["degraded"], true);
    assert_eq!(json["verdict"], "fail");
    assert!(json["scores"]["semantic_similarity"].is_null());
    assert!(json["scores"]["pixel_diff_score"].as_f64().unwrap() > 0.70);
    let notes = json["explanation"]["notes"].as_str().unwrap();
    assert!(notes.contains("semantic"));
}

// ---------------------------------------------------------------------------
// Test: missing signal + low pixel drift is inconclusive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_vision_with_low_pixel_drift_is_inconclusive() {
    let mut adapters = common::stub_adapters();
    adapters.structural = Arc::new(FailingStructural);
    let harness = common::build_test_app_with(adapters);

    let baseline = seed_commit(&harness.repository, "p", None, [80, 80, 80]);
    let candidate = seed_commit(&harness.repository, "p", None, [80, 80, 80]);
    post_json(
        &harness.app,
        "/baseline",
        json!({"project_id": "p", "commit_id": baseline.commit_id}),
    )
    .await;

    let json = body_json(
        post_json(
            &harness.app,
            "/compare",
            json!({"project_id": "p", "candidate_commit_id": candidate.commit_id}),
        )
        .await,
    )
    .await;
    assert_eq!(json["degraded"], true);
    assert_eq!(json["verdict"], "inconclusive");
    assert!(json["scores"]["vision_structural_score"].is_null());
    assert!(json["explanation"]["notes"].as_str().unwrap().contains("vision"));
}

// ---------------------------------------------------------------------------
// Test: candidates must be successful commits with images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_candidate_is_not_found() {
    let harness = common::build_test_app();
    let baseline = seed_commit(&harness.repository, "p", None, [1, 2, 3]);
    post_json(
        &harness.app,
        "/baseline",
        json!({"project_id": "p", "commit_id": baseline.commit_id}),
    )
    .await;

    let response = post_json(
        &harness.app,
        "/compare",
        json!({"project_id": "p", "candidate_commit_id": "c9999"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "COMMIT_NOT_FOUND");
}
