//! Handler for the compare pipeline.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptsmith_core::types::Verdict;
use promptsmith_store::records::{CompareArtifacts, CompareExplanation, ComparisonReportRecord};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub project_id: String,
    pub candidate_commit_id: String,
    #[serde(default)]
    pub baseline_commit_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompareScores {
    pub pixel_diff_score: f64,
    pub semantic_similarity: Option<f64>,
    pub vision_structural_score: Option<f64>,
    pub drift_score: f64,
    pub threshold: f64,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub report_id: String,
    pub project_id: String,
    pub baseline_commit_id: String,
    pub candidate_commit_id: String,
    pub scores: CompareScores,
    pub verdict: Verdict,
    pub degraded: bool,
    pub explanation: CompareExplanation,
    pub artifacts: CompareArtifacts,
    pub created_at: String,
}

fn to_response(report: ComparisonReportRecord) -> CompareResponse {
    CompareResponse {
        report_id: report.report_id,
        project_id: report.project_id,
        baseline_commit_id: report.baseline_commit_id,
        candidate_commit_id: report.candidate_commit_id,
        scores: CompareScores {
            pixel_diff_score: report.pixel_diff_score,
            semantic_similarity: report.semantic_similarity,
            vision_structural_score: report.vision_structural_score,
            drift_score: report.drift_score,
            threshold: report.threshold,
        },
        verdict: report.verdict,
        degraded: report.degraded,
        explanation: report.explanation,
        artifacts: report.artifacts,
        created_at: report.created_at,
    }
}

// ---------------------------------------------------------------------------
// POST /compare
// ---------------------------------------------------------------------------

/// Run the three-signal comparison and return the persisted report.
pub async fn compare(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CompareRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.project_id.trim().is_empty() || body.candidate_commit_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "project_id and candidate_commit_id must not be empty".into(),
        ));
    }

    let report = state
        .compare
        .compare(&body.project_id, &body.candidate_commit_id, body.baseline_commit_id)
        .await?;
    Ok(Json(to_response(report)))
}
