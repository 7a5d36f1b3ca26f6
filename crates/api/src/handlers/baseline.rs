//! Handler for setting the active baseline.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BaselineRequest {
    pub project_id: String,
    pub commit_id: String,
}

#[derive(Debug, Serialize)]
pub struct BaselineResponse {
    pub project_id: String,
    pub active_baseline_commit_id: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// POST /baseline
// ---------------------------------------------------------------------------

/// Point the project's active baseline at a successful commit.
pub async fn set_baseline(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BaselineRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.project_id.trim().is_empty() || body.commit_id.trim().is_empty() {
        return Err(ApiError::BadRequest("project_id and commit_id must not be empty".into()));
    }

    state.repository.ensure_project(&body.project_id)?;
    let project = state.repository.set_baseline(&body.project_id, &body.commit_id)?;
    Ok(Json(BaselineResponse {
        project_id: project.project_id,
        active_baseline_commit_id: project.active_baseline_commit_id.unwrap_or_default(),
        updated_at: project.updated_at,
    }))
}
