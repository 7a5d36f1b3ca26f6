//! Handler for single-shot generation.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptsmith_core::types::CommitStatus;

use crate::engine::generate::GenerateParams;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

/// Minimum prompt length accepted anywhere a prompt is supplied.
pub const MIN_PROMPT_LEN: usize = 5;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub project_id: String,
    pub prompt: String,
    pub model: String,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub parent_commit_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub commit_id: String,
    pub status: CommitStatus,
    pub prompt: String,
    pub parent_commit_id: Option<String>,
    pub image_paths: Vec<String>,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// POST /generate
// ---------------------------------------------------------------------------

/// Generate one image and persist it as a commit in the project lineage.
pub async fn generate(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<GenerateRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.project_id.trim().is_empty() {
        return Err(ApiError::BadRequest("project_id must not be empty".into()));
    }
    if body.prompt.chars().count() < MIN_PROMPT_LEN {
        return Err(ApiError::BadRequest(format!(
            "prompt must be at least {MIN_PROMPT_LEN} characters"
        )));
    }
    if body.model.trim().is_empty() {
        return Err(ApiError::BadRequest("model must not be empty".into()));
    }

    let commit = state
        .generation
        .generate(GenerateParams {
            project_id: body.project_id,
            prompt: body.prompt,
            model: body.model,
            seed: body.seed,
            parent_commit_id: body.parent_commit_id,
        })
        .await?;

    Ok(Json(GenerateResponse {
        commit_id: commit.commit_id,
        status: commit.status,
        prompt: commit.prompt,
        parent_commit_id: commit.parent_commit_id,
        image_paths: commit.image_paths,
        created_at: commit.created_at,
    }))
}
