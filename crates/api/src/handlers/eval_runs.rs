//! Handlers for eval run creation and polling.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use promptsmith_core::types::{Constraints, ObjectivePreset, Quality};

use crate::engine::eval::CreateRunParams;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::handlers::generate::MIN_PROMPT_LEN;
use crate::state::AppState;

/// Allowed variant counts per run.
const VALID_N_VARIANTS: std::ops::RangeInclusive<u8> = 2..=3;

fn default_n_variants() -> u8 {
    3
}

fn default_image_model() -> String {
    "gpt-image-1-mini".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CreateEvalRunRequest {
    pub project_id: String,
    pub base_prompt: String,
    #[serde(default)]
    pub objective_preset: ObjectivePreset,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_n_variants")]
    pub n_variants: u8,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub parent_commit_id: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
}

// ---------------------------------------------------------------------------
// POST /eval-runs
// ---------------------------------------------------------------------------

/// Validate and start an eval run. Returns the queued snapshot immediately;
/// the pipeline executes on its own task and is observed by polling.
pub async fn create_eval_run(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateEvalRunRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.project_id.trim().is_empty() {
        return Err(ApiError::BadRequest("project_id must not be empty".into()));
    }
    if body.base_prompt.chars().count() < MIN_PROMPT_LEN {
        return Err(ApiError::BadRequest(format!(
            "base_prompt must be at least {MIN_PROMPT_LEN} characters"
        )));
    }
    if !VALID_N_VARIANTS.contains(&body.n_variants) {
        return Err(ApiError::BadRequest(format!(
            "n_variants must be between {} and {}",
            VALID_N_VARIANTS.start(),
            VALID_N_VARIANTS.end()
        )));
    }
    if body.image_model.trim().is_empty() {
        return Err(ApiError::BadRequest("image_model must not be empty".into()));
    }

    let run = state.eval.create_run(CreateRunParams {
        project_id: body.project_id,
        base_prompt: body.base_prompt,
        objective_preset: body.objective_preset,
        image_model: body.image_model,
        n_variants: body.n_variants as usize,
        quality: body.quality,
        parent_commit_id: body.parent_commit_id,
        constraints: body.constraints,
    })?;

    tracing::info!(run_id = %run.run_id, project_id = %run.project_id, "Eval run queued");
    Ok(Json(run))
}

// ---------------------------------------------------------------------------
// GET /eval-runs/{run_id}
// ---------------------------------------------------------------------------

/// Snapshot read of the current run state.
pub async fn get_eval_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let run = state.eval.get_run(&run_id)?;
    Ok(Json(run))
}
