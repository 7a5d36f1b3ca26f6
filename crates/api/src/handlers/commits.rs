//! Handler for commit subtree deletion.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteCommitParams {
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteCommitResponse {
    pub project_id: String,
    pub deleted_commit_ids: Vec<String>,
    pub deleted_report_ids: Vec<String>,
    pub deleted_image_objects: usize,
    pub active_baseline_commit_id: Option<String>,
}

// ---------------------------------------------------------------------------
// DELETE /commits/{commit_id}?project_id=...
// ---------------------------------------------------------------------------

/// Delete a commit and its whole descendant subtree, cascading to reports
/// and blobs. Idempotent: re-deleting yields empty id lists.
pub async fn delete_commit_subtree(
    State(state): State<AppState>,
    Path(commit_id): Path<String>,
    Query(params): Query<DeleteCommitParams>,
) -> ApiResult<impl IntoResponse> {
    let project_id = params
        .project_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("project_id query parameter is required".into()))?;

    let result = state.repository.delete_commit_subtree(&project_id, &commit_id)?;
    Ok(Json(DeleteCommitResponse {
        project_id,
        deleted_commit_ids: result.deleted_commit_ids,
        deleted_report_ids: result.deleted_report_ids,
        deleted_image_objects: result.deleted_image_objects,
        active_baseline_commit_id: result.active_baseline_commit_id,
    }))
}
