//! Handler for cursor-paginated commit history.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptsmith_core::types::CommitStatus;
use promptsmith_store::records::CommitRecord;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Hard ceiling on the page size.
pub const MAX_HISTORY_LIMIT: i64 = 50;
/// Page size when the client does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub commit_id: String,
    pub prompt: String,
    pub model: String,
    pub status: CommitStatus,
    pub parent_commit_id: Option<String>,
    pub image_paths: Vec<String>,
    pub error: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
    pub next_cursor: Option<String>,
    pub active_baseline_commit_id: Option<String>,
}

fn to_item(commit: CommitRecord) -> HistoryItem {
    HistoryItem {
        commit_id: commit.commit_id,
        prompt: commit.prompt,
        model: commit.model,
        status: commit.status,
        parent_commit_id: commit.parent_commit_id,
        image_paths: commit.image_paths,
        error: commit.error,
        created_at: commit.created_at,
    }
}

// ---------------------------------------------------------------------------
// GET /history
// ---------------------------------------------------------------------------

/// Newest-first commit history for a project. `limit` must be in `1..=50`
/// (default 20); the cursor is the last commit id of the previous page.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let project_id = params
        .project_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("project_id query parameter is required".into()))?;

    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let (commits, next_cursor) =
        state
            .repository
            .list_history(&project_id, limit as usize, params.cursor.as_deref())?;
    let project = state.repository.get_project(&project_id)?;

    Ok(Json(HistoryResponse {
        items: commits.into_iter().map(to_item).collect(),
        next_cursor,
        active_baseline_commit_id: project.active_baseline_commit_id,
    }))
}
