//! Handlers for project CRUD.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use promptsmith_store::records::ProjectRecord;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertProjectRequest {
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub project_id: String,
    pub name: String,
    pub active_baseline_commit_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct UpsertProjectResponse {
    #[serde(flatten)]
    pub project: ProjectResponse,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct ListProjectsResponse {
    pub items: Vec<ProjectResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub project_id: String,
    pub deleted_commit_ids: Vec<String>,
    pub deleted_report_ids: Vec<String>,
    pub deleted_image_objects: usize,
}

fn to_response(project: ProjectRecord) -> ProjectResponse {
    ProjectResponse {
        project_id: project.project_id,
        name: project.name,
        active_baseline_commit_id: project.active_baseline_commit_id,
        created_at: project.created_at,
        updated_at: project.updated_at,
    }
}

// ---------------------------------------------------------------------------
// POST /projects
// ---------------------------------------------------------------------------

/// Ensure a project exists; idempotent.
pub async fn upsert_project(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<UpsertProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    if body.project_id.trim().is_empty() {
        return Err(ApiError::BadRequest("project_id must not be empty".into()));
    }
    if body.name.as_deref().is_some_and(|name| name.is_empty()) {
        return Err(ApiError::BadRequest("name must not be empty when provided".into()));
    }

    let (project, created) = state
        .repository
        .upsert_project(&body.project_id, body.name.as_deref())?;
    Ok(Json(UpsertProjectResponse {
        project: to_response(project),
        created,
    }))
}

// ---------------------------------------------------------------------------
// GET /projects
// ---------------------------------------------------------------------------

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let projects = state.repository.list_projects()?;
    Ok(Json(ListProjectsResponse {
        items: projects.into_iter().map(to_response).collect(),
    }))
}

// ---------------------------------------------------------------------------
// DELETE /projects/{project_id}
// ---------------------------------------------------------------------------

/// Cascade delete a project with all its commits, reports, and blobs.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let result = state.repository.delete_project(&project_id)?;
    Ok(Json(DeleteProjectResponse {
        project_id: result.project_id,
        deleted_commit_ids: result.deleted_commit_ids,
        deleted_report_ids: result.deleted_report_ids,
        deleted_image_objects: result.deleted_image_objects,
    }))
}
