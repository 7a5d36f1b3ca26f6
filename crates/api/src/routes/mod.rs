pub mod health;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the API route tree.
///
/// ```text
/// POST   /projects                 ensure project (upsert)
/// GET    /projects                 list projects
/// DELETE /projects/{project_id}    cascade delete project
/// POST   /generate                 one-shot generation commit
/// POST   /baseline                 set the active baseline
/// GET    /history                  cursor-paginated commit history
/// POST   /compare                  three-signal drift comparison
/// DELETE /commits/{commit_id}      delete a commit subtree
/// POST   /eval-runs                start an eval run
/// GET    /eval-runs/{run_id}       poll a run snapshot
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects",
            post(handlers::projects::upsert_project).get(handlers::projects::list_projects),
        )
        .route("/projects/{project_id}", delete(handlers::projects::delete_project))
        .route("/generate", post(handlers::generate::generate))
        .route("/baseline", post(handlers::baseline::set_baseline))
        .route("/history", get(handlers::history::history))
        .route("/compare", post(handlers::compare::compare))
        .route("/commits/{commit_id}", delete(handlers::commits::delete_commit_subtree))
        .route("/eval-runs", post(handlers::eval_runs::create_eval_run))
        .route("/eval-runs/{run_id}", get(handlers::eval_runs::get_eval_run))
}
