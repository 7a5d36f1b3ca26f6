//! Shared application router builder.
//!
//! Both the production binary and the integration tests build the router
//! through [`build_app_router`], so they exercise the same middleware stack.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error;
use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`].
///
/// The middleware stack is applied bottom-up:
///
/// 1. Error envelope (injects the request id into error bodies)
/// 2. Panic recovery
/// 3. Request timeout
/// 4. Structured request/response tracing
/// 5. Propagate request ID to the response
/// 6. Set request ID on incoming requests
/// 7. CORS
pub fn build_app_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.settings.cors_origins);
    let request_id_header = HeaderName::from_static("x-request-id");

    let image_prefix = state.repository.blobs().image_url_base();
    let image_dir = state.settings.image_dir.clone();
    let artifact_dir = state.settings.artifact_dir.clone();
    let request_timeout = Duration::from_secs(state.settings.request_timeout_secs);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::api_routes())
        // Generated images and report artifacts are served statically from
        // the storage roots; blob-store URLs point here.
        .nest_service(image_prefix.as_str(), ServeDir::new(image_dir))
        .nest_service("/artifacts", ServeDir::new(artifact_dir))
        // -- Middleware stack (applied bottom-up) --
        .layer(axum::middleware::from_fn(error::error_envelope))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// Build the CORS middleware layer. Panics at startup on an invalid origin;
/// misconfiguration should fail fast.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<_> = origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600))
}
