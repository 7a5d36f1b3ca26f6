//! Application error type and the wire error envelope.
//!
//! Every error response has the shape
//! `{"error": {"code": ..., "message": ..., "request_id": ...}}`.
//! [`ApiError::into_response`] stores the code and message in the response
//! extensions; the [`error_envelope`] middleware injects the request id from
//! the `x-request-id` header and writes the final body.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use promptsmith_core::error::CoreError;

/// Application-level error for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain-level error carrying its wire code.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("{0}")]
    BadRequest(String),

    /// An unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}

/// Convenience type alias for handler return values.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error payload stashed in response extensions for the envelope middleware.
#[derive(Debug, Clone)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// HTTP status for a domain error.
fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ProjectNotFound(_) | CoreError::CommitNotFound(_) | CoreError::EvalRunNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CoreError::BaselineNotSet(_) | CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoreError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
        CoreError::SafetyRejection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::StorageWrite(_) | CoreError::ComparePipeline(_) | CoreError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Core(core) => {
                let status = status_for(&core);
                if status.is_server_error() {
                    tracing::error!(code = core.code(), error = %core, "Request failed");
                }
                (status, core.code(), core.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "Unexpected internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMPARE_PIPELINE_FAILED",
                    "Unexpected backend error.".to_string(),
                )
            }
        };

        // Placeholder request id; the envelope middleware rewrites the body
        // with the real one.
        let body = json!({
            "error": {
                "code": code,
                "message": message,
                "request_id": "req_unknown",
            }
        });
        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(ErrorBody { code, message });
        response
    }
}

/// Middleware that rewrites error bodies with the request id assigned by the
/// request-id layer.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("req_unknown")
        .to_string();

    let response = next.run(request).await;
    let Some(body) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };

    let status = response.status();
    let envelope = json!({
        "error": {
            "code": body.code,
            "message": body.message,
            "request_id": request_id,
        }
    });
    (status, axum::Json(envelope)).into_response()
}
