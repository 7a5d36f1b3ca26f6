/// Domain error for Promptsmith operations.
///
/// Every variant maps onto one of the wire error codes returned in the
/// HTTP error envelope; [`CoreError::code`] is that mapping. HTTP status
/// selection lives in the API crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Project '{0}' was not found")]
    ProjectNotFound(String),

    #[error("{0}")]
    CommitNotFound(String),

    #[error("{0}")]
    BaselineNotSet(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    SafetyRejection(String),

    #[error("{0}")]
    StorageWrite(String),

    #[error("{0}")]
    ComparePipeline(String),

    #[error("Eval run '{0}' was not found")]
    EvalRunNotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// Convenience alias used throughout the workspace.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// The wire error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            CoreError::CommitNotFound(_) => "COMMIT_NOT_FOUND",
            CoreError::BaselineNotSet(_) => "BASELINE_NOT_SET",
            CoreError::InvalidRequest(_) => "INVALID_REQUEST",
            CoreError::UpstreamTimeout(_) => "OPENAI_TIMEOUT",
            CoreError::Upstream(_) => "OPENAI_UPSTREAM_ERROR",
            CoreError::SafetyRejection(_) => "OPENAI_SAFETY_REJECTION",
            CoreError::StorageWrite(_) => "STORAGE_WRITE_FAILED",
            CoreError::ComparePipeline(_) => "COMPARE_PIPELINE_FAILED",
            CoreError::EvalRunNotFound(_) => "EVAL_RUN_NOT_FOUND",
            CoreError::Internal(_) => "EVAL_RUN_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_wire_contract() {
        assert_eq!(
            CoreError::ProjectNotFound("p".into()).code(),
            "PROJECT_NOT_FOUND"
        );
        assert_eq!(CoreError::UpstreamTimeout("t".into()).code(), "OPENAI_TIMEOUT");
        assert_eq!(
            CoreError::SafetyRejection("s".into()).code(),
            "OPENAI_SAFETY_REJECTION"
        );
        assert_eq!(CoreError::Internal("x".into()).code(), "EVAL_RUN_FAILED");
    }

    #[test]
    fn display_includes_identifier_for_lookups() {
        let err = CoreError::ProjectNotFound("demo".into());
        assert!(err.to_string().contains("demo"));
    }
}
