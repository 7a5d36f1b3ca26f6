//! Failure taxonomy for the adapter layer.

use promptsmith_core::error::CoreError;

/// Categorized failure of an upstream model call.
///
/// [`AdapterError::is_transient`] drives the single automatic retry the
/// generating stage grants timeouts and network failures; everything else is
/// final at the adapter level.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The request exceeded the configured timeout.
    #[error("{0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset).
    #[error("{0}")]
    Network(String),

    /// The upstream service answered with an error status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The upstream refused the request on safety grounds.
    #[error("{0}")]
    SafetyRejection(String),

    /// The response arrived but did not match the expected shape.
    #[error("{0}")]
    MalformedOutput(String),

    /// The adapter cannot run at all (no API key configured).
    #[error("{0}")]
    Unavailable(String),
}

impl AdapterError {
    /// Whether a single automatic retry is warranted.
    pub fn is_transient(&self) -> bool {
        matches!(self, AdapterError::Timeout(_) | AdapterError::Network(_))
    }

    /// Categorize a reqwest transport failure.
    pub fn from_reqwest(err: reqwest::Error, what: &str) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(format!("{what} timed out"))
        } else {
            AdapterError::Network(format!("{what} failed: {err}"))
        }
    }
}

/// Map an upstream image-endpoint error status to a category. Safety
/// rejections hide behind 400s whose message mentions the moderation system.
pub fn classify_image_failure(status: u16, message: &str) -> AdapterError {
    let lowered = message.to_lowercase();
    if (400..500).contains(&status)
        && ["safety", "content_policy", "content policy", "moderation"]
            .iter()
            .any(|marker| lowered.contains(marker))
    {
        return AdapterError::SafetyRejection(format!("Image request rejected by safety system: {message}"));
    }
    AdapterError::Upstream {
        status,
        message: message.to_string(),
    }
}

impl From<AdapterError> for CoreError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Timeout(msg) => CoreError::UpstreamTimeout(msg),
            AdapterError::SafetyRejection(msg) => CoreError::SafetyRejection(msg),
            AdapterError::Network(msg) | AdapterError::MalformedOutput(msg) | AdapterError::Unavailable(msg) => {
                CoreError::Upstream(msg)
            }
            upstream @ AdapterError::Upstream { .. } => CoreError::Upstream(upstream.to_string()),
        }
    }
}
