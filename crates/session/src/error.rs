use surveyqa_client::ApiError;
use surveyqa_core::error::CoreError;

/// Errors raised by sessions, the save queue and the workspace.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A domain-level error from `surveyqa_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persistence API error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The save queue was created outside a tokio runtime.
    #[error("No async runtime available: {0}")]
    Runtime(String),

    /// Verification needs a server-assigned annotation id.
    #[error("Annotation for subject {0} has not been saved yet")]
    NotPersisted(String),
}

/// Convenience type alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;
