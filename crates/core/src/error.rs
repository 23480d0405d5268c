use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Model API returned a non-retryable error (4xx, bad payload, auth).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Model API call timed out. Retryable.
    #[error("Provider timeout: {0}")]
    Timeout(String),

    /// Model API rejected the call with a rate limit. Retryable.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Model API returned a 5xx. Retryable.
    #[error("Provider server error: {0}")]
    ServerError(String),

    /// The vision service stayed unreachable after the retry budget.
    #[error("AI service unavailable: {0}")]
    AiUnavailable(String),

    /// The browser could not reach or load the target.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// An action was malformed or out of the observed viewport bounds.
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the gateway may retry the failed call once.
    ///
    /// Only model-side transient classes qualify; browser failures are
    /// never retried here because a repeated navigation has side effects.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::RateLimited(_) | Error::ServerError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
