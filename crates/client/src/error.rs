use thiserror::Error;

/// Errors surfaced by the chat backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client-side pre-check failure, or a 400 from the backend.
    /// Pre-checks never produce a network request.
    #[error("{0}")]
    Validation(String),

    /// 401 — missing, expired, or invalid credential.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// 409 — conflicting resource state (username already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport-level failure with no usable server response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Any other non-success status.
    #[error("unexpected status {status}: {message}")]
    Unexpected { status: u16, message: String },
}

impl ApiError {
    /// True for 401-class failures, the session-expiry trigger.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}
