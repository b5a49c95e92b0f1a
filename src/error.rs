// Error handling module
// Defines the error taxonomy surfaced by the API client

use thiserror::Error;

/// Errors that can occur while executing an API call
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request path could not be joined against the base URL.
    /// A programming error in the descriptor, never retried.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// No response was received from the server
    #[error("network request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// Server rejected the access token (401).
    /// Handled internally via refresh + retry; callers only see this
    /// variant if the refresh machinery is bypassed.
    #[error("unauthorized")]
    Unauthorized,

    /// The session cannot be recovered; stored credentials were cleared
    /// and the user must log in again
    #[error("session expired, please log in again")]
    SessionExpired,

    /// Server answered with a non-2xx status that is not an auth failure
    #[error("server error: {status} - {message}")]
    Server { status: u16, message: String },
}

impl ApiError {
    /// Whether this error forces a return to the unauthenticated state
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
