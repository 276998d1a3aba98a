//! Error types for the completion client and the chat controller.

use thiserror::Error;

/// Errors raised while talking to the completion service.
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),

    /// Invalid base URL or endpoint path.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A buffered reply carried no `choices[0].message.content`.
    #[error("Completion reply contained no message content")]
    MissingContent,
}

/// Reasons a chat submission is refused before any request is made.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The message was empty after trimming.
    #[error("message is empty")]
    Empty,

    /// A previous exchange is still in flight.
    #[error("a reply is still pending")]
    Busy,
}

/// Result type alias for completion client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
