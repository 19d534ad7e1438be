//! Error types shared by the livewatch collaborators.

use thiserror::Error;

/// Errors returned by the external collaborators (room source, connector,
/// action senders).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network or HTTP level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body could not be understood.
    #[error("Malformed response: {0}")]
    Protocol(String),

    /// The endpoint answered with a documented non-success result code.
    #[error("Request rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The request was refused locally before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether the failure happened on the wire rather than in the payload.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Protocol(err.to_string())
    }
}
