//! Error taxonomy for the chat engine.

use thiserror::Error;

/// Failures surfaced by the transport, the history store and the generation
/// controller.
///
/// Transport and decoder failures are caught at the controller boundary and
/// turned into a single error string plus a transition to
/// [`GenerationState::Failed`](crate::core::generation::GenerationState::Failed).
/// Nothing here is retried automatically; retrying is always a new explicit
/// send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The backend could not be reached (DNS, refused connection, timeout
    /// before response headers, or the connection dropped mid-stream).
    #[error("Cannot reach backend: {0}")]
    Connection(String),

    /// The backend answered with a non-success status before any body was
    /// streamed.
    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    /// The stream carried an explicit error record.
    #[error("{reason}")]
    StreamFailure { reason: String },

    /// The backend rejected the credentials. The session logs the auth
    /// provider out when it sees this.
    #[error("Session expired. Please log in again.")]
    AuthExpired,

    /// `start()` was called while another generation was still running.
    #[error("A generation is already in progress")]
    GenerationInProgress,

    /// A non-streaming endpoint returned a body that could not be decoded.
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    /// The caller cancelled the request. Never reported through the error
    /// channel.
    #[error("Request cancelled")]
    Cancelled,
}

impl ChatError {
    /// Map a reqwest failure that happened before a usable response arrived.
    pub fn from_request(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ChatError::InvalidResponse(err.to_string());
        }
        ChatError::Connection(err.to_string())
    }

    /// Map a non-success HTTP status. 401 is an authentication failure, not a
    /// generic server error.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            ChatError::AuthExpired
        } else {
            ChatError::Server {
                status: status.as_u16(),
            }
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ChatError::AuthExpired)
    }
}
