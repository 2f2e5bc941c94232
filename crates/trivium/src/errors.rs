//! Shared error types and utilities for the trivium project.

pub use color_eyre::Report;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Failed to install color_eyre")]
    ColorEyre(#[from] color_eyre::Report),
    #[error("Failed to install tracing-subscriber")]
    TracingSubscriber(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Error kinds for session operations.
///
/// Every failure in the engine is one of these six kinds. On the message
/// channel all of them surface as a single `error` message carrying the
/// display string; on the HTTP surface each kind maps to a status code
/// (handled by the backend's response layer).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Session or quiz does not exist (or has expired, which is
    /// indistinguishable).
    #[error("{0}")]
    NotFound(String),
    /// A non-host attempted a host-only operation.
    #[error("{0}")]
    Forbidden(String),
    /// The operation conflicts with current state (duplicate answer,
    /// closed session, invalid status transition).
    #[error("{0}")]
    Conflict(String),
    /// Unparseable payload, unknown question type, or malformed question.
    #[error("{0}")]
    Invalid(String),
    /// The session store could not complete the operation.
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    /// Stored session state failed to deserialize.
    #[error("session state corrupt: {0}")]
    Corrupt(String),
}

impl SessionError {
    pub fn session_not_found() -> Self {
        Self::NotFound("Session not found".to_string())
    }

    pub fn quiz_not_found() -> Self {
        Self::NotFound("Quiz not found".to_string())
    }
}
