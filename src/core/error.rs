//! Error types for the conversation relay core.
//!
//! The taxonomy separates fatal transport failures from recoverable
//! per-message conditions: only [`SessionError::ConnectionFailed`] ends a
//! session. Everything else is reported once (log line or lifecycle event)
//! and processing continues.

use thiserror::Error;

/// Errors that can occur during session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport could not be established or was lost
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed or incomplete control message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Audio payload could not be decoded
    #[error("Malformed audio: {0}")]
    MalformedAudio(String),

    /// Start timer fired outside AWAITING_START; indicates a defect, not a
    /// user-visible condition
    #[error("Scheduler misuse: {0}")]
    SchedulerMisuse(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Whether this error terminates the session.
    ///
    /// Per-message and per-frame errors are recovered locally; only
    /// connection loss is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::ConnectionFailed(_))
    }
}
