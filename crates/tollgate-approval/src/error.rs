use tollgate_core::{CoreError, SessionId};

/// Errors that can occur while deciding, batching, or managing sessions.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    /// A session start was requested while another session is active.
    #[error("autonomous session {active} is already active")]
    SessionConflict {
        /// The session currently holding the slot.
        active: SessionId,
    },

    /// A stop was requested while no session is active.
    #[error("no autonomous session is active")]
    NoActiveSession,

    /// The intent is missing required fields and was never scored.
    #[error(transparent)]
    MalformedIntent(#[from] CoreError),

    /// The requested session duration is zero or above the configured maximum.
    #[error("invalid session duration {requested_secs}s (maximum {max_secs}s)")]
    InvalidDuration {
        /// Requested duration, in seconds.
        requested_secs: u64,
        /// Configured maximum, in seconds.
        max_secs: u64,
    },

    /// Configuration could not be compiled into engine settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Storage backend error (audit log could not be opened, etc.).
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal engine error.
    #[error("internal approval error: {0}")]
    Internal(String),
}

impl From<tollgate_config::ConfigError> for ApprovalError {
    fn from(err: tollgate_config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<tollgate_audit::AuditError> for ApprovalError {
    fn from(err: tollgate_audit::AuditError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
