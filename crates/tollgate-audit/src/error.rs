//! Audit-related error types.

use thiserror::Error;

/// Errors raised by audit sinks.
///
/// These never reach the decision pipeline: [`AuditTrail`](crate::AuditTrail)
/// downgrades them to warnings.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing file could not be opened, written, or read.
    #[error("audit IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be encoded or decoded.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Any other storage failure.
    #[error("storage error: {0}")]
    StorageError(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
