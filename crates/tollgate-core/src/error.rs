//! Error types for intent validation.

use thiserror::Error;

/// Errors raised while validating or decoding operation intents.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The intent is missing a required field.
    #[error("malformed intent {intent_id}: {reason}")]
    MalformedIntent {
        /// Identifier of the offending intent (may be generated).
        intent_id: String,
        /// What is missing or invalid.
        reason: String,
    },

    /// The intent record could not be decoded at all.
    #[error("failed to decode intent: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
