//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult};

// Intents
pub use crate::{IntentContext, OperationIntent, OperationKey, OperationKind};

// Common types
pub use crate::{Decision, IntentId, RiskLevel, SessionId, Timestamp};

// Time
pub use crate::{Clock, SystemClock};
