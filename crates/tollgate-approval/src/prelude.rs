//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_approval::prelude::*;` to import all essential types.

// Errors
pub use crate::{ApprovalError, ApprovalResult};

// Engine
pub use crate::{ApprovalEngine, DecisionRecord, EngineBuilder};

// Batches
pub use crate::{BatchOutcome, BatchType, GroupReport};

// Sessions
pub use crate::{SessionEndReason, SessionStatus, SessionSummary};

// Scoring
pub use crate::{Classification, RiskScore};
