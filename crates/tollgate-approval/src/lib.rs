//! Tollgate Approval - Decides whether proposed agent operations may run
//! unattended.
//!
//! This crate provides:
//! - [`PatternMatcher`]: absolute deny signatures and allow-lists that
//!   short-circuit scoring
//! - [`RiskAssessor`]: base, context, and history scoring per
//!   [`OperationKey`](tollgate_core::OperationKey)
//! - [`DecisionPolicy`]: threshold tiers with ordered contextual rules
//! - [`BatchCoordinator`]: grouping and batch-type detection
//! - [`SessionManager`]: time-boxed autonomous sessions with summaries
//! - [`ApprovalEngine`]: the façade that ties them together and writes every
//!   decision to the audit trail
//!
//! # Example
//!
//! ```
//! use tollgate_approval::ApprovalEngine;
//! use tollgate_config::Config;
//! use tollgate_core::{Decision, OperationIntent};
//!
//! let engine = ApprovalEngine::new(&Config::default()).unwrap();
//!
//! let record = engine.decide(&OperationIntent::command("git status")).unwrap();
//! assert_eq!(record.decision, Decision::AutoApprove);
//!
//! let record = engine.decide(&OperationIntent::command("sudo rm -rf /")).unwrap();
//! assert_eq!(record.decision, Decision::BlockWithWarning);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod batch;
pub mod engine;
/// Error types and results for the approval engine.
pub mod error;
pub mod pattern;
pub mod policy;
pub mod risk;
pub mod session;
pub mod settings;

pub use batch::{BatchCoordinator, BatchGroup, BatchOutcome, BatchType, GroupKey, GroupReport};
pub use engine::{ApprovalEngine, DecisionRecord, EngineBuilder};
pub use error::{ApprovalError, ApprovalResult};
pub use pattern::{Classification, PatternMatcher};
pub use policy::{DecisionPolicy, Verdict};
pub use risk::{HistoryRecord, RiskAssessor, RiskScore, RiskWeights};
pub use session::{
    SessionEndReason, SessionLimits, SessionManager, SessionStatus, SessionSummary,
};
pub use settings::EngineSettings;
