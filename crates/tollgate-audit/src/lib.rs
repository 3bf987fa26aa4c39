//! Tollgate Audit - Append-only record of approval decisions.
//!
//! This crate provides:
//! - [`AuditEntry`] values for decisions, reported outcomes, and session
//!   boundaries
//! - The [`AuditSink`] storage trait with a bounded in-memory backend and a
//!   JSON-lines file backend
//! - [`AuditTrail`], the front the engine writes through, which never lets
//!   a storage failure reach the decision pipeline
//!
//! # Example
//!
//! ```
//! use tollgate_audit::{AuditEntry, AuditTrail};
//! use tollgate_core::{Decision, OperationIntent, Timestamp};
//!
//! let trail = AuditTrail::in_memory(1_000);
//! let intent = OperationIntent::file("edit", "src/app.js");
//!
//! trail.record(&AuditEntry::decision(
//!     Timestamp::now(),
//!     None,
//!     intent.id.clone(),
//!     intent.key(),
//!     Decision::AutoApprove,
//!     Some(0.05),
//! ));
//!
//! assert_eq!(trail.len(), 1);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod entry;
mod error;
mod sink;
mod trail;

pub use entry::{AuditAction, AuditEntry, AuditEntryId};
pub use error::{AuditError, AuditResult};
pub use sink::{AuditSink, JsonlAuditSink, MemoryAuditSink};
pub use trail::{AuditTrail, DEFAULT_CAPACITY};
