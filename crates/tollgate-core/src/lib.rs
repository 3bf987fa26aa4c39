//! Tollgate Core - Foundation types for the tollgate operation approval engine.
//!
//! This crate provides:
//! - The [`OperationIntent`] record an agent submits before acting
//! - The coarse [`OperationKey`] identity used for history lookups
//! - The [`Decision`] and [`RiskLevel`] vocabularies shared by every crate
//! - Identifier and [`Timestamp`] wrappers
//! - The [`Clock`] abstraction used for wall-clock dependent scoring
//!
//! It has no dependencies on other tollgate crates.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod clock;
pub mod error;
pub mod intent;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use intent::{IntentContext, OperationIntent, OperationKey, OperationKind};
pub use types::{Decision, IntentId, RiskLevel, SessionId, Timestamp};
