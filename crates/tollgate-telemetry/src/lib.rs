//! Tollgate Telemetry - Logging setup for the tollgate approval engine.
//!
//! The engine itself only emits `tracing` events. This crate is for the
//! host: it installs a global subscriber with a chosen format, target, and
//! filter.
//!
//! # Example
//!
//! ```rust,no_run
//! use tollgate_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), tollgate_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("tollgate_approval=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("approval engine starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
