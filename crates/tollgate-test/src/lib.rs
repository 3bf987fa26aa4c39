//! Tollgate Test - Shared test utilities for the tollgate crates.
//!
//! This crate provides a controllable clock, intent fixtures, and a
//! deterministic configuration that can be used across tollgate crates as a
//! dev-dependency.
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! tollgate-test.workspace = true
//! ```
//!
//! Then use in your tests:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tollgate_approval::ApprovalEngine;
//! use tollgate_test::{ManualClock, quiet_config, test_file_edit};
//!
//! #[test]
//! fn test_decision() {
//!     let clock = Arc::new(ManualClock::default());
//!     let engine = ApprovalEngine::builder(quiet_config())
//!         .with_clock(clock.clone())
//!         .build()
//!         .unwrap();
//!
//!     engine.decide(&test_file_edit("src/app.js")).unwrap();
//!     clock.advance(Duration::from_secs(60));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod clock;
pub mod fixtures;

pub use clock::*;
pub use fixtures::*;

/// Install a test-friendly `tracing` subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `warn`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
