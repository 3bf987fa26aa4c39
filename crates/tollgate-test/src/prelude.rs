//! Prelude module - commonly used test helpers for convenient import.
//!
//! Use `use tollgate_test::prelude::*;` to import all essential helpers.

// Clock
pub use crate::ManualClock;

// Fixtures
pub use crate::{
    IntentBuilder, quiet_config, test_command, test_file_create, test_file_edit,
    test_malformed_intent,
};

// Logging
pub use crate::init_tracing;
