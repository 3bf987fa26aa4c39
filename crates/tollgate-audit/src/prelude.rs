//! Prelude module - commonly used types for convenient import.
//!
//! Use `use tollgate_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Entries
pub use crate::{AuditAction, AuditEntry, AuditEntryId};

// Storage
pub use crate::{AuditSink, AuditTrail, JsonlAuditSink, MemoryAuditSink};
