//! Layered merging of raw TOML trees.
//!
//! Merging happens before deserialization so that a key missing from an
//! overlay never clobbers the base layer with a struct default.

mod deep;
mod enforce;
mod path;
mod restrict;
mod types;

pub(crate) use deep::record_leaves;
pub use deep::{deep_merge, deep_merge_tracking};
pub use restrict::enforce_restrictions;
pub use types::{ConfigLayer, FieldSources};
