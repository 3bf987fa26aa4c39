//! Operation intents: the unit of decision.
//!
//! An [`OperationIntent`] describes something the agent wants to do but has
//! not done yet. Upstream collaborators are responsible for parsing raw tool
//! calls into this canonical shape; the engine only validates that the
//! required fields are present.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::types::IntentId;

/// Broad category of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Create, edit, or delete files.
    Filesystem,
    /// Version-control actions (commit, push, branch, ...).
    VersionControl,
    /// Shell or process invocation.
    ProcessInvocation,
    /// Anything reaching outside the workspace (network, third-party APIs).
    External,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filesystem => write!(f, "filesystem"),
            Self::VersionControl => write!(f, "version_control"),
            Self::ProcessInvocation => write!(f, "process_invocation"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Caller-supplied hints about the circumstances of an intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct IntentContext {
    /// Part of a larger homogeneous batch.
    pub is_batch_member: bool,
    /// The human explicitly asked for this operation.
    pub is_user_requested: bool,
    /// Produced by an automated fixer (formatter, linter autofix).
    pub is_automated_fix: bool,
    /// The agent has not performed this kind of operation before.
    pub is_first_time_operation: bool,
    /// A similar operation failed recently, as observed by the caller.
    pub has_recent_failure: bool,
    /// Touches a path the caller considers critical.
    pub is_critical_path: bool,
}

/// A proposed operation awaiting a decision.
///
/// # Example
///
/// ```
/// use tollgate_core::{OperationIntent, OperationKind};
///
/// let intent = OperationIntent::file("edit", "src/app.js");
/// assert_eq!(intent.kind, OperationKind::Filesystem);
/// assert!(intent.validate().is_ok());
/// assert_eq!(intent.key().to_string(), "filesystem:edit:src/app.js");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationIntent {
    /// Opaque identifier, generated when the caller does not supply one.
    #[serde(default)]
    pub id: IntentId,
    /// Operation category.
    pub kind: OperationKind,
    /// Target path for filesystem and version-control operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    /// Literal command string for process invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_text: Option<String>,
    /// Short verb describing the intent (`create`, `edit`, `push`, ...).
    pub action: String,
    /// Circumstantial hints.
    #[serde(default)]
    pub context: IntentContext,
}

impl OperationIntent {
    /// Create an intent of the given kind with no target yet.
    #[must_use]
    pub fn new(kind: OperationKind, action: impl Into<String>) -> Self {
        Self {
            id: IntentId::generate(),
            kind,
            target_path: None,
            command_text: None,
            action: action.into(),
            context: IntentContext::default(),
        }
    }

    /// Filesystem intent on a path.
    #[must_use]
    pub fn file(action: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(OperationKind::Filesystem, action).with_target_path(path)
    }

    /// Version-control intent, optionally scoped to a path.
    #[must_use]
    pub fn version_control(action: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(OperationKind::VersionControl, action).with_target_path(path)
    }

    /// Process invocation of a literal command line.
    #[must_use]
    pub fn command(command: impl Into<String>) -> Self {
        Self::new(OperationKind::ProcessInvocation, "execute").with_command_text(command)
    }

    /// Decode an intent from its JSON wire form and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if the JSON is not an intent record
    /// (including a missing `kind`), or [`CoreError::MalformedIntent`] if
    /// neither a target path nor a command is present.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let intent: Self = serde_json::from_str(json)?;
        intent.validate()?;
        Ok(intent)
    }

    /// Replace the identifier with a caller-assigned one.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = IntentId::new(id);
        self
    }

    /// Set the target path.
    #[must_use]
    pub fn with_target_path(mut self, path: impl Into<String>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    /// Set the command text.
    #[must_use]
    pub fn with_command_text(mut self, command: impl Into<String>) -> Self {
        self.command_text = Some(command.into());
        self
    }

    /// Replace the context hints.
    #[must_use]
    pub fn with_context(mut self, context: IntentContext) -> Self {
        self.context = context;
        self
    }

    /// Check the structural invariant: at least one of `target_path` and
    /// `command_text` is present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedIntent`] when the invariant fails.
    pub fn validate(&self) -> CoreResult<()> {
        let has_path = self.target_path.as_deref().is_some_and(|p| !p.trim().is_empty());
        let has_command = self
            .command_text
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if has_path || has_command {
            Ok(())
        } else {
            Err(CoreError::MalformedIntent {
                intent_id: self.id.to_string(),
                reason: "one of target_path or command_text is required".to_string(),
            })
        }
    }

    /// The target used for identity: the path when present, else the command.
    #[must_use]
    pub fn target(&self) -> &str {
        self.target_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.command_text.as_deref())
            .unwrap_or_default()
    }

    /// Derive the coarse history identity of this intent. The action is
    /// lowercased, matching how batches group intents.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey {
            kind: self.kind,
            action: self.action.to_lowercase(),
            target: self.target().to_string(),
        }
    }
}

impl fmt::Display for OperationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind, self.action, self.target())
    }
}

/// Coarse identity of an operation, used to aggregate history.
///
/// Two intents with different ids but the same kind, action, and target
/// share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationKey {
    /// Operation category.
    pub kind: OperationKind,
    /// Action verb, lowercased.
    pub action: String,
    /// Path or command text.
    pub target: String,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.action, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_intent_is_valid() {
        let intent = OperationIntent::file("create", "src/lib.rs");
        assert!(intent.validate().is_ok());
        assert_eq!(intent.target(), "src/lib.rs");
    }

    #[test]
    fn test_command_intent_is_valid() {
        let intent = OperationIntent::command("cargo test");
        assert_eq!(intent.kind, OperationKind::ProcessInvocation);
        assert_eq!(intent.action, "execute");
        assert_eq!(intent.target(), "cargo test");
        assert!(intent.validate().is_ok());
    }

    #[test]
    fn test_missing_target_and_command_is_malformed() {
        let intent = OperationIntent::new(OperationKind::Filesystem, "edit");
        let err = intent.validate().unwrap_err();
        assert!(matches!(err, CoreError::MalformedIntent { .. }));
    }

    #[test]
    fn test_blank_target_is_malformed() {
        let intent = OperationIntent::file("edit", "   ");
        assert!(intent.validate().is_err());
    }

    #[test]
    fn test_key_ignores_id() {
        let a = OperationIntent::file("edit", "README.md").with_id("a");
        let b = OperationIntent::file("edit", "README.md").with_id("b");
        assert_ne!(a.id, b.id);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_ignores_action_case() {
        let upper = OperationIntent::file("Edit", "src/lib.rs");
        let lower = OperationIntent::file("edit", "src/lib.rs");
        assert_eq!(upper.key(), lower.key());
        assert_eq!(upper.key().action, "edit");
    }

    #[test]
    fn test_key_keeps_target_case() {
        let a = OperationIntent::file("edit", "README.md");
        let b = OperationIntent::file("edit", "readme.md");
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_key_prefers_path_over_command() {
        let intent = OperationIntent::version_control("push", "origin/main")
            .with_command_text("git push origin main");
        assert_eq!(intent.key().target, "origin/main");
    }

    #[test]
    fn test_from_json_generates_id_and_defaults_context() {
        let intent = OperationIntent::from_json(
            r#"{"kind":"filesystem","action":"edit","target_path":"src/app.js"}"#,
        )
        .unwrap();
        assert!(intent.id.as_str().starts_with("intent-"));
        assert_eq!(intent.context, IntentContext::default());
    }

    #[test]
    fn test_from_json_reads_context_flags() {
        let intent = OperationIntent::from_json(
            r#"{"id":"call-7","kind":"process_invocation","action":"execute",
                "command_text":"npm test","context":{"has_recent_failure":true}}"#,
        )
        .unwrap();
        assert_eq!(intent.id.as_str(), "call-7");
        assert!(intent.context.has_recent_failure);
        assert!(!intent.context.is_batch_member);
    }

    #[test]
    fn test_from_json_missing_kind_is_decode_error() {
        let err = OperationIntent::from_json(r#"{"action":"edit","target_path":"a"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Decode(_)));
    }

    #[test]
    fn test_from_json_missing_target_is_malformed() {
        let err = OperationIntent::from_json(r#"{"kind":"external","action":"fetch"}"#).unwrap_err();
        assert!(matches!(err, CoreError::MalformedIntent { .. }));
    }
}
