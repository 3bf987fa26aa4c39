//! Test fixtures for intents and configuration.

use tollgate_config::Config;
use tollgate_core::{IntentContext, OperationIntent, OperationKind};

/// Configuration with the wall-clock penalties switched off and a fixed UTC
/// offset, so scores do not depend on when or where tests run.
#[must_use]
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.risk.off_hours.enabled = false;
    config.risk.risky_day.weekday = None;
    config.risk.utc_offset_minutes = Some(0);
    config
}

/// A filesystem edit of `path`.
#[must_use]
pub fn test_file_edit(path: impl Into<String>) -> OperationIntent {
    OperationIntent::file("edit", path)
}

/// A filesystem create of `path`.
#[must_use]
pub fn test_file_create(path: impl Into<String>) -> OperationIntent {
    OperationIntent::file("create", path)
}

/// A shell command.
#[must_use]
pub fn test_command(command: impl Into<String>) -> OperationIntent {
    OperationIntent::command(command)
}

/// An intent with neither a target path nor a command.
#[must_use]
pub fn test_malformed_intent() -> OperationIntent {
    OperationIntent::new(OperationKind::Filesystem, "edit")
}

/// Builder for intents with specific context flags.
#[derive(Debug, Clone)]
pub struct IntentBuilder {
    intent: OperationIntent,
}

impl IntentBuilder {
    /// Start from a filesystem intent.
    #[must_use]
    pub fn file(action: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            intent: OperationIntent::file(action, path),
        }
    }

    /// Start from a shell command.
    #[must_use]
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            intent: OperationIntent::command(command),
        }
    }

    /// Use a fixed intent id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.intent = self.intent.with_id(id);
        self
    }

    /// Mark as a batch member.
    #[must_use]
    pub fn batch_member(mut self) -> Self {
        self.intent.context.is_batch_member = true;
        self
    }

    /// Mark as explicitly requested by the user.
    #[must_use]
    pub fn user_requested(mut self) -> Self {
        self.intent.context.is_user_requested = true;
        self
    }

    /// Mark as an automated fix.
    #[must_use]
    pub fn automated_fix(mut self) -> Self {
        self.intent.context.is_automated_fix = true;
        self
    }

    /// Mark as never seen before.
    #[must_use]
    pub fn first_time(mut self) -> Self {
        self.intent.context.is_first_time_operation = true;
        self
    }

    /// Mark as following a recent failure.
    #[must_use]
    pub fn recent_failure(mut self) -> Self {
        self.intent.context.has_recent_failure = true;
        self
    }

    /// Mark as touching a critical path.
    #[must_use]
    pub fn critical_path(mut self) -> Self {
        self.intent.context.is_critical_path = true;
        self
    }

    /// Replace the whole context.
    #[must_use]
    pub fn context(mut self, context: IntentContext) -> Self {
        self.intent.context = context;
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> OperationIntent {
        self.intent
    }
}
