//! Audit entry types and actions.
//!
//! Every decision the engine makes is recorded as an audit entry, along
//! with execution outcomes reported back by the host and autonomous session
//! boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use tollgate_core::{Decision, IntentId, OperationKey, SessionId, Timestamp};
use uuid::Uuid;

/// Unique identifier of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(pub Uuid);

impl AuditEntryId {
    /// Create a new random entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audit:{}", self.0)
    }
}

/// A single audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry identifier.
    pub id: AuditEntryId,
    /// When this entry was created.
    pub timestamp: Timestamp,
    /// Autonomous session active when the entry was written, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// What happened.
    pub action: AuditAction,
}

impl AuditEntry {
    /// Create an entry stamped with `timestamp`.
    #[must_use]
    pub fn new(timestamp: Timestamp, session_id: Option<SessionId>, action: AuditAction) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp,
            session_id,
            action,
        }
    }

    /// Shorthand for a decision entry.
    #[must_use]
    pub fn decision(
        timestamp: Timestamp,
        session_id: Option<SessionId>,
        intent_id: IntentId,
        operation: OperationKey,
        decision: Decision,
        risk_score: Option<f64>,
    ) -> Self {
        Self::new(
            timestamp,
            session_id,
            AuditAction::Decision {
                intent_id,
                operation,
                decision,
                risk_score,
            },
        )
    }

    /// The operation key this entry concerns, if any.
    #[must_use]
    pub fn operation(&self) -> Option<&OperationKey> {
        match &self.action {
            AuditAction::Decision { operation, .. } | AuditAction::Outcome { operation, .. } => {
                Some(operation)
            },
            AuditAction::SessionStarted { .. } | AuditAction::SessionEnded { .. } => None,
        }
    }
}

/// Actions that can be audited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
    /// A decision was returned for an intent.
    Decision {
        /// Intent the decision was made for.
        intent_id: IntentId,
        /// Coarse operation identity (the full payload is not retained).
        operation: OperationKey,
        /// The decision.
        decision: Decision,
        /// Risk score, absent when a pattern or batch rule short-circuited
        /// scoring.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        risk_score: Option<f64>,
    },

    /// The host reported how an executed operation went.
    Outcome {
        /// Intent that was executed.
        intent_id: IntentId,
        /// Coarse operation identity.
        operation: OperationKey,
        /// Whether execution succeeded.
        succeeded: bool,
        /// Error text for failures.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// An autonomous session began.
    SessionStarted {
        /// Scheduled expiry.
        ends_at: Timestamp,
    },

    /// An autonomous session ended.
    SessionEnded {
        /// Why it ended (`expired` or `stopped`).
        reason: String,
        /// Operations approved while it was active.
        approved: usize,
        /// Operations blocked or escalated while it was active.
        blocked: usize,
    },
}

impl AuditAction {
    /// Short description for log lines.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Decision {
                operation,
                decision,
                ..
            } => format!("{decision}: {operation}"),
            Self::Outcome {
                operation,
                succeeded,
                ..
            } => {
                let result = if *succeeded { "succeeded" } else { "failed" };
                format!("{operation} {result}")
            },
            Self::SessionStarted { ends_at } => format!("session started, ends {ends_at}"),
            Self::SessionEnded {
                reason,
                approved,
                blocked,
            } => format!("session {reason}: {approved} approved, {blocked} blocked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_core::OperationIntent;

    #[test]
    fn test_decision_entry_serialization() {
        let intent = OperationIntent::file("edit", "src/app.js");
        let entry = AuditEntry::decision(
            Timestamp::now(),
            None,
            intent.id.clone(),
            intent.key(),
            Decision::AutoApprove,
            Some(0.12),
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"]["type"], "decision");
        assert_eq!(json["action"]["decision"], "auto_approve");
        assert!(json.get("session_id").is_none());

        let parsed: AuditEntry = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_operation_accessor() {
        let key = OperationIntent::command("ls").key();
        let entry = AuditEntry::new(
            Timestamp::now(),
            None,
            AuditAction::Outcome {
                intent_id: IntentId::new("x"),
                operation: key.clone(),
                succeeded: false,
                error: Some("exit 1".to_owned()),
            },
        );
        assert_eq!(entry.operation(), Some(&key));

        let session = AuditEntry::new(
            Timestamp::now(),
            Some(SessionId::new()),
            AuditAction::SessionStarted {
                ends_at: Timestamp::now(),
            },
        );
        assert!(session.operation().is_none());
    }

    #[test]
    fn test_description() {
        let action = AuditAction::SessionEnded {
            reason: "expired".to_owned(),
            approved: 3,
            blocked: 1,
        };
        assert_eq!(action.description(), "session expired: 3 approved, 1 blocked");
    }
}
