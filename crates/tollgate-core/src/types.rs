//! Common types used throughout tollgate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of an operation intent.
///
/// Callers may assign their own identifiers (e.g. a tool-call id from the
/// agent transport); otherwise one is generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl IntentId {
    /// Create a new random intent ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("intent-{}", Uuid::new_v4()))
    }

    /// Wrap a caller-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IntentId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for an autonomous session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a session ID from a UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Timestamp wrapper for consistent handling throughout tollgate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    /// Get the current timestamp.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%SZ"))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// Risk level classification derived from a continuous risk score.
///
/// The mapping from score to level uses fixed cut points so that levels
/// are comparable across deployments even when scoring weights differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score below 0.2.
    Low,
    /// Score in [0.2, 0.4).
    LowMedium,
    /// Score in [0.4, 0.6).
    Medium,
    /// Score in [0.6, 0.8).
    High,
    /// Score of 0.8 or above.
    Critical,
}

impl RiskLevel {
    /// Classify a score in [0, 1].
    ///
    /// Scores outside the range (and NaN) are treated as the nearest
    /// extreme, with NaN mapping to `Critical`.
    #[must_use]
    pub fn from_score(value: f64) -> Self {
        if value.is_nan() || value >= 0.8 {
            Self::Critical
        } else if value >= 0.6 {
            Self::High
        } else if value >= 0.4 {
            Self::Medium
        } else if value >= 0.2 {
            Self::LowMedium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::LowMedium => write!(f, "low-medium"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Outcome of a single approval decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Proceed without human involvement.
    AutoApprove,
    /// Proceed, but surface the operation in the activity log.
    AutoApproveWithLog,
    /// Middle tier: resolved against path-specific contextual rules.
    ContextualApprovalNeeded,
    /// Escalate to a human before proceeding.
    RequireApproval,
    /// Refuse and warn; never executed unattended.
    BlockWithWarning,
}

impl Decision {
    /// Whether the operation may proceed unattended.
    #[must_use]
    pub fn is_auto_approved(&self) -> bool {
        matches!(self, Self::AutoApprove | Self::AutoApproveWithLog)
    }

    /// Whether the operation is blocked outright.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::BlockWithWarning)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApprove => write!(f, "auto-approve"),
            Self::AutoApproveWithLog => write!(f, "auto-approve (logged)"),
            Self::ContextualApprovalNeeded => write!(f, "contextual approval needed"),
            Self::RequireApproval => write!(f, "require approval"),
            Self::BlockWithWarning => write!(f, "block"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.199), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.2), RiskLevel::LowMedium);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.8), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_nan_is_critical() {
        assert_eq!(RiskLevel::from_score(f64::NAN), RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::LowMedium);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_decision_predicates() {
        assert!(Decision::AutoApprove.is_auto_approved());
        assert!(Decision::AutoApproveWithLog.is_auto_approved());
        assert!(!Decision::RequireApproval.is_auto_approved());
        assert!(Decision::BlockWithWarning.is_blocked());
        assert!(!Decision::ContextualApprovalNeeded.is_blocked());
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_string(&Decision::BlockWithWarning).unwrap();
        assert_eq!(json, "\"block_with_warning\"");
    }

    #[test]
    fn test_intent_id_generated_unique() {
        assert_ne!(IntentId::generate(), IntentId::generate());
        assert!(IntentId::generate().as_str().starts_with("intent-"));
    }

    #[test]
    fn test_session_id_display() {
        assert!(SessionId::new().to_string().starts_with("session:"));
    }
}
