//! Batch grouping and batch-type detection.
//!
//! A batch is partitioned by `(kind, action)`. Each group gets a
//! [`BatchType`] from its shared shape. Groups whose type is on the
//! auto-approve list skip per-item scoring; every other member goes through
//! the single-intent pipeline. The engine drives the pipeline
//! ([`ApprovalEngine::process_batch`](crate::ApprovalEngine::process_batch));
//! this module only plans and reports.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tollgate_config::BatchSection;
use tollgate_core::{IntentId, OperationIntent, OperationKind};

use crate::engine::DecisionRecord;
use crate::error::{ApprovalError, ApprovalResult};
use crate::pattern::PatternMatcher;

/// Weight of the worst member in [`combined_risk`].
const MAX_WEIGHT: f64 = 0.7;
/// Weight of the mean in [`combined_risk`].
const MEAN_WEIGHT: f64 = 0.3;

/// Actions that never count as test-suite or documentation work.
const DESTRUCTIVE_ACTIONS: &[&str] = &["delete", "remove", "rm", "rmdir", "unlink"];

/// Shape of a homogeneous group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchType {
    /// Uniform `create` actions on allow-listed paths.
    MultipleFileCreation,
    /// Uniform `format` actions.
    BulkFormatting,
    /// Every target is a test file.
    TestSuiteCreation,
    /// Every target is a documentation file.
    DocumentationUpdates,
    /// None of the above.
    Unknown,
}

impl BatchType {
    /// Config name of this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleFileCreation => "multiple_file_creation",
            Self::BulkFormatting => "bulk_formatting",
            Self::TestSuiteCreation => "test_suite_creation",
            Self::DocumentationUpdates => "documentation_updates",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchType {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_file_creation" => Ok(Self::MultipleFileCreation),
            "bulk_formatting" => Ok(Self::BulkFormatting),
            "test_suite_creation" => Ok(Self::TestSuiteCreation),
            "documentation_updates" => Ok(Self::DocumentationUpdates),
            "unknown" => Ok(Self::Unknown),
            other => Err(ApprovalError::InvalidConfig(format!(
                "unknown batch type {other:?}"
            ))),
        }
    }
}

/// Grouping key of a batch partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Shared operation kind.
    pub kind: OperationKind,
    /// Shared action verb.
    pub action: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.action)
    }
}

/// A planned group: its key and the indices of its members in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGroup {
    /// Shared `(kind, action)`.
    pub key: GroupKey,
    /// Member positions in the submitted slice, in submission order.
    pub members: Vec<usize>,
}

/// Per-group summary returned alongside the batch decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    /// Shared `(kind, action)`.
    pub key: GroupKey,
    /// Detected shape.
    pub batch_type: BatchType,
    /// Whether the group was approved without per-item scoring.
    pub auto_approved: bool,
    /// `0.7 * max + 0.3 * mean` of member scores. Reporting only; `None`
    /// when no member was scored.
    pub combined_risk: Option<f64>,
    /// Member intent ids, in submission order.
    pub members: Vec<IntentId>,
}

/// Result of [`ApprovalEngine::process_batch`](crate::ApprovalEngine::process_batch).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Members that may proceed unattended.
    pub approved: Vec<DecisionRecord>,
    /// Members that need a human (including blocked ones).
    pub needs_approval: Vec<DecisionRecord>,
    /// One report per group, in order of first appearance.
    pub groups: Vec<GroupReport>,
}

impl BatchOutcome {
    /// Total number of decided members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.approved.len().saturating_add(self.needs_approval.len())
    }

    /// Whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plans batches and decides which groups skip per-item scoring.
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    auto_approve: HashSet<BatchType>,
}

impl BatchCoordinator {
    /// Compile the batch section.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`] for an unknown type name, or
    /// if `unknown` itself is listed as auto-approvable.
    pub fn from_config(section: &BatchSection) -> ApprovalResult<Self> {
        let mut auto_approve = HashSet::new();
        for name in &section.auto_approve_types {
            let batch_type = name.parse::<BatchType>()?;
            if batch_type == BatchType::Unknown {
                return Err(ApprovalError::InvalidConfig(
                    "batch type `unknown` cannot be auto-approved".to_owned(),
                ));
            }
            auto_approve.insert(batch_type);
        }
        Ok(Self { auto_approve })
    }

    /// Whether groups of `batch_type` skip per-item scoring.
    #[must_use]
    pub fn is_auto_approvable(&self, batch_type: BatchType) -> bool {
        self.auto_approve.contains(&batch_type)
    }

    /// Partition `intents` by `(kind, action)`, preserving first-appearance
    /// order of groups and submission order within each group.
    #[must_use]
    pub fn plan(intents: &[OperationIntent]) -> Vec<BatchGroup> {
        let mut groups: Vec<BatchGroup> = Vec::new();
        for (idx, intent) in intents.iter().enumerate() {
            let key = GroupKey {
                kind: intent.kind,
                action: intent.action.to_lowercase(),
            };
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.members.push(idx),
                None => groups.push(BatchGroup {
                    key,
                    members: vec![idx],
                }),
            }
        }
        groups
    }

    /// Detect the shape of a group. Checks run in a fixed order and the
    /// first that holds wins.
    #[must_use]
    pub fn classify(key: &GroupKey, members: &[&OperationIntent], matcher: &PatternMatcher) -> BatchType {
        if members.is_empty() {
            return BatchType::Unknown;
        }
        let paths: Option<Vec<&str>> = members.iter().map(|m| m.target_path.as_deref()).collect();

        if key.kind == OperationKind::Filesystem
            && key.action == "create"
            && paths
                .as_ref()
                .is_some_and(|ps| ps.iter().all(|p| matcher.allows_path(p, "create")))
        {
            return BatchType::MultipleFileCreation;
        }

        if key.action == "format" {
            return BatchType::BulkFormatting;
        }

        if DESTRUCTIVE_ACTIONS.contains(&key.action.as_str()) {
            return BatchType::Unknown;
        }

        if let Some(paths) = paths {
            if paths.iter().all(|p| matcher.is_test_path(p)) {
                return BatchType::TestSuiteCreation;
            }
            if paths.iter().all(|p| matcher.is_documentation_path(p)) {
                return BatchType::DocumentationUpdates;
            }
        }

        BatchType::Unknown
    }
}

/// `0.7 * max + 0.3 * mean`, or `None` for an empty slice.
#[must_use]
pub fn combined_risk(scores: &[f64]) -> Option<f64> {
    if scores.is_empty() {
        return None;
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = scores.iter().sum::<f64>() / f64::from(u32::try_from(scores.len()).unwrap_or(u32::MAX));
    Some(MAX_WEIGHT * max + MEAN_WEIGHT * mean)
}
