//! Score-to-decision policy.
//!
//! The policy has three layers, checked in order:
//!
//! 1. **Absolute deny** from the pattern matcher: always `BlockWithWarning`,
//!    with no exception for autonomous sessions.
//! 2. **Absolute allow**: `AutoApprove`.
//! 3. **Thresholds**: outside a session the score falls into one of five
//!    tiers, with the middle tier resolved by ordered contextual rules.
//!    Inside a session the tiers collapse to one cut at the block threshold.

use globset::GlobMatcher;
use tollgate_config::{ContextualOutcome, ContextualRuleConfig, ThresholdsSection};
use tollgate_core::Decision;

use crate::error::ApprovalResult;
use crate::pattern::{Classification, compile_glob, normalize_path};
use crate::risk::RiskScore;

/// A decision plus the reason it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The decision.
    pub decision: Decision,
    /// Human-readable explanation.
    pub reason: String,
}

impl Verdict {
    fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

struct ContextualRule {
    glob: String,
    matcher: GlobMatcher,
    outcome: ContextualOutcome,
}

/// Threshold tiers and contextual rules compiled from configuration.
pub struct DecisionPolicy {
    thresholds: ThresholdsSection,
    contextual_rules: Vec<ContextualRule>,
}

impl std::fmt::Debug for DecisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPolicy")
            .field("thresholds", &self.thresholds)
            .field(
                "contextual_rules",
                &self
                    .contextual_rules
                    .iter()
                    .map(|r| (&r.glob, r.outcome))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DecisionPolicy {
    /// Compile thresholds and contextual rules.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`](crate::ApprovalError::InvalidConfig)
    /// if a rule glob does not parse.
    pub fn from_config(
        thresholds: &ThresholdsSection,
        rules: &[ContextualRuleConfig],
    ) -> ApprovalResult<Self> {
        let contextual_rules = rules
            .iter()
            .map(|rule| {
                Ok(ContextualRule {
                    glob: rule.glob.clone(),
                    matcher: compile_glob(&rule.glob)?,
                    outcome: rule.outcome,
                })
            })
            .collect::<ApprovalResult<Vec<_>>>()?;

        Ok(Self {
            thresholds: thresholds.clone(),
            contextual_rules,
        })
    }

    /// The configured thresholds.
    #[must_use]
    pub fn thresholds(&self) -> &ThresholdsSection {
        &self.thresholds
    }

    /// Verdict for a pattern short-circuit, or `None` when the intent must
    /// be scored.
    #[must_use]
    pub fn for_classification(&self, classification: &Classification) -> Option<Verdict> {
        match classification {
            Classification::AbsoluteDeny { signature } => Some(Verdict::new(
                Decision::BlockWithWarning,
                format!("matched deny signature: {signature}"),
            )),
            Classification::AbsoluteAllow { rule } => Some(Verdict::new(
                Decision::AutoApprove,
                format!("allow-listed by {rule}"),
            )),
            Classification::NoMatch => None,
        }
    }

    /// The raw threshold tier for a score outside a session, before
    /// contextual resolution.
    #[must_use]
    pub fn tier(&self, value: f64) -> Decision {
        let t = &self.thresholds;
        if value.is_nan() || value >= t.block {
            Decision::BlockWithWarning
        } else if value >= t.contextual {
            Decision::RequireApproval
        } else if value >= t.approve_with_log {
            Decision::ContextualApprovalNeeded
        } else if value >= t.auto_approve {
            Decision::AutoApproveWithLog
        } else {
            Decision::AutoApprove
        }
    }

    /// Decide for a scored intent.
    ///
    /// `target` is the path (or command) the contextual rules match against.
    #[must_use]
    pub fn decide(&self, score: &RiskScore, target: &str, session_active: bool) -> Verdict {
        let value = score.value;
        let block = self.thresholds.block;

        if session_active {
            return if value.is_nan() || value >= block {
                Verdict::new(
                    Decision::RequireApproval,
                    format!("risk {value:.2} at or above session ceiling {block:.2}"),
                )
            } else {
                Verdict::new(
                    Decision::AutoApprove,
                    format!("risk {value:.2} below session ceiling {block:.2}"),
                )
            };
        }

        match self.tier(value) {
            Decision::ContextualApprovalNeeded => self.resolve_contextual(target, value),
            decision => Verdict::new(decision, format!("risk {value:.2} ({})", score.level)),
        }
    }

    /// First matching contextual rule wins; no match requires approval.
    fn resolve_contextual(&self, target: &str, value: f64) -> Verdict {
        let rule = normalize_path(target)
            .and_then(|path| self.contextual_rules.iter().find(|r| r.matcher.is_match(&path)));

        match rule {
            Some(rule) => {
                let decision = match rule.outcome {
                    ContextualOutcome::Approve => Decision::AutoApproveWithLog,
                    ContextualOutcome::RequireApproval => Decision::RequireApproval,
                    ContextualOutcome::Deny => Decision::BlockWithWarning,
                };
                Verdict::new(
                    decision,
                    format!("risk {value:.2}, contextual rule `{}`", rule.glob),
                )
            },
            None => Verdict::new(
                Decision::RequireApproval,
                format!("risk {value:.2}, no contextual rule matched"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_config::PatternsSection;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::from_config(
            &ThresholdsSection::default(),
            &PatternsSection::default().contextual_rules,
        )
        .unwrap()
    }

    fn score(value: f64) -> RiskScore {
        let mut s = RiskScore::compose(0.0, 0.0, 0.0, Vec::new());
        s.value = value;
        s.level = tollgate_core::RiskLevel::from_score(value);
        s
    }

    #[test]
    fn test_tiers_outside_session() {
        let p = policy();
        assert_eq!(p.tier(0.0), Decision::AutoApprove);
        assert_eq!(p.tier(0.19), Decision::AutoApprove);
        assert_eq!(p.tier(0.2), Decision::AutoApproveWithLog);
        assert_eq!(p.tier(0.4), Decision::ContextualApprovalNeeded);
        assert_eq!(p.tier(0.6), Decision::RequireApproval);
        assert_eq!(p.tier(0.8), Decision::BlockWithWarning);
        assert_eq!(p.tier(1.0), Decision::BlockWithWarning);
        assert_eq!(p.tier(f64::NAN), Decision::BlockWithWarning);
    }

    #[test]
    fn test_contextual_first_match_wins() {
        let p = policy();
        // `**/*.pem` (deny) is listed before anything else.
        let v = p.decide(&score(0.5), "certs/server.pem", false);
        assert_eq!(v.decision, Decision::BlockWithWarning);

        let v = p.decide(&score(0.5), "config/production.yaml", false);
        assert_eq!(v.decision, Decision::RequireApproval);

        let v = p.decide(&score(0.5), "docs/guide.md", false);
        assert_eq!(v.decision, Decision::AutoApproveWithLog);
        assert!(v.reason.contains("**/*.md"));
    }

    #[test]
    fn test_contextual_default_requires_approval() {
        let v = policy().decide(&score(0.5), "lib/thing.rs", false);
        assert_eq!(v.decision, Decision::RequireApproval);
        assert!(v.reason.contains("no contextual rule"));
    }

    #[test]
    fn test_contextual_rules_only_in_middle_tier() {
        let p = policy();
        // A docs path with a low score is plain auto-approve, and a high
        // score is never rescued by an approve rule.
        assert_eq!(p.decide(&score(0.1), "docs/a.md", false).decision, Decision::AutoApprove);
        assert_eq!(
            p.decide(&score(0.7), "docs/a.md", false).decision,
            Decision::RequireApproval
        );
    }

    #[test]
    fn test_session_collapses_tiers() {
        let p = policy();
        for value in [0.0, 0.3, 0.5, 0.79] {
            assert_eq!(
                p.decide(&score(value), "lib/x.rs", true).decision,
                Decision::AutoApprove,
                "value {value}"
            );
        }
        for value in [0.8, 0.95, 1.0] {
            assert_eq!(
                p.decide(&score(value), "lib/x.rs", true).decision,
                Decision::RequireApproval,
                "value {value}"
            );
        }
    }

    #[test]
    fn test_critical_risk_never_approved() {
        let p = policy();
        for active in [false, true] {
            let d = p.decide(&score(0.85), "src/a.rs", active).decision;
            assert!(
                matches!(d, Decision::RequireApproval | Decision::BlockWithWarning),
                "session={active}: {d:?}"
            );
        }
    }

    #[test]
    fn test_classification_short_circuit() {
        let p = policy();
        let deny = p
            .for_classification(&Classification::AbsoluteDeny {
                signature: "fork bomb".to_owned(),
            })
            .unwrap();
        assert_eq!(deny.decision, Decision::BlockWithWarning);

        let allow = p
            .for_classification(&Classification::AbsoluteAllow {
                rule: "command `ls`".to_owned(),
            })
            .unwrap();
        assert_eq!(allow.decision, Decision::AutoApprove);

        assert!(p.for_classification(&Classification::NoMatch).is_none());
    }

    #[test]
    fn test_custom_thresholds() {
        let thresholds = ThresholdsSection {
            auto_approve: 0.1,
            approve_with_log: 0.2,
            contextual: 0.3,
            block: 0.5,
        };
        let p = DecisionPolicy::from_config(&thresholds, &[]).unwrap();
        assert_eq!(p.tier(0.15), Decision::AutoApproveWithLog);
        assert_eq!(p.decide(&score(0.25), "x", false).decision, Decision::RequireApproval);
        assert_eq!(p.decide(&score(0.5), "x", true).decision, Decision::RequireApproval);
    }
}
