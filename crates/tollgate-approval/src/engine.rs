//! The approval engine façade.
//!
//! [`ApprovalEngine`] wires the pipeline together:
//!
//! ```text
//! intent → validate → PatternMatcher ─┬─ deny  → BlockWithWarning
//!                                     ├─ allow → AutoApprove
//!                                     └─ none  → RiskAssessor → DecisionPolicy
//!                                                  (session-aware)
//!        → AuditTrail → SessionManager accumulators → DecisionRecord
//! ```
//!
//! Decisions are synchronous and take `&self`; the engine is `Send + Sync`
//! and meant to be shared behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;
use tollgate_audit::{AuditAction, AuditEntry, AuditTrail, JsonlAuditSink};
use tollgate_config::{AuditSection, Config};
use tollgate_core::{
    Clock, CoreError, Decision, IntentId, OperationIntent, OperationKey, SessionId, SystemClock,
    Timestamp,
};

use crate::batch::{BatchCoordinator, BatchOutcome, GroupReport, combined_risk};
use crate::error::ApprovalResult;
use crate::pattern::Classification;
use crate::policy::Verdict;
use crate::risk::{HistoryRecord, RiskAssessor, RiskScore};
use crate::session::{SessionManager, SessionStatus, SessionSummary};
use crate::settings::EngineSettings;

/// The outcome of one decision, with everything needed to explain it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Intent the decision is for.
    pub intent_id: IntentId,
    /// Coarse identity of the operation.
    pub key: OperationKey,
    /// The decision.
    pub decision: Decision,
    /// Pattern classification that preceded it.
    pub classification: Classification,
    /// Risk score, absent when a pattern or batch rule short-circuited
    /// scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskScore>,
    /// Human-readable explanation.
    pub reason: String,
    /// Autonomous session the decision was made under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// When the decision was made.
    pub timestamp: Timestamp,
}

impl DecisionRecord {
    /// Whether the operation may proceed unattended.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.decision.is_auto_approved()
    }
}

/// Builder for an [`ApprovalEngine`] with a custom clock or audit trail.
#[must_use]
pub struct EngineBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<Arc<AuditTrail>>,
}

impl EngineBuilder {
    /// Use `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use `audit` instead of building one from the `audit` config section.
    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Compile settings and assemble the engine.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidConfig`](crate::ApprovalError::InvalidConfig)
    ///   if the configuration does not validate or compile
    /// - [`ApprovalError::Storage`](crate::ApprovalError::Storage) if the
    ///   configured audit file cannot be opened
    pub fn build(self) -> ApprovalResult<ApprovalEngine> {
        let settings = EngineSettings::from_config(&self.config)?;
        let audit = match self.audit {
            Some(audit) => audit,
            None => Arc::new(audit_from_config(&self.config.audit)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sessions = Arc::new(SessionManager::new(
            settings.session_limits(),
            Arc::clone(&clock),
            Arc::clone(&audit),
        ));

        tracing::debug!(?settings, "approval engine built");
        Ok(ApprovalEngine {
            settings: RwLock::new(Arc::new(settings)),
            risk: RiskAssessor::new(),
            sessions,
            audit,
            clock,
        })
    }
}

fn audit_from_config(section: &AuditSection) -> ApprovalResult<AuditTrail> {
    let trail = AuditTrail::in_memory(section.capacity);
    match section.path.as_deref() {
        Some(path) => {
            let sink = JsonlAuditSink::open(path)?;
            tracing::info!(path, "writing audit trail to file");
            Ok(trail.with_sink(Arc::new(sink)))
        },
        None => Ok(trail),
    }
}

/// Decides whether proposed operations may run unattended.
pub struct ApprovalEngine {
    settings: RwLock<Arc<EngineSettings>>,
    risk: RiskAssessor,
    sessions: Arc<SessionManager>,
    audit: Arc<AuditTrail>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ApprovalEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalEngine")
            .field("tracked_keys", &self.risk.tracked_keys())
            .field("sessions", &self.sessions)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

impl ApprovalEngine {
    /// Engine with the system clock and an audit trail built from `config`.
    ///
    /// # Errors
    ///
    /// See [`EngineBuilder::build`].
    pub fn new(config: &Config) -> ApprovalResult<Self> {
        Self::builder(config.clone()).build()
    }

    /// Start building an engine.
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder {
            config,
            clock: None,
            audit: None,
        }
    }

    /// The current settings generation.
    #[must_use]
    pub fn settings(&self) -> Arc<EngineSettings> {
        let guard = self.settings.read().unwrap_or_else(|e| {
            tracing::warn!("settings lock was poisoned, recovering");
            e.into_inner()
        });
        Arc::clone(&guard)
    }

    /// The audit trail decisions are written to.
    #[must_use]
    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Decide a single intent.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::MalformedIntent`](crate::ApprovalError::MalformedIntent)
    /// if the intent has neither a target path nor a command. The caller
    /// must treat that as not approved.
    pub fn decide(&self, intent: &OperationIntent) -> ApprovalResult<DecisionRecord> {
        if let Err(e) = intent.validate() {
            tracing::warn!(intent_id = %intent.id, error = %e, "rejected malformed intent");
            return Err(e.into());
        }
        let settings = self.settings();
        Ok(self.decide_valid(intent, &settings))
    }

    fn decide_valid(&self, intent: &OperationIntent, settings: &EngineSettings) -> DecisionRecord {
        let session = self.sessions.active_session();
        let classification = settings.matcher().classify(intent);

        let (verdict, risk) = match settings.policy().for_classification(&classification) {
            Some(verdict) => (verdict, None),
            None => {
                let score = self.risk.score(intent, settings.weights(), self.clock.now());
                let verdict = settings
                    .policy()
                    .decide(&score, intent.target(), session.is_some());
                (verdict, Some(score))
            },
        };

        self.conclude(intent, classification, verdict, risk, session)
    }

    /// Audit, count toward the session, and log a decision.
    fn conclude(
        &self,
        intent: &OperationIntent,
        classification: Classification,
        verdict: Verdict,
        risk: Option<RiskScore>,
        session: Option<SessionId>,
    ) -> DecisionRecord {
        let record = DecisionRecord {
            intent_id: intent.id.clone(),
            key: intent.key(),
            decision: verdict.decision,
            classification,
            risk,
            reason: verdict.reason,
            session_id: session,
            timestamp: Timestamp::from_datetime(self.clock.now()),
        };

        self.audit.record(&AuditEntry::decision(
            record.timestamp,
            record.session_id.clone(),
            record.intent_id.clone(),
            record.key.clone(),
            record.decision,
            record.risk.as_ref().map(|r| r.value),
        ));
        if let Some(session) = &record.session_id {
            self.sessions
                .record_decision(session, &record.intent_id, record.decision);
        }

        let risk_value = record.risk.as_ref().map(|r| r.value);
        match record.decision {
            Decision::BlockWithWarning => tracing::warn!(
                intent_id = %record.intent_id,
                operation = %record.key,
                decision = %record.decision,
                risk = ?risk_value,
                reason = %record.reason,
                "operation blocked"
            ),
            Decision::RequireApproval | Decision::ContextualApprovalNeeded => tracing::info!(
                intent_id = %record.intent_id,
                operation = %record.key,
                decision = %record.decision,
                risk = ?risk_value,
                reason = %record.reason,
                "operation requires approval"
            ),
            Decision::AutoApprove | Decision::AutoApproveWithLog => tracing::debug!(
                intent_id = %record.intent_id,
                operation = %record.key,
                decision = %record.decision,
                risk = ?risk_value,
                session_id = ?record.session_id,
                "operation approved"
            ),
        }
        record
    }

    /// Decide a list of intents, grouping them by `(kind, action)`.
    ///
    /// Members of auto-approvable groups skip scoring but are still checked
    /// against the deny signatures. Malformed members land in
    /// `needs_approval` as `RequireApproval`. Every other member gets the
    /// same decision [`decide`](Self::decide) would give it.
    pub fn process_batch(&self, intents: &[OperationIntent]) -> BatchOutcome {
        let settings = self.settings();
        let mut outcome = BatchOutcome::default();

        for group in BatchCoordinator::plan(intents) {
            let members: Vec<&OperationIntent> =
                group.members.iter().filter_map(|&i| intents.get(i)).collect();
            let batch_type = BatchCoordinator::classify(&group.key, &members, settings.matcher());
            let auto_approved = settings.batch().is_auto_approvable(batch_type);

            let mut scores = Vec::new();
            let mut ids = Vec::with_capacity(members.len());
            for intent in members {
                ids.push(intent.id.clone());
                let record = match intent.validate() {
                    Err(e) => self.malformed(intent, &e),
                    Ok(()) if auto_approved => {
                        self.batch_approve(intent, &settings, &batch_type.to_string())
                    },
                    Ok(()) => self.decide_valid(intent, &settings),
                };
                if let Some(risk) = &record.risk {
                    scores.push(risk.value);
                }
                if record.is_approved() {
                    outcome.approved.push(record);
                } else {
                    outcome.needs_approval.push(record);
                }
            }

            tracing::debug!(
                group = %group.key,
                %batch_type,
                auto_approved,
                members = ids.len(),
                "batch group decided"
            );
            outcome.groups.push(GroupReport {
                key: group.key,
                batch_type,
                auto_approved,
                combined_risk: combined_risk(&scores),
                members: ids,
            });
        }

        tracing::info!(
            total = intents.len(),
            approved = outcome.approved.len(),
            needs_approval = outcome.needs_approval.len(),
            groups = outcome.groups.len(),
            "batch processed"
        );
        outcome
    }

    fn batch_approve(
        &self,
        intent: &OperationIntent,
        settings: &EngineSettings,
        batch_type: &str,
    ) -> DecisionRecord {
        let session = self.sessions.active_session();
        let classification = settings.matcher().classify(intent);
        let verdict = if classification.is_deny() {
            settings
                .policy()
                .for_classification(&classification)
                .unwrap_or(Verdict {
                    decision: Decision::BlockWithWarning,
                    reason: "matched deny signature".to_owned(),
                })
        } else {
            Verdict {
                decision: Decision::AutoApprove,
                reason: format!("batch type `{batch_type}` is auto-approved"),
            }
        };
        self.conclude(intent, classification, verdict, None, session)
    }

    fn malformed(&self, intent: &OperationIntent, error: &CoreError) -> DecisionRecord {
        tracing::warn!(intent_id = %intent.id, error = %error, "malformed batch member");
        self.conclude(
            intent,
            Classification::NoMatch,
            Verdict {
                decision: Decision::RequireApproval,
                reason: error.to_string(),
            },
            None,
            None,
        )
    }

    /// Preview the risk score of an intent without recording history or
    /// audit entries.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::MalformedIntent`](crate::ApprovalError::MalformedIntent)
    /// for an invalid intent.
    pub fn assess(&self, intent: &OperationIntent) -> ApprovalResult<RiskScore> {
        intent.validate()?;
        let settings = self.settings();
        Ok(self
            .risk
            .preview(intent, settings.weights(), self.clock.now()))
    }

    /// Report how an executed operation went. A failure flips the latest
    /// history record for the intent's key and counts as a recent failure
    /// for future scores.
    pub fn report_outcome(&self, intent: &OperationIntent, succeeded: bool, error: Option<&str>) {
        let now = self.clock.now();
        let key = intent.key();
        let settings = self.settings();
        self.risk
            .report_outcome(&key, succeeded, now, settings.weights().history());

        self.audit.record(&AuditEntry::new(
            Timestamp::from_datetime(now),
            self.sessions.active_session(),
            AuditAction::Outcome {
                intent_id: intent.id.clone(),
                operation: key.clone(),
                succeeded,
                error: error.map(str::to_owned),
            },
        ));

        if succeeded {
            tracing::debug!(intent_id = %intent.id, operation = %key, "operation succeeded");
        } else {
            tracing::info!(
                intent_id = %intent.id,
                operation = %key,
                error = error.unwrap_or_default(),
                "operation failed"
            );
        }
    }

    /// Stored history for a key, oldest first.
    #[must_use]
    pub fn history(&self, key: &OperationKey) -> Vec<HistoryRecord> {
        self.risk.history(key)
    }

    /// Reseed history from persisted audit entries, e.g. a JSON-lines log
    /// read at startup. Returns how many entries were applied.
    pub fn restore_history(&self, entries: &[AuditEntry]) -> usize {
        let settings = self.settings();
        let cfg = settings.weights().history();
        let mut applied = 0_usize;

        for entry in entries {
            match &entry.action {
                AuditAction::Decision {
                    operation,
                    risk_score: Some(score),
                    ..
                } => {
                    self.risk.restore_observation(
                        operation,
                        HistoryRecord {
                            timestamp: entry.timestamp.0,
                            score: *score,
                            succeeded: true,
                        },
                        cfg,
                    );
                    applied = applied.saturating_add(1);
                },
                AuditAction::Outcome {
                    operation,
                    succeeded: false,
                    ..
                } => {
                    self.risk.restore_failure(operation, entry.timestamp.0, cfg);
                    applied = applied.saturating_add(1);
                },
                _ => {},
            }
        }

        tracing::info!(applied, total = entries.len(), "restored risk history");
        applied
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Start an autonomous session. `None` uses the configured default.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::start`].
    pub fn start_autonomous_session(&self, duration: Option<Duration>) -> ApprovalResult<SessionId> {
        self.sessions.start(duration)
    }

    /// Stop the active session.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NoActiveSession`](crate::ApprovalError::NoActiveSession)
    /// if nothing is active.
    pub fn stop_autonomous_session(&self) -> ApprovalResult<SessionSummary> {
        self.sessions.stop()
    }

    /// Current session status.
    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        self.sessions.status()
    }

    /// Summaries of recently completed sessions, oldest first.
    #[must_use]
    pub fn completed_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.completed()
    }

    /// Receive every session summary emitted from now on.
    #[must_use]
    pub fn subscribe_summaries(&self) -> broadcast::Receiver<SessionSummary> {
        self.sessions.subscribe()
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Recompile settings from `config` and swap them in.
    ///
    /// History and any active session are kept; the session keeps its end
    /// time. The audit section is only read at build time.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`](crate::ApprovalError::InvalidConfig)
    /// and keeps the current settings if `config` does not compile.
    pub fn reload(&self, config: &Config) -> ApprovalResult<()> {
        let next = EngineSettings::from_config(config)?;
        self.sessions.set_limits(next.session_limits());

        let mut guard = self.settings.write().unwrap_or_else(|e| {
            tracing::warn!("settings lock was poisoned, recovering");
            e.into_inner()
        });
        *guard = Arc::new(next);
        drop(guard);

        tracing::info!("approval settings reloaded");
        Ok(())
    }
}
