//! Autonomous session state machine.
//!
//! At most one session is active at a time. The session ends exactly once,
//! through whichever of these gets the lock first:
//!
//! - the expiry timer task spawned by [`SessionManager::start`],
//! - an explicit [`SessionManager::stop`],
//! - lazy expiry, checked against the [`Clock`] on every read.
//!
//! Every path goes through the same close step, which takes the active
//! session out of the state under the lock. The losers find no matching
//! session and do nothing.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tollgate_audit::{AuditAction, AuditEntry, AuditTrail};
use tollgate_config::SessionSection;
use tollgate_core::{Clock, Decision, IntentId, SessionId, Timestamp};

use crate::error::{ApprovalError, ApprovalResult};

/// Capacity of the summary broadcast channel.
pub const SUMMARY_CHANNEL_CAPACITY: usize = 64;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEndReason {
    /// The scheduled end time passed.
    Expired,
    /// The host stopped it.
    Stopped,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Report emitted once when a session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// The session that ended.
    pub session_id: SessionId,
    /// When it started.
    pub started_at: Timestamp,
    /// When it ended (the scheduled end for expiry).
    pub ended_at: Timestamp,
    /// Actual length in milliseconds.
    pub duration_actual_ms: u64,
    /// Operations approved while it was active.
    pub approved_count: usize,
    /// Operations escalated or blocked while it was active.
    pub blocked_count: usize,
    /// How it ended.
    pub end_reason: SessionEndReason,
}

/// Snapshot of the session slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session is active.
    Inactive,
    /// A session is active.
    Active {
        /// Session identifier.
        id: SessionId,
        /// When it started.
        started_at: Timestamp,
        /// Scheduled end.
        ends_at: Timestamp,
        /// Time left until the scheduled end.
        remaining: Duration,
        /// Operations approved so far.
        approved: usize,
        /// Operations escalated or blocked so far.
        blocked: usize,
    },
}

impl SessionStatus {
    /// Whether a session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Duration bounds and retention for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Used when a start request gives no duration.
    pub default_duration: Duration,
    /// Longest allowed session.
    pub max_duration: Duration,
    /// Completed summaries kept in memory.
    pub summary_history: usize,
}

impl SessionLimits {
    /// Limits from the `session` config section.
    #[must_use]
    pub fn from_config(section: &SessionSection) -> Self {
        Self {
            default_duration: Duration::from_secs(section.default_duration_secs),
            max_duration: Duration::from_secs(section.max_duration_secs),
            summary_history: section.summary_history,
        }
    }

    /// Apply the default and check the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidDuration`] for zero or above the maximum.
    pub fn resolve(&self, requested: Option<Duration>) -> ApprovalResult<Duration> {
        let duration = requested.unwrap_or(self.default_duration);
        if duration.is_zero() || duration > self.max_duration {
            return Err(ApprovalError::InvalidDuration {
                requested_secs: duration.as_secs(),
                max_secs: self.max_duration.as_secs(),
            });
        }
        Ok(duration)
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from_config(&SessionSection::default())
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    approved: Vec<IntentId>,
    blocked: Vec<IntentId>,
    timer: Option<AbortHandle>,
}

#[derive(Debug)]
struct SessionState {
    active: Option<ActiveSession>,
    completed: VecDeque<SessionSummary>,
    limits: SessionLimits,
}

impl SessionState {
    /// Take the active session out and build its summary. The only place a
    /// session ends.
    fn close(&mut self, now: DateTime<Utc>, reason: SessionEndReason) -> Option<SessionSummary> {
        let session = self.active.take()?;
        if let Some(timer) = &session.timer {
            timer.abort();
        }

        let ended_at = match reason {
            SessionEndReason::Expired => session.ends_at.min(now),
            SessionEndReason::Stopped => now,
        };
        let duration_actual_ms = u64::try_from(
            ended_at
                .signed_duration_since(session.started_at)
                .num_milliseconds(),
        )
        .unwrap_or(0);

        let summary = SessionSummary {
            session_id: session.id,
            started_at: Timestamp::from_datetime(session.started_at),
            ended_at: Timestamp::from_datetime(ended_at),
            duration_actual_ms,
            approved_count: session.approved.len(),
            blocked_count: session.blocked.len(),
            end_reason: reason,
        };

        self.completed.push_back(summary.clone());
        while self.completed.len() > self.limits.summary_history.max(1) {
            self.completed.pop_front();
        }
        Some(summary)
    }

    /// Close the active session if its end time has passed.
    fn expire_if_due(&mut self, now: DateTime<Utc>) -> Option<SessionSummary> {
        let due = self.active.as_ref().is_some_and(|s| now >= s.ends_at);
        if due {
            self.close(now, SessionEndReason::Expired)
        } else {
            None
        }
    }
}

/// Owner of the single autonomous session slot.
pub struct SessionManager {
    state: Mutex<SessionState>,
    clock: Arc<dyn Clock>,
    audit: Arc<AuditTrail>,
    summaries: broadcast::Sender<SessionSummary>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("clock", &self.clock)
            .field("subscribers", &self.summaries.receiver_count())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a manager with no active session.
    #[must_use]
    pub fn new(limits: SessionLimits, clock: Arc<dyn Clock>, audit: Arc<AuditTrail>) -> Self {
        let (summaries, _) = broadcast::channel(SUMMARY_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(SessionState {
                active: None,
                completed: VecDeque::new(),
                limits,
            }),
            clock,
            audit,
            summaries,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| {
            tracing::warn!("session lock was poisoned, recovering");
            e.into_inner()
        })
    }

    /// Start a session. `None` uses the configured default duration.
    ///
    /// Spawns the expiry timer on the current Tokio runtime. Outside a
    /// runtime the session runs without a timer and ends lazily, the next
    /// time any operation observes the clock past its end.
    ///
    /// # Errors
    ///
    /// - [`ApprovalError::InvalidDuration`] for zero or above the maximum
    /// - [`ApprovalError::SessionConflict`] if a session is already active
    pub fn start(self: &Arc<Self>, duration: Option<Duration>) -> ApprovalResult<SessionId> {
        let runtime = tokio::runtime::Handle::try_current().ok();

        let now = self.clock.now();
        let mut state = self.lock();
        let duration = state.limits.resolve(duration)?;
        let expired = state.expire_if_due(now);

        if let Some(active) = &state.active {
            let active = active.id.clone();
            drop(state);
            self.publish(expired);
            tracing::warn!(active = %active, "session start rejected, one is already active");
            return Err(ApprovalError::SessionConflict { active });
        }

        let ends_at = TimeDelta::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(ApprovalError::InvalidDuration {
                requested_secs: duration.as_secs(),
                max_secs: state.limits.max_duration.as_secs(),
            })?;

        let id = SessionId::new();
        let weak = Arc::downgrade(self);
        let timer_id = id.clone();
        let timer = match runtime {
            Some(runtime) => Some(
                runtime
                    .spawn(async move {
                        tokio::time::sleep(duration).await;
                        if let Some(manager) = weak.upgrade() {
                            manager.close(&timer_id, SessionEndReason::Expired);
                        }
                    })
                    .abort_handle(),
            ),
            None => {
                tracing::debug!(
                    session_id = %id,
                    "no Tokio runtime, session will expire lazily"
                );
                None
            },
        };

        state.active = Some(ActiveSession {
            id: id.clone(),
            started_at: now,
            ends_at,
            approved: Vec::new(),
            blocked: Vec::new(),
            timer,
        });
        drop(state);
        self.publish(expired);

        self.audit.record(&AuditEntry::new(
            Timestamp::from_datetime(now),
            Some(id.clone()),
            AuditAction::SessionStarted {
                ends_at: Timestamp::from_datetime(ends_at),
            },
        ));
        tracing::info!(
            session_id = %id,
            ends_at = %ends_at,
            duration_secs = duration.as_secs(),
            "autonomous session started"
        );
        Ok(id)
    }

    /// Stop the active session and return its summary.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::NoActiveSession`] if nothing is active,
    /// including a session that already reached its end time.
    pub fn stop(&self) -> ApprovalResult<SessionSummary> {
        let now = self.clock.now();
        let mut state = self.lock();
        let expired = state.expire_if_due(now);
        let stopped = state.close(now, SessionEndReason::Stopped);
        drop(state);

        self.publish(expired);
        let summary = stopped.ok_or(ApprovalError::NoActiveSession)?;
        self.publish(Some(summary.clone()));
        Ok(summary)
    }

    /// End `expected` if it is still the active session.
    ///
    /// Returns `None` when another path already ended it.
    pub fn close(&self, expected: &SessionId, reason: SessionEndReason) -> Option<SessionSummary> {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.active.as_ref().is_none_or(|s| &s.id != expected) {
            tracing::debug!(session_id = %expected, %reason, "session already closed");
            return None;
        }
        let summary = state.close(now, reason);
        drop(state);
        self.publish(summary.clone());
        summary
    }

    /// Id of the active session, after applying lazy expiry.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        let mut state = self.lock();
        let expired = state.expire_if_due(self.clock.now());
        let id = state.active.as_ref().map(|s| s.id.clone());
        drop(state);
        self.publish(expired);
        id
    }

    /// Count a decision toward `session`. Ignored if that session has
    /// already ended.
    pub fn record_decision(&self, session: &SessionId, intent_id: &IntentId, decision: Decision) {
        let mut state = self.lock();
        if let Some(active) = state.active.as_mut().filter(|s| &s.id == session) {
            if decision.is_auto_approved() {
                active.approved.push(intent_id.clone());
            } else {
                active.blocked.push(intent_id.clone());
            }
        }
    }

    /// Current session status, after applying lazy expiry.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let now = self.clock.now();
        let mut state = self.lock();
        let expired = state.expire_if_due(now);
        let status = state
            .active
            .as_ref()
            .map_or(SessionStatus::Inactive, |s| SessionStatus::Active {
                id: s.id.clone(),
                started_at: Timestamp::from_datetime(s.started_at),
                ends_at: Timestamp::from_datetime(s.ends_at),
                remaining: s
                    .ends_at
                    .signed_duration_since(now)
                    .to_std()
                    .unwrap_or_default(),
                approved: s.approved.len(),
                blocked: s.blocked.len(),
            });
        drop(state);
        self.publish(expired);
        status
    }

    /// Completed session summaries, oldest first.
    #[must_use]
    pub fn completed(&self) -> Vec<SessionSummary> {
        self.lock().completed.iter().cloned().collect()
    }

    /// Receive every summary emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSummary> {
        self.summaries.subscribe()
    }

    /// Current limits.
    #[must_use]
    pub fn limits(&self) -> SessionLimits {
        self.lock().limits
    }

    /// Replace the limits. An active session keeps its end time.
    pub fn set_limits(&self, limits: SessionLimits) {
        let mut state = self.lock();
        state.limits = limits;
        while state.completed.len() > limits.summary_history.max(1) {
            state.completed.pop_front();
        }
    }

    /// Broadcast, audit, and log a summary. Called without the lock held.
    fn publish(&self, summary: Option<SessionSummary>) {
        let Some(summary) = summary else {
            return;
        };

        if self.summaries.send(summary.clone()).is_err() {
            tracing::trace!(session_id = %summary.session_id, "no summary subscribers");
        }
        self.audit.record(&AuditEntry::new(
            summary.ended_at,
            Some(summary.session_id.clone()),
            AuditAction::SessionEnded {
                reason: summary.end_reason.to_string(),
                approved: summary.approved_count,
                blocked: summary.blocked_count,
            },
        ));
        tracing::info!(
            session_id = %summary.session_id,
            reason = %summary.end_reason,
            duration_ms = summary.duration_actual_ms,
            approved = summary.approved_count,
            blocked = summary.blocked_count,
            "autonomous session ended"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_test::ManualClock;

    fn manager_with(clock: Arc<dyn Clock>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            SessionLimits::default(),
            clock,
            Arc::new(AuditTrail::in_memory(100)),
        ))
    }

    fn manager() -> (Arc<SessionManager>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (manager_with(clock.clone()), clock)
    }

    // -----------------------------------------------------------------------
    // Limits
    // -----------------------------------------------------------------------

    #[test]
    fn test_limits_resolve() {
        let limits = SessionLimits::default();
        assert_eq!(limits.resolve(None).unwrap(), Duration::from_secs(3600));
        assert_eq!(
            limits.resolve(Some(Duration::from_secs(60))).unwrap(),
            Duration::from_secs(60)
        );
        assert!(matches!(
            limits.resolve(Some(Duration::ZERO)),
            Err(ApprovalError::InvalidDuration { requested_secs: 0, .. })
        ));
        assert!(matches!(
            limits.resolve(Some(Duration::from_secs(28_801))),
            Err(ApprovalError::InvalidDuration { max_secs: 28_800, .. })
        ));
    }

    #[test]
    fn test_start_outside_runtime_expires_lazily() {
        let (manager, clock) = manager();
        let id = manager.start(Some(Duration::from_secs(60))).unwrap();
        assert!(manager.status().is_active());
        assert!(matches!(
            manager.start(None),
            Err(ApprovalError::SessionConflict { .. })
        ));

        clock.advance(Duration::from_secs(60));
        assert!(!manager.status().is_active());

        let completed = manager.completed();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].session_id, id);
        assert_eq!(completed[0].end_reason, SessionEndReason::Expired);
    }

    #[test]
    fn test_stop_outside_runtime() {
        let (manager, _) = manager();
        manager.start(None).unwrap();
        let summary = manager.stop().unwrap();
        assert_eq!(summary.end_reason, SessionEndReason::Stopped);
    }

    // -----------------------------------------------------------------------
    // Start / stop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_start_and_conflict() {
        let (manager, _) = manager();
        let id = manager.start(Some(Duration::from_secs(60))).unwrap();

        match manager.start(Some(Duration::from_secs(60))) {
            Err(ApprovalError::SessionConflict { active }) => assert_eq!(active, id),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(manager.active_session(), Some(id));
    }

    #[tokio::test]
    async fn test_stop_without_session() {
        let (manager, _) = manager();
        assert!(matches!(manager.stop(), Err(ApprovalError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_stop_reports_and_resets_accumulators() {
        let (manager, clock) = manager();
        let id = manager.start(Some(Duration::from_secs(600))).unwrap();

        manager.record_decision(&id, &IntentId::new("a"), Decision::AutoApprove);
        manager.record_decision(&id, &IntentId::new("b"), Decision::AutoApproveWithLog);
        manager.record_decision(&id, &IntentId::new("c"), Decision::RequireApproval);
        clock.advance(Duration::from_secs(90));

        let summary = manager.stop().unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.approved_count, 2);
        assert_eq!(summary.blocked_count, 1);
        assert_eq!(summary.duration_actual_ms, 90_000);
        assert_eq!(summary.end_reason, SessionEndReason::Stopped);

        let next = manager.start(Some(Duration::from_secs(600))).unwrap();
        match manager.status() {
            SessionStatus::Active {
                id,
                approved,
                blocked,
                remaining,
                ..
            } => {
                assert_eq!(id, next);
                assert_eq!((approved, blocked), (0, 0));
                assert_eq!(remaining, Duration::from_secs(600));
            },
            SessionStatus::Inactive => panic!("expected active session"),
        }
    }

    #[tokio::test]
    async fn test_decisions_for_ended_session_ignored() {
        let (manager, _) = manager();
        let old = manager.start(Some(Duration::from_secs(60))).unwrap();
        manager.stop().unwrap();
        let current = manager.start(Some(Duration::from_secs(60))).unwrap();

        manager.record_decision(&old, &IntentId::new("late"), Decision::AutoApprove);
        assert_eq!(manager.stop().unwrap().approved_count, 0);
        assert_ne!(old, current);
    }

    #[tokio::test]
    async fn test_start_and_end_are_audited() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let audit = Arc::new(AuditTrail::in_memory(100));
        let manager = Arc::new(SessionManager::new(
            SessionLimits::default(),
            clock,
            Arc::clone(&audit),
        ));

        let id = manager.start(None).unwrap();
        manager.stop().unwrap();

        let entries = audit.for_session(&id);
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].action, AuditAction::SessionStarted { .. }));
        assert!(matches!(entries[1].action, AuditAction::SessionEnded { .. }));
    }

    // -----------------------------------------------------------------------
    // Expiry
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_timer_expires_session() {
        let (manager, _) = manager();
        let mut rx = manager.subscribe();
        let id = manager.start(Some(Duration::from_secs(60))).unwrap();

        // Paused time auto-advances to the timer once the runtime is idle.
        let summary = rx.recv().await.unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.end_reason, SessionEndReason::Expired);
        assert!(!manager.status().is_active());
        assert_eq!(manager.completed().len(), 1);
    }

    #[tokio::test]
    async fn test_lazy_expiry_without_timer() {
        let (manager, clock) = manager();
        let mut rx = manager.subscribe();
        let id = manager.start(Some(Duration::from_secs(60))).unwrap();

        clock.advance(Duration::from_secs(61));
        assert_eq!(manager.active_session(), None);

        let summary = rx.try_recv().unwrap();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.end_reason, SessionEndReason::Expired);
        assert_eq!(summary.duration_actual_ms, 60_000);
        assert!(matches!(manager.stop(), Err(ApprovalError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_start_after_lazy_expiry_succeeds() {
        let (manager, clock) = manager();
        manager.start(Some(Duration::from_secs(60))).unwrap();
        clock.advance(Duration::from_secs(120));
        assert!(manager.start(Some(Duration::from_secs(60))).is_ok());
        assert_eq!(manager.completed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_timer_emits_once() {
        let (manager, _) = manager();
        let mut rx = manager.subscribe();
        let id = manager.start(Some(Duration::from_secs(60))).unwrap();

        manager.stop().unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        assert!(manager.close(&id, SessionEndReason::Expired).is_none());
        assert_eq!(rx.try_recv().unwrap().end_reason, SessionEndReason::Stopped);
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert_eq!(manager.completed().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_stops_close_once() {
        let (manager, _) = manager();
        let mut rx = manager.subscribe();
        manager.start(Some(Duration::from_secs(60))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&manager);
                tokio::spawn(async move { m.stop().is_ok() })
            })
            .collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_completed_history_bounded() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let limits = SessionLimits {
            summary_history: 2,
            ..SessionLimits::default()
        };
        let manager = Arc::new(SessionManager::new(
            limits,
            clock,
            Arc::new(AuditTrail::in_memory(100)),
        ));

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(manager.start(None).unwrap());
            manager.stop().unwrap();
        }

        let completed = manager.completed();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].session_id, ids[1]);
        assert_eq!(completed[1].session_id, ids[2]);
    }

    #[test]
    fn test_summary_serialization() {
        let summary = SessionSummary {
            session_id: SessionId::new(),
            started_at: Timestamp::now(),
            ended_at: Timestamp::now(),
            duration_actual_ms: 1,
            approved_count: 0,
            blocked_count: 0,
            end_reason: SessionEndReason::Expired,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["end_reason"], "expired");
    }
}
