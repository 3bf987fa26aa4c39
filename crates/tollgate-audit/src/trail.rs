//! The engine-facing audit front.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tollgate_core::SessionId;

use crate::entry::AuditEntry;
use crate::sink::{AuditSink, MemoryAuditSink};

/// Default capacity of the in-memory sink.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Append-only audit trail fanning entries out to one or more sinks.
///
/// [`record`](Self::record) never fails: a sink error is logged at `warn`
/// level and counted, and the decision that produced the entry is still
/// delivered. Reads come from the first (primary) sink.
pub struct AuditTrail {
    sinks: Vec<Arc<dyn AuditSink>>,
    warnings: AtomicU64,
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("sinks", &self.sinks.len())
            .field("warnings", &self.warning_count())
            .finish()
    }
}

impl AuditTrail {
    /// Create a trail over a primary sink.
    #[must_use]
    pub fn new(primary: Arc<dyn AuditSink>) -> Self {
        Self {
            sinks: vec![primary],
            warnings: AtomicU64::new(0),
        }
    }

    /// Create a trail backed by a bounded in-memory sink.
    #[must_use]
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(Arc::new(MemoryAuditSink::new(capacity)))
    }

    /// Also write every entry to `sink` (e.g. a [`JsonlAuditSink`](crate::JsonlAuditSink)).
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append an entry to every sink.
    pub fn record(&self, entry: &AuditEntry) {
        for (idx, sink) in self.sinks.iter().enumerate() {
            if let Err(e) = sink.append(entry) {
                self.warnings.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    sink = idx,
                    entry_id = %entry.id,
                    action = %entry.action.description(),
                    error = %e,
                    "audit write failed; decision still delivered"
                );
            }
        }
    }

    /// All entries retained by the primary sink, oldest first.
    ///
    /// A read failure is logged and yields an empty list.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        let Some(primary) = self.sinks.first() else {
            return Vec::new();
        };
        primary.entries().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to read audit entries");
            Vec::new()
        })
    }

    /// The `n` most recent entries, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let mut entries = self.entries();
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
        entries
    }

    /// Entries written while `session_id` was active.
    #[must_use]
    pub fn for_session(&self, session_id: &SessionId) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.session_id.as_ref() == Some(session_id))
            .collect()
    }

    /// Number of entries retained by the primary sink.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sinks
            .first()
            .and_then(|s| s.count().ok())
            .unwrap_or_default()
    }

    /// Whether the primary sink holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many sink writes have failed since creation.
    #[must_use]
    pub fn warning_count(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Flush every sink, logging failures.
    pub fn flush(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                self.warnings.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "audit flush failed");
            }
        }
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::in_memory(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::AuditAction;
    use crate::error::{AuditError, AuditResult};
    use tollgate_core::{Decision, OperationIntent, Timestamp};

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn append(&self, _entry: &AuditEntry) -> AuditResult<()> {
            Err(AuditError::StorageError("disk full".to_owned()))
        }

        fn entries(&self) -> AuditResult<Vec<AuditEntry>> {
            Err(AuditError::StorageError("unreadable".to_owned()))
        }
    }

    fn entry(session: Option<SessionId>) -> AuditEntry {
        let intent = OperationIntent::file("create", "src/new.rs");
        AuditEntry::decision(
            Timestamp::now(),
            session,
            intent.id.clone(),
            intent.key(),
            Decision::AutoApprove,
            None,
        )
    }

    #[test]
    fn test_record_and_read() {
        let trail = AuditTrail::in_memory(100);
        assert!(trail.is_empty());
        trail.record(&entry(None));
        trail.record(&entry(None));
        assert_eq!(trail.len(), 2);
        assert_eq!(trail.warning_count(), 0);
    }

    #[test]
    fn test_failing_sink_only_warns() {
        let trail = AuditTrail::new(Arc::new(FailingSink));
        trail.record(&entry(None));
        trail.record(&entry(None));

        assert_eq!(trail.warning_count(), 2);
        assert!(trail.entries().is_empty());
        assert_eq!(trail.len(), 0);
    }

    #[test]
    fn test_secondary_failure_does_not_affect_primary() {
        let trail = AuditTrail::in_memory(10).with_sink(Arc::new(FailingSink));
        trail.record(&entry(None));

        assert_eq!(trail.len(), 1);
        assert_eq!(trail.warning_count(), 1);
    }

    #[test]
    fn test_recent() {
        let trail = AuditTrail::in_memory(10);
        for _ in 0..5 {
            trail.record(&entry(None));
        }
        assert_eq!(trail.recent(2).len(), 2);
        assert_eq!(trail.recent(50).len(), 5);
    }

    #[test]
    fn test_for_session() {
        let trail = AuditTrail::in_memory(10);
        let session = SessionId::new();
        trail.record(&entry(Some(session.clone())));
        trail.record(&entry(None));
        trail.record(&AuditEntry::new(
            Timestamp::now(),
            Some(session.clone()),
            AuditAction::SessionStarted {
                ends_at: Timestamp::now(),
            },
        ));

        assert_eq!(trail.for_session(&session).len(), 2);
    }
}
