//! Risk scoring.
//!
//! A [`RiskScore`] is composed from three terms with a fixed law:
//!
//! ```text
//! value = clamp01(0.6 * base + 0.25 * context + 0.15 * history)
//! ```
//!
//! - **base**: arithmetic mean of the weights of matched risk factors, plus a
//!   fixed increment per dangerous command substring, clamped to [0, 1].
//! - **context**: signed sum of the deltas for each true context flag, plus
//!   off-hours and risky-day penalties.
//! - **history**: a penalty per recent failure for the same
//!   [`OperationKey`], or a bonus for a long reliable track record.
//!
//! The weights inside each term come from [`RiskWeights`]; the composition
//! weights do not.

use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDateTime, TimeDelta, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tollgate_config::{ContextDeltas, HistoryConfig, OffHoursConfig, RiskSection};
use tollgate_core::{IntentContext, OperationIntent, OperationKey, RiskLevel};

use crate::error::{ApprovalError, ApprovalResult};

/// Weight of the base term in the final score.
pub const BASE_WEIGHT: f64 = 0.6;
/// Weight of the context term in the final score.
pub const CONTEXT_WEIGHT: f64 = 0.25;
/// Weight of the history term in the final score.
pub const HISTORY_WEIGHT: f64 = 0.15;

/// A scored intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Final score in [0, 1].
    pub value: f64,
    /// Level derived from `value`.
    pub level: RiskLevel,
    /// Base term in [0, 1].
    pub base: f64,
    /// Signed context term.
    pub context: f64,
    /// Signed history term.
    pub history: f64,
    /// Human-readable names of everything that moved the score. Presentation
    /// only.
    pub contributing_factors: Vec<String>,
}

impl RiskScore {
    /// Compose a score from its three terms.
    #[must_use]
    pub fn compose(base: f64, context: f64, history: f64, contributing_factors: Vec<String>) -> Self {
        let value = clamp01(BASE_WEIGHT * base + CONTEXT_WEIGHT * context + HISTORY_WEIGHT * history);
        Self {
            value,
            level: RiskLevel::from_score(value),
            base,
            context,
            history,
            contributing_factors,
        }
    }
}

/// Clamp to [0, 1], mapping NaN to 1 so a broken weight fails closed.
#[must_use]
pub fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        1.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn count_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

// ---------------------------------------------------------------------------
// RiskWeights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RiskFactor {
    name: String,
    weight: f64,
    keywords: Vec<String>,
}

/// Scoring tables compiled from the `risk` config section.
#[derive(Debug, Clone)]
pub struct RiskWeights {
    factors: Vec<RiskFactor>,
    dangerous_commands: Vec<String>,
    dangerous_increment: f64,
    context: ContextDeltas,
    off_hours: OffHoursConfig,
    risky_day: Option<(Weekday, f64)>,
    utc_offset: Option<FixedOffset>,
    history: HistoryConfig,
}

impl RiskWeights {
    /// Compile the risk section. Keywords and signatures are lowercased once.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`] for an unknown weekday name or
    /// an out-of-range UTC offset.
    pub fn from_config(section: &RiskSection) -> ApprovalResult<Self> {
        let factors = section
            .factors
            .iter()
            .map(|f| RiskFactor {
                name: f.name.clone(),
                weight: f.weight,
                keywords: f
                    .keywords
                    .iter()
                    .map(|k| k.to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();

        let risky_day = match section.risky_day.weekday.as_deref() {
            Some(name) => {
                let day = name.parse::<Weekday>().map_err(|_| {
                    ApprovalError::InvalidConfig(format!("unknown weekday {name:?}"))
                })?;
                Some((day, section.risky_day.penalty))
            },
            None => None,
        };

        let utc_offset = match section.utc_offset_minutes {
            Some(minutes) => Some(
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        ApprovalError::InvalidConfig(format!("utc offset {minutes} out of range"))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            factors,
            dangerous_commands: section
                .dangerous_commands
                .iter()
                .map(|c| c.to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
            dangerous_increment: section.dangerous_increment,
            context: section.context.clone(),
            off_hours: section.off_hours.clone(),
            risky_day,
            utc_offset,
            history: section.history.clone(),
        })
    }

    /// History tuning.
    #[must_use]
    pub fn history(&self) -> &HistoryConfig {
        &self.history
    }

    /// Base term and the names of the factors that produced it.
    #[must_use]
    pub fn base(&self, intent: &OperationIntent) -> (f64, Vec<String>) {
        let haystack = [
            intent.target_path.as_deref().unwrap_or_default(),
            intent.action.as_str(),
            intent.command_text.as_deref().unwrap_or_default(),
        ]
        .join(" ")
        .to_lowercase();

        let mut names = Vec::new();
        let mut sum = 0.0;
        let mut matched = 0_usize;
        for factor in &self.factors {
            if factor.keywords.iter().any(|k| haystack.contains(k.as_str())) {
                sum += factor.weight;
                matched = matched.saturating_add(1);
                names.push(factor.name.clone());
            }
        }
        let mut base = if matched == 0 { 0.0 } else { sum / count_f64(matched) };

        if let Some(command) = intent.command_text.as_deref() {
            let lowered = command.to_lowercase();
            for signature in &self.dangerous_commands {
                if lowered.contains(signature.as_str()) {
                    base += self.dangerous_increment;
                    names.push(format!("dangerous command `{signature}`"));
                }
            }
        }

        (clamp01(base), names)
    }

    /// Context term and the names of the modifiers that produced it.
    #[must_use]
    pub fn context(&self, ctx: &IntentContext, now: DateTime<Utc>) -> (f64, Vec<String>) {
        let deltas = &self.context;
        let flags = [
            (ctx.is_batch_member, deltas.batch_member, "batch member"),
            (ctx.is_user_requested, deltas.user_requested, "user requested"),
            (ctx.is_automated_fix, deltas.automated_fix, "automated fix"),
            (ctx.is_first_time_operation, deltas.first_time, "first-time operation"),
            (ctx.has_recent_failure, deltas.recent_failure, "recent failure reported"),
            (ctx.is_critical_path, deltas.critical_path, "critical path"),
        ];

        let mut names = Vec::new();
        let mut total = 0.0;
        for (set, delta, name) in flags {
            if set {
                total += delta;
                names.push(name.to_owned());
            }
        }

        let local = self.local_time(now);
        if self.off_hours.enabled
            && in_window(local.hour(), self.off_hours.start_hour, self.off_hours.end_hour)
        {
            total += self.off_hours.penalty;
            names.push("off-hours".to_owned());
        }
        if let Some((day, penalty)) = self.risky_day
            && local.weekday() == day
        {
            total += penalty;
            names.push(format!("risky day ({day})"));
        }

        (total, names)
    }

    fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self.utc_offset {
            Some(offset) => now.with_timezone(&offset).naive_local(),
            None => now.with_timezone(&Local).naive_local(),
        }
    }
}

/// Whether `hour` falls in `[start, end)`, wrapping midnight when
/// `start > end`. An empty window (`start == end`) never matches.
fn in_window(hour: u32, start: u32, end: u32) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Less => hour >= start && hour < end,
        std::cmp::Ordering::Greater => hour >= start || hour < end,
        std::cmp::Ordering::Equal => false,
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One observation of an operation key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// When the operation was scored.
    pub timestamp: DateTime<Utc>,
    /// Score it received.
    pub score: f64,
    /// Provisionally `true`; flipped by a failure report.
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct KeyHistory {
    records: VecDeque<HistoryRecord>,
    failures: Vec<DateTime<Utc>>,
}

impl KeyHistory {
    /// Newest observation or failure report.
    fn last_activity(&self) -> Option<DateTime<Utc>> {
        let seen = self.records.back().map(|r| r.timestamp);
        let failed = self.failures.iter().max().copied();
        seen.max(failed)
    }

    fn push(&mut self, record: HistoryRecord, max_entries: usize) {
        self.records.push_back(record);
        while self.records.len() > max_entries.max(1) {
            self.records.pop_front();
        }
    }

    fn prune_failures(&mut self, now: DateTime<Utc>, window_secs: u64) {
        let window = std::time::Duration::from_secs(window_secs);
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.failures.retain(|t| *t > cutoff);
    }

    /// History term. Prunes stale failures first.
    fn term(&mut self, cfg: &HistoryConfig, now: DateTime<Utc>) -> (f64, Option<String>) {
        self.prune_failures(now, cfg.failure_window_secs);

        let recent = self.failures.len();
        if recent > 0 {
            return (
                cfg.failure_penalty * count_f64(recent),
                Some(format!("{recent} recent failure(s)")),
            );
        }

        let attempts = self.records.len();
        if attempts > 0 && attempts >= cfg.min_attempts {
            let successes = self.records.iter().filter(|r| r.succeeded).count();
            let rate = count_f64(successes) / count_f64(attempts);
            if rate > cfg.success_rate {
                return (-cfg.success_bonus, Some("reliable history".to_owned()));
            }
        }

        (0.0, None)
    }
}

type Tables = HashMap<OperationKey, KeyHistory>;

/// The entry for `key`, first evicting the least recently active key when
/// `key` is new and the table already holds `max_keys`.
fn entry_with_room<'a>(
    tables: &'a mut Tables,
    key: &OperationKey,
    max_keys: usize,
) -> &'a mut KeyHistory {
    if !tables.contains_key(key) && tables.len() >= max_keys.max(1) {
        let stale = tables
            .iter()
            .min_by_key(|(_, h)| h.last_activity())
            .map(|(k, _)| k.clone());
        if let Some(stale) = stale {
            tables.remove(&stale);
            tracing::debug!(evicted = %stale, max_keys, "risk history full, forgot oldest key");
        }
    }
    tables.entry(key.clone()).or_default()
}

/// Scores intents and owns the per-key history tables.
///
/// All tables sit behind one mutex. A score's history read and the
/// observation it records happen under the same guard, so concurrent
/// decisions for one key cannot interleave a stale read with a write.
/// At most `max_keys` keys are tracked.
#[derive(Debug, Default)]
pub struct RiskAssessor {
    tables: Mutex<Tables>,
}

impl RiskAssessor {
    /// Create an assessor with empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| {
            tracing::warn!("risk history lock was poisoned, recovering");
            e.into_inner()
        })
    }

    /// Score an intent and record the observation (provisionally succeeded).
    #[must_use]
    pub fn score(
        &self,
        intent: &OperationIntent,
        weights: &RiskWeights,
        now: DateTime<Utc>,
    ) -> RiskScore {
        self.evaluate(intent, weights, now, true)
    }

    /// Score an intent without recording anything.
    #[must_use]
    pub fn preview(
        &self,
        intent: &OperationIntent,
        weights: &RiskWeights,
        now: DateTime<Utc>,
    ) -> RiskScore {
        self.evaluate(intent, weights, now, false)
    }

    fn evaluate(
        &self,
        intent: &OperationIntent,
        weights: &RiskWeights,
        now: DateTime<Utc>,
        record: bool,
    ) -> RiskScore {
        let (base, mut factors) = weights.base(intent);
        let (context, context_factors) = weights.context(&intent.context, now);
        factors.extend(context_factors);

        let key = intent.key();
        let mut tables = self.lock();
        let (history, history_factor) = if record {
            entry_with_room(&mut tables, &key, weights.history.max_keys)
                .term(&weights.history, now)
        } else {
            tables
                .get_mut(&key)
                .map_or((0.0, None), |h| h.term(&weights.history, now))
        };
        factors.extend(history_factor);

        let score = RiskScore::compose(base, context, history, factors);

        if record && let Some(entry) = tables.get_mut(&key) {
            entry.push(
                HistoryRecord {
                    timestamp: now,
                    score: score.value,
                    succeeded: true,
                },
                weights.history.max_entries,
            );
        }
        drop(tables);

        tracing::trace!(
            operation = %key,
            base,
            context,
            history,
            risk = score.value,
            "scored intent"
        );
        score
    }

    /// Close the loop on an executed operation.
    ///
    /// Sets `succeeded` on the most recent record for `key`. A failure is
    /// also appended to the key's failure list, even if the key was never
    /// scored (allow-listed operations can fail too).
    pub fn report_outcome(
        &self,
        key: &OperationKey,
        succeeded: bool,
        now: DateTime<Utc>,
        cfg: &HistoryConfig,
    ) {
        let mut tables = self.lock();
        let entry = entry_with_room(&mut tables, key, cfg.max_keys);
        if let Some(last) = entry.records.back_mut() {
            last.succeeded = succeeded;
        }
        if !succeeded {
            entry.failures.push(now);
            entry.prune_failures(now, cfg.failure_window_secs);
        }
    }

    /// Reinsert a persisted observation.
    pub fn restore_observation(&self, key: &OperationKey, record: HistoryRecord, cfg: &HistoryConfig) {
        let mut tables = self.lock();
        entry_with_room(&mut tables, key, cfg.max_keys).push(record, cfg.max_entries);
    }

    /// Reinsert a persisted failure report.
    pub fn restore_failure(&self, key: &OperationKey, at: DateTime<Utc>, cfg: &HistoryConfig) {
        let mut tables = self.lock();
        let entry = entry_with_room(&mut tables, key, cfg.max_keys);
        if let Some(last) = entry.records.iter_mut().rev().find(|r| r.timestamp <= at) {
            last.succeeded = false;
        }
        entry.failures.push(at);
    }

    /// Snapshot of the records for `key`, oldest first.
    #[must_use]
    pub fn history(&self, key: &OperationKey) -> Vec<HistoryRecord> {
        self.lock()
            .get(key)
            .map(|h| h.records.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of records stored for `key`.
    #[must_use]
    pub fn history_len(&self, key: &OperationKey) -> usize {
        self.lock().get(key).map_or(0, |h| h.records.len())
    }

    /// Failures for `key` inside the window ending at `now`.
    #[must_use]
    pub fn recent_failures(&self, key: &OperationKey, now: DateTime<Utc>, window_secs: u64) -> usize {
        let mut tables = self.lock();
        tables.get_mut(key).map_or(0, |h| {
            h.prune_failures(now, window_secs);
            h.failures.len()
        })
    }

    /// Number of distinct keys with history.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Forget all history.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
