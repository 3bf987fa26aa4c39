//! Configuration types for the tollgate engine.
//!
//! All types in this module are self-contained with no dependencies on other
//! tollgate crates. The decision engine compiles them into its own runtime
//! settings at the boundary. Every struct implements [`Default`] with the
//! production defaults, so a bare `[section]` header in TOML produces a
//! working configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration for the tollgate engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Allow/deny pattern sets and path classification globs.
    pub patterns: PatternsSection,
    /// Risk-factor weights, context deltas, and history tuning.
    pub risk: RiskSection,
    /// Score cut points for decision tiers.
    pub thresholds: ThresholdsSection,
    /// Batch coordination settings.
    pub batch: BatchSection,
    /// Autonomous session limits.
    pub session: SessionSection,
    /// Audit trail retention.
    pub audit: AuditSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// PatternsSection
// ---------------------------------------------------------------------------

/// Allow-list and rule patterns consumed by the pattern matcher and policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsSection {
    /// Command prefixes that are approved outright (read-only, VCS
    /// inspection, and build verbs).
    pub allow_commands: Vec<String>,
    /// Path globs paired with the actions allowed on matching paths.
    pub path_rules: Vec<PathRuleConfig>,
    /// Additional deny substrings. These extend the built-in destructive
    /// signatures, which cannot be removed.
    pub extra_deny_signatures: Vec<String>,
    /// Ordered rules resolving the contextual tier. First match wins.
    pub contextual_rules: Vec<ContextualRuleConfig>,
    /// Globs identifying test files.
    pub test_globs: Vec<String>,
    /// Globs identifying documentation files.
    pub documentation_globs: Vec<String>,
}

impl Default for PatternsSection {
    fn default() -> Self {
        Self {
            allow_commands: to_strings(&[
                "git status",
                "git diff",
                "git log",
                "git show",
                "git branch",
                "git add",
                "git commit",
                "ls",
                "pwd",
                "cat",
                "head",
                "tail",
                "grep",
                "rg",
                "cargo check",
                "cargo build",
                "cargo test",
                "cargo fmt",
                "cargo clippy",
                "npm test",
                "npm run build",
                "npm run lint",
                "yarn test",
                "go build",
                "go test",
                "pytest",
                "make",
            ]),
            path_rules: vec![
                PathRuleConfig::new("src/**", &["create", "edit"]),
                PathRuleConfig::new("lib/**", &["create", "edit"]),
                PathRuleConfig::new("test/**", &["create", "edit", "delete"]),
                PathRuleConfig::new("tests/**", &["create", "edit", "delete"]),
                PathRuleConfig::new("docs/**", &["create", "edit"]),
                PathRuleConfig::new("**/*.md", &["create", "edit"]),
            ],
            extra_deny_signatures: Vec::new(),
            contextual_rules: vec![
                ContextualRuleConfig::new("**/*.pem", ContextualOutcome::Deny),
                ContextualRuleConfig::new("**/id_rsa*", ContextualOutcome::Deny),
                ContextualRuleConfig::new("**/*production*", ContextualOutcome::RequireApproval),
                ContextualRuleConfig::new("**/.env*", ContextualOutcome::RequireApproval),
                ContextualRuleConfig::new("**/*.{test,spec}.*", ContextualOutcome::Approve),
                ContextualRuleConfig::new("**/tests/**", ContextualOutcome::Approve),
                ContextualRuleConfig::new("**/*.md", ContextualOutcome::Approve),
            ],
            test_globs: to_strings(&[
                "**/*.test.*",
                "**/*.spec.*",
                "**/*_test.*",
                "**/test_*",
                "**/test/**",
                "**/tests/**",
                "**/__tests__/**",
            ]),
            documentation_globs: to_strings(&[
                "**/*.md",
                "**/*.rst",
                "**/*.adoc",
                "**/docs/**",
                "**/README*",
                "**/CHANGELOG*",
            ]),
        }
    }
}

/// Path glob paired with the actions it allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRuleConfig {
    /// Glob over the intent's target path.
    pub glob: String,
    /// Actions approved on matching paths.
    pub actions: Vec<String>,
}

impl PathRuleConfig {
    /// Create a rule from a glob and a list of action verbs.
    #[must_use]
    pub fn new(glob: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            glob: glob.into(),
            actions: to_strings(actions),
        }
    }
}

/// How a contextual rule resolves the middle decision tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextualOutcome {
    /// Approve, with the operation logged.
    Approve,
    /// Escalate to a human.
    RequireApproval,
    /// Block with a warning.
    Deny,
}

/// Path glob paired with a contextual outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualRuleConfig {
    /// Glob over the intent's target path.
    pub glob: String,
    /// Outcome when the glob matches.
    pub outcome: ContextualOutcome,
}

impl ContextualRuleConfig {
    /// Create a rule.
    #[must_use]
    pub fn new(glob: impl Into<String>, outcome: ContextualOutcome) -> Self {
        Self {
            glob: glob.into(),
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// RiskSection
// ---------------------------------------------------------------------------

/// Inputs to the risk assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSection {
    /// Keyword-triggered risk factors, averaged when several match.
    pub factors: Vec<RiskFactorConfig>,
    /// Command substrings that add `dangerous_increment` to the base score
    /// directly, bypassing the averaging.
    pub dangerous_commands: Vec<String>,
    /// Increment applied per matching dangerous command substring.
    pub dangerous_increment: f64,
    /// Signed deltas for the intent's context flags.
    pub context: ContextDeltas,
    /// Off-hours window penalty.
    pub off_hours: OffHoursConfig,
    /// Risky weekday penalty.
    pub risky_day: RiskyDayConfig,
    /// Fixed UTC offset for wall-clock checks. `None` uses the host's
    /// local time zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utc_offset_minutes: Option<i32>,
    /// Historical outcome tuning.
    pub history: HistoryConfig,
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            factors: vec![
                RiskFactorConfig::new("production", 0.9, &["production"]),
                RiskFactorConfig::new("configuration", 0.7, &["config", "settings"]),
                RiskFactorConfig::new("environment", 0.8, &[".env", "environment"]),
                RiskFactorConfig::new("security", 0.9, &["security", "secret", "credential"]),
                RiskFactorConfig::new("authentication", 0.9, &["auth", "login", "password"]),
                RiskFactorConfig::new("database", 0.8, &["database", "migration", "schema"]),
                RiskFactorConfig::new("deployment", 0.9, &["deploy", "dockerfile", "terraform"]),
                RiskFactorConfig::new(
                    "dependency",
                    0.6,
                    &["package.json", "cargo.toml", "requirements.txt", "go.mod", "install"],
                ),
                RiskFactorConfig::new("external", 0.7, &["http://", "https://", "curl", "wget"]),
                RiskFactorConfig::new("test", 0.2, &["test", "spec"]),
                RiskFactorConfig::new("documentation", 0.1, &["readme", "docs/", ".md"]),
                RiskFactorConfig::new("styling", 0.1, &[".css", ".scss", "style"]),
            ],
            dangerous_commands: to_strings(&[
                "rm -rf",
                "rm -r",
                "git push --force",
                "git push -f",
                "git reset --hard",
                "git clean -fd",
                "drop table",
                "drop database",
                "truncate table",
                "chmod 777",
                "chmod -r 777",
                "--no-verify",
                "npm publish",
                "cargo publish",
                "kill -9",
            ]),
            dangerous_increment: 0.8,
            context: ContextDeltas::default(),
            off_hours: OffHoursConfig::default(),
            risky_day: RiskyDayConfig::default(),
            utc_offset_minutes: None,
            history: HistoryConfig::default(),
        }
    }
}

/// A named risk factor triggered by keyword containment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactorConfig {
    /// Human-readable factor name, reported as a contributing factor.
    pub name: String,
    /// Weight in [0, 1].
    pub weight: f64,
    /// Case-insensitive substrings that trigger the factor.
    pub keywords: Vec<String>,
}

impl RiskFactorConfig {
    /// Create a factor.
    #[must_use]
    pub fn new(name: impl Into<String>, weight: f64, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            weight,
            keywords: to_strings(keywords),
        }
    }
}

/// Signed deltas applied for each true context flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextDeltas {
    /// Applied when `is_batch_member` is set.
    pub batch_member: f64,
    /// Applied when `is_user_requested` is set.
    pub user_requested: f64,
    /// Applied when `is_automated_fix` is set.
    pub automated_fix: f64,
    /// Applied when `is_first_time_operation` is set.
    pub first_time: f64,
    /// Applied when `has_recent_failure` is set.
    pub recent_failure: f64,
    /// Applied when `is_critical_path` is set.
    pub critical_path: f64,
}

impl Default for ContextDeltas {
    fn default() -> Self {
        Self {
            batch_member: -0.1,
            user_requested: -0.2,
            automated_fix: -0.05,
            first_time: 0.2,
            recent_failure: 0.3,
            critical_path: 0.3,
        }
    }
}

/// Wall-clock window during which operations carry extra risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffHoursConfig {
    /// Whether the penalty applies at all.
    pub enabled: bool,
    /// First off-hours hour (0-23, inclusive).
    pub start_hour: u32,
    /// First working hour (0-23, exclusive end). The window wraps midnight
    /// when `start_hour > end_hour`.
    pub end_hour: u32,
    /// Penalty added inside the window.
    pub penalty: f64,
}

impl Default for OffHoursConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_hour: 22,
            end_hour: 6,
            penalty: 0.1,
        }
    }
}

/// Weekday on which operations carry a small extra risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskyDayConfig {
    /// Lowercase English weekday name, or `None` to disable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<String>,
    /// Penalty added on that day.
    pub penalty: f64,
}

impl Default for RiskyDayConfig {
    fn default() -> Self {
        Self {
            weekday: Some("friday".to_owned()),
            penalty: 0.05,
        }
    }
}

/// Historical outcome tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum observations kept per operation key (oldest evicted first).
    pub max_entries: usize,
    /// Maximum distinct operation keys tracked. The key with the oldest
    /// activity is forgotten to make room for a new one.
    pub max_keys: usize,
    /// How long a reported failure counts as recent.
    pub failure_window_secs: u64,
    /// Penalty per recent failure.
    pub failure_penalty: f64,
    /// Minimum observations before the success bonus can apply.
    pub min_attempts: usize,
    /// Success rate that must be exceeded for the bonus.
    pub success_rate: f64,
    /// Bonus subtracted for a reliable track record.
    pub success_bonus: f64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_keys: 10_000,
            failure_window_secs: 3600,
            failure_penalty: 0.3,
            min_attempts: 10,
            success_rate: 0.95,
            success_bonus: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// ThresholdsSection
// ---------------------------------------------------------------------------

/// Exclusive upper bounds of each decision tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsSection {
    /// Below this: auto-approve.
    pub auto_approve: f64,
    /// Below this: auto-approve with log.
    pub approve_with_log: f64,
    /// Below this: contextual resolution.
    pub contextual: f64,
    /// Below this: require approval. At or above: block. Also the single
    /// cut used during an autonomous session.
    pub block: f64,
}

impl Default for ThresholdsSection {
    fn default() -> Self {
        Self {
            auto_approve: 0.2,
            approve_with_log: 0.4,
            contextual: 0.6,
            block: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// BatchSection
// ---------------------------------------------------------------------------

/// Batch type names accepted in `batch.auto_approve_types`.
pub const BATCH_TYPES: &[&str] = &[
    "multiple_file_creation",
    "bulk_formatting",
    "test_suite_creation",
    "documentation_updates",
    "unknown",
];

/// Batch coordination settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Batch types whose members are approved without per-item scoring.
    pub auto_approve_types: Vec<String>,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            auto_approve_types: to_strings(&[
                "multiple_file_creation",
                "bulk_formatting",
                "test_suite_creation",
                "documentation_updates",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSection
// ---------------------------------------------------------------------------

/// Autonomous session limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Duration used when a start request does not specify one.
    pub default_duration_secs: u64,
    /// Longest session a start request may ask for.
    pub max_duration_secs: u64,
    /// Completed session summaries kept in memory.
    pub summary_history: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            default_duration_secs: 3600,
            max_duration_secs: 8 * 3600,
            summary_history: 20,
        }
    }
}

// ---------------------------------------------------------------------------
// AuditSection
// ---------------------------------------------------------------------------

/// Audit trail retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Entries kept by the in-memory sink (oldest dropped first).
    pub capacity: usize,
    /// Optional JSON-lines file the host wants entries appended to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["tollgate_approval=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}
