//! Allow/deny pattern classification.
//!
//! [`PatternMatcher::classify`] is the first stage of every decision. It is
//! pure: the same intent against the same matcher always yields the same
//! [`Classification`], and nothing is recorded.
//!
//! Deny signatures come in two layers:
//! - **Built-in** destructive signatures (recursive deletion of root paths,
//!   disk formatting, privilege escalation, fetch-and-execute pipelines).
//!   These are compiled into every matcher and cannot be removed by
//!   configuration.
//! - **Extra** substrings from `patterns.extra_deny_signatures`.

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tollgate_config::PatternsSection;
use tollgate_core::{OperationIntent, OperationKind};

use crate::error::{ApprovalError, ApprovalResult};

/// Built-in destructive command signatures, as `(name, regex)` pairs.
///
/// Matched against the lowercased command text. A command word may follow
/// a line break or any shell separator, may carry a directory prefix
/// (`/usr/bin/sudo`), and may be wrapped by launchers such as `env`,
/// `time`, `nohup` or `exec`.
const BUILTIN_DENY_PATTERNS: &[(&str, &str)] = &[
    (
        "recursive deletion of a root path",
        r#"\brm\s+(?:-\S+\s+)*-\S*r\S*\s+(?:\S+\s+)*?["']?(?:/|~|\$home|\$\{home\}|/(?:etc|usr|bin|boot|var|home|lib|lib64|sbin|sys|proc|dev|opt|root))/?\*?["']?(?:\s|$|[;&|)])"#,
    ),
    (
        "disk formatting",
        r"(?:^|[\s;&|(`])(?:\S*/)?(?:mkfs(?:\.\w+)?|mke2fs|mkswap|wipefs|fdisk|sfdisk|parted)(?:\s|$)",
    ),
    ("raw device write", r"\bdd\s+[^;&|\n]*\bof=/dev/"),
    ("raw device redirect", r">\s*/dev/(?:sd|hd|nvme|disk|mmcblk)"),
    (
        "privilege escalation",
        r"(?:^|[\n;&|(`]|\$\()\s*(?:(?:\S*/)?(?:env|time|nohup|exec|command|nice|timeout|stdbuf|xargs)(?:\s+(?:-\S+|\w+=\S*|\d\S*))*\s+)*(?:\S*/)?(?:sudo|su|doas|pkexec|runas)(?:\s|$)",
    ),
    (
        "remote script execution",
        r"\b(?:curl|wget|fetch)\b[^;\n]*\|\s*(?:(?:\S*/)?(?:env|time|nohup|exec|command|sudo|doas)(?:\s+(?:-\S+|\w+=\S*))*\s+)*(?:\S*/)?(?:(?:ba|z|da|k|fi|c|tc)?sh|python[0-9.]*|perl|ruby|node|php)\b",
    ),
    (
        "remote script execution",
        r#"\b(?:ba|z|da|k)?sh\s+(?:<\(|-c\s+["']?(?:\$\(|`))\s*(?:curl|wget)\b"#,
    ),
    ("fork bomb", r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:"),
];

/// Filesystem targets that may never be deleted.
const ROOT_PATHS: &[&str] = &[
    "/", "~", "$home", "${home}", "/etc", "/usr", "/bin", "/boot", "/var", "/home", "/lib",
    "/lib64", "/sbin", "/sys", "/proc", "/dev", "/opt", "/root", "c:",
];

const DELETE_ACTIONS: &[&str] = &["delete", "remove", "rm", "rmdir", "unlink"];

/// Shell metacharacters that chain or redirect commands. An allow-listed
/// prefix never applies to a command containing any of these.
const CHAINING_TOKENS: &[&str] = &[";", "&", "|", "`", "$(", ">", "<", "\n"];

/// Result of matching an intent against the pattern sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Classification {
    /// A destructive signature matched; the intent is always blocked.
    AbsoluteDeny {
        /// Name of the matched signature.
        signature: String,
    },
    /// An allow-list entry matched; the intent is approved without scoring.
    AbsoluteAllow {
        /// The allow-list entry that matched.
        rule: String,
    },
    /// Nothing matched; the intent goes to risk scoring.
    NoMatch,
}

impl Classification {
    /// Whether this is an absolute deny.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::AbsoluteDeny { .. })
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbsoluteDeny { signature } => write!(f, "absolute deny ({signature})"),
            Self::AbsoluteAllow { rule } => write!(f, "absolute allow ({rule})"),
            Self::NoMatch => write!(f, "no match"),
        }
    }
}

struct DenySignature {
    name: &'static str,
    regex: Regex,
}

struct PathRule {
    glob: String,
    matcher: GlobMatcher,
    actions: Vec<String>,
}

/// Precompiled allow/deny pattern sets.
pub struct PatternMatcher {
    builtin_deny: Vec<DenySignature>,
    extra_deny: Vec<String>,
    allow_commands: Vec<String>,
    path_rules: Vec<PathRule>,
    test_paths: GlobSet,
    documentation_paths: GlobSet,
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("builtin_deny", &self.builtin_deny.len())
            .field("extra_deny", &self.extra_deny)
            .field("allow_commands", &self.allow_commands)
            .field(
                "path_rules",
                &self.path_rules.iter().map(|r| &r.glob).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl PatternMatcher {
    /// Compile the pattern section. Globs and signatures are compiled once
    /// here, never per call.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::InvalidConfig`] if a glob does not parse, or
    /// [`ApprovalError::Internal`] if a built-in signature fails to compile.
    pub fn from_config(section: &PatternsSection) -> ApprovalResult<Self> {
        let builtin_deny = BUILTIN_DENY_PATTERNS
            .iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| DenySignature { name, regex })
                    .map_err(|e| ApprovalError::Internal(format!("deny signature {name}: {e}")))
            })
            .collect::<ApprovalResult<Vec<_>>>()?;

        let path_rules = section
            .path_rules
            .iter()
            .map(|rule| {
                Ok(PathRule {
                    glob: rule.glob.clone(),
                    matcher: compile_glob(&rule.glob)?,
                    actions: rule.actions.iter().map(|a| a.to_lowercase()).collect(),
                })
            })
            .collect::<ApprovalResult<Vec<_>>>()?;

        Ok(Self {
            builtin_deny,
            extra_deny: lowercase_non_empty(&section.extra_deny_signatures),
            allow_commands: section
                .allow_commands
                .iter()
                .map(|c| normalize_command(c))
                .filter(|c| !c.is_empty())
                .collect(),
            path_rules,
            test_paths: compile_glob_set(&section.test_globs)?,
            documentation_paths: compile_glob_set(&section.documentation_globs)?,
        })
    }

    /// Classify an intent. Deny is evaluated first and wins over any allow.
    #[must_use]
    pub fn classify(&self, intent: &OperationIntent) -> Classification {
        if let Some(signature) = self.deny_signature(intent) {
            return Classification::AbsoluteDeny { signature };
        }

        if let Some(command) = intent.command_text.as_deref().filter(|c| !c.trim().is_empty()) {
            return match self.allowed_command(command) {
                Some(prefix) => Classification::AbsoluteAllow {
                    rule: format!("command `{prefix}`"),
                },
                None => Classification::NoMatch,
            };
        }

        if intent.kind == OperationKind::Filesystem
            && let Some(path) = intent.target_path.as_deref()
            && let Some(rule) = self.path_rule(path, &intent.action)
        {
            return Classification::AbsoluteAllow {
                rule: format!("path `{}`", rule.glob),
            };
        }

        Classification::NoMatch
    }

    /// Name of the first deny signature the intent matches, if any.
    #[must_use]
    pub fn deny_signature(&self, intent: &OperationIntent) -> Option<String> {
        if let Some(command) = intent.command_text.as_deref() {
            let lowered = command.to_lowercase();
            if let Some(sig) = self.builtin_deny.iter().find(|s| s.regex.is_match(&lowered)) {
                return Some(sig.name.to_owned());
            }
            if let Some(extra) = self.extra_deny.iter().find(|s| lowered.contains(s.as_str())) {
                return Some(format!("deny signature `{extra}`"));
            }
        }

        if let Some(path) = intent.target_path.as_deref() {
            let lowered = path.to_lowercase();
            if let Some(extra) = self.extra_deny.iter().find(|s| lowered.contains(s.as_str())) {
                return Some(format!("deny signature `{extra}`"));
            }
            let action = intent.action.to_lowercase();
            if DELETE_ACTIONS.contains(&action.as_str()) && is_root_path(&lowered) {
                return Some("deletion of a root path".to_owned());
            }
        }

        None
    }

    /// Whether `path` matches a path rule that allows `action`.
    #[must_use]
    pub fn allows_path(&self, path: &str, action: &str) -> bool {
        self.path_rule(path, action).is_some()
    }

    /// Whether `path` matches one of the test-file globs.
    #[must_use]
    pub fn is_test_path(&self, path: &str) -> bool {
        normalize_path(path).is_some_and(|p| self.test_paths.is_match(p))
    }

    /// Whether `path` matches one of the documentation globs.
    #[must_use]
    pub fn is_documentation_path(&self, path: &str) -> bool {
        normalize_path(path).is_some_and(|p| self.documentation_paths.is_match(p))
    }

    fn allowed_command(&self, command: &str) -> Option<&str> {
        let normalized = normalize_command(command);
        if CHAINING_TOKENS.iter().any(|t| normalized.contains(t)) {
            return None;
        }
        self.allow_commands
            .iter()
            .find(|prefix| {
                normalized
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
            })
            .map(String::as_str)
    }

    fn path_rule(&self, path: &str, action: &str) -> Option<&PathRule> {
        let path = normalize_path(path)?;
        let action = action.to_lowercase();
        self.path_rules
            .iter()
            .find(|rule| rule.actions.contains(&action) && rule.matcher.is_match(&path))
    }
}

/// Compile a single glob with `*` allowed to cross `/`.
pub(crate) fn compile_glob(pattern: &str) -> ApprovalResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ApprovalError::InvalidConfig(format!("invalid glob {pattern:?}: {e}")))
}

fn compile_glob_set(patterns: &[String]) -> ApprovalResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()
            .map_err(|e| ApprovalError::InvalidConfig(format!("invalid glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ApprovalError::InvalidConfig(format!("glob set: {e}")))
}

/// Canonical relative form of a path for glob matching.
///
/// Returns `None` for paths that climb out with `..`, which never match an
/// allow rule.
pub(crate) fn normalize_path(path: &str) -> Option<String> {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if rest.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(rest.to_owned())
}

fn normalize_command(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn lowercase_non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn is_root_path(lowered: &str) -> bool {
    let unified = lowered
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace('\\', "/");
    let base = unified.strip_suffix('*').unwrap_or(&unified);
    let trimmed = base.trim_end_matches('/');
    let candidate = if trimmed.is_empty() && !base.is_empty() {
        "/"
    } else {
        trimmed
    };
    ROOT_PATHS.contains(&candidate)
}
