use super::enforce::{
    block_workspace_expansion, clamp_max, clamp_max_int, clamp_min, clamp_min_int,
    enforce_bool_only_true, protect_weighted_entries, union_arrays,
};

/// Float fields the workspace may only lower. Lower thresholds push more
/// operations toward human approval.
const CLAMPED_FLOATS: &[&[&str]] = &[
    &["thresholds", "auto_approve"],
    &["thresholds", "approve_with_log"],
    &["thresholds", "contextual"],
    &["thresholds", "block"],
    &["risk", "history", "success_bonus"],
];

/// Float fields the workspace may only raise. Every one of them moves a
/// score up as it grows, the lowering context deltas included (they are
/// negative, so raising them shrinks the discount).
const FLOOR_FLOATS: &[&[&str]] = &[
    &["risk", "dangerous_increment"],
    &["risk", "off_hours", "penalty"],
    &["risk", "risky_day", "penalty"],
    &["risk", "history", "failure_penalty"],
    &["risk", "history", "success_rate"],
    &["risk", "context", "batch_member"],
    &["risk", "context", "user_requested"],
    &["risk", "context", "automated_fix"],
    &["risk", "context", "first_time"],
    &["risk", "context", "recent_failure"],
    &["risk", "context", "critical_path"],
];

/// Integer fields the workspace may only raise.
const FLOOR_INTS: &[&[&str]] = &[
    &["risk", "history", "failure_window_secs"],
    &["risk", "history", "min_attempts"],
];

/// Weighted entry lists whose weights the workspace may only raise.
const PROTECTED_WEIGHTS: &[&[&str]] = &[&["risk", "factors"]];

/// Integer fields the workspace may only lower.
const CLAMPED_INTS: &[&[&str]] = &[
    &["session", "default_duration_secs"],
    &["session", "max_duration_secs"],
];

/// Arrays the workspace may only append to.
const UNION_ARRAYS: &[&[&str]] = &[
    &["patterns", "extra_deny_signatures"],
    &["risk", "dangerous_commands"],
];

/// Allow-lists the workspace may only narrow.
const NO_EXPANSION: &[&[&str]] = &[
    &["patterns", "allow_commands"],
    &["patterns", "path_rules"],
    &["patterns", "contextual_rules"],
    &["batch", "auto_approve_types"],
];

/// Booleans the workspace may only switch on.
const ONLY_TRUE: &[&[&str]] = &[&["risk", "off_hours", "enabled"]];

/// Enforce that the workspace layer can only tighten the engine. Call after
/// merging the workspace layer and before deserialization.
///
/// `baseline` is the merged tree *before* the workspace layer was applied,
/// so enforcement holds even when no user config exists.
pub fn enforce_restrictions(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace_layer: &toml::Value,
) {
    for path in CLAMPED_FLOATS {
        clamp_max(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in FLOOR_FLOATS {
        clamp_min(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in FLOOR_INTS {
        clamp_min_int(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in PROTECTED_WEIGHTS {
        protect_weighted_entries(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in CLAMPED_INTS {
        clamp_max_int(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in UNION_ARRAYS {
        union_arrays(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in NO_EXPANSION {
        block_workspace_expansion(merged, baseline, workspace_layer, path, &path.join("."));
    }
    for path in ONLY_TRUE {
        enforce_bool_only_true(merged, workspace_layer, path, &path.join("."));
    }
}
