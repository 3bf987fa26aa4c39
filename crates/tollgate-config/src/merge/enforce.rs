use tracing::warn;

use super::path::{get_nested, set_nested};

/// Read a number whether it was written as a TOML float or integer.
#[allow(clippy::cast_precision_loss)]
fn as_number(val: &toml::Value) -> Option<f64> {
    match val {
        toml::Value::Float(f) => Some(*f),
        toml::Value::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

/// Clamp a float field so the workspace cannot raise it above baseline.
pub(super) fn clamp_max(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let baseline_val = get_nested(baseline, path).and_then(as_number);
    let ws_val = get_nested(workspace, path).and_then(as_number);

    if let (Some(base_v), Some(ws_v)) = (baseline_val, ws_val)
        && (ws_v > base_v || ws_v.is_nan())
    {
        warn!(
            field = field_name,
            baseline = base_v,
            requested = ws_v,
            "workspace config tried to raise a limit; clamping to baseline"
        );
        set_nested(merged, path, toml::Value::Float(base_v));
    }
}

/// Clamp an integer field so the workspace cannot raise it above baseline.
pub(super) fn clamp_max_int(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let baseline_val = get_nested(baseline, path).and_then(toml::Value::as_integer);
    let ws_val = get_nested(workspace, path).and_then(toml::Value::as_integer);

    if let (Some(base_v), Some(ws_v)) = (baseline_val, ws_val)
        && ws_v > base_v
    {
        warn!(
            field = field_name,
            baseline = base_v,
            requested = ws_v,
            "workspace config tried to raise a limit; clamping to baseline"
        );
        set_nested(merged, path, toml::Value::Integer(base_v));
    }
}

/// Clamp a float field so the workspace cannot lower it below baseline.
pub(super) fn clamp_min(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let baseline_val = get_nested(baseline, path).and_then(as_number);
    let ws_val = get_nested(workspace, path).and_then(as_number);

    if let (Some(base_v), Some(ws_v)) = (baseline_val, ws_val)
        && (ws_v < base_v || ws_v.is_nan())
    {
        warn!(
            field = field_name,
            baseline = base_v,
            requested = ws_v,
            "workspace config tried to lower a risk weight; clamping to baseline"
        );
        set_nested(merged, path, toml::Value::Float(base_v));
    }
}

/// Clamp an integer field so the workspace cannot lower it below baseline.
pub(super) fn clamp_min_int(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let baseline_val = get_nested(baseline, path).and_then(toml::Value::as_integer);
    let ws_val = get_nested(workspace, path).and_then(toml::Value::as_integer);

    if let (Some(base_v), Some(ws_v)) = (baseline_val, ws_val)
        && ws_v < base_v
    {
        warn!(
            field = field_name,
            baseline = base_v,
            requested = ws_v,
            "workspace config tried to lower a limit; clamping to baseline"
        );
        set_nested(merged, path, toml::Value::Integer(base_v));
    }
}

/// A boolean the workspace may switch on but never off.
pub(super) fn enforce_bool_only_true(
    merged: &mut toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    if let Some(false) = get_nested(workspace, path).and_then(toml::Value::as_bool) {
        warn!(
            field = field_name,
            "workspace config tried to disable a safeguard; forcing it on"
        );
        set_nested(merged, path, toml::Value::Boolean(true));
    }
}

/// Union the workspace array with the baseline: entries can be added but
/// never removed.
pub(super) fn union_arrays(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    if get_nested(workspace, path).is_none() {
        return;
    }
    let Some(baseline_items) = get_nested(baseline, path).and_then(toml::Value::as_array) else {
        return;
    };

    let mut result = get_nested(merged, path)
        .and_then(toml::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut restored: usize = 0;
    for item in baseline_items {
        if !result.contains(item) {
            result.push(item.clone());
            restored = restored.saturating_add(1);
        }
    }
    if restored > 0 {
        warn!(
            field = field_name,
            restored, "workspace config removed entries; restoring them"
        );
    }

    set_nested(merged, path, toml::Value::Array(result));
}

/// The workspace may narrow an array to a subset of the baseline but never
/// add entries. Any addition reverts the whole field to baseline.
pub(super) fn block_workspace_expansion(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let Some(ws_items) = get_nested(workspace, path).and_then(toml::Value::as_array) else {
        return;
    };
    let baseline_items = get_nested(baseline, path)
        .and_then(toml::Value::as_array)
        .cloned()
        .unwrap_or_default();

    if ws_items.iter().any(|item| !baseline_items.contains(item)) {
        warn!(
            field = field_name,
            "workspace config tried to expand an allow-list; reverting to baseline"
        );
        set_nested(merged, path, toml::Value::Array(baseline_items));
    }
}

/// Named weighted entries (`name`, `weight`, `keywords`) the workspace may
/// only make heavier.
///
/// The baseline list is kept as-is, except that a workspace entry with the
/// same name may raise its weight. Removals, keyword edits and new entries
/// are dropped: any of them could pull a mean of matched weights down.
pub(super) fn protect_weighted_entries(
    merged: &mut toml::Value,
    baseline: &toml::Value,
    workspace: &toml::Value,
    path: &[&str],
    field_name: &str,
) {
    let Some(ws_items) = get_nested(workspace, path).and_then(toml::Value::as_array) else {
        return;
    };
    let mut result = get_nested(baseline, path)
        .and_then(toml::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let name_of = |item: &toml::Value| {
        item.get("name")
            .and_then(toml::Value::as_str)
            .map(str::to_owned)
    };
    let weight_of = |item: &toml::Value| item.get("weight").and_then(as_number);

    let mut ignored: usize = 0;
    for ws_item in ws_items {
        let Some(name) = name_of(ws_item) else {
            ignored = ignored.saturating_add(1);
            continue;
        };
        let Some(base_item) = result
            .iter_mut()
            .find(|b| name_of(&**b).as_deref() == Some(name.as_str()))
        else {
            ignored = ignored.saturating_add(1);
            continue;
        };
        if ws_item
            .get("keywords")
            .is_some_and(|k| Some(k) != base_item.get("keywords"))
        {
            ignored = ignored.saturating_add(1);
        }
        if let (Some(ws_w), Some(base_w)) = (weight_of(ws_item), weight_of(&*base_item))
            && ws_w > base_w
            && let Some(table) = base_item.as_table_mut()
        {
            table.insert("weight".to_owned(), toml::Value::Float(ws_w));
        }
    }

    if result.as_slice() != ws_items.as_slice() {
        warn!(
            field = field_name,
            ignored, "workspace config may only raise existing weights; keeping baseline entries"
        );
    }

    set_nested(merged, path, toml::Value::Array(result));
}
