use super::{ConfigLayer, FieldSources};

/// Join a dotted prefix and a key.
fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Recursively merge `overlay` into `base`.
///
/// Tables merge key by key. Scalars and arrays (including arrays of tables
/// such as `patterns.path_rules`) are replaced wholesale by the overlay.
pub fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    let mut scratch = FieldSources::new();
    deep_merge_tracking(base, overlay, "", &ConfigLayer::User, &mut scratch);
}

/// Merge `overlay` into `base` and record, for every leaf the overlay
/// touches, that `layer` is now its source.
pub fn deep_merge_tracking(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    let base_table = match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(_)) => base_table,
        (base, overlay) => {
            *base = overlay.clone();
            record_leaves(overlay, prefix, layer, sources);
            return;
        },
    };
    let Some(overlay_table) = overlay.as_table() else {
        return;
    };

    for (key, overlay_val) in overlay_table {
        let path = child_path(prefix, key);
        match base_table.get_mut(key) {
            Some(base_val) if base_val.is_table() && overlay_val.is_table() => {
                deep_merge_tracking(base_val, overlay_val, &path, layer, sources);
            },
            Some(base_val) => {
                *base_val = overlay_val.clone();
                record_leaves(overlay_val, &path, layer, sources);
            },
            None => {
                base_table.insert(key.clone(), overlay_val.clone());
                record_leaves(overlay_val, &path, layer, sources);
            },
        }
    }
}

/// Record every leaf under `val` as coming from `layer`. Arrays count as
/// leaves.
pub(crate) fn record_leaves(
    val: &toml::Value,
    prefix: &str,
    layer: &ConfigLayer,
    sources: &mut FieldSources,
) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            record_leaves(child, &child_path(prefix, key), layer, sources);
        }
    } else {
        sources.insert(prefix.to_owned(), layer.clone());
    }
}
