//! Dotted-path navigation over raw TOML trees.

/// Navigate into a nested value by path segments.
pub(super) fn get_nested<'a>(val: &'a toml::Value, path: &[&str]) -> Option<&'a toml::Value> {
    path.iter()
        .try_fold(val, |current, segment| current.as_table()?.get(*segment))
}

/// Walk to the table that owns the last segment of `path`.
fn parent_table_mut<'a>(
    val: &'a mut toml::Value,
    parents: &[&str],
) -> Option<&'a mut toml::map::Map<String, toml::Value>> {
    let mut current = val;
    for segment in parents {
        current = current.as_table_mut()?.get_mut(*segment)?;
    }
    current.as_table_mut()
}

/// Replace the value at `path`. Intermediate tables must already exist;
/// when one is missing the write is skipped with a warning.
pub(super) fn set_nested(val: &mut toml::Value, path: &[&str], new_val: toml::Value) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    match parent_table_mut(val, parents) {
        Some(table) => {
            table.insert((*leaf).to_owned(), new_val);
        },
        None => {
            tracing::warn!(path = %path.join("."), "missing intermediate table; skipping write");
        },
    }
}
