//! Dot-path access into nested content objects.
//!
//! Paths are split on `.` with no escaping: `"spacing.marginTop"` addresses
//! key `marginTop` inside object `spacing`. Only objects are traversed; arrays
//! are leaves and are read or replaced as a whole.
//!
//! `get` and `set` work on a [`Value`]; `has` and `remove` work on a flat
//! [`Overrides`] map, whose keys already *are* paths.

use trellis_types::{Object, Overrides, Value};

/// Read the value at `path`.
///
/// Returns `None` as soon as a segment is missing or an intermediate value is
/// not an object (`null`, scalar, array). A `null` stored at the final segment
/// is returned as `Some(Value::Null)`.
pub fn get<'a>(obj: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = obj;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, in place.
///
/// Objects on the path are copied only when shared (see [`Value::object_mut`]),
/// so any value that shares structure with `obj` is left untouched.
/// Intermediate segments that are missing, `null`, or not objects are replaced
/// by fresh empty objects; the final segment is overwritten unconditionally.
///
/// This coercion is lenient: a path running through a scalar or array
/// silently discards it. Callers that need strict paths must validate with
/// [`get`] first.
pub fn set(obj: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = obj;
    for segment in parents {
        current = object_for_write(current, path)
            .entry((*segment).to_string())
            .or_insert(Value::Null);
    }
    object_for_write(current, path).insert((*last).to_string(), value);
}

fn object_for_write<'a>(value: &'a mut Value, path: &str) -> &'a mut Object {
    if !value.is_object() && !value.is_null() {
        tracing::debug!(path, "replacing non-object intermediate while setting override path");
    }
    value.object_mut()
}

/// Exact key membership on a flat override map.
pub fn has(overrides: &Overrides, path: &str) -> bool {
    overrides.contains_path(path)
}

/// A copy of `overrides` without `path`. Absent keys return an equal map.
pub fn remove(overrides: &Overrides, path: &str) -> Overrides {
    let mut out = overrides.clone();
    out.remove_path(path);
    out
}

// ============================================================================
// Tests
// ============================================================================
