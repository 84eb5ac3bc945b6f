//! Override merging.
//!
//! Layers a sparse [`Overrides`] map onto a base value:
//! - Paths: applied with [`path::set`] in insertion order (last wins)
//! - Arrays: REPLACE (never concatenated or merged by index)
//! - Untouched subtrees: shared with the base, pointer-identical
//!
//! The base is never mutated.

use trellis_types::{Overrides, Value};

use crate::path;

/// Compute the effective value of `base` under `overrides`.
///
/// - base absent: overrides applied onto an empty object
/// - overrides absent or empty: a (structurally shared) copy of the base
/// - both absent: an empty object
pub fn merge(base: Option<&Value>, overrides: Option<&Overrides>) -> Value {
    let mut effective = match base {
        Some(base) => base.clone(),
        None => Value::object(),
    };

    if let Some(overrides) = overrides {
        for (path, value) in overrides.iter() {
            path::set(&mut effective, path, value.clone());
        }
    }

    effective
}

/// Merge several override layers in order (first applied first, last wins).
pub fn merge_layers<'a>(
    base: Option<&Value>,
    layers: impl IntoIterator<Item = &'a Overrides>,
) -> Value {
    layers
        .into_iter()
        .fold(merge(base, None), |acc, layer| merge(Some(&acc), Some(layer)))
}
