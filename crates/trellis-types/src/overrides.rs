//! Sparse per-instance overrides.
//!
//! An [`Overrides`] map is flat: its keys *are* dot-paths such as
//! `"content.title"` or `"metadata.spacing.marginTop"`. The first segment names
//! the field the override addresses (`content` or `metadata`); the rest is the
//! path inside that field. Insertion order is preserved and is the order in
//! which overrides are applied.
//!
//! An [`OverrideSet`] holds one `Overrides` map per node of an instantiated
//! subtree, keyed by the *template* node's id.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{BlockId, Value};

/// Prefix of override paths addressing a block's `content`.
pub const CONTENT_PREFIX: &str = "content";

/// Prefix of override paths addressing a block's `metadata`.
pub const METADATA_PREFIX: &str = "metadata";

/// Which overridable field a path addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverrideField {
    Content,
    Metadata,
}

impl OverrideField {
    /// Split a full override path into its field and the path inside it.
    ///
    /// Returns `None` for paths that address anything else (structural fields,
    /// unknown roots) or that name the field itself with no inner path.
    pub fn split_path(path: &str) -> Option<(Self, &str)> {
        let (head, rest) = path.split_once('.')?;
        let field = match head {
            CONTENT_PREFIX => OverrideField::Content,
            METADATA_PREFIX => OverrideField::Metadata,
            _ => return None,
        };
        Some((field, rest))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideField::Content => CONTENT_PREFIX,
            OverrideField::Metadata => METADATA_PREFIX,
        }
    }
}

/// Flat, ordered map of dot-path → value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overrides(IndexMap<String, Value>);

impl Overrides {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Set (or replace) the override at `path`.
    ///
    /// Replacing keeps the key's original position in the application order.
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(path.into(), value.into());
    }

    /// Builder-style [`Overrides::insert`].
    pub fn with(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.0.contains_key(path)
    }

    /// Remove `path` in place, keeping the order of the remaining keys.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        self.0.shift_remove(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(path, value)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Paths addressing `field`, with the field prefix stripped.
    pub fn for_field(&self, field: OverrideField) -> Overrides {
        self.iter()
            .filter_map(|(path, value)| match OverrideField::split_path(path) {
                Some((f, inner)) if f == field => Some((inner.to_string(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Paths that address neither `content` nor `metadata`.
    pub fn unaddressable(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|path| OverrideField::split_path(path).is_none())
    }
}

impl FromIterator<(String, Value)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Overrides {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Overrides for every node of one instance, keyed by template node id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideSet(IndexMap<BlockId, Overrides>);

impl OverrideSet {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Overrides for a node, if any were recorded.
    pub fn for_node(&self, id: &BlockId) -> Option<&Overrides> {
        self.0.get(id)
    }

    /// Replace all overrides of one node.
    pub fn insert(&mut self, id: BlockId, overrides: Overrides) {
        self.0.insert(id, overrides);
    }

    /// Builder-style [`OverrideSet::insert`].
    pub fn with(mut self, id: impl Into<BlockId>, overrides: Overrides) -> Self {
        self.insert(id.into(), overrides);
        self
    }

    /// Set a single override on a node.
    pub fn set(&mut self, id: &BlockId, path: impl Into<String>, value: impl Into<Value>) {
        self.0.entry(id.clone()).or_default().insert(path, value);
    }

    /// Clear a single override on a node. Nodes left with no overrides are dropped.
    pub fn clear(&mut self, id: &BlockId, path: &str) -> Option<Value> {
        let overrides = self.0.get_mut(id)?;
        let removed = overrides.remove_path(path);
        if overrides.is_empty() {
            self.0.shift_remove(id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &Overrides)> {
        self.0.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(
            OverrideField::split_path("content.title"),
            Some((OverrideField::Content, "title"))
        );
        assert_eq!(
            OverrideField::split_path("metadata.spacing.marginTop"),
            Some((OverrideField::Metadata, "spacing.marginTop"))
        );
        assert_eq!(OverrideField::split_path("content"), None);
        assert_eq!(OverrideField::split_path("position"), None);
        assert_eq!(OverrideField::split_path("parent_block_id.x"), None);
    }

    #[test]
    fn test_for_field_strips_prefix_and_keeps_order() {
        let overrides = Overrides::new()
            .with("content.b", 1)
            .with("metadata.color", "red")
            .with("content.a", 2);
        let content = overrides.for_field(OverrideField::Content);
        let keys: Vec<&str> = content.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(overrides.for_field(OverrideField::Metadata).get("color"), Some(&Value::from("red")));
    }

    #[test]
    fn test_unaddressable_paths() {
        let overrides = Overrides::new().with("content.x", 1).with("slot", "y");
        let bad: Vec<&str> = overrides.unaddressable().collect();
        assert_eq!(bad, vec!["slot"]);
    }

    #[test]
    fn test_deserialize_keeps_document_order() {
        let overrides: Overrides =
            serde_json::from_str(r#"{"content.z": 1, "content.a": 2}"#).unwrap();
        let keys: Vec<&str> = overrides.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["content.z", "content.a"]);
    }

    #[test]
    fn test_override_set_clear_drops_empty_nodes() {
        let id = BlockId::new("T");
        let mut set = OverrideSet::new();
        set.set(&id, "content.title", "Bye");
        assert_eq!(set.len(), 1);
        assert_eq!(set.clear(&id, "content.title"), Some(Value::from("Bye")));
        assert!(set.is_empty());
        assert_eq!(set.clear(&id, "content.title"), None);
    }

    #[test]
    fn test_override_set_json_shape() {
        let set: OverrideSet =
            serde_json::from_str(r#"{"T": {"content.title": "Bye"}}"#).unwrap();
        let node = set.for_node(&BlockId::new("T")).unwrap();
        assert_eq!(node.get("content.title"), Some(&Value::from("Bye")));
    }
}
