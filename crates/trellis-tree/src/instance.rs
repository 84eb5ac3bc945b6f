//! Instance resolution.
//!
//! An instance of a reusable block renders the template's subtree with the
//! instance's sparse overrides layered on top. Only `content` and `metadata`
//! are overridable; structural fields always come from the template.

use std::collections::HashMap;

use serde::Serialize;
use trellis_types::{BlockId, BlockNode, OverrideField, OverrideSet, Overrides};

use crate::assemble::AssembledNode;
use crate::instantiate::IdMap;
use crate::merge::merge_layers;

/// A row with its effective content and metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedNode {
    pub node: BlockNode,
    pub depth: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl ResolvedNode {
    pub fn id(&self) -> &BlockId {
        &self.node.id
    }
}

/// Resolve a template subtree against one instance's overrides.
///
/// Output has the same order, ids and depths as `subtree`.
pub fn resolve_instance(subtree: &[AssembledNode<'_>], overrides: &OverrideSet) -> Vec<ResolvedNode> {
    resolve_layered(subtree, &[overrides])
}

/// Resolve with several override layers; later layers win.
///
/// Used when an outer instance overrides a node that a nested instance has
/// already overridden.
pub fn resolve_layered(subtree: &[AssembledNode<'_>], layers: &[&OverrideSet]) -> Vec<ResolvedNode> {
    subtree
        .iter()
        .map(|entry| {
            let per_node: Vec<&Overrides> = layers
                .iter()
                .filter_map(|set| set.for_node(entry.id()))
                .collect();
            ResolvedNode {
                node: apply_overrides(entry.node, &per_node),
                depth: entry.depth,
                degraded: entry.degraded,
            }
        })
        .collect()
}

/// Resolve an already-cloned instance whose overrides are keyed by template
/// ids.
///
/// Rows without an entry in `id_map` resolve to themselves.
pub fn resolve_materialized(
    instance: &[AssembledNode<'_>],
    id_map: &IdMap,
    overrides: &OverrideSet,
) -> Vec<ResolvedNode> {
    let sources: HashMap<&BlockId, &BlockId> = id_map.iter().map(|(source, clone)| (clone, source)).collect();
    instance
        .iter()
        .map(|entry| {
            let layer = sources
                .get(entry.id())
                .and_then(|source| overrides.for_node(source));
            ResolvedNode {
                node: apply_overrides(entry.node, layer.as_slice()),
                depth: entry.depth,
                degraded: entry.degraded,
            }
        })
        .collect()
}

/// Bake effective values into plain rows that no longer reference a template.
pub fn detach(resolved: &[ResolvedNode]) -> Vec<BlockNode> {
    resolved
        .iter()
        .map(|r| {
            let mut node = r.node.clone();
            node.instance_id = None;
            node
        })
        .collect()
}

fn apply_overrides(node: &BlockNode, layers: &[&Overrides]) -> BlockNode {
    let mut resolved = node.clone();
    if layers.iter().all(|layer| layer.is_empty()) {
        return resolved;
    }

    for layer in layers {
        for path in layer.unaddressable() {
            tracing::warn!(id = %node.id, path, "override addresses a non-overridable field, skipping");
        }
    }

    let content: Vec<Overrides> = layers.iter().map(|l| l.for_field(OverrideField::Content)).collect();
    if content.iter().any(|l| !l.is_empty()) {
        resolved.content = merge_layers(Some(&node.content), &content);
    }

    let metadata: Vec<Overrides> = layers.iter().map(|l| l.for_field(OverrideField::Metadata)).collect();
    if metadata.iter().any(|l| !l.is_empty()) {
        resolved.metadata = merge_layers(Some(&node.metadata), &metadata);
    }

    resolved
}

// ============================================================================
// Tests
// ============================================================================
