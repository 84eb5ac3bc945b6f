//! Tree assembly from flat block rows.
//!
//! The [`TreeAssembler`] is an ephemeral index over a row slice. It groups rows
//! by `(parent_block_id, slot)`, sorts every group by position, and walks the
//! result depth-first to produce the flat, depth-annotated sequence renderers
//! consume. It never modifies the rows.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use trellis_types::{BlockId, BlockNode, MAX_TREE_DEPTH, SiblingKey};

use crate::config::AssemblyConfig;

/// Capability lookup for block types, owned by the rendering side.
///
/// The assembler only asks whether a type is known; rows of unknown types are
/// still emitted, flagged `degraded`, and rendering picks the fallback.
pub trait BlockTypeRegistry {
    fn contains(&self, block_type: &str) -> bool;
}

impl BlockTypeRegistry for HashSet<String> {
    fn contains(&self, block_type: &str) -> bool {
        HashSet::contains(self, block_type)
    }
}

impl BlockTypeRegistry for BTreeSet<String> {
    fn contains(&self, block_type: &str) -> bool {
        BTreeSet::contains(self, block_type)
    }
}

impl<T: AsRef<str>> BlockTypeRegistry for Vec<T> {
    fn contains(&self, block_type: &str) -> bool {
        self.iter().any(|t| t.as_ref() == block_type)
    }
}

/// Which slots a traversal step accepts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotFilter {
    /// Every child of the parent regardless of slot.
    #[default]
    Any,
    /// Only children with no slot.
    Unslotted,
    /// Only children in the named slot.
    Named(String),
}

impl SlotFilter {
    /// Filter for an optional slot name; `None` and `""` mean unslotted.
    pub fn from_slot(slot: Option<&str>) -> Self {
        match slot.filter(|s| !s.is_empty()) {
            Some(name) => SlotFilter::Named(name.to_string()),
            None => SlotFilter::Unslotted,
        }
    }

    /// Check whether a child with `slot` passes this filter.
    pub fn accepts(&self, slot: Option<&str>) -> bool {
        let slot = slot.filter(|s| !s.is_empty());
        match self {
            SlotFilter::Any => true,
            SlotFilter::Unslotted => slot.is_none(),
            SlotFilter::Named(name) => slot == Some(name.as_str()),
        }
    }
}

impl FromStr for SlotFilter {
    type Err = std::convert::Infallible;

    /// `*` or `any` → [`SlotFilter::Any`]; `-` or `none` → unslotted; anything
    /// else names a slot.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "*" | "any" => SlotFilter::Any,
            "" | "-" | "none" => SlotFilter::Unslotted,
            name => SlotFilter::Named(name.to_string()),
        })
    }
}

/// One emitted row with its depth below the traversal root.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AssembledNode<'a> {
    pub node: &'a BlockNode,
    /// 0 for the traversal root's children (or the root itself in [`TreeAssembler::subtree`]).
    pub depth: usize,
    /// The block type is unknown to the registry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl<'a> AssembledNode<'a> {
    /// Borrowed from the row slice, so it outlives this entry.
    pub fn id(&self) -> &'a BlockId {
        &self.node.id
    }
}

/// Position-sorted child index over a slice of rows.
pub struct TreeAssembler<'a> {
    nodes: &'a [BlockNode],
    /// Row indices per `(parent, slot)`, sorted by position.
    groups: HashMap<SiblingKey, Vec<usize>>,
    /// Row indices per parent across all slots, sorted by position.
    by_parent: HashMap<Option<BlockId>, Vec<usize>>,
    /// First row index per id.
    by_id: HashMap<&'a str, usize>,
    registry: Option<&'a dyn BlockTypeRegistry>,
    descend: SlotFilter,
    max_depth: usize,
}

impl<'a> TreeAssembler<'a> {
    /// Index `nodes`. Sorting is stable: equal positions keep slice order.
    pub fn new(nodes: &'a [BlockNode]) -> Self {
        let mut groups: HashMap<SiblingKey, Vec<usize>> = HashMap::new();
        let mut by_parent: HashMap<Option<BlockId>, Vec<usize>> = HashMap::new();
        let mut by_id = HashMap::with_capacity(nodes.len());

        for (idx, node) in nodes.iter().enumerate() {
            let key = node.sibling_key();
            by_parent.entry(key.parent.clone()).or_default().push(idx);
            groups.entry(key).or_default().push(idx);
            by_id.entry(node.id.as_str()).or_insert(idx);
        }

        let by_position = |a: &usize, b: &usize| nodes[*a].position.total_cmp(&nodes[*b].position);
        for group in groups.values_mut() {
            group.sort_by(by_position);
        }
        for group in by_parent.values_mut() {
            group.sort_by(by_position);
        }

        Self {
            nodes,
            groups,
            by_parent,
            by_id,
            registry: None,
            descend: SlotFilter::Any,
            max_depth: MAX_TREE_DEPTH,
        }
    }

    /// Index `nodes` with traversal settings from config.
    pub fn with_config(nodes: &'a [BlockNode], config: &AssemblyConfig) -> Self {
        Self::new(nodes)
            .descend(config.descend.clone())
            .max_depth(config.max_depth)
    }

    /// Flag rows whose type the registry does not know.
    pub fn with_registry(mut self, registry: &'a dyn BlockTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Slot filter applied below the traversal root. Defaults to [`SlotFilter::Any`].
    pub fn descend(mut self, filter: SlotFilter) -> Self {
        self.descend = filter;
        self
    }

    /// Depth circuit breaker. Defaults to [`MAX_TREE_DEPTH`].
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Get a row by id (first occurrence if ids are duplicated).
    pub fn get(&self, id: &str) -> Option<&'a BlockNode> {
        self.by_id.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn child_indices(&self, parent: Option<&BlockId>, slot: &SlotFilter) -> &[usize] {
        let found = match slot {
            SlotFilter::Any => self
                .by_parent
                .get(&parent.filter(|p| !p.is_empty()).cloned()),
            SlotFilter::Unslotted => self.groups.get(&SiblingKey::new(parent, None)),
            SlotFilter::Named(name) => self.groups.get(&SiblingKey::new(parent, Some(name.as_str()))),
        };
        found.map(Vec::as_slice).unwrap_or(&[])
    }

    /// One sorted sibling group.
    pub fn children(&self, parent: Option<&BlockId>, slot: &SlotFilter) -> Vec<&'a BlockNode> {
        self.child_indices(parent, slot)
            .iter()
            .map(|&idx| &self.nodes[idx])
            .collect()
    }

    /// Depth-first pre-order traversal below `(root_parent, root_slot)`.
    ///
    /// The root group's rows are emitted at depth 0; deeper levels use the
    /// assembler's descend filter. Rows whose parent chain does not reach the
    /// root (dangling parents, cycles) never appear.
    pub fn assemble(
        &self,
        root_parent: Option<&BlockId>,
        root_slot: &SlotFilter,
    ) -> Vec<AssembledNode<'a>> {
        let start = self.child_indices(root_parent, root_slot);
        let out = self.walk(start);
        tracing::trace!(
            emitted = out.len(),
            total = self.nodes.len(),
            "assembled block tree"
        );
        out
    }

    /// Whole page from the root group, every slot.
    pub fn assemble_page(&self) -> Vec<AssembledNode<'a>> {
        self.assemble(None, &SlotFilter::Any)
    }

    /// `root` at depth 0 followed by all of its descendants.
    ///
    /// Empty if `root` is not in the row set.
    pub fn subtree(&self, root: &BlockId) -> Vec<AssembledNode<'a>> {
        match self.by_id.get(root.as_str()) {
            Some(&idx) => self.walk(&[idx]),
            None => Vec::new(),
        }
    }

    fn walk(&self, start: &[usize]) -> Vec<AssembledNode<'a>> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        // Push in reverse so the first sibling is popped first.
        let mut stack: Vec<(usize, usize)> = start.iter().rev().map(|&idx| (0, idx)).collect();

        while let Some((depth, idx)) = stack.pop() {
            if !visited.insert(idx) {
                tracing::warn!(id = %self.nodes[idx].id, "block reached twice during traversal, skipping");
                continue;
            }
            let node = &self.nodes[idx];
            out.push(AssembledNode {
                node,
                depth,
                degraded: self.is_degraded(node),
            });

            let children = self.child_indices(Some(&node.id), &self.descend);
            if children.is_empty() {
                continue;
            }
            if depth + 1 >= self.max_depth {
                tracing::warn!(
                    id = %node.id,
                    max_depth = self.max_depth,
                    "traversal hit max depth, not descending"
                );
                continue;
            }
            for &child in children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }

        out
    }

    fn is_degraded(&self, node: &BlockNode) -> bool {
        self.registry
            .is_some_and(|registry| !registry.contains(&node.block_type))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::BlockNodeBuilder;

    fn node(id: &str, parent: Option<&str>, slot: Option<&str>, position: f64) -> BlockNode {
        let mut b = BlockNodeBuilder::new(id, "container").position(position);
        if let Some(p) = parent {
            b = b.parent(p);
        }
        if let Some(s) = slot {
            b = b.slot(s);
        }
        b.build()
    }

    fn ids(out: &[AssembledNode<'_>]) -> Vec<String> {
        out.iter().map(|n| n.node.id.to_string()).collect()
    }

    #[test]
    fn test_siblings_sorted_by_position() {
        let rows = vec![
            node("c", None, None, 3.0),
            node("a", None, None, 1.0),
            node("b", None, None, 2.0),
        ];
        let out = TreeAssembler::new(&rows).assemble_page();
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let rows = vec![
            node("first", None, None, 1.0),
            node("second", None, None, 1.0),
            node("zero", None, None, 0.0),
        ];
        let out = TreeAssembler::new(&rows).assemble_page();
        assert_eq!(ids(&out), vec!["zero", "first", "second"]);
    }

    #[test]
    fn test_preorder_with_depth() {
        let rows = vec![
            node("child-b", Some("root"), None, 1.0),
            node("root", None, None, 0.0),
            node("grandchild", Some("child-a"), None, 0.0),
            node("child-a", Some("root"), None, 0.0),
            node("root-2", None, None, 1.0),
        ];
        let out = TreeAssembler::new(&rows).assemble_page();
        assert_eq!(ids(&out), vec!["root", "child-a", "grandchild", "child-b", "root-2"]);
        let depths: Vec<usize> = out.iter().map(|n| n.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_ids_outlive_assembled_output() {
        let rows = vec![node("b", None, None, 1.0), node("a", None, None, 0.0)];
        let assembler = TreeAssembler::new(&rows);
        let order: Vec<&str> = assembler.assemble_page().iter().map(|n| n.id().as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_slot_isolation() {
        let rows = vec![
            node("tabs", None, None, 0.0),
            node("in-x", Some("tabs"), Some("x"), 0.0),
            node("in-y", Some("tabs"), Some("y"), 0.0),
        ];
        let assembler = TreeAssembler::new(&rows);
        let tabs = BlockId::new("tabs");

        let y = assembler.assemble(Some(&tabs), &SlotFilter::Named("y".into()));
        assert_eq!(ids(&y), vec!["in-y"]);

        let x = assembler.assemble(Some(&tabs), &SlotFilter::Named("x".into()));
        assert_eq!(ids(&x), vec!["in-x"]);
    }

    #[test]
    fn test_empty_string_sentinels_match_root() {
        let mut a = node("a", None, None, 1.0);
        a.parent_block_id = Some(BlockId::new(""));
        a.slot = Some(String::new());
        let b = node("b", None, None, 0.0);
        let rows = vec![a, b];

        let out = TreeAssembler::new(&rows).assemble(None, &SlotFilter::Unslotted);
        assert_eq!(ids(&out), vec!["b", "a"]);
    }

    #[test]
    fn test_descend_unslotted_skips_slotted_children() {
        let rows = vec![
            node("tabs", None, None, 0.0),
            node("plain", Some("tabs"), None, 1.0),
            node("slotted", Some("tabs"), Some("tab-1"), 0.0),
        ];
        let any = TreeAssembler::new(&rows).assemble_page();
        assert_eq!(ids(&any), vec!["tabs", "slotted", "plain"]);

        let unslotted = TreeAssembler::new(&rows)
            .descend(SlotFilter::Unslotted)
            .assemble_page();
        assert_eq!(ids(&unslotted), vec!["tabs", "plain"]);
    }

    #[test]
    fn test_dangling_parent_is_unreachable() {
        let rows = vec![node("root", None, None, 0.0), node("orphan", Some("ghost"), None, 0.0)];
        let out = TreeAssembler::new(&rows).assemble_page();
        assert_eq!(ids(&out), vec!["root"]);
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let rows = vec![node("a", Some("b"), None, 0.0), node("b", Some("a"), None, 0.0)];
        let assembler = TreeAssembler::new(&rows);
        assert!(assembler.assemble_page().is_empty());
        let sub = assembler.subtree(&BlockId::new("a"));
        assert_eq!(ids(&sub), vec!["a", "b"]);
    }

    #[test]
    fn test_max_depth_circuit_breaker() {
        let rows = vec![
            node("d0", None, None, 0.0),
            node("d1", Some("d0"), None, 0.0),
            node("d2", Some("d1"), None, 0.0),
            node("d3", Some("d2"), None, 0.0),
        ];
        let out = TreeAssembler::new(&rows).max_depth(2).assemble_page();
        assert_eq!(ids(&out), vec!["d0", "d1"]);
    }

    #[test]
    fn test_unknown_block_type_is_degraded() {
        let mut rows = vec![node("a", None, None, 0.0), node("b", None, None, 1.0)];
        rows[1].block_type = "mystery".into();
        let registry: HashSet<String> = ["container".to_string()].into_iter().collect();

        let out = TreeAssembler::new(&rows).with_registry(&registry).assemble_page();
        assert_eq!(out.len(), 2);
        assert!(!out[0].degraded);
        assert!(out[1].degraded);
    }

    #[test]
    fn test_subtree_rooted_at_block() {
        let rows = vec![
            node("page", None, None, 0.0),
            node("card", Some("page"), None, 0.0),
            node("title", Some("card"), None, 0.0),
            node("other", Some("page"), None, 1.0),
        ];
        let sub = TreeAssembler::new(&rows).subtree(&BlockId::new("card"));
        assert_eq!(ids(&sub), vec!["card", "title"]);
        assert_eq!(sub[0].depth, 0);
        assert_eq!(sub[1].depth, 1);
        assert!(TreeAssembler::new(&rows).subtree(&BlockId::new("nope")).is_empty());
    }

    #[test]
    fn test_children_group() {
        let rows = vec![
            node("p", None, None, 0.0),
            node("c2", Some("p"), None, 2.0),
            node("c1", Some("p"), None, 1.0),
        ];
        let assembler = TreeAssembler::new(&rows);
        let kids: Vec<&str> = assembler
            .children(Some(&BlockId::new("p")), &SlotFilter::Unslotted)
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(kids, vec!["c1", "c2"]);
    }

    #[test]
    fn test_slot_filter_parse() {
        assert_eq!("*".parse::<SlotFilter>().unwrap(), SlotFilter::Any);
        assert_eq!("none".parse::<SlotFilter>().unwrap(), SlotFilter::Unslotted);
        assert_eq!("tab-1".parse::<SlotFilter>().unwrap(), SlotFilter::Named("tab-1".into()));
    }
}
