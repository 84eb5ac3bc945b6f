//! Position planning for reorder and reparent.
//!
//! Positions only need to be strictly ordered within a sibling group, never
//! contiguous. Under [`PositionPolicy::Sparse`] the planner touches as few
//! rows as possible: a left/right move swaps two positions, a drop takes the
//! midpoint of its new neighbours. When ties make that unsound (two equal
//! positions cannot be swapped into a new order, and no value lies strictly
//! between equal neighbours) the affected group is renumbered instead.
//! [`PositionPolicy::Renumber`] always rewrites touched groups to
//! `0, step, 2*step, ...`.

use std::collections::HashMap;

use trellis_types::{BlockId, BlockNode, MAX_TREE_DEPTH, SiblingKey};

use crate::config::{PositionConfig, PositionPolicy, SiblingScope};
use crate::error::PlanError;
use crate::ops::{DropTarget, MoveDirection, Placement, PositionPatch, PositionUpdate};

/// Stateless planner; holds only its policy.
#[derive(Clone, Debug, Default)]
pub struct PositionPlanner {
    config: PositionConfig,
}

impl PositionPlanner {
    pub fn new(config: PositionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PositionConfig {
        &self.config
    }

    // =========================================================================
    // Sibling groups
    // =========================================================================

    fn in_scope_of(&self, node: &BlockNode, candidate: &BlockNode) -> bool {
        match self.config.scope {
            SiblingScope::ParentSlot => candidate.sibling_key() == node.sibling_key(),
            SiblingScope::Page => {
                candidate.page_id == node.page_id && candidate.is_root() && node.is_root()
            }
        }
    }

    /// The node's sibling group from `nodes`, stably sorted by position.
    ///
    /// Rows outside the node's group are ignored, so callers may pass the whole
    /// page. The node itself is included if present.
    pub fn siblings_of<'a>(&self, node: &BlockNode, nodes: &'a [BlockNode]) -> Vec<&'a BlockNode> {
        let mut group: Vec<&BlockNode> = nodes.iter().filter(|n| self.in_scope_of(node, n)).collect();
        group.sort_by(|a, b| a.position.total_cmp(&b.position));
        group
    }

    /// Members of `key` on the moved block's page, optionally without the
    /// moved block itself.
    fn group_for_key<'a>(
        &self,
        key: &SiblingKey,
        moved: &BlockNode,
        nodes: &'a [BlockNode],
        include_moved: bool,
    ) -> Vec<&'a BlockNode> {
        let mut group: Vec<&BlockNode> = nodes
            .iter()
            .filter(|n| include_moved || n.id != moved.id)
            .filter(|n| &n.sibling_key() == key)
            .filter(|n| self.config.scope != SiblingScope::Page || n.page_id == moved.page_id)
            .collect();
        group.sort_by(|a, b| a.position.total_cmp(&b.position));
        group
    }

    fn index_in(node: &BlockNode, group: &[&BlockNode]) -> Option<usize> {
        group.iter().position(|n| n.id == node.id)
    }

    // =========================================================================
    // Adjacent moves
    // =========================================================================

    /// The node is in its group and not first.
    pub fn can_move_left(&self, node: &BlockNode, siblings: &[BlockNode]) -> bool {
        let group = self.siblings_of(node, siblings);
        Self::index_in(node, &group).is_some_and(|idx| idx > 0)
    }

    /// The node is in its group and not last.
    pub fn can_move_right(&self, node: &BlockNode, siblings: &[BlockNode]) -> bool {
        let group = self.siblings_of(node, siblings);
        Self::index_in(node, &group).is_some_and(|idx| idx + 1 < group.len())
    }

    /// Move `node` one step within its group.
    ///
    /// Moving past either end returns an empty patch. A node missing from its
    /// own group is a caller bug and returns [`PlanError::NotInGroup`].
    pub fn plan_move(
        &self,
        node: &BlockNode,
        siblings: &[BlockNode],
        direction: MoveDirection,
    ) -> Result<PositionPatch, PlanError> {
        let group = self.siblings_of(node, siblings);
        let idx = Self::index_in(node, &group).ok_or_else(|| PlanError::NotInGroup {
            id: node.id.clone(),
            group: node.sibling_key(),
        })?;

        let neighbor = match direction {
            MoveDirection::Left => idx.checked_sub(1),
            MoveDirection::Right => (idx + 1 < group.len()).then_some(idx + 1),
        };
        let Some(neighbor) = neighbor else {
            return Ok(PositionPatch::new());
        };

        let (current, other) = (group[idx], group[neighbor]);
        let mut patch = PositionPatch::new();
        let tied = current.position.total_cmp(&other.position).is_eq();

        if self.config.policy == PositionPolicy::Sparse && !tied {
            patch.push(PositionUpdate::position(current.id.clone(), other.position));
            patch.push(PositionUpdate::position(other.id.clone(), current.position));
        } else {
            let mut order = group.clone();
            order.swap(idx, neighbor);
            self.renumber(&order, &mut patch);
        }

        tracing::debug!(
            id = %node.id,
            %direction,
            changed = patch.len(),
            "planned adjacent move"
        );
        Ok(patch)
    }

    // =========================================================================
    // Reparent / drop
    // =========================================================================

    /// Move `node` to `target`, which may be its current group or another one.
    ///
    /// `nodes` is the full row set; it is used to find the target group, to
    /// check the target parent exists, and to refuse drops that would make the
    /// node its own ancestor. A node that is not in `nodes` yet (dropped from a
    /// palette) is planned as a pure insertion.
    pub fn plan_reparent(
        &self,
        node: &BlockNode,
        nodes: &[BlockNode],
        target: &DropTarget,
    ) -> Result<PositionPatch, PlanError> {
        let key = target.sibling_key();
        if let Some(parent) = &key.parent {
            self.check_target_parent(node, parent, nodes)?;
        }

        let existing = nodes.iter().find(|n| n.id == node.id);
        let moved = existing.unwrap_or(node);
        let same_group = existing.is_some() && moved.sibling_key() == key;
        let placement = (!same_group).then(|| Placement::from(key.clone()));

        let group = self.group_for_key(&key, moved, nodes, false);
        let index = target.index.min(group.len());

        if same_group {
            let full = self.group_for_key(&key, moved, nodes, true);
            if Self::index_in(moved, &full) == Some(index) {
                return Ok(PositionPatch::new());
            }
        }

        let mut patch = PositionPatch::new();
        let sparse = match self.config.policy {
            PositionPolicy::Sparse => self.sparse_position(&group, index),
            PositionPolicy::Renumber => None,
        };

        match sparse {
            Some(position) => patch.push(PositionUpdate {
                id: moved.id.clone(),
                position,
                placement,
            }),
            None => {
                let mut order = group.clone();
                order.insert(index, moved);
                self.renumber(&order, &mut patch);
                patch.push(PositionUpdate {
                    id: moved.id.clone(),
                    position: index as f64 * self.config.step,
                    placement,
                });
            }
        }

        if self.config.policy == PositionPolicy::Renumber && existing.is_some() && !same_group {
            let former = self.group_for_key(&moved.sibling_key(), moved, nodes, false);
            self.renumber(&former, &mut patch);
        }

        tracing::debug!(
            id = %node.id,
            group = %key,
            index,
            changed = patch.len(),
            "planned reparent"
        );
        Ok(patch)
    }

    /// Renumber one sibling group to `0, step, 2*step, ...` in its current
    /// (stable) order. Only rows whose position changes are returned.
    pub fn plan_renumber(&self, key: &SiblingKey, nodes: &[BlockNode]) -> PositionPatch {
        let mut group: Vec<&BlockNode> = nodes.iter().filter(|n| &n.sibling_key() == key).collect();
        group.sort_by(|a, b| a.position.total_cmp(&b.position));
        let mut patch = PositionPatch::new();
        self.renumber(&group, &mut patch);
        patch
    }

    /// Renumber every sibling group that contains duplicate positions.
    pub fn plan_repair(&self, nodes: &[BlockNode]) -> PositionPatch {
        let mut groups: HashMap<SiblingKey, Vec<&BlockNode>> = HashMap::new();
        for node in nodes {
            groups.entry(node.sibling_key()).or_default().push(node);
        }

        let mut keys: Vec<&SiblingKey> = groups.keys().collect();
        keys.sort();

        let mut patch = PositionPatch::new();
        for key in keys {
            let mut group = groups[key].clone();
            group.sort_by(|a, b| a.position.total_cmp(&b.position));
            let has_ties = group
                .windows(2)
                .any(|pair| pair[0].position.total_cmp(&pair[1].position).is_eq());
            if has_ties {
                tracing::debug!(group = %key, "renumbering group with duplicate positions");
                self.renumber(&group, &mut patch);
            }
        }
        patch
    }

    fn check_target_parent(
        &self,
        node: &BlockNode,
        parent: &BlockId,
        nodes: &[BlockNode],
    ) -> Result<(), PlanError> {
        let parents: HashMap<&str, Option<&BlockId>> =
            nodes.iter().map(|n| (n.id.as_str(), n.parent())).collect();

        if !parents.contains_key(parent.as_str()) {
            return Err(PlanError::UnknownParent(parent.clone()));
        }

        let mut current = Some(parent);
        let mut steps = 0;
        while let Some(id) = current {
            if id == &node.id {
                return Err(PlanError::WouldCycle {
                    id: node.id.clone(),
                    target: parent.clone(),
                });
            }
            steps += 1;
            if steps > MAX_TREE_DEPTH {
                tracing::warn!(parent = %parent, "ancestor walk hit MAX_TREE_DEPTH ({MAX_TREE_DEPTH}), stopping");
                break;
            }
            current = parents.get(id.as_str()).copied().flatten();
        }
        Ok(())
    }

    /// Position strictly between the neighbours at `index`, if one exists.
    fn sparse_position(&self, group: &[&BlockNode], index: usize) -> Option<f64> {
        let step = self.config.step;
        let left = index.checked_sub(1).map(|i| group[i].position);
        let right = group.get(index).map(|n| n.position);

        let position = match (left, right) {
            (None, None) => 0.0,
            (Some(l), None) => l + step,
            (None, Some(r)) => r - step,
            (Some(l), Some(r)) => l + (r - l) / 2.0,
        };

        let above_left = left.is_none_or(|l| l < position);
        let below_right = right.is_none_or(|r| position < r);
        (position.is_finite() && above_left && below_right).then_some(position)
    }

    fn renumber(&self, order: &[&BlockNode], patch: &mut PositionPatch) {
        for (idx, node) in order.iter().enumerate() {
            let position = idx as f64 * self.config.step;
            if node.position != position {
                patch.push(PositionUpdate::position(node.id.clone(), position));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
