//! Planner inputs and outputs.
//!
//! The planner never writes rows. It returns a [`PositionPatch`]: the minimal
//! list of row updates the caller persists (one write per entry, or one
//! batched request). Drop targets arrive already parsed into a
//! [`DropTarget`]; how the drag-and-drop layer encodes them is its business.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;
use trellis_types::{BlockId, SiblingKey};

/// Direction of an adjacent move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum MoveDirection {
    #[strum(serialize = "left", serialize = "up")]
    Left,
    #[strum(serialize = "right", serialize = "down")]
    Right,
}

impl MoveDirection {
    /// Parse from string (case-insensitive). Accepts `up`/`down` aliases.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoveDirection::Left => "left",
            MoveDirection::Right => "right",
        }
    }
}

impl std::fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a dragged block was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropTarget {
    /// New parent, `None` for the page root.
    #[serde(default)]
    pub parent_block_id: Option<BlockId>,
    /// New slot under the parent.
    #[serde(default)]
    pub slot: Option<String>,
    /// Index in the new group's sorted order, counted without the moved block.
    /// Clamped to the group length.
    pub index: usize,
}

impl DropTarget {
    pub fn new(parent: Option<BlockId>, slot: Option<String>, index: usize) -> Self {
        Self {
            parent_block_id: parent,
            slot,
            index,
        }
    }

    /// The sibling group the block lands in.
    pub fn sibling_key(&self) -> SiblingKey {
        SiblingKey::new(self.parent_block_id.as_ref(), self.slot.as_deref())
    }
}

/// New parent and slot for a reparented block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub parent_block_id: Option<BlockId>,
    pub slot: Option<String>,
}

impl From<SiblingKey> for Placement {
    fn from(key: SiblingKey) -> Self {
        Self {
            parent_block_id: key.parent,
            slot: key.slot,
        }
    }
}

/// One row update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: BlockId,
    pub position: f64,
    /// Set only for the block that changes parent or slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

impl PositionUpdate {
    pub fn position(id: BlockId, position: f64) -> Self {
        Self {
            id,
            position,
            placement: None,
        }
    }
}

/// Row updates produced by one planning call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionPatch(Vec<PositionUpdate>);

impl PositionPatch {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Record an update, replacing any earlier update of the same block.
    pub fn push(&mut self, update: PositionUpdate) {
        match self.0.iter_mut().find(|u| u.id == update.id) {
            Some(existing) => {
                existing.position = update.position;
                if update.placement.is_some() {
                    existing.placement = update.placement;
                }
            }
            None => self.0.push(update),
        }
    }

    pub fn get(&self, id: &BlockId) -> Option<&PositionUpdate> {
        self.0.iter().find(|u| &u.id == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionUpdate> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<PositionUpdate> {
        self.0
    }
}

impl<'a> IntoIterator for &'a PositionPatch {
    type Item = &'a PositionUpdate;
    type IntoIter = std::slice::Iter<'a, PositionUpdate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
