//! Error types for tree operations.
//!
//! Data-shape problems in the row set (dangling parents, duplicate positions,
//! odd override paths) are *not* errors: the engine tolerates them and the
//! integrity checker reports them. The variants here are for calls that cannot
//! be answered at all.

use thiserror::Error;

use trellis_types::{BlockId, SiblingKey};

/// Errors from position planning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The node handed to the planner is not part of its own sibling group.
    #[error("block {id} is not in sibling group {group}")]
    NotInGroup { id: BlockId, group: SiblingKey },

    /// The drop target names a parent that is not in the row set.
    #[error("target parent not found: {0}")]
    UnknownParent(BlockId),

    /// The drop target is the moved block itself or one of its descendants.
    #[error("moving {id} under {target} would create a cycle")]
    WouldCycle { id: BlockId, target: BlockId },
}

/// Errors from instantiating a template subtree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CloneError {
    /// A descendant's parent is not part of the subtree being cloned.
    #[error(
        "block {id} has parent {} outside the cloned subtree",
        .parent.as_ref().map_or("<page root>", BlockId::as_str)
    )]
    ParentOutsideSubtree { id: BlockId, parent: Option<BlockId> },

    /// The template's designated root is missing from its block list.
    #[error("template root not found: {0}")]
    MissingRoot(BlockId),

    /// The id source kept producing ids that were already taken.
    #[error("id source produced {attempts} colliding ids in a row")]
    IdExhausted { attempts: usize },
}

/// Errors from loading engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Any engine error.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
