//! Shared block types for Trellis.
//!
//! This crate is the data-model foundation: typed ids, block rows, reusable
//! block templates, structurally shared content values, and override maps. It
//! has **no internal trellis dependencies**; the engine crate builds on it.
//!
//! # Row Model
//!
//! ```text
//! Page
//!     └── BlockNode (parent_block_id = None)
//!             └── BlockNode (parent_block_id = parent, slot = "tab-1", position = 0)
//!             └── BlockNode (parent_block_id = parent, slot = "tab-2", position = 0)
//!
//! ReusableBlock (TemplateId)
//!     └── root_block_id → BlockNode subtree
//!     └── instantiated as a fresh subtree whose root has instance_id = TemplateId
//!
//! OverrideSet (one per instance)
//!     └── template node id → Overrides ("content.title" → "Bye")
//! ```
//!
//! # Key Types
//!
//! |-------------------|------------------------------------------------|
//! | Type              | Purpose                                        |
//! |-------------------|------------------------------------------------|
//! | [`BlockNode`]     | One persisted block row                        |
//! | [`BlockId`]       | Opaque block identifier                        |
//! | [`TemplateId`]    | Reusable-block identifier                      |
//! | [`SiblingKey`]    | `(parent, slot)` ordering group                |
//! | [`ReusableBlock`] | Template: named subtree with a root            |
//! | [`Value`]         | JSON-like content with shared subtrees         |
//! | [`Overrides`]     | Flat dot-path → value map for one node         |
//! | [`OverrideSet`]   | Overrides for every node of one instance       |
//! |-------------------|------------------------------------------------|

pub mod block;
pub mod ids;
pub mod overrides;
pub mod value;

// Re-export primary types at crate root for convenience.
pub use block::{
    BlockNode, BlockNodeBuilder, MAX_TREE_DEPTH, ReusableBlock, SiblingKey, Status,
};
pub use ids::{BlockId, PageId, PrefixError, TemplateId, resolve_block_prefix};
pub use overrides::{CONTENT_PREFIX, METADATA_PREFIX, OverrideField, OverrideSet, Overrides};
pub use value::{Object, Value};
