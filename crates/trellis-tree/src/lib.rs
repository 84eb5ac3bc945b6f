//! Block tree engine for Trellis.
//!
//! Pure, synchronous operations over flat block rows:
//!
//! - [`path`] / [`merge`]: dot-path access and sparse override merging
//! - [`TreeAssembler`]: rows → ordered, depth-annotated tree
//! - [`PositionPlanner`]: reorder and reparent plans as [`PositionPatch`]es
//! - [`InstantiationCloner`]: template subtree → fresh instance rows
//! - [`resolve_instance`]: template + overrides → effective rows
//! - [`integrity::check`]: report what the others tolerate
//!
//! Nothing here persists or mutates input rows. The caller owns storage and
//! applies the returned rows and patches.
//!
//! # Data Flow
//!
//! ```text
//! rows ──▶ TreeAssembler ──▶ [AssembledNode] ──▶ resolve_instance ──▶ [ResolvedNode]
//!                                  │                    ▲
//!                                  ▼                    │ OverrideSet
//!                        InstantiationCloner ──▶ Instantiation { nodes, id_map }
//!
//! drag/drop ──▶ DropTarget ──▶ PositionPlanner ──▶ PositionPatch ──▶ caller writes
//! ```

pub mod assemble;
pub mod config;
mod error;
pub mod instance;
pub mod instantiate;
pub mod integrity;
pub mod merge;
pub mod ops;
pub mod path;
pub mod planner;

pub use assemble::{AssembledNode, BlockTypeRegistry, SlotFilter, TreeAssembler};
pub use config::{
    AssemblyConfig, EngineConfig, InstanceConfig, InstanceTracking, PositionConfig,
    PositionPolicy, SiblingScope,
};
pub use error::{CloneError, ConfigError, PlanError, TreeError};
pub use instance::{ResolvedNode, detach, resolve_instance, resolve_layered, resolve_materialized};
pub use instantiate::{
    CloneTarget, IdMap, IdSource, Instantiation, InstantiationCloner, SequentialIds, Uuid7Ids,
    template_subtree,
};
pub use integrity::IntegrityIssue;
pub use merge::{merge, merge_layers};
pub use ops::{DropTarget, MoveDirection, Placement, PositionPatch, PositionUpdate};
pub use planner::PositionPlanner;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, TreeError>;
