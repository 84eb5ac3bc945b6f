//! Engine configuration.
//!
//! Every field has a default, so an empty RON document `()` is a valid config.
//!
//! ```ron
//! (
//!     assembly: (descend: Any, max_depth: 512),
//!     positions: (policy: Sparse, step: 1.0, scope: ParentSlot),
//!     instances: (tracking: RootOnly),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::EnumString;
use trellis_types::MAX_TREE_DEPTH;

use crate::assemble::SlotFilter;
use crate::error::ConfigError;

/// How the planner assigns positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PositionPolicy {
    /// Adjacent swaps and midpoint inserts; only the moved rows change.
    /// Falls back to renumbering a group when ties leave no room.
    #[default]
    Sparse,
    /// Rewrite every touched group to `0, step, 2*step, ...`.
    Renumber,
}

/// What counts as a sibling for left/right moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SiblingScope {
    /// Same `(parent_block_id, slot)`.
    #[default]
    ParentSlot,
    /// Same `page_id` and both at the page root; for page-level block lists.
    Page,
}

/// Which cloned rows carry `instance_id`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InstanceTracking {
    /// Only the instance root.
    #[default]
    RootOnly,
    /// Every row of the instance.
    PerNode,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Slot filter below the traversal root.
    pub descend: SlotFilter,
    /// Traversal circuit breaker.
    pub max_depth: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            descend: SlotFilter::Any,
            max_depth: MAX_TREE_DEPTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionConfig {
    pub policy: PositionPolicy,
    /// Gap between consecutive positions when appending or renumbering.
    pub step: f64,
    pub scope: SiblingScope,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            policy: PositionPolicy::Sparse,
            step: 1.0,
            scope: SiblingScope::ParentSlot,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub tracking: InstanceTracking,
}

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub assembly: AssemblyConfig,
    pub positions: PositionConfig,
    pub instances: InstanceConfig,
}

impl EngineConfig {
    /// Parse and validate a RON document.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = ron::de::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&source)?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Pretty RON rendering of this config.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let step = self.positions.step;
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "positions.step must be a positive number, got {step}"
            )));
        }
        if self.assembly.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "assembly.max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
