//! Block rows, publication status, and reusable-block templates.
//!
//! A [`BlockNode`] is one persisted row. Hierarchy is encoded entirely in the
//! row's pointer fields: `parent_block_id` names the parent, `slot` names the
//! bucket under that parent, and `position` orders siblings that share the
//! same `(parent_block_id, slot)` key.
//!
//! Persisted rows use `null` and `""` interchangeably for "no parent" and
//! "no slot". Deserialization folds `""` to `None`, and the accessors
//! [`BlockNode::parent`] and [`BlockNode::slot_name`] apply the same rule to
//! values built in code.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, PageId, TemplateId};
use crate::value::Value;

/// Maximum expected tree depth. Traversal code uses this as a circuit breaker.
///
/// Page layouts rarely nest deeper than a dozen levels (section → row →
/// column → card → button). Exceeding 512 almost certainly means a parent
/// cycle in the row set.
pub const MAX_TREE_DEPTH: usize = 512;

/// Publication status of a block. Opaque to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum Status {
    Published,
    #[default]
    Draft,
    /// Anything the CMS stores that the engine has no name for.
    Other,
}

impl Status {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Published => "published",
            Status::Draft => "draft",
            Status::Other => "other",
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Status::Published)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Status::from_str(&s).unwrap_or(Status::Other)
    }
}

impl From<Status> for String {
    fn from(s: Status) -> String {
        s.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `(parent, slot)` key of a sibling group, with `""` already folded to `None`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiblingKey {
    pub parent: Option<BlockId>,
    pub slot: Option<String>,
}

impl SiblingKey {
    pub fn new(parent: Option<&BlockId>, slot: Option<&str>) -> Self {
        Self {
            parent: parent.filter(|p| !p.is_empty()).cloned(),
            slot: slot.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    /// The page-root group with no slot.
    pub fn root() -> Self {
        Self { parent: None, slot: None }
    }
}

impl std::fmt::Display for SiblingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parent = self.parent.as_ref().map_or("<root>", BlockId::as_str);
        match &self.slot {
            Some(slot) => write!(f, "{parent}[{slot}]"),
            None => write!(f, "{parent}"),
        }
    }
}

/// One block row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockNode {
    /// Unique within the page, immutable after creation.
    pub id: BlockId,
    /// Key into the external block-type registry.
    pub block_type: String,
    /// Block-type-specific fields.
    #[serde(default = "Value::object")]
    pub content: Value,
    /// Styling/design fields. Overridden the same way as `content`.
    #[serde(default = "Value::object")]
    pub metadata: Value,
    /// Parent block, `None` at the page root.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent_block_id: Option<BlockId>,
    /// Named bucket under the parent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub slot: Option<String>,
    /// Order among siblings sharing `(parent_block_id, slot)`.
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub status: Status,
    /// Template this subtree was instantiated from.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub instance_id: Option<TemplateId>,
    /// Owning page, when the row set spans pages.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub page_id: Option<PageId>,
}

/// Fold `null` and `""` to `None`.
fn empty_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let raw: Option<String> = Option::deserialize(de)?;
    Ok(raw.filter(|s| !s.is_empty()).map(T::from))
}

impl BlockNode {
    /// A root-level block with empty content and metadata.
    pub fn new(id: impl Into<BlockId>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            content: Value::object(),
            metadata: Value::object(),
            parent_block_id: None,
            slot: None,
            position: 0.0,
            status: Status::default(),
            instance_id: None,
            page_id: None,
        }
    }

    /// Parent id with the empty-string sentinel folded to `None`.
    pub fn parent(&self) -> Option<&BlockId> {
        self.parent_block_id.as_ref().filter(|p| !p.is_empty())
    }

    /// Slot name with the empty-string sentinel folded to `None`.
    pub fn slot_name(&self) -> Option<&str> {
        self.slot.as_deref().filter(|s| !s.is_empty())
    }

    /// Check if this is a page-root block.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Check if this block roots an instance of a reusable block.
    pub fn is_instance(&self) -> bool {
        self.instance_id.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// The sibling group this block orders within.
    pub fn sibling_key(&self) -> SiblingKey {
        SiblingKey::new(self.parent(), self.slot_name())
    }
}

/// Builder for [`BlockNode`], mirroring the row fields.
///
/// ```
/// use trellis_types::{BlockNodeBuilder, Status};
/// use serde_json::json;
///
/// let node = BlockNodeBuilder::new("cta", "button")
///     .parent("hero")
///     .slot("actions")
///     .position(2.0)
///     .content(json!({"label": "Sign up"}))
///     .status(Status::Published)
///     .build();
/// assert_eq!(node.parent().unwrap().as_str(), "hero");
/// ```
pub struct BlockNodeBuilder {
    node: BlockNode,
}

impl BlockNodeBuilder {
    pub fn new(id: impl Into<BlockId>, block_type: impl Into<String>) -> Self {
        Self {
            node: BlockNode::new(id, block_type),
        }
    }

    pub fn parent(mut self, parent: impl Into<BlockId>) -> Self {
        self.node.parent_block_id = Some(parent.into());
        self
    }

    pub fn slot(mut self, slot: impl Into<String>) -> Self {
        self.node.slot = Some(slot.into());
        self
    }

    pub fn position(mut self, position: f64) -> Self {
        self.node.position = position;
        self
    }

    pub fn content(mut self, content: impl Into<Value>) -> Self {
        self.node.content = content.into();
        self
    }

    pub fn metadata(mut self, metadata: impl Into<Value>) -> Self {
        self.node.metadata = metadata.into();
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.node.status = status;
        self
    }

    pub fn instance_of(mut self, template: impl Into<TemplateId>) -> Self {
        self.node.instance_id = Some(template.into());
        self
    }

    pub fn page(mut self, page: impl Into<PageId>) -> Self {
        self.node.page_id = Some(page.into());
        self
    }

    /// Consume the builder and return the node.
    pub fn build(self) -> BlockNode {
        self.node
    }
}

/// A named, reusable subtree of blocks with a designated root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReusableBlock {
    pub id: TemplateId,
    #[serde(default)]
    pub name: String,
    pub root_block_id: BlockId,
    /// Every block of the template, in any order.
    pub blocks: Vec<BlockNode>,
}

impl ReusableBlock {
    /// The designated root block, if present in `blocks`.
    pub fn root(&self) -> Option<&BlockNode> {
        self.blocks.iter().find(|b| b.id == self.root_block_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
