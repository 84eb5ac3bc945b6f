//! Template instantiation.
//!
//! Cloning a template subtree produces fresh rows that are independent of the
//! template: new ids, parents rewritten through the [`IdMap`], the root placed
//! wherever the caller asks. Overrides are never copied; an instance starts
//! out rendering exactly like its template.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use trellis_types::{BlockId, BlockNode, PageId, ReusableBlock, TemplateId};

use crate::assemble::{AssembledNode, TreeAssembler};
use crate::config::InstanceTracking;
use crate::error::CloneError;

/// How many colliding ids in a row before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

// ============================================================================
// Id sources
// ============================================================================

/// Supplies fresh block ids.
///
/// Passed explicitly so instantiation stays deterministic under test.
pub trait IdSource {
    fn next_id(&mut self) -> BlockId;
}

/// UUIDv7 ids, the default outside tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Uuid7Ids;

impl IdSource for Uuid7Ids {
    fn next_id(&mut self) -> BlockId {
        BlockId::new_v7()
    }
}

/// `prefix1`, `prefix2`, ... for tests and reproducible CLI output.
#[derive(Clone, Debug)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 1,
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self) -> BlockId {
        let id = BlockId::new(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }
}

impl<F> IdSource for F
where
    F: FnMut() -> BlockId,
{
    fn next_id(&mut self) -> BlockId {
        self()
    }
}

// ============================================================================
// IdMap
// ============================================================================

/// Template id → cloned id, in clone order (root first).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdMap(IndexMap<BlockId, BlockId>);

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: BlockId, clone: BlockId) {
        self.0.insert(source, clone);
    }

    /// The clone of a template block.
    pub fn get(&self, source: &BlockId) -> Option<&BlockId> {
        self.0.get(source)
    }

    /// The template block a clone was made from.
    pub fn source_of(&self, clone: &BlockId) -> Option<&BlockId> {
        self.0
            .iter()
            .find_map(|(source, cloned)| (cloned == clone).then_some(source))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &BlockId)> {
        self.0.iter()
    }
}

// ============================================================================
// Cloner
// ============================================================================

/// Where the instance root goes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneTarget {
    #[serde(default)]
    pub parent_block_id: Option<BlockId>,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub position: f64,
    /// Stamped on every cloned row when set.
    #[serde(default)]
    pub page_id: Option<PageId>,
}

impl CloneTarget {
    /// At the page root.
    pub fn root(position: f64) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Under `parent` in `slot`.
    pub fn under(parent: impl Into<BlockId>, slot: Option<&str>, position: f64) -> Self {
        Self {
            parent_block_id: Some(parent.into()),
            slot: slot.filter(|s| !s.is_empty()).map(str::to_string),
            position,
            page_id: None,
        }
    }

    pub fn on_page(mut self, page: impl Into<PageId>) -> Self {
        self.page_id = Some(page.into());
        self
    }
}

/// Result of one instantiation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Instantiation {
    /// Cloned rows, root first, parents before children.
    pub nodes: Vec<BlockNode>,
    pub id_map: IdMap,
}

impl Instantiation {
    pub fn root(&self) -> Option<&BlockNode> {
        self.nodes.first()
    }
}

/// Copies template subtrees into fresh instance rows.
#[derive(Clone, Debug, Default)]
pub struct InstantiationCloner {
    tracking: InstanceTracking,
}

impl InstantiationCloner {
    pub fn new(tracking: InstanceTracking) -> Self {
        Self { tracking }
    }

    /// Clone a parent-first template subtree.
    ///
    /// The first entry is the template root. Its clone takes parent, slot and
    /// position from `target` and carries `instance_id = template_id`. Every
    /// other row keeps its slot and position and has its parent rewritten to
    /// the parent's clone; a parent outside the subtree is an error.
    pub fn clone_subtree(
        &self,
        subtree: &[AssembledNode<'_>],
        template_id: &TemplateId,
        target: &CloneTarget,
        ids: &mut dyn IdSource,
    ) -> Result<Instantiation, CloneError> {
        let Some((root, descendants)) = subtree.split_first() else {
            return Ok(Instantiation::default());
        };

        let id_map = Self::mint_ids(subtree, ids)?;
        let cloned_id = |source: &BlockId| id_map.get(source).cloned();

        let mut nodes = Vec::with_capacity(subtree.len());

        let mut clone = root.node.clone();
        clone.id = cloned_id(&root.node.id).ok_or_else(|| CloneError::MissingRoot(root.node.id.clone()))?;
        clone.parent_block_id = target.parent_block_id.clone().filter(|p| !p.is_empty());
        clone.slot = target.slot.clone().filter(|s| !s.is_empty());
        clone.position = target.position;
        clone.instance_id = Some(template_id.clone());
        if target.page_id.is_some() {
            clone.page_id = target.page_id.clone();
        }
        nodes.push(clone);

        for entry in descendants {
            let source = entry.node;
            let parent = source
                .parent()
                .and_then(|p| cloned_id(p))
                .ok_or_else(|| CloneError::ParentOutsideSubtree {
                    id: source.id.clone(),
                    parent: source.parent().cloned(),
                })?;

            let mut clone = source.clone();
            clone.id = cloned_id(&source.id).ok_or_else(|| CloneError::MissingRoot(source.id.clone()))?;
            clone.parent_block_id = Some(parent);
            clone.instance_id = match self.tracking {
                InstanceTracking::RootOnly => None,
                InstanceTracking::PerNode => Some(template_id.clone()),
            };
            if target.page_id.is_some() {
                clone.page_id = target.page_id.clone();
            }
            nodes.push(clone);
        }

        tracing::debug!(
            template = %template_id,
            root = %nodes[0].id,
            count = nodes.len(),
            "instantiated template subtree"
        );
        Ok(Instantiation { nodes, id_map })
    }

    /// Clone a whole template from its designated root.
    pub fn instantiate(
        &self,
        template: &ReusableBlock,
        target: &CloneTarget,
        ids: &mut dyn IdSource,
    ) -> Result<Instantiation, CloneError> {
        let subtree = template_subtree(template)?;
        self.clone_subtree(&subtree, &template.id, target, ids)
    }

    fn mint_ids(subtree: &[AssembledNode<'_>], ids: &mut dyn IdSource) -> Result<IdMap, CloneError> {
        let taken: HashSet<&BlockId> = subtree.iter().map(|entry| entry.id()).collect();
        let mut minted: HashSet<BlockId> = HashSet::with_capacity(subtree.len());
        let mut id_map = IdMap::new();

        for entry in subtree {
            let mut attempts = 0;
            let fresh = loop {
                let candidate = ids.next_id();
                if !candidate.is_empty() && !taken.contains(&candidate) && !minted.contains(&candidate) {
                    break candidate;
                }
                attempts += 1;
                tracing::debug!(candidate = %candidate, attempts, "fresh id collided, regenerating");
                if attempts >= MAX_ID_ATTEMPTS {
                    return Err(CloneError::IdExhausted { attempts });
                }
            };
            minted.insert(fresh.clone());
            id_map.insert(entry.id().clone(), fresh);
        }

        Ok(id_map)
    }
}

/// The template root followed by its descendants, parent-first.
pub fn template_subtree(template: &ReusableBlock) -> Result<Vec<AssembledNode<'_>>, CloneError> {
    let subtree = TreeAssembler::new(&template.blocks).subtree(&template.root_block_id);
    if subtree.is_empty() {
        return Err(CloneError::MissingRoot(template.root_block_id.clone()));
    }
    Ok(subtree)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::BlockNodeBuilder;

    fn template() -> ReusableBlock {
        ReusableBlock {
            id: TemplateId::new("T"),
            name: "Card".into(),
            root_block_id: BlockId::new("t-root"),
            blocks: vec![
                BlockNodeBuilder::new("t-title", "heading")
                    .parent("t-root")
                    .slot("header")
                    .position(0.0)
                    .content(serde_json::json!({"text": "Hi"}))
                    .build(),
                BlockNodeBuilder::new("t-root", "card").position(4.0).build(),
                BlockNodeBuilder::new("t-body", "text").parent("t-root").position(1.0).build(),
                BlockNodeBuilder::new("t-leaf", "text").parent("t-body").position(0.0).build(),
            ],
        }
    }

    #[test]
    fn test_clone_rewrites_ids_and_parents() {
        let tpl = template();
        let mut ids = SequentialIds::new("n");
        let out = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::under("page-col", Some("main"), 7.0), &mut ids)
            .unwrap();

        assert_eq!(out.nodes.len(), 4);
        let root = out.root().unwrap();
        assert_eq!(root.id.as_str(), "n1");
        assert_eq!(root.parent().map(BlockId::as_str), Some("page-col"));
        assert_eq!(root.slot_name(), Some("main"));
        assert_eq!(root.position, 7.0);
        assert_eq!(root.instance_id, Some(TemplateId::new("T")));

        let by_source = |src: &str| {
            let id = out.id_map.get(&BlockId::new(src)).unwrap();
            out.nodes.iter().find(|n| &n.id == id).unwrap()
        };
        let title = by_source("t-title");
        assert_eq!(title.parent(), Some(&root.id));
        assert_eq!(title.slot_name(), Some("header"));
        assert_eq!(title.instance_id, None);
        assert_eq!(title.content, tpl.blocks[0].content);

        let leaf = by_source("t-leaf");
        assert_eq!(leaf.parent(), Some(out.id_map.get(&BlockId::new("t-body")).unwrap()));
    }

    #[test]
    fn test_clone_ids_are_unique_and_fresh() {
        let tpl = template();
        let out = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::root(0.0), &mut Uuid7Ids)
            .unwrap();
        let fresh: HashSet<&BlockId> = out.nodes.iter().map(|n| &n.id).collect();
        assert_eq!(fresh.len(), tpl.blocks.len());
        assert!(tpl.blocks.iter().all(|b| !fresh.contains(&b.id)));
    }

    #[test]
    fn test_colliding_ids_are_regenerated() {
        let tpl = template();
        let mut script = ["t-root", "x", "x", "t-body", "", "y", "z", "w"].into_iter();
        let mut ids = move || BlockId::new(script.next().unwrap_or("spill"));
        let out = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::root(0.0), &mut ids)
            .unwrap();
        let minted: Vec<&str> = out.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(minted.len(), 4);
        assert!(minted.contains(&"x"));
        assert!(!minted.contains(&"t-root"));
        assert!(!minted.contains(&""));
    }

    #[test]
    fn test_stuck_id_source_gives_up() {
        let tpl = template();
        let mut ids = || BlockId::new("t-root");
        let err = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::root(0.0), &mut ids)
            .unwrap_err();
        assert_eq!(err, CloneError::IdExhausted { attempts: MAX_ID_ATTEMPTS });
    }

    #[test]
    fn test_per_node_tracking() {
        let tpl = template();
        let out = InstantiationCloner::new(InstanceTracking::PerNode)
            .instantiate(&tpl, &CloneTarget::root(0.0), &mut SequentialIds::new("p"))
            .unwrap();
        assert!(out.nodes.iter().all(|n| n.instance_id == Some(TemplateId::new("T"))));
    }

    #[test]
    fn test_page_stamped_on_every_row() {
        let tpl = template();
        let out = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::root(0.0).on_page("home"), &mut SequentialIds::new("p"))
            .unwrap();
        assert!(out.nodes.iter().all(|n| n.page_id == Some(PageId::new("home"))));
    }

    #[test]
    fn test_parent_outside_subtree_is_error() {
        let rows = vec![
            BlockNodeBuilder::new("r", "card").build(),
            BlockNodeBuilder::new("stray", "text").parent("elsewhere").build(),
        ];
        let subtree: Vec<AssembledNode<'_>> = rows
            .iter()
            .map(|node| AssembledNode { node, depth: 0, degraded: false })
            .collect();
        let err = InstantiationCloner::default()
            .clone_subtree(&subtree, &TemplateId::new("T"), &CloneTarget::root(0.0), &mut SequentialIds::new("n"))
            .unwrap_err();
        assert_eq!(
            err,
            CloneError::ParentOutsideSubtree {
                id: BlockId::new("stray"),
                parent: Some(BlockId::new("elsewhere")),
            }
        );
    }

    #[test]
    fn test_missing_template_root() {
        let mut tpl = template();
        tpl.root_block_id = BlockId::new("nope");
        let err = template_subtree(&tpl).unwrap_err();
        assert_eq!(err, CloneError::MissingRoot(BlockId::new("nope")));
    }

    #[test]
    fn test_template_untouched_and_reverse_lookup() {
        let tpl = template();
        let before = tpl.clone();
        let out = InstantiationCloner::default()
            .instantiate(&tpl, &CloneTarget::root(0.0), &mut SequentialIds::new("n"))
            .unwrap();
        assert_eq!(tpl, before);
        assert_eq!(out.id_map.source_of(&BlockId::new("n1")), Some(&BlockId::new("t-root")));
        assert_eq!(out.id_map.source_of(&BlockId::new("t-root")), None);
    }
}
