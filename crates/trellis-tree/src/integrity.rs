//! Row-set integrity checks.
//!
//! The assembler tolerates bad data silently (dangling parents are simply
//! unreachable, ties keep input order). This module is where those problems
//! get reported.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use trellis_types::{BlockId, BlockNode, SiblingKey};

/// One problem found in a row set.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// Two or more rows share an id.
    DuplicateId { id: BlockId, count: usize },
    /// A row names a parent that is not in the set.
    DanglingParent { id: BlockId, parent: BlockId },
    /// Rows in one sibling group share a position.
    DuplicatePosition {
        group: String,
        position: f64,
        ids: Vec<BlockId>,
    },
    /// Parent links that loop back on themselves.
    Cycle { ids: Vec<BlockId> },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::DuplicateId { id, count } => {
                write!(f, "duplicate id {id} ({count} rows)")
            }
            IntegrityIssue::DanglingParent { id, parent } => {
                write!(f, "{id}: parent {parent} not found")
            }
            IntegrityIssue::DuplicatePosition { group, position, ids } => {
                write!(f, "group {group}: position {position} shared by ")?;
                write_ids(f, ids)
            }
            IntegrityIssue::Cycle { ids } => {
                write!(f, "parent cycle: ")?;
                write_ids(f, ids)
            }
        }
    }
}

fn write_ids(f: &mut fmt::Formatter<'_>, ids: &[BlockId]) -> fmt::Result {
    for (i, id) in ids.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{id}")?;
    }
    Ok(())
}

/// Check a row set. Issues come grouped by kind, each kind in a stable order.
pub fn check(nodes: &[BlockNode]) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();
    duplicate_ids(nodes, &mut issues);
    dangling_parents(nodes, &mut issues);
    duplicate_positions(nodes, &mut issues);
    cycles(nodes, &mut issues);

    if !issues.is_empty() {
        tracing::debug!(rows = nodes.len(), issues = issues.len(), "integrity check found issues");
    }
    issues
}

fn duplicate_ids(nodes: &[BlockNode], issues: &mut Vec<IntegrityIssue>) {
    let mut counts: HashMap<&BlockId, usize> = HashMap::new();
    for node in nodes {
        *counts.entry(&node.id).or_default() += 1;
    }
    let mut reported = HashSet::new();
    for node in nodes {
        let count = counts[&node.id];
        if count > 1 && reported.insert(&node.id) {
            issues.push(IntegrityIssue::DuplicateId {
                id: node.id.clone(),
                count,
            });
        }
    }
}

fn dangling_parents(nodes: &[BlockNode], issues: &mut Vec<IntegrityIssue>) {
    let ids: HashSet<&BlockId> = nodes.iter().map(|n| &n.id).collect();
    for node in nodes {
        let Some(parent) = node.parent() else {
            continue;
        };
        if !ids.contains(parent) {
            issues.push(IntegrityIssue::DanglingParent {
                id: node.id.clone(),
                parent: parent.clone(),
            });
        }
    }
}

fn duplicate_positions(nodes: &[BlockNode], issues: &mut Vec<IntegrityIssue>) {
    let mut groups: BTreeMap<SiblingKey, Vec<&BlockNode>> = BTreeMap::new();
    for node in nodes {
        groups.entry(node.sibling_key()).or_default().push(node);
    }

    for (key, mut group) in groups {
        group.sort_by(|a, b| a.position.total_cmp(&b.position));
        for run in group.chunk_by(|a, b| a.position.total_cmp(&b.position).is_eq()) {
            if run.len() > 1 {
                issues.push(IntegrityIssue::DuplicatePosition {
                    group: key.to_string(),
                    position: run[0].position,
                    ids: run.iter().map(|n| n.id.clone()).collect(),
                });
            }
        }
    }
}

/// Walk parent links from every row, marking rows done once their chain ends
/// at a root, a dangling parent, or an already reported cycle.
fn cycles(nodes: &[BlockNode], issues: &mut Vec<IntegrityIssue>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnPath,
        Done,
    }

    let parents: HashMap<&BlockId, Option<&BlockId>> =
        nodes.iter().map(|n| (&n.id, n.parent())).collect();
    let mut marks: HashMap<&BlockId, Mark> = HashMap::new();

    for node in nodes {
        let mut path: Vec<&BlockId> = Vec::new();
        let mut current = Some(&node.id);

        while let Some(id) = current {
            match marks.get(id) {
                Some(Mark::Done) => break,
                Some(Mark::OnPath) => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut ring: Vec<BlockId> = path[start..].iter().map(|id| (*id).clone()).collect();
                    if let Some(min) = ring.iter().enumerate().min_by_key(|(_, id)| *id).map(|(i, _)| i) {
                        ring.rotate_left(min);
                    }
                    tracing::warn!(ids = ?ring, "parent cycle in row set");
                    issues.push(IntegrityIssue::Cycle { ids: ring });
                    break;
                }
                None => {
                    marks.insert(id, Mark::OnPath);
                    path.push(id);
                    current = parents.get(id).copied().flatten();
                }
            }
        }

        for id in path {
            marks.insert(id, Mark::Done);
        }
    }
}
