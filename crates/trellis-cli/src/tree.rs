//! Block trees as ASCII art.

use trellis_tree::{AssembledNode, ResolvedNode};
use trellis_types::{BlockNode, Value};

/// Anything that renders as one tree line.
pub trait TreeEntry {
    fn node(&self) -> &BlockNode;
    fn depth(&self) -> usize;
    fn degraded(&self) -> bool;
}

impl TreeEntry for AssembledNode<'_> {
    fn node(&self) -> &BlockNode {
        self.node
    }
    fn depth(&self) -> usize {
        self.depth
    }
    fn degraded(&self) -> bool {
        self.degraded
    }
}

impl TreeEntry for ResolvedNode {
    fn node(&self) -> &BlockNode {
        &self.node
    }
    fn depth(&self) -> usize {
        self.depth
    }
    fn degraded(&self) -> bool {
        self.degraded
    }
}

/// Format a pre-order, depth-annotated block list as ASCII tree lines.
pub fn format_block_tree<E: TreeEntry>(entries: &[E]) -> Vec<String> {
    let mut lines = Vec::with_capacity(entries.len());
    // last_at[d]: the most recent entry at depth d was the last of its siblings
    let mut last_at: Vec<bool> = Vec::new();

    for (idx, entry) in entries.iter().enumerate() {
        let depth = entry.depth();
        let is_last = is_last_sibling(entries, idx);
        last_at.truncate(depth);
        last_at.resize(depth, true);
        last_at.push(is_last);

        let mut prefix = String::new();
        for &ancestor_last in last_at.iter().take(depth).skip(1) {
            prefix.push_str(if ancestor_last { "   " } else { "│  " });
        }

        let connector = if depth == 0 {
            ""
        } else if is_last {
            "└─ "
        } else {
            "├─ "
        };

        lines.push(format!("{prefix}{connector}{}", describe(entry)));
    }

    lines
}

fn is_last_sibling<E: TreeEntry>(entries: &[E], idx: usize) -> bool {
    let depth = entries[idx].depth();
    for later in &entries[idx + 1..] {
        if later.depth() < depth {
            return true;
        }
        if later.depth() == depth {
            return false;
        }
    }
    true
}

fn describe<E: TreeEntry>(entry: &E) -> String {
    let node = entry.node();
    let mut line = format!("{} [{}]", node.id.short(), node.block_type);
    if let Some(slot) = node.slot_name() {
        line.push_str(&format!(" @{slot}"));
    }
    if let Some(template) = &node.instance_id {
        line.push_str(&format!(" <{template}>"));
    }
    if entry.degraded() {
        line.push_str(" (unknown type)");
    }
    if let Some(summary) = content_summary(&node.content, 40) {
        line.push_str(&format!(" \"{summary}\""));
    }
    line
}

/// First string field of the content, first line only, truncated.
fn content_summary(content: &Value, max_chars: usize) -> Option<String> {
    let text = content
        .as_object()?
        .values()
        .find_map(Value::as_str)?;
    let first_line = text.lines().next().unwrap_or("").trim();
    if first_line.is_empty() {
        return None;
    }

    if first_line.chars().count() <= max_chars {
        Some(first_line.to_string())
    } else {
        let truncated: String = first_line.chars().take(max_chars - 3).collect();
        Some(format!("{truncated}..."))
    }
}
