//! Loading rows, templates and overrides from JSON files.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use trellis_types::{BlockId, BlockNode, OverrideSet, ReusableBlock, resolve_block_prefix};

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {what} file {}", path.display()))
}

/// A JSON array of block rows.
pub fn load_rows(path: &Path) -> Result<Vec<BlockNode>> {
    let rows: Vec<BlockNode> = read_json(path, "rows")?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "loaded rows");
    Ok(rows)
}

/// A JSON reusable block.
pub fn load_template(path: &Path) -> Result<ReusableBlock> {
    read_json(path, "template")
}

/// A JSON object `{ node_id: { path: value } }`; absent path means no overrides.
pub fn load_overrides(path: Option<&Path>) -> Result<OverrideSet> {
    match path {
        Some(path) => read_json(path, "overrides"),
        None => Ok(OverrideSet::new()),
    }
}

/// Resolve a full id or unique prefix against the loaded rows.
pub fn find_block<'a>(rows: &'a [BlockNode], query: &str) -> Result<&'a BlockNode> {
    let id: BlockId = resolve_block_prefix(rows.iter().map(|r| &r.id), query)?;
    rows.iter()
        .find(|r| r.id == id)
        .with_context(|| format!("block {id} vanished during lookup"))
}
