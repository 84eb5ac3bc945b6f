//! Typed identifiers for blocks, reusable-block templates, and pages.
//!
//! Identifiers are opaque strings as far as the engine is concerned: rows come
//! from an external layout API that may use UUIDs, database keys, or anything
//! else. Fresh ids minted by the engine are UUIDv7 text (time-ordered).
//!
//! The `short()` form (first 8 chars) is for human-facing output only, never
//! used as a lookup key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

/// A reusable-block (template) identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

/// A page identifier.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a new time-ordered identifier (UUIDv7 text).
            pub fn new_v7() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for human display only (not lookup).
            pub fn short(&self) -> &str {
                match self.0.char_indices().nth(8) {
                    Some((idx, _)) => &self.0[..idx],
                    None => &self.0,
                }
            }

            /// Empty identifiers are the "no reference" sentinel in persisted rows.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Check if a query string matches this ID by prefix.
            pub fn matches_prefix(&self, prefix: &str) -> bool {
                self.0.starts_with(prefix)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<$T> for String {
            fn from(id: $T) -> String {
                id.0
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $T {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_string_id!(BlockId, "BlockId");
impl_string_id!(TemplateId, "TemplateId");
impl_string_id!(PageId, "PageId");

// ── Prefix resolution ───────────────────────────────────────────────────────

/// Error from ambiguous prefix resolution.
#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("no match for prefix '{0}'")]
    NoMatch(String),
    #[error("ambiguous prefix '{prefix}': matches {candidates:?}")]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Resolve a query string against a set of block IDs.
///
/// Resolution order:
/// 1. Exact match
/// 2. Unique prefix match
/// 3. Error (no match or ambiguous)
pub fn resolve_block_prefix<'a>(
    ids: impl Iterator<Item = &'a BlockId>,
    query: &str,
) -> Result<BlockId, PrefixError> {
    let mut matches: Vec<&BlockId> = Vec::new();
    for id in ids {
        if id.as_str() == query {
            return Ok(id.clone());
        }
        if id.matches_prefix(query) {
            matches.push(id);
        }
    }

    match matches.len() {
        0 => Err(PrefixError::NoMatch(query.to_string())),
        1 => Ok(matches[0].clone()),
        _ => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: matches.iter().map(|id| id.to_string()).collect(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
