//! Tag normalization.
//!
//! Free-text tags are canonicalized into a lowercase, whitespace-collapsed
//! form before they reach the asset store. The canonical set is always
//! sorted and deduplicated, and its space-joined form (`tag_text`) is what the
//! full-text index sees.

use std::collections::BTreeSet;

/// Canonicalize a single tag.
///
/// Trims, collapses internal whitespace runs to a single space and lowercases.
/// Whitespace-only input yields an empty string, which callers must drop.
pub fn normalize(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonicalize a list of tags into a sorted, deduplicated set.
pub fn normalize_set<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| normalize(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Space-joined canonical form used as a search column.
pub fn tag_text<I, S>(tags: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_set(tags).join(" ")
}
