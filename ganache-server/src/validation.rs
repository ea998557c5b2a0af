//! Request validation module
//!
//! Field length checks and paging clamps applied at the HTTP boundary.

use crate::error::ApiError;
use crate::store::{AssetUpdate, Patch};

/// Longest accepted title, credit, source or tag, in characters
pub const MAX_FIELD_CHARS: usize = 255;

/// Asset search paging bounds
pub const MAX_SEARCH_PAGE_SIZE: i64 = 200;

/// Tag listing paging bounds
pub const MAX_TAG_PAGE_SIZE: i64 = 500;

/// Reject a field longer than [`MAX_FIELD_CHARS`].
pub fn validate_field_length(name: &str, value: Option<&str>) -> Result<(), ApiError> {
    match value {
        Some(v) if v.chars().count() > MAX_FIELD_CHARS => Err(ApiError::bad_request(format!(
            "{} exceeds maximum length of {} characters",
            name, MAX_FIELD_CHARS
        ))),
        _ => Ok(()),
    }
}

/// Reject any tag longer than [`MAX_FIELD_CHARS`].
pub fn validate_tags<S: AsRef<str>>(tags: &[S]) -> Result<(), ApiError> {
    tags.iter()
        .try_for_each(|tag| validate_field_length("tag", Some(tag.as_ref())))
}

/// Length checks for the bounded fields of a partial update.
pub fn validate_update(update: &AssetUpdate) -> Result<(), ApiError> {
    validate_field_length("title", update.title.as_value().map(String::as_str))?;
    validate_field_length("credit", update.credit.as_value().map(String::as_str))?;
    validate_field_length("source", update.source.as_value().map(String::as_str))?;
    if let Patch::Value(tags) = &update.tags {
        validate_tags(tags)?;
    }
    Ok(())
}

/// Page number, at least 1.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Page size within `1..=max`, `default` when absent.
pub fn clamp_page_size(page_size: Option<i64>, default: i64, max: i64) -> i64 {
    page_size.unwrap_or(default).clamp(1, max)
}
