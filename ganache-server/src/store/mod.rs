//! Asset store
//!
//! Persists asset metadata and the tag vocabulary. Two backends share one
//! contract:
//! - **PostgreSQL** (production): full-text search through a generated
//!   `tsvector` column, one transaction per write.
//! - **Memory** (development and tests): a single mutex serializes every
//!   operation. Used when `DATABASE_URL` is not set; data is lost on restart.

mod memory;
mod postgres;
mod query;

pub use memory::MemoryAssetStore;
pub use postgres::{PostgresAssetStore, MIGRATOR};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

/// Default page size for asset searches.
pub const DEFAULT_PAGE_SIZE: i64 = 30;

/// Default page size for tag listings.
pub const DEFAULT_TAG_PAGE_SIZE: i64 = 100;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No asset matched, or it is soft-deleted and the caller did not ask for deleted rows
    #[error("asset not found")]
    NotFound,

    /// Content already catalogued; carries the existing record
    #[error("asset with sha256 {} already exists (id {})", .0.sha256, .0.id)]
    Duplicate(Box<Asset>),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(String),
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Migration(e.to_string())
    }
}

/// A catalogued image.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[schema(example = 42)]
    pub id: i64,

    /// Lowercase hex SHA-256 of the original bytes
    #[schema(example = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08")]
    pub sha256: String,

    #[schema(example = 482113)]
    pub bytes: i64,

    #[schema(example = "image/jpeg")]
    pub mime: String,

    pub width: i32,
    pub height: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,

    pub title: Option<String>,
    pub caption: Option<String>,
    pub credit: Option<String>,
    pub source: Option<String>,
    pub usage_notes: Option<String>,

    /// Canonical tag set, sorted
    #[schema(example = json!(["cricket", "new zealand"]))]
    pub tags: Vec<String>,

    /// Space-joined form of `tags`
    #[serde(skip)]
    pub tag_text: String,

    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub created_at: DateTime<Utc>,

    #[schema(value_type = String, example = "2026-01-08T10:00:00Z")]
    pub updated_at: DateTime<Utc>,

    #[schema(value_type = Option<String>)]
    pub deleted_at: Option<DateTime<Utc>>,

    /// Text-search rank; only set by searches with a query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
}

impl Asset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for [`AssetStore::create`].
#[derive(Debug, Clone, Default)]
pub struct NewAsset {
    pub sha256: String,
    pub bytes: i64,
    pub mime: String,
    pub width: i32,
    pub height: i32,
    pub original_filename: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
    pub credit: Option<String>,
    pub source: Option<String>,
    pub usage_notes: Option<String>,
    /// Raw tags; normalized by the store
    pub tags: Vec<String>,
}

/// Three-state field of a partial update.
///
/// Deserializes `null` as [`Patch::Null`] and a value as [`Patch::Value`];
/// pair with `#[serde(default)]` so an absent key stays [`Patch::Missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Missing,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Clone + PartialEq> Patch<T> {
    /// The value to write when applying this patch over `current`, or `None`
    /// when the field is untouched or already equal.
    pub fn change_from(&self, current: Option<&T>) -> Option<Option<T>> {
        match self {
            Self::Missing => None,
            Self::Null => current.is_some().then_some(None),
            Self::Value(next) => (current != Some(next)).then(|| Some(next.clone())),
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_value().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Value(value),
            None => Self::Null,
        })
    }
}

/// Partial update of an asset's editable fields.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct AssetUpdate {
    #[schema(value_type = Option<String>)]
    pub title: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub caption: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub credit: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub source: Patch<String>,
    #[schema(value_type = Option<String>)]
    pub usage_notes: Patch<String>,
    /// Replaces the whole tag set; `null` clears it
    #[schema(value_type = Option<Vec<String>>)]
    pub tags: Patch<Vec<String>>,
}

impl AssetUpdate {
    /// Target tag set, or `None` when tags are untouched.
    pub(crate) fn target_tags(&self) -> Option<Vec<String>> {
        match &self.tags {
            Patch::Missing => None,
            Patch::Null => Some(Vec::new()),
            Patch::Value(tags) => Some(ganache_core::tags::normalize_set(tags)),
        }
    }

    /// Text fields whose stored value this update changes, with the new value.
    pub(crate) fn text_changes(&self, current: &Asset) -> Vec<(TextField, Option<String>)> {
        [
            (TextField::Title, &self.title, &current.title),
            (TextField::Caption, &self.caption, &current.caption),
            (TextField::Credit, &self.credit, &current.credit),
            (TextField::Source, &self.source, &current.source),
            (TextField::UsageNotes, &self.usage_notes, &current.usage_notes),
        ]
        .into_iter()
        .filter_map(|(field, patch, existing)| {
            patch
                .change_from(existing.as_ref())
                .map(|value| (field, value))
        })
        .collect()
    }
}

/// Editable free-text field of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextField {
    Title,
    Caption,
    Credit,
    Source,
    UsageNotes,
}

impl TextField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Caption => "caption",
            Self::Credit => "credit",
            Self::Source => "source",
            Self::UsageNotes => "usage_notes",
        }
    }

    /// The asset's slot for this field.
    pub(crate) fn slot(self, asset: &mut Asset) -> &mut Option<String> {
        match self {
            Self::Title => &mut asset.title,
            Self::Caption => &mut asset.caption,
            Self::Credit => &mut asset.credit,
            Self::Source => &mut asset.source,
            Self::UsageNotes => &mut asset.usage_notes,
        }
    }
}

/// Result ordering for searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Relevance,
}

impl SortOrder {
    /// Parse a sort parameter; unknown values fall back to newest.
    pub fn from_param(value: &str) -> Self {
        match value {
            "oldest" => Self::Oldest,
            "relevance" => Self::Relevance,
            _ => Self::Newest,
        }
    }

    /// Relevance is meaningless without a text query.
    pub(crate) fn effective(self, has_query: bool) -> Self {
        match self {
            Self::Relevance if !has_query => Self::Newest,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Free-text query; blank is treated as absent
    pub query: Option<String>,
    /// Every listed tag must be present (after normalization)
    pub tags: Vec<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort: SortOrder,
    pub include_deleted: bool,
}

impl SearchParams {
    pub(crate) fn text_query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub items: Vec<Asset>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagPage {
    pub items: Vec<String>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Paging {
    pub page: i64,
    pub page_size: i64,
    pub offset: i64,
}

impl Paging {
    /// Non-positive values fall back to page 1 and `default_size`.
    pub fn resolve(page: i64, page_size: i64, default_size: i64) -> Self {
        let page = if page <= 0 { 1 } else { page };
        let page_size = if page_size <= 0 {
            default_size
        } else {
            page_size
        };
        Self {
            page,
            page_size,
            offset: (page - 1).saturating_mul(page_size),
        }
    }
}

/// Storage backend
enum Backend {
    Postgres(PostgresAssetStore),
    Memory(MemoryAssetStore),
}

/// Asset store dispatching to PostgreSQL or memory.
pub struct AssetStore {
    backend: Backend,
}

impl AssetStore {
    /// Connect to PostgreSQL and apply pending migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, StoreError> {
        let store =
            PostgresAssetStore::connect(database_url, max_connections, min_connections).await?;
        store.migrate().await?;
        Ok(Self::postgres(store))
    }

    pub fn postgres(store: PostgresAssetStore) -> Self {
        Self {
            backend: Backend::Postgres(store),
        }
    }

    /// In-memory store (development only)
    pub fn in_memory() -> Self {
        tracing::warn!("Using in-memory asset store - catalog will be lost on restart!");
        Self {
            backend: Backend::Memory(MemoryAssetStore::new()),
        }
    }

    /// Whether records survive a restart
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, Backend::Postgres(_))
    }

    /// Insert a new asset, or fail with [`StoreError::Duplicate`] carrying the
    /// record that already owns the SHA-256.
    pub async fn create(&self, input: NewAsset) -> Result<Asset, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.create(input).await,
            Backend::Memory(mem) => mem.create(input),
        }
    }

    pub async fn get(&self, id: i64, include_deleted: bool) -> Result<Asset, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.get(id, include_deleted).await,
            Backend::Memory(mem) => mem.get(id, include_deleted),
        }
    }

    /// Apply a partial update to an active asset.
    ///
    /// `updated_at` only moves when a stored value actually changes.
    pub async fn update(&self, id: i64, update: AssetUpdate) -> Result<Asset, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.update(id, update).await,
            Backend::Memory(mem) => mem.update(id, update),
        }
    }

    /// Soft-delete an active asset. Deleting twice is `NotFound`.
    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.delete(id).await,
            Backend::Memory(mem) => mem.delete(id),
        }
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchPage, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.search(params).await,
            Backend::Memory(mem) => mem.search(params),
        }
    }

    /// Alphabetical tag vocabulary, optionally restricted to a prefix.
    pub async fn list_tags(
        &self,
        prefix: Option<&str>,
        page: i64,
        page_size: i64,
    ) -> Result<TagPage, StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.list_tags(prefix, page, page_size).await,
            Backend::Memory(mem) => mem.list_tags(prefix, page, page_size),
        }
    }

    /// Check backend health (always Ok for memory)
    pub async fn ping(&self) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Postgres(pg) => pg.ping().await,
            Backend::Memory(_) => Ok(()),
        }
    }
}
