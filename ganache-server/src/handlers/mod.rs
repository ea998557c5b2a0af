//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod assets;
pub mod health;
pub mod media;
pub mod tags;

pub use crate::state::AppState;
pub use assets::{
    delete_asset, get_asset, search_assets, update_asset, upload_asset, AssetResponse,
    AssetSearchResponse, SearchQuery, VariantUrls,
};
pub use health::{healthz, readyz, HealthResponse};
pub use media::get_media_variant;
pub use tags::{list_tags, TagItem, TagListQuery, TagListResponse};
