//! Ganache Server Library - REST API and asset store for the Ganache image catalog
//!
//! This library exposes the server components for use in integration tests
//! and the operator CLI. The main binary uses these same components.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::{create_router, create_router_with_config};
pub use state::{AppState, UploadLimits};
pub use store::{
    Asset, AssetStore, AssetUpdate, MemoryAssetStore, NewAsset, Patch, PostgresAssetStore,
    SearchPage, SearchParams, SortOrder, StoreError, TagPage, MIGRATOR,
};
