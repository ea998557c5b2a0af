//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use ganache_core::MediaManager;

use crate::config::Config;
use crate::store::AssetStore;

/// Per-upload admission limits handed to the media manager.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub max_pixels: u64,
}

impl From<&Config> for UploadLimits {
    fn from(config: &Config) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            max_pixels: config.max_pixels,
        }
    }
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Asset metadata store
    pub store: Arc<AssetStore>,
    /// Content-addressed file storage
    pub media: Arc<MediaManager>,
    pub limits: UploadLimits,
}

impl AppState {
    pub fn new(store: AssetStore, media: MediaManager, limits: UploadLimits) -> Self {
        Self {
            store: Arc::new(store),
            media: Arc::new(media),
            limits,
        }
    }
}
