//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document for the Ganache catalog API.

use utoipa::OpenApi;

use crate::handlers::{
    AssetResponse, AssetSearchResponse, HealthResponse, TagItem, TagListResponse, VariantUrls,
};
use crate::store::{Asset, AssetUpdate, SortOrder};

/// Ganache Image Catalog API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ganache - Image Catalog API",
        version = "0.1.0",
        description = r#"
## Content-addressed image catalog

Ganache ingests image uploads, deduplicates them by SHA-256 and keeps
searchable metadata alongside them.

### How It Works

1. **Upload** an image via `POST /api/assets` (multipart, field `file`)
2. The bytes are stored once per SHA-256; `content` and `thumb` variants are derived
3. **Search** by text and tags via `GET /api/assets`
4. **Serve** any variant via `GET /media/{id}/{variant}` with strong ETags

Uploading content that is already catalogued returns `409` with the
existing asset. Deleted assets keep their SHA-256.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    tags(
        (name = "Assets", description = "Upload, edit, delete and search catalogued images"),
        (name = "Tags", description = "Browse the tag vocabulary"),
        (name = "Media", description = "Stream original and derived image bytes"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::healthz,
        crate::handlers::health::readyz,
        crate::handlers::assets::search_assets,
        crate::handlers::assets::upload_asset,
        crate::handlers::assets::get_asset,
        crate::handlers::assets::update_asset,
        crate::handlers::assets::delete_asset,
        crate::handlers::tags::list_tags,
        crate::handlers::media::get_media_variant,
    ),
    components(
        schemas(
            Asset,
            AssetResponse,
            AssetSearchResponse,
            AssetUpdate,
            VariantUrls,
            SortOrder,
            TagItem,
            TagListResponse,
            HealthResponse,
        )
    )
)]
pub struct ApiDoc;
