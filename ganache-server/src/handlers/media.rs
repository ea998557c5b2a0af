//! Media variant streaming handler
//!
//! Serves the bytes of an asset's original or derived variants straight from
//! the content-addressed tree.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use ganache_core::{original_extension, VariantKind, DERIVED_EXTENSION};
use tokio_util::io::ReaderStream;

use crate::error::ApiError;
use crate::extract::PathParams;
use crate::state::AppState;

/// Cache lifetime for originals.
const ORIGINAL_CACHE_CONTROL: &str = "public, max-age=86400";

/// Derived variants never change for a given content hash.
const DERIVED_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Strong validator for one variant of one piece of content.
pub fn etag_for(sha256: &str, kind: VariantKind) -> String {
    format!("\"{}-{}\"", sha256, kind)
}

fn cache_control(kind: VariantKind) -> &'static str {
    if kind.is_derived() {
        DERIVED_CACHE_CONTROL
    } else {
        ORIGINAL_CACHE_CONTROL
    }
}

/// Whether an `If-None-Match` header value lists `etag` (or `*`).
fn matches_if_none_match(header: &str, etag: &str) -> bool {
    header.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate == etag || candidate.strip_prefix("W/") == Some(etag)
    })
}

/// GET /media/{id}/{variant} - Stream a variant of an asset
///
/// `variant` is one of `original`, `content` or `thumb`. Responses carry an
/// `ETag` of `"<sha256>-<variant>"` and answer a matching `If-None-Match`
/// with 304.
#[utoipa::path(
    get,
    path = "/media/{id}/{variant}",
    tag = "Media",
    params(
        ("id" = i64, Path, description = "Asset id"),
        ("variant" = String, Path, description = "original, content or thumb")
    ),
    responses(
        (status = 200, description = "Variant bytes", content_type = "application/octet-stream"),
        (status = 304, description = "Client copy is current"),
        (status = 404, description = "Unknown asset or variant")
    )
)]
pub async fn get_media_variant(
    State(state): State<AppState>,
    PathParams((id, variant)): PathParams<(i64, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let kind: VariantKind = variant
        .parse()
        .map_err(|_| ApiError::not_found(format!("Unknown variant '{}'", variant)))?;

    let asset = state.store.get(id, false).await?;
    let etag = etag_for(&asset.sha256, kind);
    let etag_value =
        HeaderValue::from_str(&etag).map_err(|e| ApiError::internal(e.to_string()))?;
    let cache = HeaderValue::from_static(cache_control(kind));

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| matches_if_none_match(v, &etag));
    if not_modified {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, etag_value), (header::CACHE_CONTROL, cache)],
        )
            .into_response());
    }

    let extension = original_extension(asset.original_filename.as_deref(), &asset.mime);
    let path = state.media.path_for_variant(&asset.sha256, kind, &extension);

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(asset_id = id, variant = %kind, path = %path.display(), "Variant file missing");
            return Err(ApiError::not_found("Variant not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("open {}: {}", path.display(), e))),
    };
    let length = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("stat {}: {}", path.display(), e)))?
        .len();

    let content_type = if kind.is_derived() {
        format!("image/{}", DERIVED_EXTENSION)
    } else {
        asset.mime.clone()
    };
    let content_type = HeaderValue::from_str(&content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
            (header::ETAG, etag_value),
            (header::CACHE_CONTROL, cache),
        ],
        body,
    )
        .into_response())
}
