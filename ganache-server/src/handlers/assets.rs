//! Asset handlers
//!
//! Upload, read, update, delete and search catalogued assets.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParams, QueryParams};
use crate::multipart::AssetForm;
use crate::state::AppState;
use crate::store::{
    Asset, AssetUpdate, SearchPage, SearchParams, SortOrder, StoreError, DEFAULT_PAGE_SIZE,
};
use crate::validation::{
    clamp_page, clamp_page_size, validate_field_length, validate_tags, validate_update,
    MAX_SEARCH_PAGE_SIZE,
};

/// URLs of the servable variants of an asset
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VariantUrls {
    #[schema(example = "/media/42/thumb")]
    pub thumb: String,
    #[schema(example = "/media/42/content")]
    pub content: String,
    #[schema(example = "/media/42/original")]
    pub original: String,
}

impl VariantUrls {
    fn for_asset(id: i64) -> Self {
        Self {
            thumb: format!("/media/{}/thumb", id),
            content: format!("/media/{}/content", id),
            original: format!("/media/{}/original", id),
        }
    }
}

/// Asset as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AssetResponse {
    #[serde(flatten)]
    pub asset: Asset,
    pub variants: VariantUrls,
}

impl From<Asset> for AssetResponse {
    fn from(asset: Asset) -> Self {
        let variants = VariantUrls::for_asset(asset.id);
        Self { asset, variants }
    }
}

/// One page of search results
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetSearchResponse {
    pub items: Vec<AssetResponse>,
    pub page: i64,
    pub page_size: i64,
    /// Matches across all pages
    pub total: i64,
}

impl From<SearchPage> for AssetSearchResponse {
    fn from(page: SearchPage) -> Self {
        Self {
            items: page.items.into_iter().map(AssetResponse::from).collect(),
            page: page.page,
            page_size: page.page_size,
            total: page.total,
        }
    }
}

/// Query parameters for searching assets
///
/// Parsed from raw pairs because `tag` repeats.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct SearchQuery {
    /// Full-text query over title, caption and tags
    pub q: Option<String>,

    /// Required tag; repeat to require several
    pub tag: Vec<String>,

    /// Page number (1-indexed)
    #[param(default = 1, minimum = 1)]
    pub page: Option<i64>,

    /// Items per page (max 200)
    #[param(default = 30, minimum = 1, maximum = 200)]
    pub page_size: Option<i64>,

    /// newest, oldest or relevance
    #[param(default = "newest")]
    pub sort: Option<String>,

    /// Include soft-deleted assets
    #[param(default = false)]
    pub include_deleted: bool,
}

impl SearchQuery {
    /// Collect known keys from decoded query pairs; unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "q" => query.q = Some(value),
                "tag" => query.tag.push(value),
                "page" => query.page = Some(parse_int(&key, &value)?),
                "pageSize" => query.page_size = Some(parse_int(&key, &value)?),
                "sort" => query.sort = Some(value),
                "includeDeleted" => query.include_deleted = parse_bool(&key, &value)?,
                _ => {}
            }
        }
        Ok(query)
    }

    pub fn to_search_params(&self) -> SearchParams {
        SearchParams {
            query: self.q.clone(),
            tags: self.tag.clone(),
            page: clamp_page(self.page),
            page_size: clamp_page_size(self.page_size, DEFAULT_PAGE_SIZE, MAX_SEARCH_PAGE_SIZE),
            sort: self
                .sort
                .as_deref()
                .map(SortOrder::from_param)
                .unwrap_or_default(),
            include_deleted: self.include_deleted,
        }
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{} must be an integer", key)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(ApiError::bad_request(format!("{} must be a boolean", key))),
    }
}

/// GET /api/assets - Search assets
#[utoipa::path(
    get,
    path = "/api/assets",
    tag = "Assets",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching assets", body = AssetSearchResponse),
        (status = 400, description = "Malformed query parameter")
    )
)]
pub async fn search_assets(
    State(state): State<AppState>,
    QueryParams(pairs): QueryParams<Vec<(String, String)>>,
) -> Result<Json<AssetSearchResponse>, ApiError> {
    let params = SearchQuery::from_pairs(pairs)?.to_search_params();

    tracing::debug!(
        query = ?params.query,
        tags = ?params.tags,
        page = params.page,
        page_size = params.page_size,
        sort = ?params.sort,
        "Searching assets"
    );

    let page = state.store.search(&params).await?;
    Ok(Json(page.into()))
}

/// POST /api/assets - Upload a new asset
///
/// Accepts multipart/form-data with:
/// - **file** (required): the image, streamed to storage
/// - **title**, **credit**, **source** (optional): at most 255 characters
/// - **caption**, **usageNotes** (optional)
/// - **tags** (optional, repeatable): each at most 255 characters
///
/// Content already in the catalog yields 409 with the existing asset.
#[utoipa::path(
    post,
    path = "/api/assets",
    tag = "Assets",
    request_body(
        content_type = "multipart/form-data",
        description = "Image file plus optional metadata fields"
    ),
    responses(
        (status = 201, description = "Asset created", body = AssetResponse),
        (status = 400, description = "Missing file, invalid image or invalid field"),
        (status = 409, description = "Same content already catalogued", body = AssetResponse),
        (status = 413, description = "File exceeds the upload limit")
    )
)]
pub async fn upload_asset(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AssetResponse>), ApiError> {
    let form = AssetForm::parse(&mut multipart, &state.media, state.limits).await?;

    form.require_media()?;
    validate_field_length("title", form.title.as_deref())?;
    validate_field_length("credit", form.credit.as_deref())?;
    validate_field_length("source", form.source.as_deref())?;
    validate_tags(&form.tags)?;

    let input = form.into_new_asset()?;
    match state.store.create(input).await {
        Ok(asset) => {
            tracing::info!(asset_id = asset.id, sha256 = %asset.sha256, "Asset created");
            Ok((StatusCode::CREATED, Json(asset.into())))
        }
        Err(StoreError::Duplicate(existing)) => {
            tracing::info!(
                asset_id = existing.id,
                sha256 = %existing.sha256,
                deleted = existing.is_deleted(),
                "Duplicate upload"
            );
            Ok((StatusCode::CONFLICT, Json((*existing).into())))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/assets/{id} - Fetch one active asset
#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    tag = "Assets",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset found", body = AssetResponse),
        (status = 404, description = "No active asset with this id")
    )
)]
pub async fn get_asset(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> Result<Json<AssetResponse>, ApiError> {
    let asset = state.store.get(id, false).await?;
    Ok(Json(asset.into()))
}

/// PATCH /api/assets/{id} - Partially update an asset
///
/// Absent keys are left alone, `null` clears a field, and `tags` replaces
/// the whole tag set.
#[utoipa::path(
    patch,
    path = "/api/assets/{id}",
    tag = "Assets",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = AssetUpdate,
    responses(
        (status = 200, description = "Updated asset", body = AssetResponse),
        (status = 400, description = "Malformed body or field too long"),
        (status = 404, description = "No active asset with this id")
    )
)]
pub async fn update_asset(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
    JsonBody(update): JsonBody<AssetUpdate>,
) -> Result<Json<AssetResponse>, ApiError> {
    validate_update(&update)?;

    let asset = state.store.update(id, update).await?;
    tracing::info!(asset_id = asset.id, "Asset updated");
    Ok(Json(asset.into()))
}

/// DELETE /api/assets/{id} - Soft-delete an asset
#[utoipa::path(
    delete,
    path = "/api/assets/{id}",
    tag = "Assets",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 404, description = "No active asset with this id")
    )
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id).await?;
    tracing::info!(asset_id = id, "Asset deleted");
    Ok(StatusCode::NO_CONTENT)
}
