//! Tag vocabulary handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::extract::QueryParams;
use crate::state::AppState;
use crate::store::{TagPage, DEFAULT_TAG_PAGE_SIZE};
use crate::validation::{clamp_page, clamp_page_size, MAX_TAG_PAGE_SIZE};

/// Query parameters for listing tags
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TagListQuery {
    /// Only tags starting with this text (case-sensitive, canonical form)
    pub prefix: Option<String>,

    /// Page number (1-indexed)
    #[param(default = 1, minimum = 1)]
    pub page: Option<i64>,

    /// Items per page (max 500)
    #[param(default = 100, minimum = 1, maximum = 500)]
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TagItem {
    #[schema(example = "new zealand")]
    pub name: String,
}

/// One page of the tag vocabulary
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagListResponse {
    pub items: Vec<TagItem>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

impl From<TagPage> for TagListResponse {
    fn from(page: TagPage) -> Self {
        Self {
            items: page
                .items
                .into_iter()
                .map(|name| TagItem { name })
                .collect(),
            page: page.page,
            page_size: page.page_size,
            total: page.total,
        }
    }
}

/// GET /api/tags - List tags alphabetically
#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "Tags",
    params(TagListQuery),
    responses(
        (status = 200, description = "Alphabetical page of tags", body = TagListResponse)
    )
)]
pub async fn list_tags(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TagListQuery>,
) -> Result<Json<TagListResponse>, ApiError> {
    let page = clamp_page(query.page);
    let page_size = clamp_page_size(query.page_size, DEFAULT_TAG_PAGE_SIZE, MAX_TAG_PAGE_SIZE);
    let prefix = query.prefix.as_deref().filter(|p| !p.is_empty());

    let tags = state.store.list_tags(prefix, page, page_size).await?;
    Ok(Json(tags.into()))
}
