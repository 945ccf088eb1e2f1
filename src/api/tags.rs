//! Tag API endpoints
//!
//! - GET /api/v1/tags - Tags ordered by name with public post counts
//! - GET /api/v1/tags/{name}/posts - Public posts carrying the tag

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::AppState;
use crate::api::responses::{ApiError, PagedResponse};
use crate::models::{PostSummary, TagWithCount};

/// Response for tag list
#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagWithCount>,
}

/// Build the tag router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tags))
        .route("/{name}/posts", get(list_posts_by_tag))
}

/// GET /api/v1/tags
async fn list_tags(State(state): State<AppState>) -> Result<Json<TagListResponse>, ApiError> {
    let tags = state.tag_service.list().await?;
    Ok(Json(TagListResponse { tags }))
}

/// GET /api/v1/tags/{name}/posts
async fn list_posts_by_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<PostSummary>>, ApiError> {
    let page = state
        .post_service
        .list_by_tag(&name, &query.into())
        .await?;
    Ok(Json(page.into()))
}
