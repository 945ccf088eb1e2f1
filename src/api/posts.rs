//! Post API endpoints
//!
//! - GET /api/v1/posts - Public post list
//! - POST /api/v1/posts - Create post
//! - GET /api/v1/posts/{id} - Post detail, full or teaser
//! - PUT /api/v1/posts/{id} - Edit post (author only)
//! - DELETE /api/v1/posts/{id} - Delete post (author only)
//! - GET /api/v1/feed - Posts of followed authors

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{ApiError, Notice, NoticeResponse, PagedResponse};
use crate::models::{CreatePostInput, PostSummary, UpdatePostInput};
use crate::services::PostDetail;

/// GET /api/v1/posts - Public posts, newest first
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<PostSummary>>, ApiError> {
    let page = state.post_service.list(&query.into()).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/posts - Create post owned by the current user
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostSummary>), ApiError> {
    let post = state.post_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/posts/{id} - Post detail
///
/// Returns the full post when the viewer may read it and a teaser
/// otherwise. The `view` field tells the two apart.
pub async fn get_post(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, ApiError> {
    let detail = state.post_service.detail(id, viewer.user()).await?;
    Ok(Json(detail))
}

/// PUT /api/v1/posts/{id} - Edit post
pub async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePostInput>,
) -> Result<Json<PostSummary>, ApiError> {
    let post = state.post_service.update(id, &user.0, body).await?;
    Ok(Json(post))
}

/// DELETE /api/v1/posts/{id} - Delete post
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<NoticeResponse>, ApiError> {
    state.post_service.delete(id, &user.0).await?;
    Ok(Json(Notice::success("Post deleted").into()))
}

/// GET /api/v1/feed - Public posts by followed authors, newest first
pub async fn feed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResponse<PostSummary>>, ApiError> {
    let page = state.post_service.feed(&user.0, &query.into()).await?;
    Ok(Json(page.into()))
}
