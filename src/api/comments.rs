//! Comment API endpoints
//!
//! - GET /api/v1/posts/{id}/comments - Comments, oldest first
//! - POST /api/v1/posts/{id}/comments - Add a comment

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::responses::ApiError;
use crate::models::CommentWithAuthor;

/// Request body for creating a comment
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// GET /api/v1/posts/{id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentWithAuthor>>, ApiError> {
    let comments = state.comment_service.list(post_id, viewer.user()).await?;
    Ok(Json(comments))
}

/// POST /api/v1/posts/{id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentWithAuthor>), ApiError> {
    let comment = state
        .comment_service
        .create(post_id, &user.0, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
