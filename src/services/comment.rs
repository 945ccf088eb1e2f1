//! Comment service
//!
//! Comments can only be left by viewers who may read the post's content.
//! They are immutable once created.

use crate::db::repositories::{AccessRequestRepository, CommentRepository, PostRepository};
use crate::models::{Comment, CommentWithAuthor, Post, User};
use crate::services::validation::FieldErrors;
use crate::services::visibility::resolve_visibility;
use anyhow::Context;
use std::sync::Arc;

/// Error types for comment service operations
#[derive(Debug, thiserror::Error)]
pub enum CommentServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    /// The commenter cannot read the post
    #[error("You need access to post {0} before commenting")]
    AccessDenied(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Comment service
pub struct CommentService {
    comment_repo: Arc<dyn CommentRepository>,
    post_repo: Arc<dyn PostRepository>,
    access_repo: Arc<dyn AccessRequestRepository>,
}

impl CommentService {
    pub fn new(
        comment_repo: Arc<dyn CommentRepository>,
        post_repo: Arc<dyn PostRepository>,
        access_repo: Arc<dyn AccessRequestRepository>,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            access_repo,
        }
    }

    /// Add a comment by `author` to `post_id`.
    pub async fn create(
        &self,
        post_id: i64,
        author: &User,
        content: &str,
    ) -> Result<CommentWithAuthor, CommentServiceError> {
        let post = self.post(post_id).await?;

        let visibility = resolve_visibility(self.access_repo.as_ref(), &post, Some(author.id)).await?;
        if !visibility.is_full() {
            tracing::debug!(post_id, user_id = author.id, "Comment refused: no access");
            return Err(CommentServiceError::AccessDenied(post_id));
        }

        let content = content.trim();
        if content.is_empty() {
            return Err(CommentServiceError::ValidationError(FieldErrors::single(
                "content",
                "Comment cannot be empty",
            )));
        }

        let comment = self
            .comment_repo
            .create(&Comment::new(post.id, author.id, content.to_string()))
            .await
            .context("Failed to create comment")?;

        Ok(CommentWithAuthor::new(
            comment,
            author.username.clone(),
            &author.email,
        ))
    }

    /// Comments on a post, oldest first. Hidden from teaser viewers.
    pub async fn list(
        &self,
        post_id: i64,
        viewer: Option<&User>,
    ) -> Result<Vec<CommentWithAuthor>, CommentServiceError> {
        let post = self.post(post_id).await?;
        let visibility =
            resolve_visibility(self.access_repo.as_ref(), &post, viewer.map(|v| v.id)).await?;
        if !visibility.is_full() {
            return Err(CommentServiceError::AccessDenied(post_id));
        }

        let comments = self
            .comment_repo
            .list_by_post(post.id)
            .await
            .context("Failed to list comments")?;
        Ok(comments)
    }

    async fn post(&self, post_id: i64) -> Result<Post, CommentServiceError> {
        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(CommentServiceError::PostNotFound(post_id))
    }
}
