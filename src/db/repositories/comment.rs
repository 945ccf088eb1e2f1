//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Comment, CommentWithAuthor};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create(&self, comment: &Comment) -> Result<Comment>;

    /// Comments on a post with author data, oldest first
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>>;
}

/// SQLx-based comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_COMMENT: &str =
    "INSERT INTO comments (post_id, author_id, content, created_at) VALUES (?, ?, ?, ?)";

const LIST_BY_POST: &str = r#"
    SELECT c.id, c.post_id, c.author_id, c.content, c.created_at,
           u.username AS author_username, u.email AS author_email
    FROM comments c
    INNER JOIN users u ON u.id = c.author_id
    WHERE c.post_id = ?
    ORDER BY c.created_at ASC, c.id ASC
"#;

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .execute(pool)
                .await
                .context("Failed to create comment")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(INSERT_COMMENT)
                .bind(comment.post_id)
                .bind(comment.author_id)
                .bind(&comment.content)
                .bind(comment.created_at)
                .execute(pool)
                .await
                .context("Failed to create comment")?
                .last_insert_id() as i64,
        };

        Ok(Comment {
            id,
            ..comment.clone()
        })
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>> {
        let comments: Vec<CommentWithAuthor> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(LIST_BY_POST)
                .bind(post_id)
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(|row| {
                    let comment = Comment {
                        id: row.get("id"),
                        post_id: row.get("post_id"),
                        author_id: row.get("author_id"),
                        content: row.get("content"),
                        created_at: row.get("created_at"),
                    };
                    let email: String = row.get("author_email");
                    CommentWithAuthor::new(comment, row.get("author_username"), &email)
                })
                .collect(),
            Backend::Mysql(pool) => sqlx::query(LIST_BY_POST)
                .bind(post_id)
                .fetch_all(pool)
                .await
                .context("Failed to list comments")?
                .iter()
                .map(|row| {
                    let comment = Comment {
                        id: row.get("id"),
                        post_id: row.get("post_id"),
                        author_id: row.get("author_id"),
                        content: row.get("content"),
                        created_at: row.get("created_at"),
                    };
                    let email: String = row.get("author_email");
                    CommentWithAuthor::new(comment, row.get("author_username"), &email)
                })
                .collect(),
        };
        Ok(comments)
    }
}
