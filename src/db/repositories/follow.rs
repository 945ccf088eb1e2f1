//! Follow repository
//!
//! Edges are created with an insert-or-ignore against the
//! `(follower_id, following_id)` unique key, so concurrent follow requests
//! can never produce two rows for the same pair.

use crate::db::{Backend, DynDatabasePool};
use crate::models::FollowCounts;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

/// Follow repository trait
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Create the edge. Returns false if it already existed.
    async fn create(&self, follower_id: i64, following_id: i64) -> Result<bool>;

    /// Delete the edge. Returns false if there was none.
    async fn delete(&self, follower_id: i64, following_id: i64) -> Result<bool>;

    /// Whether `follower_id` follows `following_id`
    async fn exists(&self, follower_id: i64, following_id: i64) -> Result<bool>;

    /// Follower and following totals for a user
    async fn counts(&self, user_id: i64) -> Result<FollowCounts>;
}

/// SQLx-based follow repository implementation
pub struct SqlxFollowRepository {
    pool: DynDatabasePool,
}

impl SqlxFollowRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn FollowRepository> {
        Arc::new(Self::new(pool))
    }
}

const COUNTS_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM follows WHERE following_id = ?) AS followers,
        (SELECT COUNT(*) FROM follows WHERE follower_id = ?) AS following
"#;

#[async_trait]
impl FollowRepository for SqlxFollowRepository {
    async fn create(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(
                "INSERT OR IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(following_id)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create follow")?
            .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(
                "INSERT IGNORE INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(follower_id)
            .bind(following_id)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create follow")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let sql = "DELETE FROM follows WHERE follower_id = ? AND following_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(follower_id)
                .bind(following_id)
                .execute(pool)
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(follower_id)
                .bind(following_id)
                .execute(pool)
                .await
                .context("Failed to delete follow")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn exists(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        let sql = "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND following_id = ?";
        let count: i64 = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_scalar(sql)
                .bind(follower_id)
                .bind(following_id)
                .fetch_one(pool)
                .await
                .context("Failed to check follow")?,
            Backend::Mysql(pool) => sqlx::query_scalar(sql)
                .bind(follower_id)
                .bind(following_id)
                .fetch_one(pool)
                .await
                .context("Failed to check follow")?,
        };
        Ok(count > 0)
    }

    async fn counts(&self, user_id: i64) -> Result<FollowCounts> {
        let (followers, following): (i64, i64) = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query_as(COUNTS_SQL)
                .bind(user_id)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count follows")?,
            Backend::Mysql(pool) => sqlx::query_as(COUNTS_SQL)
                .bind(user_id)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count follows")?,
        };
        Ok(FollowCounts {
            followers,
            following,
        })
    }
}
