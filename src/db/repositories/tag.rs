//! Tag repository
//!
//! This module provides:
//! - `TagRepository` trait for tags and their links to posts
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Tag, TagWithCount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Return the tag called `name`, creating it first if needed
    async fn get_or_create(&self, name: &str) -> Result<Tag>;

    /// Get tag by exact name
    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>>;

    /// List all tags ordered by name, with their public post counts
    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>>;

    /// Tags linked to a post, ordered by name
    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>>;

}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_BY_NAME: &str = "SELECT id, name, created_at FROM tags WHERE name = ?";

const LIST_WITH_COUNTS: &str = r#"
    SELECT t.id, t.name, t.created_at,
           COUNT(p.id) AS post_count
    FROM tags t
    LEFT JOIN post_tags pt ON pt.tag_id = t.id
    LEFT JOIN posts p ON p.id = pt.post_id AND p.status = 'public'
    GROUP BY t.id, t.name, t.created_at
    ORDER BY t.name ASC
"#;

const SELECT_BY_POST: &str = r#"
    SELECT t.id, t.name, t.created_at
    FROM tags t
    INNER JOIN post_tags pt ON pt.tag_id = t.id
    WHERE pt.post_id = ?
    ORDER BY t.name ASC
"#;

macro_rules! row_to_tag {
    ($row:expr) => {
        Tag {
            id: $row.get("id"),
            name: $row.get("name"),
            created_at: $row.get("created_at"),
        }
    };
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn get_or_create(&self, name: &str) -> Result<Tag> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query("INSERT OR IGNORE INTO tags (name, created_at) VALUES (?, ?)")
                    .bind(name)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to create tag")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query("INSERT IGNORE INTO tags (name, created_at) VALUES (?, ?)")
                    .bind(name)
                    .bind(now)
                    .execute(pool)
                    .await
                    .context("Failed to create tag")?;
            }
        }

        self.get_by_name(name)
            .await?
            .with_context(|| format!("Tag '{}' missing after insert", name))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SELECT_BY_NAME)
                .bind(name)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by name")?
                .map(|row| row_to_tag!(row)),
            Backend::Mysql(pool) => sqlx::query(SELECT_BY_NAME)
                .bind(name)
                .fetch_optional(pool)
                .await
                .context("Failed to get tag by name")?
                .map(|row| row_to_tag!(row)),
        };
        Ok(tag)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let tags: Vec<TagWithCount> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(LIST_WITH_COUNTS)
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| TagWithCount::new(row_to_tag!(row), row.get("post_count")))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(LIST_WITH_COUNTS)
                .fetch_all(pool)
                .await
                .context("Failed to list tags")?
                .iter()
                .map(|row| TagWithCount::new(row_to_tag!(row), row.get("post_count")))
                .collect(),
        };
        Ok(tags)
    }

    async fn get_by_post(&self, post_id: i64) -> Result<Vec<Tag>> {
        let tags: Vec<Tag> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(SELECT_BY_POST)
                .bind(post_id)
                .fetch_all(pool)
                .await
                .context("Failed to get tags by post")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(SELECT_BY_POST)
                .bind(post_id)
                .fetch_all(pool)
                .await
                .context("Failed to get tags by post")?
                .iter()
                .map(|row| row_to_tag!(row))
                .collect(),
        };
        Ok(tags)
    }
}

/// Replace the tag set of a post on an open SQLite connection.
///
/// Callers run this inside the transaction that writes the post.
pub(crate) async fn replace_post_tags_sqlite(
    conn: &mut SqliteConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link tag to post")?;
    }
    Ok(())
}

/// MySQL counterpart of [`replace_post_tags_sqlite`]
pub(crate) async fn replace_post_tags_mysql(
    conn: &mut MySqlConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<()> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear post tags")?;
    for tag_id in tag_ids {
        sqlx::query("INSERT IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(*tag_id)
            .execute(&mut *conn)
            .await
            .context("Failed to link tag to post")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use sqlx::SqlitePool;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_post(pool: &SqlitePool, status: &str) -> i64 {
        sqlx::query(
            "INSERT OR IGNORE INTO users (id, username, email, password_hash) VALUES (1, 'author', 'a@example.com', 'hash')",
        )
        .execute(pool)
        .await
        .expect("Failed to create user");

        sqlx::query("INSERT INTO posts (title, content, author_id, status) VALUES ('t', 'c', 1, ?)")
            .bind(status)
            .execute(pool)
            .await
            .expect("Failed to create post")
            .last_insert_rowid()
    }

    #[tokio::test]
    async fn test_get_or_create_reuses_existing() {
        let (_pool, repo) = setup_test_repo().await;

        let first = repo.get_or_create("rust").await.expect("Failed to create tag");
        let second = repo.get_or_create("rust").await.expect("Failed to get tag");

        assert!(first.id > 0);
        assert_eq!(first.id, second.id);
        assert_eq!(repo.list_with_counts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_by_name_is_exact() {
        let (_pool, repo) = setup_test_repo().await;
        repo.get_or_create("rust").await.unwrap();

        assert!(repo.get_by_name("rust").await.unwrap().is_some());
        assert!(repo.get_by_name("rus").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_post_tags_replaces_set() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();
        let post_id = create_test_post(sqlite, "public").await;
        let mut conn = sqlite.acquire().await.unwrap();

        let rust = repo.get_or_create("rust").await.unwrap();
        let web = repo.get_or_create("web").await.unwrap();
        let cli = repo.get_or_create("cli").await.unwrap();

        replace_post_tags_sqlite(&mut conn, post_id, &[rust.id, web.id]).await.unwrap();
        let names: Vec<String> = repo
            .get_by_post(post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["rust", "web"]);

        replace_post_tags_sqlite(&mut conn, post_id, &[cli.id]).await.unwrap();
        let names: Vec<String> = repo
            .get_by_post(post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["cli"]);
    }

    #[tokio::test]
    async fn test_list_with_counts_only_counts_public_posts() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();
        let public_post = create_test_post(sqlite, "public").await;
        let hidden_post = create_test_post(sqlite, "hidden_request").await;

        let rust = repo.get_or_create("rust").await.unwrap();
        repo.get_or_create("alpha").await.unwrap();
        let mut conn = sqlite.acquire().await.unwrap();
        replace_post_tags_sqlite(&mut conn, public_post, &[rust.id]).await.unwrap();
        replace_post_tags_sqlite(&mut conn, hidden_post, &[rust.id]).await.unwrap();
        drop(conn);

        let tags = repo.list_with_counts().await.unwrap();
        assert_eq!(tags.len(), 2);
        // Ordered by name
        assert_eq!(tags[0].tag.name, "alpha");
        assert_eq!(tags[0].post_count, 0);
        assert_eq!(tags[1].tag.name, "rust");
        assert_eq!(tags[1].post_count, 1);
    }
}
