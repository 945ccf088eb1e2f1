//! Post repository
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL
//!
//! Every list query returns public posts only, newest first. Ties on
//! `created_at` are broken by id so pagination is stable.

use crate::db::repositories::tag::{replace_post_tags_mysql, replace_post_tags_sqlite};
use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, Post, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlConnection, MySqlPool, Row, SqliteConnection, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post linked to `tag_ids`, in one transaction
    async fn create(&self, post: &Post, tag_ids: &[i64]) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// Persist title, content, status and updated_at of an existing post.
    ///
    /// When `tag_ids` is given the tag set is replaced in the same
    /// transaction.
    async fn update(&self, post: &Post, tag_ids: Option<&[i64]>) -> Result<Post>;

    /// Delete a post. Returns false if it did not exist.
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Public posts, newest first
    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Post>, i64)>;

    /// Public posts carrying the tag, newest first
    async fn list_public_by_tag(&self, tag_id: i64, params: &ListParams)
        -> Result<(Vec<Post>, i64)>;

    /// Public posts whose author `follower_id` follows, newest first
    async fn list_feed(&self, follower_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

/// A filtered list query: the WHERE clause and its single optional bind
struct ListFilter {
    from_where: &'static str,
    bind: Option<i64>,
}

const PUBLIC_POSTS: ListFilter = ListFilter {
    from_where: "FROM posts p WHERE p.status = 'public'",
    bind: None,
};

fn by_tag(tag_id: i64) -> ListFilter {
    ListFilter {
        from_where: "FROM posts p INNER JOIN post_tags pt ON pt.post_id = p.id \
                     WHERE p.status = 'public' AND pt.tag_id = ?",
        bind: Some(tag_id),
    }
}

fn feed_of(follower_id: i64) -> ListFilter {
    ListFilter {
        from_where: "FROM posts p WHERE p.status = 'public' AND p.author_id IN \
                     (SELECT f.following_id FROM follows f WHERE f.follower_id = ?)",
        bind: Some(follower_id),
    }
}

const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.author_id, p.status, p.created_at, p.updated_at";

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post, tag_ids: &[i64]) -> Result<Post> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let created = create_post_sqlite(&mut tx, post).await?;
                replace_post_tags_sqlite(&mut tx, created.id, tag_ids).await?;
                tx.commit().await.context("Failed to commit post")?;
                Ok(created)
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                let created = create_post_mysql(&mut tx, post).await?;
                replace_post_tags_mysql(&mut tx, created.id, tag_ids).await?;
                tx.commit().await.context("Failed to commit post")?;
                Ok(created)
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts p WHERE p.id = ?", POST_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get post by ID")?
                .map(|row| row_to_post_sqlite(&row))
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get post by ID")?
                .map(|row| row_to_post_mysql(&row))
                .transpose(),
        }
    }

    async fn update(&self, post: &Post, tag_ids: Option<&[i64]>) -> Result<Post> {
        let sql = "UPDATE posts SET title = ?, content = ?, status = ?, updated_at = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(post.status.as_str())
                    .bind(post.updated_at)
                    .bind(post.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update post")?;
                if let Some(tag_ids) = tag_ids {
                    replace_post_tags_sqlite(&mut tx, post.id, tag_ids).await?;
                }
                tx.commit().await.context("Failed to commit post update")?;
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await.context("Failed to begin transaction")?;
                sqlx::query(sql)
                    .bind(&post.title)
                    .bind(&post.content)
                    .bind(post.status.as_str())
                    .bind(post.updated_at)
                    .bind(post.id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update post")?;
                if let Some(tag_ids) = tag_ids {
                    replace_post_tags_mysql(&mut tx, post.id, tag_ids).await?;
                }
                tx.commit().await.context("Failed to commit post update")?;
            }
        }
        Ok(post.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM posts WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_public(&self, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        self.list(PUBLIC_POSTS, params).await
    }

    async fn list_public_by_tag(
        &self,
        tag_id: i64,
        params: &ListParams,
    ) -> Result<(Vec<Post>, i64)> {
        self.list(by_tag(tag_id), params).await
    }

    async fn list_feed(&self, follower_id: i64, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        self.list(feed_of(follower_id), params).await
    }
}

impl SqlxPostRepository {
    async fn list(&self, filter: ListFilter, params: &ListParams) -> Result<(Vec<Post>, i64)> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_posts_sqlite(pool, &filter, params).await,
            Backend::Mysql(pool) => list_posts_mysql(pool, &filter, params).await,
        }
    }
}

fn list_sql(filter: &ListFilter) -> (String, String) {
    let count_sql = format!("SELECT COUNT(*) {}", filter.from_where);
    let select_sql = format!(
        "SELECT {} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_COLUMNS, filter.from_where
    );
    (count_sql, select_sql)
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(conn: &mut SqliteConnection, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, author_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.author_id)
    .bind(post.status.as_str())
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(conn)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &ListFilter,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let (count_sql, select_sql) = list_sql(filter);

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut select_query = sqlx::query(&select_sql);
    if let Some(value) = filter.bind {
        count_query = count_query.bind(value);
        select_query = select_query.bind(value);
    }

    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let rows = select_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let posts = rows
        .iter()
        .map(row_to_post_sqlite)
        .collect::<Result<Vec<_>>>()?;

    Ok((posts, total))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        status: PostStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(conn: &mut MySqlConnection, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (title, content, author_id, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(post.author_id)
    .bind(post.status.as_str())
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(conn)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: &ListFilter,
    params: &ListParams,
) -> Result<(Vec<Post>, i64)> {
    let (count_sql, select_sql) = list_sql(filter);

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut select_query = sqlx::query(&select_sql);
    if let Some(value) = filter.bind {
        count_query = count_query.bind(value);
        select_query = select_query.bind(value);
    }

    let total = count_query
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;

    let rows = select_query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list posts")?;

    let posts = rows
        .iter()
        .map(row_to_post_mysql)
        .collect::<Result<Vec<_>>>()?;

    Ok((posts, total))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        author_id: row.get("author_id"),
        status: PostStatus::from_str(&status)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxPostRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxPostRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, username: &str) -> i64 {
        sqlx::query("INSERT INTO users (username, email, password_hash) VALUES (?, ?, 'hash')")
            .bind(username)
            .bind(format!("{}@example.com", username))
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test user")
            .last_insert_rowid()
    }

    /// Post whose creation time is `minutes_ago` in the past
    fn post_at(author_id: i64, title: &str, status: PostStatus, minutes_ago: i64) -> Post {
        let mut post = Post::new(title.to_string(), "Body".to_string(), author_id, status);
        post.created_at = Utc::now() - Duration::minutes(minutes_ago);
        post.updated_at = post.created_at;
        post
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;

        let created = repo
            .create(&post_at(author, "Hello", PostStatus::HiddenRequest, 0), &[])
            .await
            .expect("Failed to create post");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get post")
            .expect("Post not found");
        assert_eq!(found.title, "Hello");
        assert_eq!(found.author_id, author);
        assert_eq!(found.status, PostStatus::HiddenRequest);

        assert!(repo.get_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_post() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let mut post = repo
            .create(&post_at(author, "Old", PostStatus::Public, 5), &[])
            .await
            .unwrap();

        post.title = "New".to_string();
        post.status = PostStatus::HiddenRequest;
        post.updated_at = Utc::now();
        repo.update(&post, None).await.expect("Failed to update post");

        let found = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(found.title, "New");
        assert_eq!(found.status, PostStatus::HiddenRequest);
        assert!(found.updated_at > found.created_at);
    }

    async fn create_test_tag(pool: &DynDatabasePool, name: &str) -> i64 {
        sqlx::query("INSERT INTO tags (name) VALUES (?)")
            .bind(name)
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("Failed to create test tag")
            .last_insert_rowid()
    }

    async fn count(pool: &DynDatabasePool, sql: &str) -> i64 {
        sqlx::query_scalar(sql)
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_links_tags() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let rust = create_test_tag(&pool, "rust").await;

        let created = repo
            .create(&post_at(author, "Tagged", PostStatus::Public, 0), &[rust])
            .await
            .unwrap();

        let (posts, total) = repo
            .list_public_by_tag(rust, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].id, created.id);
    }

    #[tokio::test]
    async fn test_create_is_rolled_back_when_tag_link_fails() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let rust = create_test_tag(&pool, "rust").await;

        let result = repo
            .create(&post_at(author, "Broken", PostStatus::Public, 0), &[rust, rust + 999])
            .await;

        assert!(result.is_err());
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM posts").await, 0);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM post_tags").await, 0);
    }

    #[tokio::test]
    async fn test_update_is_rolled_back_when_tag_link_fails() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let rust = create_test_tag(&pool, "rust").await;
        let mut post = repo
            .create(&post_at(author, "Old", PostStatus::Public, 5), &[rust])
            .await
            .unwrap();

        post.title = "New".to_string();
        post.updated_at = Utc::now();
        let result = repo.update(&post, Some(&[rust + 999][..])).await;

        assert!(result.is_err());
        let found = repo.get_by_id(post.id).await.unwrap().unwrap();
        assert_eq!(found.title, "Old");
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM post_tags").await, 1);
    }

    #[tokio::test]
    async fn test_update_replaces_tags() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let rust = create_test_tag(&pool, "rust").await;
        let web = create_test_tag(&pool, "web").await;
        let post = repo
            .create(&post_at(author, "Post", PostStatus::Public, 5), &[rust])
            .await
            .unwrap();

        repo.update(&post, Some(&[web][..])).await.unwrap();

        let (_, by_rust) = repo.list_public_by_tag(rust, &ListParams::default()).await.unwrap();
        let (_, by_web) = repo.list_public_by_tag(web, &ListParams::default()).await.unwrap();
        assert_eq!(by_rust, 0);
        assert_eq!(by_web, 1);
    }

    #[tokio::test]
    async fn test_delete_post() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;
        let post = repo
            .create(&post_at(author, "Bye", PostStatus::Public, 0), &[])
            .await
            .unwrap();

        assert!(repo.delete(post.id).await.unwrap());
        assert!(!repo.delete(post.id).await.unwrap());
        assert!(repo.get_by_id(post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_public_excludes_hidden_and_orders_newest_first() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;

        repo.create(&post_at(author, "oldest", PostStatus::Public, 30), &[]).await.unwrap();
        repo.create(&post_at(author, "hidden", PostStatus::HiddenRequest, 20), &[]).await.unwrap();
        repo.create(&post_at(author, "newest", PostStatus::Public, 10), &[]).await.unwrap();

        let (posts, total) = repo.list_public(&ListParams::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(titles(&posts), vec!["newest", "oldest"]);
    }

    #[tokio::test]
    async fn test_list_public_paginates() {
        let (pool, repo) = setup_test_repo().await;
        let author = create_test_user(&pool, "alice").await;

        for i in 0..5 {
            repo.create(&post_at(author, &format!("post{}", i), PostStatus::Public, 10 - i), &[])
                .await
                .unwrap();
        }

        let (page2, total) = repo.list_public(&ListParams::new(2, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(titles(&page2), vec!["post2", "post1"]);

        let (page3, _) = repo.list_public(&ListParams::new(3, 2)).await.unwrap();
        assert_eq!(titles(&page3), vec!["post0"]);
    }

    #[tokio::test]
    async fn test_list_public_by_tag() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();
        let author = create_test_user(&pool, "alice").await;

        let tagged = repo.create(&post_at(author, "tagged", PostStatus::Public, 3), &[]).await.unwrap();
        let hidden = repo
            .create(&post_at(author, "hidden", PostStatus::HiddenRequest, 2), &[])
            .await
            .unwrap();
        repo.create(&post_at(author, "untagged", PostStatus::Public, 1), &[]).await.unwrap();

        let tag_id = sqlx::query("INSERT INTO tags (name) VALUES ('rust')")
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();
        for post_id in [tagged.id, hidden.id] {
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(tag_id)
                .execute(sqlite)
                .await
                .unwrap();
        }

        let (posts, total) = repo
            .list_public_by_tag(tag_id, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(titles(&posts), vec!["tagged"]);
    }

    #[tokio::test]
    async fn test_list_feed_only_followed_public_posts() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.as_sqlite().unwrap();
        let reader = create_test_user(&pool, "reader").await;
        let followed = create_test_user(&pool, "followed").await;
        let stranger = create_test_user(&pool, "stranger").await;

        sqlx::query("INSERT INTO follows (follower_id, following_id) VALUES (?, ?)")
            .bind(reader)
            .bind(followed)
            .execute(sqlite)
            .await
            .unwrap();

        repo.create(&post_at(followed, "visible", PostStatus::Public, 3), &[]).await.unwrap();
        repo.create(&post_at(followed, "hidden", PostStatus::HiddenRequest, 2), &[]).await.unwrap();
        repo.create(&post_at(stranger, "stranger", PostStatus::Public, 1), &[]).await.unwrap();
        repo.create(&post_at(reader, "own", PostStatus::Public, 0), &[]).await.unwrap();

        let (posts, total) = repo.list_feed(reader, &ListParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(titles(&posts), vec!["visible"]);

        let (empty, total) = repo.list_feed(stranger, &ListParams::default()).await.unwrap();
        assert_eq!(total, 0);
        assert!(empty.is_empty());
    }
}
