//! Access request repository
//!
//! Storage for the access workflow. Both writes are single atomic
//! statements guarded at the storage layer:
//! - creation is an insert-or-ignore against the `(post_id, requester_id)`
//!   unique key
//! - a status change only applies while the row is still `pending`

use crate::db::{Backend, DynDatabasePool};
use crate::models::{AccessRequest, AccessRequestStatus, AccessRequestWithMeta};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Access request repository trait
#[async_trait]
pub trait AccessRequestRepository: Send + Sync {
    /// Insert a pending request unless one exists for the pair.
    /// Returns true if a row was created.
    async fn create_if_absent(&self, post_id: i64, requester_id: i64) -> Result<bool>;

    /// Get request by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<AccessRequest>>;

    /// Get the request `requester_id` made for `post_id`
    async fn get_for(&self, post_id: i64, requester_id: i64) -> Result<Option<AccessRequest>>;

    /// Move a pending request to `status`, stamping `response_at`.
    /// Returns false if the request was no longer pending.
    async fn resolve(
        &self,
        id: i64,
        status: AccessRequestStatus,
        response_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Pending requests for posts written by `author_id`, newest first
    async fn list_pending_for_author(&self, author_id: i64) -> Result<Vec<AccessRequestWithMeta>>;

    /// Every request, optionally filtered by status, newest first
    async fn list_all(
        &self,
        status: Option<AccessRequestStatus>,
    ) -> Result<Vec<AccessRequestWithMeta>>;
}

/// SQLx-based access request repository implementation
pub struct SqlxAccessRequestRepository {
    pool: DynDatabasePool,
}

impl SqlxAccessRequestRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AccessRequestRepository> {
        Arc::new(Self::new(pool))
    }
}

const REQUEST_COLUMNS: &str = "ar.id, ar.post_id, ar.requester_id, ar.status, ar.requested_at, ar.response_at";

const META_JOIN: &str = r#"
    FROM access_requests ar
    INNER JOIN posts p ON p.id = ar.post_id
    INNER JOIN users u ON u.id = ar.requester_id
"#;

const RESOLVE_SQL: &str =
    "UPDATE access_requests SET status = ?, response_at = ? WHERE id = ? AND status = 'pending'";

/// Query listing requests with their post and requester; `filter` is an
/// optional WHERE clause taking at most one bind.
fn meta_sql(filter: &str) -> String {
    format!(
        "SELECT {}, p.title AS post_title, p.author_id AS post_author_id, \
         u.username AS requester_username {} {} \
         ORDER BY ar.requested_at DESC, ar.id DESC",
        REQUEST_COLUMNS, META_JOIN, filter
    )
}

#[async_trait]
impl AccessRequestRepository for SqlxAccessRequestRepository {
    async fn create_if_absent(&self, post_id: i64, requester_id: i64) -> Result<bool> {
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(
                r#"
                INSERT OR IGNORE INTO access_requests (post_id, requester_id, status, requested_at)
                VALUES (?, ?, 'pending', ?)
                "#,
            )
            .bind(post_id)
            .bind(requester_id)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create access request")?
            .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(
                r#"
                INSERT IGNORE INTO access_requests (post_id, requester_id, status, requested_at)
                VALUES (?, ?, 'pending', ?)
                "#,
            )
            .bind(post_id)
            .bind(requester_id)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create access request")?
            .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<AccessRequest>> {
        let sql = format!("SELECT {} FROM access_requests ar WHERE ar.id = ?", REQUEST_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get access request")?
                .map(|row| row_to_request_sqlite(&row))
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get access request")?
                .map(|row| row_to_request_mysql(&row))
                .transpose(),
        }
    }

    async fn get_for(&self, post_id: i64, requester_id: i64) -> Result<Option<AccessRequest>> {
        let sql = format!(
            "SELECT {} FROM access_requests ar WHERE ar.post_id = ? AND ar.requester_id = ?",
            REQUEST_COLUMNS
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(post_id)
                .bind(requester_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get access request for post")?
                .map(|row| row_to_request_sqlite(&row))
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(post_id)
                .bind(requester_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get access request for post")?
                .map(|row| row_to_request_mysql(&row))
                .transpose(),
        }
    }

    async fn resolve(
        &self,
        id: i64,
        status: AccessRequestStatus,
        response_at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(RESOLVE_SQL)
                .bind(status.as_str())
                .bind(response_at)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update access request")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(RESOLVE_SQL)
                .bind(status.as_str())
                .bind(response_at)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update access request")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_pending_for_author(&self, author_id: i64) -> Result<Vec<AccessRequestWithMeta>> {
        let sql = meta_sql("WHERE p.author_id = ? AND ar.status = 'pending'");
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_meta_sqlite(pool, &sql, Some(author_id.into())).await,
            Backend::Mysql(pool) => list_meta_mysql(pool, &sql, Some(author_id.into())).await,
        }
    }

    async fn list_all(
        &self,
        status: Option<AccessRequestStatus>,
    ) -> Result<Vec<AccessRequestWithMeta>> {
        let (sql, bind) = match status {
            Some(status) => (
                meta_sql("WHERE ar.status = ?"),
                Some(BindValue::Text(status.as_str())),
            ),
            None => (meta_sql(""), None),
        };
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_meta_sqlite(pool, &sql, bind).await,
            Backend::Mysql(pool) => list_meta_mysql(pool, &sql, bind).await,
        }
    }
}

/// The single value bound by a listing filter
enum BindValue {
    Id(i64),
    Text(&'static str),
}

impl From<i64> for BindValue {
    fn from(id: i64) -> Self {
        BindValue::Id(id)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_meta_sqlite(
    pool: &SqlitePool,
    sql: &str,
    bind: Option<BindValue>,
) -> Result<Vec<AccessRequestWithMeta>> {
    let query = match bind {
        Some(BindValue::Id(id)) => sqlx::query(sql).bind(id),
        Some(BindValue::Text(text)) => sqlx::query(sql).bind(text),
        None => sqlx::query(sql),
    };

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list access requests")?;

    rows.iter()
        .map(|row| -> Result<AccessRequestWithMeta> {
            Ok(AccessRequestWithMeta {
                request: row_to_request_sqlite(row)?,
                post_title: row.get("post_title"),
                post_author_id: row.get("post_author_id"),
                requester_username: row.get("requester_username"),
            })
        })
        .collect()
}

fn row_to_request_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<AccessRequest> {
    let status: String = row.get("status");
    Ok(AccessRequest {
        id: row.get("id"),
        post_id: row.get("post_id"),
        requester_id: row.get("requester_id"),
        status: AccessRequestStatus::from_str(&status)?,
        requested_at: row.get("requested_at"),
        response_at: row.get("response_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_meta_mysql(
    pool: &MySqlPool,
    sql: &str,
    bind: Option<BindValue>,
) -> Result<Vec<AccessRequestWithMeta>> {
    let query = match bind {
        Some(BindValue::Id(id)) => sqlx::query(sql).bind(id),
        Some(BindValue::Text(text)) => sqlx::query(sql).bind(text),
        None => sqlx::query(sql),
    };

    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to list access requests")?;

    rows.iter()
        .map(|row| -> Result<AccessRequestWithMeta> {
            Ok(AccessRequestWithMeta {
                request: row_to_request_mysql(row)?,
                post_title: row.get("post_title"),
                post_author_id: row.get("post_author_id"),
                requester_username: row.get("requester_username"),
            })
        })
        .collect()
}

fn row_to_request_mysql(row: &sqlx::mysql::MySqlRow) -> Result<AccessRequest> {
    let status: String = row.get("status");
    Ok(AccessRequest {
        id: row.get("id"),
        post_id: row.get("post_id"),
        requester_id: row.get("requester_id"),
        status: AccessRequestStatus::from_str(&status)?,
        requested_at: row.get("requested_at"),
        response_at: row.get("response_at"),
    })
}
