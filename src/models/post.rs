//! Post model
//!
//! This module provides:
//! - `Post` entity and its `PostStatus`
//! - Input types for creating and updating posts
//! - Pagination types shared by every list view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Tag;

/// Maximum title length in characters
pub const MAX_TITLE_LENGTH: usize = 200;

/// Post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: i64,
    /// Post title
    pub title: String,
    /// Body text
    pub content: String,
    /// Owner of the post
    pub author_id: i64,
    /// Visibility status
    pub status: PostStatus,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post owned by `author_id`
    pub fn new(title: String, content: String, author_id: i64, status: PostStatus) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            title,
            content,
            author_id,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.status == PostStatus::HiddenRequest
    }
}

/// Post visibility status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Readable by everyone, anonymous viewers included
    #[default]
    Public,
    /// Readable by the author and by approved requesters only
    HiddenRequest,
}

impl PostStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Public => "public",
            PostStatus::HiddenRequest => "hidden_request",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(PostStatus::Public),
            "hidden_request" => Ok(PostStatus::HiddenRequest),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// Post joined with its author's name and its tags, as used by list views.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author_username: String,
    pub tags: Vec<Tag>,
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    /// Defaults to `Public`
    #[serde(default)]
    pub status: Option<PostStatus>,
    /// Tag names; created on first use
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Input for editing a post. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    /// Replaces the whole tag set when present
    pub tags: Option<Vec<String>>,
}

impl UpdatePostInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.title.is_some() || self.content.is_some() || self.status.is_some() || self.tags.is_some()
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub page_size: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

impl ListParams {
    /// Create pagination parameters, clamping out-of-range values
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            page_size: params.page_size,
        }
    }

    /// Calculate the total number of pages
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        (self.total.max(0) as u32).div_ceil(self.page_size)
    }

    /// Apply `f` to every item, keeping pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}
