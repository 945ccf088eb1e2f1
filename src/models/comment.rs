//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comment entity. Comments are immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(post_id: i64, author_id: i64, content: String) -> Self {
        Self {
            id: 0,
            post_id,
            author_id,
            content,
            created_at: Utc::now(),
        }
    }
}

/// Comment with its author's display data
#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub avatar_url: String,
}

impl CommentWithAuthor {
    /// Build the display form of `comment` from its author's name and email
    pub fn new(comment: Comment, author_username: String, author_email: &str) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username,
            content: comment.content,
            created_at: comment.created_at,
            avatar_url: Self::gravatar_url(author_email),
        }
    }

    /// Generate Gravatar URL from email
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }
}
