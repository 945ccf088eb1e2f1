//! Tag service
//!
//! Tags are attached to posts by name. Names are trimmed, blank entries are
//! dropped and duplicates collapse to one; each remaining name is created on
//! first use and reused afterwards.

use crate::db::repositories::TagRepository;
use crate::models::{Tag, TagWithCount, MAX_TAG_LENGTH};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

/// Error types for tag service operations
#[derive(Debug, thiserror::Error)]
pub enum TagServiceError {
    /// Tag not found
    #[error("Tag not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Normalize a list of submitted tag names.
///
/// Order of first appearance is kept.
pub fn normalize_tag_names(names: &[String]) -> Result<Vec<String>, FieldErrors> {
    let mut normalized: Vec<String> = Vec::with_capacity(names.len());

    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if name.chars().count() > MAX_TAG_LENGTH {
            return Err(FieldErrors::single(
                "tags",
                format!("Tag names must be at most {} characters", MAX_TAG_LENGTH),
            ));
        }
        if !normalized.iter().any(|existing| existing == name) {
            normalized.push(name.to_string());
        }
    }

    Ok(normalized)
}

/// Tag service
pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    /// All tags ordered by name, with their public post counts
    pub async fn list(&self) -> Result<Vec<TagWithCount>, TagServiceError> {
        let tags = self
            .repo
            .list_with_counts()
            .await
            .context("Failed to list tags")?;
        Ok(tags)
    }

    /// Look a tag up by exact name
    pub async fn get_by_name(&self, name: &str) -> Result<Tag, TagServiceError> {
        self.repo
            .get_by_name(name)
            .await
            .context("Failed to get tag by name")?
            .ok_or_else(|| TagServiceError::NotFound(name.to_string()))
    }

    /// Tags of one post, ordered by name
    pub async fn tags_of(&self, post_id: i64) -> Result<Vec<Tag>, TagServiceError> {
        let tags = self
            .repo
            .get_by_post(post_id)
            .await
            .context("Failed to get tags for post")?;
        Ok(tags)
    }

    /// Look up each name, creating tags that do not exist yet.
    ///
    /// Names must already be normalized with [`normalize_tag_names`]. The
    /// result is ordered by name, like every other tag listing.
    pub async fn resolve(&self, names: &[String]) -> Result<Vec<Tag>, TagServiceError> {
        let mut tags = Vec::with_capacity(names.len());
        for name in names {
            let tag = self
                .repo
                .get_or_create(name)
                .await
                .with_context(|| format!("Failed to resolve tag '{}'", name))?;
            tags.push(tag);
        }
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}
