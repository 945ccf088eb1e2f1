//! Post visibility
//!
//! Decides whether a viewer may read a post's content:
//!
//! - public posts are readable by everyone, anonymous viewers included;
//! - hidden posts are readable by their author;
//! - hidden posts are readable by a requester whose request was approved;
//! - everyone else gets a teaser, carrying their request status if any.

use crate::db::repositories::AccessRequestRepository;
use crate::models::{AccessRequest, AccessRequestStatus, Post, PostStatus};
use anyhow::{Context, Result};

/// Outcome of evaluating a post for one viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostVisibility {
    /// Content, tags and comments may be shown
    Full,
    /// Metadata only
    Teaser {
        request_status: Option<AccessRequestStatus>,
    },
}

impl PostVisibility {
    pub fn is_full(&self) -> bool {
        matches!(self, PostVisibility::Full)
    }
}

/// Evaluate `post` for `viewer_id`.
///
/// `request` is the viewer's access request for this post, if any. A request
/// that belongs to another post or another user is ignored.
pub fn evaluate_visibility(
    post: &Post,
    viewer_id: Option<i64>,
    request: Option<&AccessRequest>,
) -> PostVisibility {
    if post.status == PostStatus::Public {
        return PostVisibility::Full;
    }

    let viewer_id = match viewer_id {
        Some(id) => id,
        None => return PostVisibility::Teaser { request_status: None },
    };

    if viewer_id == post.author_id {
        return PostVisibility::Full;
    }

    let request = request.filter(|r| r.post_id == post.id && r.requester_id == viewer_id);
    match request {
        Some(r) if r.is_approved() => PostVisibility::Full,
        Some(r) => PostVisibility::Teaser {
            request_status: Some(r.status),
        },
        None => PostVisibility::Teaser { request_status: None },
    }
}

/// Load the viewer's access request when it matters and evaluate `post`.
pub async fn resolve_visibility(
    requests: &dyn AccessRequestRepository,
    post: &Post,
    viewer_id: Option<i64>,
) -> Result<PostVisibility> {
    let request = match viewer_id {
        Some(viewer) if post.is_hidden() && viewer != post.author_id => requests
            .get_for(post.id, viewer)
            .await
            .context("Failed to load access request")?,
        _ => None,
    };

    Ok(evaluate_visibility(post, viewer_id, request.as_ref()))
}
