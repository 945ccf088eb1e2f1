//! Access workflow
//!
//! Readers ask for access to hidden posts; the post's author approves or
//! rejects each request once. Status changes go through the transition
//! functions on [`AccessRequestStatus`] and are persisted with a guarded
//! update, so a request that is no longer pending is never overwritten.

use crate::db::repositories::{AccessRequestRepository, PostRepository};
use crate::models::{
    AccessDecision, AccessRequest, AccessRequestStatus, AccessRequestWithMeta, Post, TransitionError,
    User,
};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Error types for access workflow operations
#[derive(Debug, thiserror::Error)]
pub enum AccessServiceError {
    /// Post not found
    #[error("Post not found: {0}")]
    PostNotFound(i64),

    /// Access requests only apply to hidden posts
    #[error("Post {0} is public and needs no access request")]
    PostIsPublic(i64),

    /// Access request not found
    #[error("Access request not found: {0}")]
    RequestNotFound(i64),

    /// Only the post's author can respond to its requests
    #[error("Only the post's author can respond to access request {0}")]
    NotPostAuthor(i64),

    /// Illegal state transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of asking for access to a post
#[derive(Debug, Clone, PartialEq)]
pub enum RequestAccessOutcome {
    /// A new pending request was stored
    Created(AccessRequest),
    AlreadyPending,
    AlreadyApproved,
    PreviouslyRejected,
    /// The requester wrote the post
    IsAuthor,
}

impl RequestAccessOutcome {
    fn from_existing(status: AccessRequestStatus) -> Self {
        match status {
            AccessRequestStatus::Pending => RequestAccessOutcome::AlreadyPending,
            AccessRequestStatus::Approved => RequestAccessOutcome::AlreadyApproved,
            AccessRequestStatus::Rejected => RequestAccessOutcome::PreviouslyRejected,
        }
    }
}

/// Access workflow service
pub struct AccessService {
    access_repo: Arc<dyn AccessRequestRepository>,
    post_repo: Arc<dyn PostRepository>,
}

impl AccessService {
    pub fn new(
        access_repo: Arc<dyn AccessRequestRepository>,
        post_repo: Arc<dyn PostRepository>,
    ) -> Self {
        Self {
            access_repo,
            post_repo,
        }
    }

    /// `requester` asks to read `post_id`.
    ///
    /// A request is created only for a hidden post the requester did not
    /// write and has never asked for before. Every other case reports the
    /// existing state without writing anything.
    pub async fn request_access(
        &self,
        post_id: i64,
        requester: &User,
    ) -> Result<RequestAccessOutcome, AccessServiceError> {
        let post = self.post(post_id).await?;

        if !post.is_hidden() {
            return Err(AccessServiceError::PostIsPublic(post_id));
        }
        if requester.is_author_of(post.author_id) {
            return Ok(RequestAccessOutcome::IsAuthor);
        }

        if let Some(existing) = self.existing(post_id, requester.id).await? {
            return Ok(RequestAccessOutcome::from_existing(existing.status));
        }

        let created = self
            .access_repo
            .create_if_absent(post_id, requester.id)
            .await
            .context("Failed to create access request")?;

        let request = self
            .existing(post_id, requester.id)
            .await?
            .context("Access request missing after insert")?;

        if created {
            tracing::info!(
                request_id = request.id,
                post_id,
                requester_id = requester.id,
                "Access requested"
            );
            Ok(RequestAccessOutcome::Created(request))
        } else {
            // Lost a race against a concurrent request for the same pair
            Ok(RequestAccessOutcome::from_existing(request.status))
        }
    }

    /// Approve a pending request on one of `author`'s posts
    pub async fn approve(
        &self,
        request_id: i64,
        author: &User,
    ) -> Result<AccessRequest, AccessServiceError> {
        self.respond(request_id, author, AccessDecision::Approve).await
    }

    /// Reject a pending request on one of `author`'s posts
    pub async fn reject(
        &self,
        request_id: i64,
        author: &User,
    ) -> Result<AccessRequest, AccessServiceError> {
        self.respond(request_id, author, AccessDecision::Reject).await
    }

    /// Apply `decision` to a request.
    ///
    /// # Errors
    ///
    /// - `RequestNotFound` if the request does not exist
    /// - `NotPostAuthor` if `author` did not write the post
    /// - `Transition` if the request is no longer pending
    pub async fn respond(
        &self,
        request_id: i64,
        author: &User,
        decision: AccessDecision,
    ) -> Result<AccessRequest, AccessServiceError> {
        let request = self
            .access_repo
            .get_by_id(request_id)
            .await
            .context("Failed to get access request")?
            .ok_or(AccessServiceError::RequestNotFound(request_id))?;

        let post = self
            .post_repo
            .get_by_id(request.post_id)
            .await
            .context("Failed to get post")?
            .ok_or(AccessServiceError::RequestNotFound(request_id))?;

        if !author.is_author_of(post.author_id) {
            tracing::warn!(request_id, user_id = author.id, "Refused response by non-author");
            return Err(AccessServiceError::NotPostAuthor(request_id));
        }

        let next = request.status.apply(decision).map_err(|e| {
            tracing::debug!(request_id, error = %e, "Refused transition");
            e
        })?;

        let now = Utc::now();
        let resolved = self
            .access_repo
            .resolve(request_id, next, now)
            .await
            .context("Failed to update access request")?;

        if !resolved {
            // Another response landed between the read and the update
            let current = self
                .access_repo
                .get_by_id(request_id)
                .await
                .context("Failed to reload access request")?
                .map(|r| r.status)
                .unwrap_or(next);
            return Err(AccessServiceError::Transition(TransitionError {
                current,
                attempted: decision,
            }));
        }

        tracing::info!(
            request_id,
            post_id = post.id,
            status = %next,
            "Access request resolved"
        );

        Ok(AccessRequest {
            status: next,
            response_at: Some(now),
            ..request
        })
    }

    /// Pending requests for posts written by `author`, newest first
    pub async fn pending_for_author(
        &self,
        author: &User,
    ) -> Result<Vec<AccessRequestWithMeta>, AccessServiceError> {
        let requests = self
            .access_repo
            .list_pending_for_author(author.id)
            .await
            .context("Failed to list pending access requests")?;
        Ok(requests)
    }

    /// Every request, optionally filtered by status, newest first
    pub async fn list_all(
        &self,
        status: Option<AccessRequestStatus>,
    ) -> Result<Vec<AccessRequestWithMeta>, AccessServiceError> {
        let requests = self
            .access_repo
            .list_all(status)
            .await
            .context("Failed to list access requests")?;
        Ok(requests)
    }

    async fn post(&self, post_id: i64) -> Result<Post, AccessServiceError> {
        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(AccessServiceError::PostNotFound(post_id))
    }

    async fn existing(
        &self,
        post_id: i64,
        requester_id: i64,
    ) -> Result<Option<AccessRequest>, AccessServiceError> {
        let request = self
            .access_repo
            .get_for(post_id, requester_id)
            .await
            .context("Failed to get access request")?;
        Ok(request)
    }
}
