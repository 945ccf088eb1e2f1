//! Access request model
//!
//! An access request tracks one user's request to read one hidden post.
//! Its status moves through a small state machine:
//!
//! ```text
//! pending ──approve──▶ approved
//!    │
//!    └────reject────▶ rejected
//! ```
//!
//! `approved` and `rejected` are terminal. There is no path back to
//! `pending`, so a rejected requester cannot ask again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Status of an access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Transition the author can apply to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessDecision {
    Approve,
    Reject,
}

impl AccessDecision {
    /// Status the request ends up in after this decision
    pub fn target(&self) -> AccessRequestStatus {
        match self {
            AccessDecision::Approve => AccessRequestStatus::Approved,
            AccessDecision::Reject => AccessRequestStatus::Rejected,
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessDecision::Approve => f.write_str("approve"),
            AccessDecision::Reject => f.write_str("reject"),
        }
    }
}

/// Illegal state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {attempted} an access request that is already {current}")]
pub struct TransitionError {
    pub current: AccessRequestStatus,
    pub attempted: AccessDecision,
}

impl AccessRequestStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessRequestStatus::Pending => "pending",
            AccessRequestStatus::Approved => "approved",
            AccessRequestStatus::Rejected => "rejected",
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AccessRequestStatus::Pending)
    }

    /// `pending → approved`
    pub fn approve(self) -> Result<Self, TransitionError> {
        match self {
            AccessRequestStatus::Pending => Ok(AccessRequestStatus::Approved),
            current => Err(TransitionError {
                current,
                attempted: AccessDecision::Approve,
            }),
        }
    }

    /// `pending → rejected`
    pub fn reject(self) -> Result<Self, TransitionError> {
        match self {
            AccessRequestStatus::Pending => Ok(AccessRequestStatus::Rejected),
            current => Err(TransitionError {
                current,
                attempted: AccessDecision::Reject,
            }),
        }
    }

    /// Apply `decision` through the matching transition function
    pub fn apply(self, decision: AccessDecision) -> Result<Self, TransitionError> {
        match decision {
            AccessDecision::Approve => self.approve(),
            AccessDecision::Reject => self.reject(),
        }
    }
}

impl fmt::Display for AccessRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessRequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AccessRequestStatus::Pending),
            "approved" => Ok(AccessRequestStatus::Approved),
            "rejected" => Ok(AccessRequestStatus::Rejected),
            _ => Err(anyhow::anyhow!("Invalid access request status: {}", s)),
        }
    }
}

/// Access request entity. Unique per (post, requester).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub id: i64,
    pub post_id: i64,
    pub requester_id: i64,
    pub status: AccessRequestStatus,
    pub requested_at: DateTime<Utc>,
    /// Set when the author approves or rejects
    pub response_at: Option<DateTime<Utc>>,
}

impl AccessRequest {
    /// A fresh pending request
    pub fn new(post_id: i64, requester_id: i64) -> Self {
        Self {
            id: 0,
            post_id,
            requester_id,
            status: AccessRequestStatus::Pending,
            requested_at: Utc::now(),
            response_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == AccessRequestStatus::Approved
    }
}

/// Access request with the post title and requester name for listings
#[derive(Debug, Clone, Serialize)]
pub struct AccessRequestWithMeta {
    #[serde(flatten)]
    pub request: AccessRequest,
    pub post_title: String,
    pub post_author_id: i64,
    pub requester_username: String,
}
