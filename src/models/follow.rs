//! Follow graph model
//!
//! Edges are directed: a follower subscribes to another user's public posts.
//! The edge itself carries nothing beyond the pair and its creation time, so
//! only the aggregate counts are modelled here.

use serde::Serialize;

/// Follower/following totals for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: i64,
    pub following: i64,
}
