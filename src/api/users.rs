//! User profile and follow endpoints
//!
//! - GET /api/v1/users/{id} - Profile with follow counts
//! - POST /api/v1/users/{id}/follow - Follow
//! - POST /api/v1/users/{id}/unfollow - Unfollow

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::api::middleware::{AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{ApiError, Notice};
use crate::models::UserProfile;
use crate::services::{FollowOutcome, UnfollowOutcome};

/// Follow/unfollow result with the target's updated profile
#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub notice: Notice,
    pub profile: UserProfile,
}

/// GET /api/v1/users/{id}
pub async fn get_profile(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.follow_service.profile(id, viewer.user()).await?;
    Ok(Json(profile))
}

/// POST /api/v1/users/{id}/follow
pub async fn follow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FollowResponse>, ApiError> {
    let (target, outcome) = state.follow_service.follow(&user.0, id).await?;

    let notice = match outcome {
        FollowOutcome::Followed => {
            Notice::success(format!("You are now following {}", target.username))
        }
        FollowOutcome::AlreadyFollowing => {
            Notice::info(format!("You already follow {}", target.username))
        }
    };
    let profile = state.follow_service.profile(target.id, Some(&user.0)).await?;

    Ok(Json(FollowResponse { notice, profile }))
}

/// POST /api/v1/users/{id}/unfollow
pub async fn unfollow(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<FollowResponse>, ApiError> {
    let (target, outcome) = state.follow_service.unfollow(&user.0, id).await?;

    let notice = match outcome {
        UnfollowOutcome::Unfollowed => {
            Notice::success(format!("You unfollowed {}", target.username))
        }
        UnfollowOutcome::NotFollowing => {
            Notice::info(format!("You were not following {}", target.username))
        }
    };
    let profile = state.follow_service.profile(target.id, Some(&user.0)).await?;

    Ok(Json(FollowResponse { notice, profile }))
}
