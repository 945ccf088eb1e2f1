//! Follow service
//!
//! Follow and unfollow are idempotent: repeating either one reports what
//! already was the case instead of failing. Users cannot follow themselves.

use crate::db::repositories::{FollowRepository, UserRepository};
use crate::models::{User, UserProfile};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use std::sync::Arc;

/// Error types for follow service operations
#[derive(Debug, thiserror::Error)]
pub enum FollowServiceError {
    /// Target user not found
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Result of a follow attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
}

/// Result of an unfollow attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
}

/// Follow service
pub struct FollowService {
    follow_repo: Arc<dyn FollowRepository>,
    user_repo: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(follow_repo: Arc<dyn FollowRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            follow_repo,
            user_repo,
        }
    }

    /// `follower` starts following `target_id`. Returns the target too.
    pub async fn follow(
        &self,
        follower: &User,
        target_id: i64,
    ) -> Result<(User, FollowOutcome), FollowServiceError> {
        let target = self.target(target_id).await?;
        if target.id == follower.id {
            return Err(self_follow_error("You cannot follow yourself"));
        }

        let created = self
            .follow_repo
            .create(follower.id, target.id)
            .await
            .context("Failed to create follow")?;

        let outcome = if created {
            tracing::info!(follower_id = follower.id, following_id = target.id, "Follow created");
            FollowOutcome::Followed
        } else {
            FollowOutcome::AlreadyFollowing
        };
        Ok((target, outcome))
    }

    /// `follower` stops following `target_id`. Returns the target too.
    pub async fn unfollow(
        &self,
        follower: &User,
        target_id: i64,
    ) -> Result<(User, UnfollowOutcome), FollowServiceError> {
        let target = self.target(target_id).await?;
        if target.id == follower.id {
            return Err(self_follow_error("You cannot unfollow yourself"));
        }

        let deleted = self
            .follow_repo
            .delete(follower.id, target.id)
            .await
            .context("Failed to delete follow")?;

        let outcome = if deleted {
            tracing::info!(follower_id = follower.id, following_id = target.id, "Follow removed");
            UnfollowOutcome::Unfollowed
        } else {
            UnfollowOutcome::NotFollowing
        };
        Ok((target, outcome))
    }

    /// Public profile of `user_id` with follow counts.
    ///
    /// `is_following` is false for anonymous viewers and for the user
    /// looking at their own profile.
    pub async fn profile(
        &self,
        user_id: i64,
        viewer: Option<&User>,
    ) -> Result<UserProfile, FollowServiceError> {
        let user = self.target(user_id).await?;
        let counts = self
            .follow_repo
            .counts(user.id)
            .await
            .context("Failed to count follows")?;

        let is_following = match viewer {
            Some(viewer) if viewer.id != user.id => self
                .follow_repo
                .exists(viewer.id, user.id)
                .await
                .context("Failed to check follow")?,
            _ => false,
        };

        Ok(UserProfile {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
            followers_count: counts.followers,
            following_count: counts.following,
            is_following,
        })
    }

    async fn target(&self, user_id: i64) -> Result<User, FollowServiceError> {
        self.user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(FollowServiceError::UserNotFound(user_id))
    }
}

fn self_follow_error(message: &str) -> FollowServiceError {
    FollowServiceError::ValidationError(FieldErrors::single("user_id", message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxFollowRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::UserRole;

    async fn setup() -> (DynDatabasePool, FollowService, User, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let alice = user_repo
            .create(&User::new("alice".into(), "alice@example.com".into(), "h".into(), UserRole::Admin))
            .await
            .unwrap();
        let bob = user_repo
            .create(&User::new("bob".into(), "bob@example.com".into(), "h".into(), UserRole::Author))
            .await
            .unwrap();

        let service = FollowService::new(SqlxFollowRepository::boxed(pool.clone()), user_repo);
        (pool, service, alice, bob)
    }

    async fn edge_count(pool: &DynDatabasePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_follow_is_idempotent() {
        let (pool, service, alice, bob) = setup().await;

        let (_, first) = service.follow(&bob, alice.id).await.unwrap();
        let (_, second) = service.follow(&bob, alice.id).await.unwrap();

        assert_eq!(first, FollowOutcome::Followed);
        assert_eq!(second, FollowOutcome::AlreadyFollowing);
        assert_eq!(edge_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_self_follow_creates_no_edge() {
        let (pool, service, alice, _bob) = setup().await;

        let follow = service.follow(&alice, alice.id).await;
        assert!(matches!(follow, Err(FollowServiceError::ValidationError(_))));

        let unfollow = service.unfollow(&alice, alice.id).await;
        assert!(matches!(unfollow, Err(FollowServiceError::ValidationError(_))));

        assert_eq!(edge_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (pool, service, alice, bob) = setup().await;

        let (_, outcome) = service.unfollow(&bob, alice.id).await.unwrap();
        assert_eq!(outcome, UnfollowOutcome::NotFollowing);

        service.follow(&bob, alice.id).await.unwrap();
        let (target, outcome) = service.unfollow(&bob, alice.id).await.unwrap();
        assert_eq!(outcome, UnfollowOutcome::Unfollowed);
        assert_eq!(target.username, "alice");
        assert_eq!(edge_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (_pool, service, alice, _bob) = setup().await;
        assert!(matches!(
            service.follow(&alice, 999).await,
            Err(FollowServiceError::UserNotFound(999))
        ));
        assert!(matches!(
            service.profile(999, None).await,
            Err(FollowServiceError::UserNotFound(999))
        ));
    }

    #[tokio::test]
    async fn test_profile_counts_and_following_flag() {
        let (_pool, service, alice, bob) = setup().await;
        service.follow(&bob, alice.id).await.unwrap();

        let seen_by_bob = service.profile(alice.id, Some(&bob)).await.unwrap();
        assert_eq!(seen_by_bob.followers_count, 1);
        assert_eq!(seen_by_bob.following_count, 0);
        assert!(seen_by_bob.is_following);

        let seen_by_self = service.profile(alice.id, Some(&alice)).await.unwrap();
        assert!(!seen_by_self.is_following);

        let anonymous = service.profile(bob.id, None).await.unwrap();
        assert_eq!(anonymous.following_count, 1);
        assert!(!anonymous.is_following);
    }
}
