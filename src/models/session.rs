//! Session model

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login session. The id doubles as the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Issue a fresh session for `user_id` that lives for `ttl`.
    ///
    /// Fails when the expiry falls outside the representable time range.
    pub fn issue(user_id: i64, ttl: Duration) -> anyhow::Result<Self> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl)
            .context("Session expiry out of range")?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at,
            created_at: now,
        })
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
