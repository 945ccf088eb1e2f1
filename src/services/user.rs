//! User service
//!
//! Registration (the first account becomes admin), login, logout and
//! session validation. Sessions are opaque uuid tokens stored in the
//! `sessions` table; an expired session is deleted the first time it is
//! presented.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use crate::services::validation::FieldErrors;
use anyhow::Context;
use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;

/// Default session expiration time in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

/// Maximum username length
pub const MAX_USERNAME_LENGTH: usize = 50;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(FieldErrors),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    /// Username or email
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Register a new user.
    ///
    /// The username and email are trimmed before storage. The first user in
    /// the system is assigned [`UserRole::Admin`].
    ///
    /// # Errors
    ///
    /// - `ValidationError` for a blank or overlong username, a malformed
    ///   email, or a short password
    /// - `UserExists` if the username or email is already taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let input = RegisterInput {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password: input.password,
        };
        validate_register_input(&input).map_err(UserServiceError::ValidationError)?;

        if self
            .user_repo
            .get_by_username(&input.username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self
            .user_repo
            .get_by_email(&input.email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Author
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, input.email, password_hash, role);

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Check the credentials and open a new session.
    ///
    /// Unknown users and wrong passwords produce the same error.
    pub async fn login(&self, input: LoginInput) -> Result<(User, Session), UserServiceError> {
        let identifier = input.username_or_email.trim();

        let user = match self.find_user_by_username_or_email(identifier).await? {
            Some(user) => user,
            None => {
                tracing::debug!("Login refused: unknown user");
                return Err(invalid_credentials());
            }
        };

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Login refused: wrong password");
            return Err(invalid_credentials());
        }

        let ttl = Duration::try_days(self.session_days)
            .with_context(|| format!("Session lifetime of {} days is out of range", self.session_days))?;
        let session = Session::issue(user.id, ttl)?;
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    /// Delete the session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Returns `None` for unknown or expired tokens; expired sessions are
    /// removed.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Whether no user has registered yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?;
        Ok(count == 0)
    }

    /// Delete all expired sessions, returning how many were removed.
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self
            .user_repo
            .get_by_username(username_or_email)
            .await
            .context("Failed to get user by username")?
        {
            return Ok(Some(user));
        }

        let user = self
            .user_repo
            .get_by_email(username_or_email)
            .await
            .context("Failed to get user by email")?;
        Ok(user)
    }
}

fn invalid_credentials() -> UserServiceError {
    UserServiceError::AuthenticationError("Invalid username or password".to_string())
}

fn validate_register_input(input: &RegisterInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if input.username.is_empty() {
        errors.add("username", "Username cannot be empty");
    } else if input.username.chars().count() > MAX_USERNAME_LENGTH {
        errors.add(
            "username",
            format!("Username must be at most {} characters", MAX_USERNAME_LENGTH),
        );
    }

    if input.email.is_empty() {
        errors.add("email", "Email cannot be empty");
    } else if !is_plausible_email(&input.email) {
        errors.add("email", "Invalid email format");
    }

    if input.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LENGTH),
        );
    }

    errors.into_result()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};

    async fn setup_test_service() -> (DynDatabasePool, UserService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            DEFAULT_SESSION_DAYS,
        );
        (pool, service)
    }

    fn input(name: &str) -> RegisterInput {
        RegisterInput::new(name, format!("{}@example.com", name), "password123")
    }

    #[tokio::test]
    async fn test_register_first_user_becomes_admin() {
        let (_pool, service) = setup_test_service().await;

        let first = service.register(input("alice")).await.unwrap();
        let second = service.register(input("bob")).await.unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::Author);
    }

    #[tokio::test]
    async fn test_register_trims_and_hashes() {
        let (_pool, service) = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("  alice ", " alice@example.com ", "password123"))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_ne!(user.password_hash, "password123");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicates_fail() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("alice")).await.unwrap();

        let same_name = service
            .register(RegisterInput::new("alice", "other@example.com", "password123"))
            .await;
        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));

        let same_email = service
            .register(RegisterInput::new("other", "alice@example.com", "password123"))
            .await;
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_reports_every_invalid_field() {
        let (_pool, service) = setup_test_service().await;

        let result = service
            .register(RegisterInput::new("   ", "not-an-email", "short"))
            .await;

        match result {
            Err(UserServiceError::ValidationError(errors)) => {
                assert!(errors.get("username").is_some());
                assert_eq!(errors.get("email"), Some("Invalid email format"));
                assert!(errors.get("password").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
        }
        assert!(service.is_first_user().await.unwrap());
    }

    #[tokio::test]
    async fn test_login_with_username_or_email() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("alice")).await.unwrap();

        let (by_name, session) = service
            .login(LoginInput::new("alice", "password123"))
            .await
            .unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(session.user_id, user.id);

        let (by_email, _) = service
            .login(LoginInput::new("alice@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn test_login_with_unrepresentable_lifetime_fails_cleanly() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            1_000_000_000,
        );
        service.register(input("alice")).await.unwrap();

        let err = service
            .login(LoginInput::new("alice", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserServiceError::InternalError(_)));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_pool, service) = setup_test_service().await;
        service.register(input("alice")).await.unwrap();

        let wrong_password = service
            .login(LoginInput::new("alice", "wrong-password"))
            .await
            .unwrap_err();
        let unknown_user = service
            .login(LoginInput::new("nobody", "password123"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, UserServiceError::AuthenticationError(_)));
    }

    #[tokio::test]
    async fn test_validate_session_and_logout() {
        let (_pool, service) = setup_test_service().await;
        let user = service.register(input("alice")).await.unwrap();
        let (_, session) = service
            .login(LoginInput::new("alice", "password123"))
            .await
            .unwrap();

        let validated = service.validate_session(&session.id).await.unwrap();
        assert_eq!(validated.map(|u| u.id), Some(user.id));

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());

        // Logging out twice is harmless
        service.logout(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("alice")).await.unwrap();

        let expired = Session::issue(user.id, Duration::hours(-1)).unwrap();
        let session_repo = SqlxSessionRepository::new(pool.clone());
        session_repo.create(&expired).await.unwrap();

        assert!(service.validate_session(&expired.id).await.unwrap().is_none());
        assert!(session_repo.get_by_id(&expired.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let (pool, service) = setup_test_service().await;
        let user = service.register(input("alice")).await.unwrap();
        let session_repo = SqlxSessionRepository::new(pool.clone());

        session_repo
            .create(&Session::issue(user.id, Duration::hours(-2)).unwrap())
            .await
            .unwrap();
        let live = Session::issue(user.id, Duration::days(1)).unwrap();
        session_repo.create(&live).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(service.validate_session(&live.id).await.unwrap().is_some());
    }

    #[test]
    fn test_is_plausible_email() {
        assert!(is_plausible_email("a@b.c"));
        assert!(!is_plausible_email("@b.c"));
        assert!(!is_plausible_email("a@"));
        assert!(!is_plausible_email("a@b@c"));
        assert!(!is_plausible_email("abc"));
    }
}
