//! Shared API response types
//!
//! - `ApiError`: the `{ "error": { code, message, details } }` body every
//!   failing endpoint returns, with the status code derived from `code`
//! - `Notice`: the `{ level, message }` object attached to idempotent actions
//! - `PagedResponse`: list envelope with pagination metadata
//!
//! Service errors convert into `ApiError` here so handlers can use `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::PagedResult;
use crate::services::{
    AccessServiceError, CommentServiceError, FieldErrors, FollowServiceError, PostServiceError,
    TagServiceError, UserServiceError,
};

/// Path the client is sent to after a refused access-request response
pub const MANAGE_REQUESTS_PATH: &str = "/api/v1/access-requests/manage";

/// Detail path of a post
pub fn post_path(post_id: i64) -> String {
    format!("/api/v1/posts/{}", post_id)
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    /// 403 carrying the path the client should go to instead
    pub fn forbidden_redirect(message: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        Self::with_details(
            "FORBIDDEN",
            message,
            serde_json::json!({ "redirect_to": redirect_to.into() }),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// 400 with one entry per invalid field
    pub fn invalid_fields(errors: &FieldErrors) -> Self {
        Self::with_details(
            "VALIDATION_ERROR",
            "Invalid input",
            serde_json::json!({ "fields": errors }),
        )
    }

    pub fn conflict(message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::with_details("CONFLICT", message, details)
    }

    /// Log `err` and return an opaque 500
    pub fn internal(err: &anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Request failed");
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(errors) => ApiError::invalid_fields(&errors),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg, serde_json::json!({})),
            UserServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::NotFound(id) => ApiError::not_found(format!("Post not found: {}", id)),
            PostServiceError::TagNotFound(name) => {
                ApiError::not_found(format!("Tag not found: {}", name))
            }
            PostServiceError::NotAuthor { post_id } => ApiError::forbidden_redirect(
                "Only the author can change this post",
                post_path(post_id),
            ),
            PostServiceError::ValidationError(errors) => ApiError::invalid_fields(&errors),
            PostServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<TagServiceError> for ApiError {
    fn from(err: TagServiceError) -> Self {
        match err {
            TagServiceError::NotFound(name) => ApiError::not_found(format!("Tag not found: {}", name)),
            TagServiceError::ValidationError(errors) => ApiError::invalid_fields(&errors),
            TagServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<FollowServiceError> for ApiError {
    fn from(err: FollowServiceError) -> Self {
        match err {
            FollowServiceError::UserNotFound(id) => {
                ApiError::not_found(format!("User not found: {}", id))
            }
            FollowServiceError::ValidationError(errors) => ApiError::invalid_fields(&errors),
            FollowServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::PostNotFound(id) => {
                ApiError::not_found(format!("Post not found: {}", id))
            }
            CommentServiceError::AccessDenied(id) => ApiError::forbidden_redirect(
                "You need access to this post first",
                post_path(id),
            ),
            CommentServiceError::ValidationError(errors) => ApiError::invalid_fields(&errors),
            CommentServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

impl From<AccessServiceError> for ApiError {
    fn from(err: AccessServiceError) -> Self {
        match err {
            AccessServiceError::PostNotFound(id) => {
                ApiError::not_found(format!("Post not found: {}", id))
            }
            // request_access answers this case with an error notice instead
            AccessServiceError::PostIsPublic(id) => {
                ApiError::validation_error(format!("Post {} is public", id))
            }
            AccessServiceError::RequestNotFound(id) => {
                ApiError::not_found(format!("Access request not found: {}", id))
            }
            AccessServiceError::NotPostAuthor(_) => ApiError::forbidden_redirect(
                "Only the post's author can respond to this request",
                MANAGE_REQUESTS_PATH,
            ),
            AccessServiceError::Transition(e) => ApiError::conflict(
                e.to_string(),
                serde_json::json!({
                    "current": e.current,
                    "attempted": e.attempted,
                }),
            ),
            AccessServiceError::InternalError(e) => ApiError::internal(&e),
        }
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Short user-facing message attached to a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }
}

/// Body of an action whose only result is a notice
#[derive(Debug, Serialize)]
pub struct NoticeResponse {
    pub notice: Notice,
}

impl From<Notice> for NoticeResponse {
    fn from(notice: Notice) -> Self {
        Self { notice }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> From<PagedResult<T>> for PagedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        let total_pages = result.total_pages();
        Self {
            items: result.items,
            total: result.total,
            page: result.page,
            page_size: result.page_size,
            total_pages,
        }
    }
}
