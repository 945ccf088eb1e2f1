//! Access request endpoints
//!
//! - POST /api/v1/posts/{id}/request-access - Ask to read a hidden post
//! - GET /api/v1/access-requests/manage - Pending requests for my posts
//! - POST /api/v1/access-requests/{id}/approve - Approve (post author only)
//! - POST /api/v1/access-requests/{id}/reject - Reject (post author only)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::api::middleware::{AppState, AuthenticatedUser};
use crate::api::responses::{ApiError, Notice};
use crate::models::{AccessRequest, AccessRequestStatus, AccessRequestWithMeta};
use crate::services::{AccessServiceError, RequestAccessOutcome};

/// Result of a request-access call
#[derive(Debug, Serialize)]
pub struct RequestAccessResponse {
    pub notice: Notice,
    /// The caller's request status after the call, if they have one
    pub access_request_status: Option<AccessRequestStatus>,
    /// Present when this call created the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AccessRequest>,
}

/// Result of approving or rejecting a request
#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub notice: Notice,
    pub request: AccessRequest,
}

/// Pending requests for the caller's posts
#[derive(Debug, Serialize)]
pub struct ManageResponse {
    pub requests: Vec<AccessRequestWithMeta>,
}

/// POST /api/v1/posts/{id}/request-access
pub async fn request_access(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(post_id): Path<i64>,
) -> Result<(StatusCode, Json<RequestAccessResponse>), ApiError> {
    let outcome = match state.access_service.request_access(post_id, &user.0).await {
        Ok(outcome) => outcome,
        Err(AccessServiceError::PostIsPublic(_)) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(RequestAccessResponse {
                    notice: Notice::error("This post is public; no access request is needed"),
                    access_request_status: None,
                    request: None,
                }),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let (status, notice, access_request_status, request) = match outcome {
        RequestAccessOutcome::Created(request) => (
            StatusCode::CREATED,
            Notice::success("Access requested. The author will review your request"),
            Some(request.status),
            Some(request),
        ),
        RequestAccessOutcome::AlreadyPending => (
            StatusCode::OK,
            Notice::info("Your request is still waiting for the author"),
            Some(AccessRequestStatus::Pending),
            None,
        ),
        RequestAccessOutcome::AlreadyApproved => (
            StatusCode::OK,
            Notice::success("Access was already granted"),
            Some(AccessRequestStatus::Approved),
            None,
        ),
        RequestAccessOutcome::PreviouslyRejected => (
            StatusCode::OK,
            Notice::warning("Your request was previously rejected"),
            Some(AccessRequestStatus::Rejected),
            None,
        ),
        RequestAccessOutcome::IsAuthor => (
            StatusCode::OK,
            Notice::info("You are the author of this post"),
            None,
            None,
        ),
    };

    Ok((
        status,
        Json(RequestAccessResponse {
            notice,
            access_request_status,
            request,
        }),
    ))
}

/// GET /api/v1/access-requests/manage
pub async fn manage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<ManageResponse>, ApiError> {
    let requests = state.access_service.pending_for_author(&user.0).await?;
    Ok(Json(ManageResponse { requests }))
}

/// POST /api/v1/access-requests/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RespondResponse>, ApiError> {
    let request = state.access_service.approve(id, &user.0).await?;
    Ok(Json(RespondResponse {
        notice: Notice::success("Access request approved"),
        request,
    }))
}

/// POST /api/v1/access-requests/{id}/reject
pub async fn reject(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<RespondResponse>, ApiError> {
    let request = state.access_service.reject(id, &user.0).await?;
    Ok(Json(RespondResponse {
        notice: Notice::info("Access request rejected"),
        request,
    }))
}
