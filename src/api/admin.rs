//! Admin API endpoints
//!
//! - GET /api/v1/admin/access-requests?status= - Every access request,
//!   optionally filtered by status (read-only)

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::access::ManageResponse;
use crate::api::middleware::AppState;
use crate::api::responses::ApiError;
use crate::models::AccessRequestStatus;
use crate::services::FieldErrors;

/// Query parameters for the access request listing
#[derive(Debug, Deserialize)]
pub struct AccessRequestQuery {
    pub status: Option<String>,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new().route("/access-requests", get(list_access_requests))
}

/// GET /api/v1/admin/access-requests
async fn list_access_requests(
    State(state): State<AppState>,
    Query(query): Query<AccessRequestQuery>,
) -> Result<Json<ManageResponse>, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => Some(AccessRequestStatus::from_str(value).map_err(|_| {
            ApiError::invalid_fields(&FieldErrors::single(
                "status",
                "Status must be one of pending, approved, rejected",
            ))
        })?),
    };

    let requests = state.access_service.list_all(status).await?;
    Ok(Json(ManageResponse { requests }))
}
