//! API layer - HTTP handlers and routing
//!
//! Every endpoint lives under `/api/v1`:
//! - Auth endpoints (register, login, logout, me)
//! - Post endpoints (list, detail, create, edit, delete, feed)
//! - Comment endpoints
//! - Tag endpoints
//! - User profile and follow endpoints
//! - Access request endpoints
//! - Admin endpoints

pub mod access;
pub mod admin;
pub mod auth;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod tags;
pub mod users;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{AppState, AuthenticatedUser, Viewer};
pub use responses::{ApiError, Notice, NoticeLevel, NoticeResponse, PagedResponse};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need a session)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{id}",
            axum::routing::put(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{id}/comments", post(comments::create_comment))
        .route("/posts/{id}/request-access", post(access::request_access))
        .route("/feed", get(posts::feed))
        .route("/users/{id}/follow", post(users::follow))
        .route("/users/{id}/unfollow", post(users::unfollow))
        .route("/access-requests/manage", get(access::manage))
        .route("/access-requests/{id}/approve", post(access::approve))
        .route("/access-requests/{id}/reject", post(access::reject))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Viewer routes (answer differs for signed-in users)
    let viewer_routes = Router::new()
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/posts/{id}/comments", get(comments::list_comments))
        .route("/users/{id}", get(users::get_profile))
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .nest("/tags", tags::router())
        .merge(admin_routes)
        .merge(protected_routes)
        .merge(viewer_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    // Cookie auth needs credentials, so the origin must be explicit
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
