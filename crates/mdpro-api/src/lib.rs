//! # mdpro-api
//!
//! HTTP backend for the mdpro editor: accounts and sessions, owner-scoped
//! document and category CRUD, share-link resolution and realtime change
//! feeds over WebSocket and SSE.
//!
//! The binary in `main.rs` wires configuration, logging and storage; this
//! library exposes [`router`] so tests can drive the full stack in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use handlers::{auth as auth_handlers, categories, documents, health, profile, realtime, shares};

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

async fn share_rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.share_limiter {
        if limiter.check().is_err() {
            tracing::warn!(path = %request.uri().path(), "Share rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Build the application router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.config.parse_allowed_origins()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600));

    // Anonymous share lookups are rate limited; owner routes are not.
    let public_shares = Router::new()
        .route("/api/v1/shares/:token", get(shares::get_shared_document))
        .route(
            "/api/v1/shares/:token/unlock",
            post(shares::unlock_shared_document),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            share_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        // Auth
        .route("/api/v1/auth/signup", post(auth_handlers::sign_up))
        .route("/api/v1/auth/signin", post(auth_handlers::sign_in))
        .route("/api/v1/auth/signout", post(auth_handlers::sign_out))
        .route("/api/v1/auth/user", get(auth_handlers::current_user))
        .route("/api/v1/auth/password", put(auth_handlers::update_password))
        .route("/api/v1/auth/recover", post(auth_handlers::request_recovery))
        .route(
            "/api/v1/auth/recover/verify",
            post(auth_handlers::verify_recovery),
        )
        // Profile
        .route(
            "/api/v1/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        // Documents
        .route(
            "/api/v1/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/api/v1/documents/:id",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/api/v1/documents/:id/category", put(documents::move_document))
        .route(
            "/api/v1/documents/:id/shares",
            get(shares::list_shares).post(shares::create_share),
        )
        // Categories
        .route(
            "/api/v1/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/v1/categories/:id",
            patch(categories::rename_category).delete(categories::delete_category),
        )
        // Realtime
        .route("/api/v1/realtime", get(realtime::ws_handler))
        .route("/api/v1/events", get(realtime::sse_events))
        .merge(public_shares)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state)
}
