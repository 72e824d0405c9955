//! PaperVault HTTP gateway
//!
//! JSON API over the common workflows. Handles:
//! - Session cookies and bearer tokens
//! - Request routing and upload streaming
//! - Rate limiting of the authentication endpoints
//! - Observability (logging, metrics, request ids)

pub mod handlers;
pub mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use papervault_common::{auth::IdentityProvider, config::AppConfig, services::AppServices};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use middleware::rate_limit::{rate_limit_middleware, AuthRateLimit};

/// Multipart framing on top of the largest accepted file
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: AppServices,
}

impl FromRef<AppState> for IdentityProvider {
    fn from_ref(state: &AppState) -> Self {
        state.services.identity.clone()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/password-reset", post(handlers::auth::request_password_reset))
        .route(
            "/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        );

    if config.rate_limit.enabled {
        let limit = AuthRateLimit::new(&config.rate_limit);
        auth_routes = auth_routes.layer(from_fn_with_state(limit, rate_limit_middleware));
    }

    let paper_routes = Router::new()
        .route("/", get(handlers::papers::search).post(handlers::papers::upload))
        .route("/mine", get(handlers::papers::list_mine))
        .route(
            "/{id}",
            get(handlers::papers::get_paper).delete(handlers::papers::delete_paper),
        )
        .route("/{id}/file", get(handlers::papers::download));

    let admin_routes = Router::new()
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}", delete(handlers::admin::delete_user))
        .route("/users/{id}/promote", post(handlers::admin::promote))
        .route("/users/{id}/demote", post(handlers::admin::demote))
        .route("/users/{id}/ban", post(handlers::admin::ban))
        .route("/users/{id}/unban", post(handlers::admin::unban))
        .route("/papers", get(handlers::admin::list_papers))
        .route("/papers/{id}", delete(handlers::admin::delete_paper));

    let body_limit = config.storage.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/me", get(handlers::auth::me))
        .nest("/auth", auth_routes)
        .nest("/papers", paper_routes)
        .nest("/admin", admin_routes)
        .layer(DefaultBodyLimit::max(body_limit as usize))
        .layer(from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(ConcurrencyLimitLayer::new(config.server.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
