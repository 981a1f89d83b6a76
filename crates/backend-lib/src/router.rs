// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP route table.
//!
//! `/auth/*` is gated per client IP. `/api/*` is gated per access token and
//! then authenticated; the quota runs first so a flood of bad tokens is
//! still counted.
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, auth, settings};
use crate::middleware::{identity_rate_limit, ip_rate_limit, require_identity};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/sign-in", post(auth::sign_in))
        .route("/refresh", post(auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), ip_rate_limit));

    // Later route_layer calls wrap earlier ones: the quota runs before auth
    let api_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/password", put(auth::change_password))
        .route("/auth/sessions", get(auth::list_sessions))
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route("/settings/day-coin", post(settings::claim_daily_reward))
        .route("/settings/subscription", post(settings::activate_subscription))
        .route_layer(from_fn_with_state(state.clone(), require_identity))
        .route_layer(from_fn_with_state(state.clone(), identity_rate_limit));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
