use axum::{middleware as axum_middleware, routing::post, Router};
use std::sync::Arc;

use crate::api::handlers;
use crate::auth::middleware::{admin_middleware, auth_middleware};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Protected routes (auth required); every bidding action is caller-scoped
    let protected_routes = Router::new()
        .route("/bidding/submit-bid", post(handlers::submit_bid::submit_bid))
        .route("/bidding/set-auto-bid", post(handlers::auto_bid::set_auto_bid))
        .route("/bidding/withdraw-bid", post(handlers::withdraw_bid::withdraw_bid))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Admin routes (auth required + admin role check)
    let admin_routes = Router::new()
        .route(
            "/admin/bidding/sessions/:session_id/cancel",
            post(handlers::submit_bid::cancel_session),
        )
        // Admin middleware must come BEFORE auth middleware in the layer chain
        // (layers are applied in reverse order, so auth runs first, then admin)
        .layer(axum_middleware::from_fn(admin_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).merge(admin_routes)
}
