//! API routes for pasal-server

pub mod admin;
pub mod health;
pub mod orders;
pub mod payment;

use axum::routing::{get, post, put};
use axum::{Router, middleware};

use crate::auth::{auth_middleware, require_admin};
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Authenticated storefront surface
    let user = Router::new()
        .route("/api/orders", post(orders::create).get(orders::list))
        .route("/api/orders/{id}", get(orders::get_one))
        .route("/api/orders/initiate-payment", post(payment::initiate))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Admin surface (auth + role check; auth layer added last so it runs first)
    let admin = Router::new()
        .route("/api/admin/orders", get(admin::list))
        .route("/api/admin/orders/{id}", put(admin::update))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // The gateway redirects the customer's browser here; no bearer token.
    let callback = Router::new().route("/api/orders/payment/verify", get(payment::verify));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(user)
        .merge(admin)
        .merge(callback)
        .with_state(state)
}
