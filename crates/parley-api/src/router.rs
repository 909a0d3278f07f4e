use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, negotiations, products};

/// All REST routes. CORS and request tracing are layered on by the binary.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/product", get(products::list_products))
        .route("/api/product/{id}", get(products::get_product))
        .route("/api/product/by-name/{name}", get(products::get_product_by_name))
        .route("/api/negotiation", post(negotiations::start_negotiation))
        .route("/api/negotiation/{id}", get(negotiations::get_negotiation))
        .route("/api/negotiation/{id}/status", get(negotiations::get_status))
        .route("/api/negotiation/{id}/proposals", get(negotiations::list_proposals))
        .route("/api/negotiation/propose/{id}", post(negotiations::propose_price))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/product", post(products::create_product))
        .route("/api/product/{id}", delete(products::delete_product))
        .route("/api/negotiation/accept/{id}", post(negotiations::accept_negotiation))
        .route("/api/negotiation/reject/{id}", post(negotiations::reject_negotiation))
        .route("/api/negotiation/{id}", delete(negotiations::delete_negotiation))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
