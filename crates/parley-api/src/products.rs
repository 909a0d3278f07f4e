use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use parley_types::api::{Claims, CreateProductRequest};

use crate::error::ApiError;
use crate::services::catalog;
use crate::state::{AppState, run_blocking};

/// POST /api/product
pub async fn create_product(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let product =
        run_blocking(&state, move |s| catalog::create_product(&s.db, &req.name, req.price)).await?;

    info!("Product {} added by {}", product.id, claims.email);
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/product
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = run_blocking(&state, |s| catalog::list_products(&s.db)).await?;
    Ok(Json(products))
}

/// GET /api/product/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = run_blocking(&state, move |s| catalog::get_product_by_id(&s.db, product_id)).await?;
    Ok(Json(product))
}

/// GET /api/product/by-name/{name}
pub async fn get_product_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = run_blocking(&state, move |s| catalog::get_product_by_name(&s.db, &name)).await?;
    Ok(Json(product))
}

/// DELETE /api/product/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    run_blocking(&state, move |s| catalog::delete_product(&s.db, product_id)).await?;

    info!("Product {} removed by {}", product_id, claims.email);
    Ok(StatusCode::NO_CONTENT)
}
