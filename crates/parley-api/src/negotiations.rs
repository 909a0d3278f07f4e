use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use parley_types::api::{
    Claims, MessageResponse, NegotiationResponse, PriceProposalResponse, ProposePriceRequest,
    StartNegotiationRequest, StatusResponse,
};

use crate::error::ApiError;
use crate::services::negotiation;
use crate::state::{AppState, run_blocking};

/// POST /api/negotiation
pub async fn start_negotiation(
    State(state): State<AppState>,
    payload: Result<Json<StartNegotiationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let started = run_blocking(&state, move |s| {
        negotiation::start_negotiation(
            &s.db,
            req.product_id,
            req.product_name.as_deref(),
            Utc::now(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(NegotiationResponse::from(&started))))
}

/// GET /api/negotiation/{id}
pub async fn get_negotiation(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let found =
        run_blocking(&state, move |s| negotiation::get_negotiation(&s.db, negotiation_id)).await?;
    Ok(Json(NegotiationResponse::from(&found)))
}

/// GET /api/negotiation/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = run_blocking(&state, move |s| negotiation::get_status(&s.db, negotiation_id)).await?;
    Ok(Json(StatusResponse { status }))
}

/// GET /api/negotiation/{id}/proposals
pub async fn list_proposals(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let proposals =
        run_blocking(&state, move |s| negotiation::list_proposals(&s.db, negotiation_id)).await?;

    let body: Vec<PriceProposalResponse> = proposals.iter().map(PriceProposalResponse::from).collect();
    Ok(Json(body))
}

/// POST /api/negotiation/propose/{id}
pub async fn propose_price(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
    payload: Result<Json<ProposePriceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    run_blocking(&state, move |s| {
        negotiation::propose_price(&s.db, negotiation_id, req.proposed_price, Utc::now())
    })
    .await?;

    Ok(Json(MessageResponse::new("Price proposal submitted successfully.")))
}

/// POST /api/negotiation/accept/{id}
pub async fn accept_negotiation(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |s| negotiation::accept_negotiation(&s.db, negotiation_id)).await?;

    info!("Negotiation {} accepted by {}", negotiation_id, claims.email);
    Ok(Json(MessageResponse::new("Price proposal accepted.")))
}

/// POST /api/negotiation/reject/{id}
pub async fn reject_negotiation(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |s| {
        negotiation::reject_negotiation(&s.db, negotiation_id, Utc::now())
    })
    .await?;

    info!("Negotiation {} proposal rejected by {}", negotiation_id, claims.email);
    Ok(Json(MessageResponse::new("Price proposal rejected.")))
}

/// DELETE /api/negotiation/{id}
pub async fn delete_negotiation(
    State(state): State<AppState>,
    Path(negotiation_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    run_blocking(&state, move |s| negotiation::delete_negotiation(&s.db, negotiation_id)).await?;

    info!("Negotiation {} deleted by {}", negotiation_id, claims.email);
    Ok(Json(MessageResponse::new("Negotiation deleted successfully.")))
}
