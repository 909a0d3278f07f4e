use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Negotiation, NegotiationStatus, PriceProposal, ProposalStatus};

// -- JWT Claims --

/// Bearer token claims, shared by token issuance and the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub jti: Uuid,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

// -- Products --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
}

// -- Negotiations --

/// Either field may be omitted, but not both.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartNegotiationRequest {
    pub product_id: Option<Uuid>,
    pub product_name: Option<String>,
}

/// Unknown body fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposePriceRequest {
    pub proposed_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub status: NegotiationStatus,
    pub created_at: DateTime<Utc>,
    pub last_rejected_at: Option<DateTime<Utc>>,
}

impl From<&Negotiation> for NegotiationResponse {
    fn from(n: &Negotiation) -> Self {
        Self {
            id: n.id,
            product_id: n.product_id,
            status: n.status,
            created_at: n.created_at,
            last_rejected_at: n.last_rejected_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceProposalResponse {
    pub id: Uuid,
    pub negotiation_id: Uuid,
    pub proposed_at: DateTime<Utc>,
    pub status: ProposalStatus,
    pub proposed_price: Decimal,
}

impl From<&PriceProposal> for PriceProposalResponse {
    fn from(p: &PriceProposal) -> Self {
        Self {
            id: p.id,
            negotiation_id: p.negotiation_id,
            proposed_at: p.proposed_at,
            status: p.status,
            proposed_price: p.proposed_price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: NegotiationStatus,
}

/// Plain acknowledgement for state-changing negotiation calls.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
