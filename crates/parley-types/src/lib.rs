pub mod api;
pub mod models;
pub mod negotiation;

pub use models::{NegotiationStatus, ProposalStatus};
pub use negotiation::NegotiationError;
