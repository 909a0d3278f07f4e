//! Negotiation lifecycle rules.
//!
//! A negotiation starts `Pending` and ends in exactly one of `Approved`,
//! `Rejected` or `Cancelled`. Every transition here is pure: callers load the
//! aggregate, apply one of these methods and store the result. Some failed
//! transitions still move the negotiation into a terminal state; those report
//! `changes_state() == true` and the caller must persist before surfacing the
//! error.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Negotiation, NegotiationStatus, PriceProposal, ProposalStatus};

/// A negotiation is forced to `Rejected` once it holds this many proposals.
pub const MAX_PROPOSALS: usize = 3;

/// Days without a new proposal after which a negotiation is cancelled.
pub const INACTIVITY_LIMIT_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("Negotiation is no longer active")]
    NotActive,
    #[error("Negotiation is already resolved")]
    AlreadyResolved,
    #[error(
        "Proposal is already pending, wait for it to be accepted or rejected before making another one"
    )]
    ProposalPending,
    #[error("Negotiation cancelled after 7 days of inactivity")]
    Expired,
    #[error("Negotiation rejected: too many proposals")]
    TooManyProposals,
    #[error("Proposed price must be greater than 0")]
    InvalidPrice,
}

impl NegotiationError {
    /// The failed transition moved the negotiation into a terminal state.
    pub fn changes_state(&self) -> bool {
        matches!(self, Self::Expired | Self::TooManyProposals)
    }

    /// Bad input rather than a rule violation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidPrice)
    }
}

impl Negotiation {
    pub fn start(product_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            status: NegotiationStatus::Pending,
            created_at: now,
            last_rejected_at: None,
            proposals: Vec::new(),
        }
    }

    /// Most recent proposal by `proposed_at`, ties going to the later insert.
    pub fn latest_proposal(&self) -> Option<&PriceProposal> {
        self.proposals.iter().max_by_key(|p| (p.proposed_at, p.seq))
    }

    fn latest_proposal_mut(&mut self) -> Option<&mut PriceProposal> {
        self.proposals.iter_mut().max_by_key(|p| (p.proposed_at, p.seq))
    }

    /// Start of the current inactivity window.
    pub fn reference_date(&self) -> DateTime<Utc> {
        self.latest_proposal()
            .map(|p| p.proposed_at)
            .unwrap_or(self.created_at)
    }

    /// Proposals in the order they were made.
    pub fn proposals_in_order(&self) -> Vec<&PriceProposal> {
        let mut proposals: Vec<&PriceProposal> = self.proposals.iter().collect();
        proposals.sort_by_key(|p| (p.proposed_at, p.seq));
        proposals
    }

    fn ensure_pending(&self, err: NegotiationError) -> Result<(), NegotiationError> {
        if self.status.is_terminal() {
            return Err(err);
        }
        Ok(())
    }

    /// Record a new offer.
    ///
    /// Checks run in a fixed order: active, nothing pending, inactivity
    /// window, proposal cap, then the price itself. Expiry and the cap both
    /// leave the negotiation in a terminal state.
    pub fn propose(
        &mut self,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<&PriceProposal, NegotiationError> {
        self.ensure_pending(NegotiationError::NotActive)?;

        if self
            .latest_proposal()
            .is_some_and(|p| p.status == ProposalStatus::Pending)
        {
            return Err(NegotiationError::ProposalPending);
        }

        if now - self.reference_date() > Duration::days(INACTIVITY_LIMIT_DAYS) {
            self.status = NegotiationStatus::Cancelled;
            return Err(NegotiationError::Expired);
        }

        if self.proposals.len() >= MAX_PROPOSALS {
            self.status = NegotiationStatus::Rejected;
            return Err(NegotiationError::TooManyProposals);
        }

        if price <= Decimal::ZERO {
            return Err(NegotiationError::InvalidPrice);
        }

        let seq = self
            .proposals
            .iter()
            .map(|p| p.seq + 1)
            .max()
            .unwrap_or(0);

        self.proposals.push(PriceProposal {
            id: Uuid::new_v4(),
            negotiation_id: self.id,
            seq,
            proposed_price: price,
            proposed_at: now,
            status: ProposalStatus::Pending,
        });

        let idx = self.proposals.len() - 1;
        Ok(&self.proposals[idx])
    }

    /// Approve the negotiation, accepting the latest offer if there is one.
    pub fn accept(&mut self) -> Result<(), NegotiationError> {
        self.ensure_pending(NegotiationError::AlreadyResolved)?;

        self.status = NegotiationStatus::Approved;
        if let Some(latest) = self.latest_proposal_mut() {
            latest.status = ProposalStatus::Accepted;
        }
        Ok(())
    }

    /// Reject the latest offer. The negotiation stays open unless the
    /// proposal cap has been reached, in which case it becomes `Rejected`
    /// and `TooManyProposals` is returned after the mutation.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), NegotiationError> {
        self.ensure_pending(NegotiationError::AlreadyResolved)?;

        if let Some(latest) = self.latest_proposal_mut() {
            latest.status = ProposalStatus::Rejected;
            self.last_rejected_at = Some(now);
        }

        if self.proposals.len() >= MAX_PROPOSALS {
            self.status = NegotiationStatus::Rejected;
            return Err(NegotiationError::TooManyProposals);
        }
        Ok(())
    }
}
