//! Negotiation lifecycle against the store.
//!
//! Each operation loads the aggregate, applies one transition from
//! `parley_types::negotiation` and saves it. When a transition fails but
//! still moved the negotiation into a terminal state (inactivity expiry,
//! proposal cap) the new state is saved first and the error is returned
//! afterwards; nothing is rolled back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_types::NegotiationError;
use parley_types::models::{Negotiation, NegotiationStatus, PriceProposal, Product};

use crate::error::ApiError;

fn load(db: &Database, id: Uuid) -> Result<Negotiation, ApiError> {
    db.load_negotiation(id)?
        .ok_or_else(|| ApiError::not_found(format!("Negotiation {} does not exist", id)))
}

/// Persist the outcome of a transition, including forced terminal states.
fn commit<T>(
    db: &Database,
    negotiation: &Negotiation,
    outcome: Result<T, NegotiationError>,
) -> Result<T, ApiError> {
    match outcome {
        Ok(value) => {
            db.save_negotiation(negotiation)?;
            Ok(value)
        }
        Err(err) if err.changes_state() => {
            db.save_negotiation(negotiation)?;
            warn!(
                "Negotiation {} forced to {}: {}",
                negotiation.id,
                negotiation.status.as_str(),
                err
            );
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Resolve the product a new negotiation refers to.
///
/// With only an id or only a name the other is looked up; with both they
/// must name the same product (names compared case-insensitively).
fn resolve_product(
    db: &Database,
    product_id: Option<Uuid>,
    product_name: Option<&str>,
) -> Result<Product, ApiError> {
    let product_name = product_name.filter(|n| !n.trim().is_empty());

    match (product_id, product_name) {
        (Some(id), None) => db
            .get_product_by_id(id)?
            .ok_or_else(|| ApiError::not_found(format!("Product with id: {} does not exist", id))),
        (None, Some(name)) => db.get_product_by_name(name)?.ok_or_else(|| {
            ApiError::not_found(format!("Product with name: {} does not exist", name))
        }),
        (Some(id), Some(name)) => match db.get_product_by_id(id)? {
            Some(product) if product.name.to_lowercase() == name.to_lowercase() => Ok(product),
            _ => Err(ApiError::validation("Product ID and name do not match")),
        },
        (None, None) => Err(ApiError::validation(
            "Either productId or productName must be provided",
        )),
    }
}

pub fn start_negotiation(
    db: &Database,
    product_id: Option<Uuid>,
    product_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Negotiation, ApiError> {
    let product = resolve_product(db, product_id, product_name)?;

    let negotiation = Negotiation::start(product.id, now);
    db.insert_negotiation(&negotiation)?;

    info!(
        "Negotiation {} started for product {} '{}'",
        negotiation.id, product.id, product.name
    );
    Ok(negotiation)
}

pub fn propose_price(
    db: &Database,
    negotiation_id: Uuid,
    price: Decimal,
    now: DateTime<Utc>,
) -> Result<PriceProposal, ApiError> {
    let mut negotiation = load(db, negotiation_id)?;

    let outcome = negotiation.propose(price, now).cloned();
    let proposal = commit(db, &negotiation, outcome)?;

    info!(
        "Negotiation {}: proposal #{} at {}",
        negotiation_id,
        proposal.seq + 1,
        proposal.proposed_price
    );
    Ok(proposal)
}

pub fn accept_negotiation(db: &Database, negotiation_id: Uuid) -> Result<Negotiation, ApiError> {
    let mut negotiation = load(db, negotiation_id)?;

    let outcome = negotiation.accept();
    commit(db, &negotiation, outcome)?;

    info!("Negotiation {} approved", negotiation_id);
    Ok(negotiation)
}

/// Reject the latest offer. At the proposal cap the negotiation itself is
/// rejected, saved, and the call still fails with a conflict.
pub fn reject_negotiation(
    db: &Database,
    negotiation_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Negotiation, ApiError> {
    let mut negotiation = load(db, negotiation_id)?;

    let outcome = negotiation.reject(now);
    commit(db, &negotiation, outcome)?;

    info!("Negotiation {}: latest proposal rejected", negotiation_id);
    Ok(negotiation)
}

pub fn delete_negotiation(db: &Database, negotiation_id: Uuid) -> Result<(), ApiError> {
    if !db.delete_negotiation(negotiation_id)? {
        return Err(ApiError::not_found(format!(
            "Negotiation {} does not exist",
            negotiation_id
        )));
    }
    info!("Negotiation {} deleted", negotiation_id);
    Ok(())
}

pub fn get_negotiation(db: &Database, negotiation_id: Uuid) -> Result<Negotiation, ApiError> {
    load(db, negotiation_id)
}

pub fn get_status(db: &Database, negotiation_id: Uuid) -> Result<NegotiationStatus, ApiError> {
    db.get_negotiation_status(negotiation_id)?
        .ok_or_else(|| ApiError::not_found(format!("Negotiation {} does not exist", negotiation_id)))
}

/// Proposals in the order they were made.
pub fn list_proposals(
    db: &Database,
    negotiation_id: Uuid,
) -> Result<Vec<PriceProposal>, ApiError> {
    let negotiation = load(db, negotiation_id)?;
    Ok(negotiation
        .proposals_in_order()
        .into_iter()
        .cloned()
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use parley_types::models::ProposalStatus;

    use super::*;
    use crate::services::catalog;

    fn setup() -> (Database, Product) {
        let db = Database::open_in_memory().unwrap();
        let product = catalog::create_product(&db, "Road bike", Decimal::new(100, 0)).unwrap();
        (db, product)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-04-10T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn price(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn start_resolves_by_id_or_name() {
        let (db, product) = setup();

        let by_id = start_negotiation(&db, Some(product.id), None, t0()).unwrap();
        assert_eq!(by_id.product_id, product.id);
        assert_eq!(by_id.status, NegotiationStatus::Pending);

        let by_name = start_negotiation(&db, None, Some("Road bike"), t0()).unwrap();
        assert_eq!(by_name.product_id, product.id);

        let both = start_negotiation(&db, Some(product.id), Some("ROAD BIKE"), t0()).unwrap();
        assert_eq!(both.product_id, product.id);
    }

    #[test]
    fn start_rejects_bad_references() {
        let (db, product) = setup();

        let err = start_negotiation(&db, Some(product.id), Some("Unicycle"), t0()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "Product ID and name do not match"));

        let err = start_negotiation(&db, None, None, t0()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = start_negotiation(&db, None, Some("  "), t0()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = start_negotiation(&db, Some(Uuid::new_v4()), None, t0()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = start_negotiation(&db, None, Some("Unicycle"), t0()).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn fourth_proposal_fails_and_negotiation_is_rejected() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();

        for (i, p) in [90, 80, 70].into_iter().enumerate() {
            let at = t0() + Duration::hours(i as i64 * 2 + 1);
            propose_price(&db, neg.id, price(p), at).unwrap();

            let reject = reject_negotiation(&db, neg.id, at + Duration::hours(1));
            if i < 2 {
                assert_eq!(reject.unwrap().status, NegotiationStatus::Pending);
            } else {
                // third rejection hits the cap: stored, then reported
                assert!(matches!(reject, Err(ApiError::Conflict(_))));
            }
        }

        let err = propose_price(&db, neg.id, price(60), t0() + Duration::days(1)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(get_status(&db, neg.id).unwrap(), NegotiationStatus::Rejected);
        assert_eq!(list_proposals(&db, neg.id).unwrap().len(), 3);
    }

    #[test]
    fn proposing_against_three_resolved_offers_persists_rejection() {
        let (db, product) = setup();
        let mut neg = Negotiation::start(product.id, t0());
        for i in 0..3 {
            neg.propose(price(90 - i * 10), t0() + Duration::hours(i)).unwrap();
            neg.proposals.last_mut().unwrap().status = ProposalStatus::Rejected;
        }
        db.save_negotiation(&neg).unwrap();

        let err = propose_price(&db, neg.id, price(50), t0() + Duration::days(1)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("too many proposals")));
        assert_eq!(get_status(&db, neg.id).unwrap(), NegotiationStatus::Rejected);
    }

    #[test]
    fn eight_days_of_silence_cancels() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();

        propose_price(&db, neg.id, price(95), t0()).unwrap();
        reject_negotiation(&db, neg.id, t0() + Duration::hours(1)).unwrap();

        let err = propose_price(&db, neg.id, price(85), t0() + Duration::days(8)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("7 days")));
        assert_eq!(get_status(&db, neg.id).unwrap(), NegotiationStatus::Cancelled);
    }

    #[test]
    fn unanswered_offer_is_not_expired_by_silence() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();

        propose_price(&db, neg.id, price(90), t0()).unwrap();
        let err = propose_price(&db, neg.id, price(80), t0() + Duration::days(8)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m.contains("pending")), "got {:?}", err);
        assert_eq!(get_status(&db, neg.id).unwrap(), NegotiationStatus::Pending);
        assert_eq!(list_proposals(&db, neg.id).unwrap().len(), 1);
    }

    #[test]
    fn pending_offer_blocks_the_next_one() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();

        propose_price(&db, neg.id, price(95), t0()).unwrap();
        let err = propose_price(&db, neg.id, price(90), t0() + Duration::hours(1)).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(list_proposals(&db, neg.id).unwrap().len(), 1);
    }

    #[test]
    fn invalid_price_is_validation_error() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();

        let err = propose_price(&db, neg.id, Decimal::ZERO, t0()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(list_proposals(&db, neg.id).unwrap().is_empty());
    }

    #[test]
    fn accept_resolves_and_further_calls_conflict() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();
        propose_price(&db, neg.id, price(99), t0()).unwrap();

        let accepted = accept_negotiation(&db, neg.id).unwrap();
        assert_eq!(accepted.status, NegotiationStatus::Approved);

        let stored = get_negotiation(&db, neg.id).unwrap();
        assert_eq!(stored.proposals[0].status, ProposalStatus::Accepted);

        assert!(matches!(accept_negotiation(&db, neg.id), Err(ApiError::Conflict(_))));
        assert!(matches!(
            reject_negotiation(&db, neg.id, t0()),
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(get_negotiation(&db, neg.id).unwrap(), stored);
    }

    #[test]
    fn missing_negotiation_is_not_found() {
        let (db, _) = setup();
        let id = Uuid::new_v4();

        assert!(matches!(propose_price(&db, id, price(1), t0()), Err(ApiError::NotFound(_))));
        assert!(matches!(accept_negotiation(&db, id), Err(ApiError::NotFound(_))));
        assert!(matches!(reject_negotiation(&db, id, t0()), Err(ApiError::NotFound(_))));
        assert!(matches!(delete_negotiation(&db, id), Err(ApiError::NotFound(_))));
        assert!(matches!(get_status(&db, id), Err(ApiError::NotFound(_))));
        assert!(matches!(list_proposals(&db, id), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn delete_removes_negotiation_and_proposals() {
        let (db, product) = setup();
        let neg = start_negotiation(&db, Some(product.id), None, t0()).unwrap();
        propose_price(&db, neg.id, price(80), t0()).unwrap();

        delete_negotiation(&db, neg.id).unwrap();
        assert!(matches!(get_negotiation(&db, neg.id), Err(ApiError::NotFound(_))));
    }
}
