//! Database row types. These map directly to SQLite rows (everything TEXT)
//! and are converted into `parley-types` models at the edge of this crate.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use parley_types::models::{Negotiation, PriceProposal, Product, User};

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
}

pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: String,
}

pub struct NegotiationRow {
    pub id: String,
    pub product_id: String,
    pub status: String,
    pub created_at: String,
    pub last_rejected_at: Option<String>,
}

pub struct ProposalRow {
    pub id: String,
    pub negotiation_id: String,
    pub seq: i64,
    pub proposed_price: String,
    pub proposed_at: String,
    pub status: String,
}

/// RFC 3339 with microseconds, so lexical order matches time order.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("corrupt timestamp '{}'", raw))?
        .with_timezone(&Utc))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("corrupt decimal '{}'", raw))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            full_name: row.full_name,
            email: row.email,
            password_hash: row.password,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = anyhow::Error;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Product {
            id: parse_uuid(&row.id)?,
            price: parse_decimal(&row.price)?,
            name: row.name,
        })
    }
}

impl TryFrom<ProposalRow> for PriceProposal {
    type Error = anyhow::Error;

    fn try_from(row: ProposalRow) -> Result<Self> {
        Ok(PriceProposal {
            id: parse_uuid(&row.id)?,
            negotiation_id: parse_uuid(&row.negotiation_id)?,
            seq: u32::try_from(row.seq).context("negative proposal seq")?,
            proposed_price: parse_decimal(&row.proposed_price)?,
            proposed_at: parse_ts(&row.proposed_at)?,
            status: row.status.parse()?,
        })
    }
}

impl NegotiationRow {
    pub fn into_negotiation(self, proposals: Vec<ProposalRow>) -> Result<Negotiation> {
        Ok(Negotiation {
            id: parse_uuid(&self.id)?,
            product_id: parse_uuid(&self.product_id)?,
            status: self.status.parse()?,
            created_at: parse_ts(&self.created_at)?,
            last_rejected_at: self.last_rejected_at.as_deref().map(parse_ts).transpose()?,
            proposals: proposals
                .into_iter()
                .map(PriceProposal::try_from)
                .collect::<Result<Vec<_>>>()?,
        })
    }
}
