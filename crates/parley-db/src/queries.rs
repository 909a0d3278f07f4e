use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use parley_types::models::{Negotiation, NegotiationStatus, Product, User};

use crate::Database;
use crate::models::{NegotiationRow, ProductRow, ProposalRow, UserRow, format_ts};

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &User) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, full_name, email, password) VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.to_string(),
                    user.full_name,
                    user.email,
                    user.password_hash
                ],
            )?;
            Ok(())
        })
    }

    /// Case-insensitive lookup (the column is `COLLATE NOCASE`).
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, full_name, email, password FROM users WHERE email = ?1",
                    [email],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            full_name: row.get(1)?,
                            email: row.get(2)?,
                            password: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(User::try_from).transpose()
    }

    // -- Products --

    pub fn insert_product(&self, product: &Product) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO products (id, name, price) VALUES (?1, ?2, ?3)",
                params![
                    product.id.to_string(),
                    product.name,
                    product.price.to_string()
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_product_by_id(&self, id: Uuid) -> Result<Option<Product>> {
        self.query_product("SELECT id, name, price FROM products WHERE id = ?1", &id.to_string())
    }

    /// Exact, case-sensitive name match.
    pub fn get_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        self.query_product("SELECT id, name, price FROM products WHERE name = ?1", name)
    }

    fn query_product(&self, sql: &str, key: &str) -> Result<Option<Product>> {
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(sql, [key], product_row)
                .optional()?;
            Ok(row)
        })?;

        row.map(Product::try_from).transpose()
    }

    pub fn list_products(&self) -> Result<Vec<Product>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, price FROM products ORDER BY name")?;
            let rows = stmt
                .query_map([], product_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Returns false if no such product existed. Negotiations on the product
    /// go with it (`ON DELETE CASCADE`).
    pub fn delete_product(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM products WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }

    // -- Negotiations --

    pub fn insert_negotiation(&self, negotiation: &Negotiation) -> Result<()> {
        self.save_negotiation(negotiation)
    }

    /// Load a negotiation together with all of its proposals.
    pub fn load_negotiation(&self, id: Uuid) -> Result<Option<Negotiation>> {
        let loaded = self.with_conn(|conn| {
            let Some(row) = query_negotiation(conn, &id.to_string())? else {
                return Ok(None);
            };
            let proposals = query_proposals(conn, &row.id)?;
            Ok(Some((row, proposals)))
        })?;

        loaded
            .map(|(row, proposals)| row.into_negotiation(proposals))
            .transpose()
    }

    pub fn get_negotiation_status(&self, id: Uuid) -> Result<Option<NegotiationStatus>> {
        let status: Option<String> = self.with_conn(|conn| {
            let status = conn
                .query_row(
                    "SELECT status FROM negotiations WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(status)
        })?;

        Ok(status.map(|s| s.parse::<NegotiationStatus>()).transpose()?)
    }

    /// Write the whole aggregate in one transaction. The negotiation row is
    /// upserted and every proposal is inserted or has its mutable columns
    /// overwritten; the last save wins.
    pub fn save_negotiation(&self, negotiation: &Negotiation) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO negotiations (id, product_id, status, created_at, last_rejected_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    last_rejected_at = excluded.last_rejected_at",
                params![
                    negotiation.id.to_string(),
                    negotiation.product_id.to_string(),
                    negotiation.status.as_str(),
                    format_ts(&negotiation.created_at),
                    negotiation.last_rejected_at.as_ref().map(format_ts),
                ],
            )?;

            for p in &negotiation.proposals {
                tx.execute(
                    "INSERT INTO price_proposals
                        (id, negotiation_id, seq, proposed_price, proposed_at, status)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        proposed_price = excluded.proposed_price,
                        proposed_at = excluded.proposed_at,
                        status = excluded.status",
                    params![
                        p.id.to_string(),
                        negotiation.id.to_string(),
                        i64::from(p.seq),
                        p.proposed_price.to_string(),
                        format_ts(&p.proposed_at),
                        p.status.as_str(),
                    ],
                )?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Returns false if no such negotiation existed. Proposals cascade.
    pub fn delete_negotiation(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let affected =
                conn.execute("DELETE FROM negotiations WHERE id = ?1", [id.to_string()])?;
            Ok(affected > 0)
        })
    }
}

fn product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        price: row.get(2)?,
    })
}

fn query_negotiation(conn: &Connection, id: &str) -> Result<Option<NegotiationRow>> {
    let row = conn
        .query_row(
            "SELECT id, product_id, status, created_at, last_rejected_at
             FROM negotiations WHERE id = ?1",
            [id],
            |row| {
                Ok(NegotiationRow {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    status: row.get(2)?,
                    created_at: row.get(3)?,
                    last_rejected_at: row.get(4)?,
                })
            },
        )
        .optional()?;

    Ok(row)
}

fn query_proposals(conn: &Connection, negotiation_id: &str) -> Result<Vec<ProposalRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, negotiation_id, seq, proposed_price, proposed_at, status
         FROM price_proposals
         WHERE negotiation_id = ?1
         ORDER BY proposed_at, seq",
    )?;

    let rows = stmt
        .query_map([negotiation_id], |row| {
            Ok(ProposalRow {
                id: row.get(0)?,
                negotiation_id: row.get(1)?,
                seq: row.get(2)?,
                proposed_price: row.get(3)?,
                proposed_at: row.get(4)?,
                status: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;

    use parley_types::models::ProposalStatus;

    use super::*;

    fn product(name: &str, cents: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price: Decimal::new(cents, 2),
        }
    }

    #[test]
    fn product_lookup_by_id_and_name() {
        let db = Database::open_in_memory().unwrap();
        let lamp = product("Desk lamp", 4999);
        db.insert_product(&lamp).unwrap();

        assert_eq!(db.get_product_by_id(lamp.id).unwrap(), Some(lamp.clone()));
        assert_eq!(db.get_product_by_name("Desk lamp").unwrap(), Some(lamp));
        assert!(db.get_product_by_name("desk lamp").unwrap().is_none());
    }

    #[test]
    fn duplicate_product_name_violates_constraint() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&product("Chair", 1000)).unwrap();

        let err = db.insert_product(&product("Chair", 2000)).unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn foreign_key_failure_is_not_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        let orphan = Negotiation::start(Uuid::new_v4(), Utc::now());

        let err = db.save_negotiation(&orphan).unwrap_err();
        assert!(!crate::is_unique_violation(&err));
    }

    #[test]
    fn list_products_sorted_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.insert_product(&product("Zebra rug", 1)).unwrap();
        db.insert_product(&product("Armchair", 2)).unwrap();

        let names: Vec<String> = db.list_products().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Armchair", "Zebra rug"]);
    }

    #[test]
    fn negotiation_aggregate_survives_save_and_load() {
        let db = Database::open_in_memory().unwrap();
        let item = product("Bike", 30000);
        db.insert_product(&item).unwrap();

        // Whole seconds: stored timestamps keep microseconds only.
        let now = DateTime::parse_from_rfc3339("2025-06-01T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut neg = Negotiation::start(item.id, now);
        db.insert_negotiation(&neg).unwrap();

        neg.propose(Decimal::new(25000, 2), now + Duration::minutes(1)).unwrap();
        neg.reject(now + Duration::minutes(2)).unwrap();
        neg.propose(Decimal::new(27000, 2), now + Duration::minutes(3)).unwrap();
        db.save_negotiation(&neg).unwrap();

        let loaded = db.load_negotiation(neg.id).unwrap().unwrap();
        assert_eq!(loaded.proposals.len(), 2);
        assert_eq!(loaded.proposals[0].status, ProposalStatus::Rejected);
        assert_eq!(loaded.proposals[1].status, ProposalStatus::Pending);
        assert_eq!(loaded.proposals[1].proposed_price, Decimal::new(27000, 2));
        assert_eq!(loaded.last_rejected_at, neg.last_rejected_at);
        assert_eq!(
            db.get_negotiation_status(neg.id).unwrap(),
            Some(NegotiationStatus::Pending)
        );
    }

    #[test]
    fn deleting_product_cascades_to_negotiations() {
        let db = Database::open_in_memory().unwrap();
        let item = product("Kettle", 2500);
        db.insert_product(&item).unwrap();

        let mut neg = Negotiation::start(item.id, Utc::now());
        neg.propose(Decimal::new(2000, 2), Utc::now()).unwrap();
        db.save_negotiation(&neg).unwrap();

        assert!(db.delete_product(item.id).unwrap());
        assert!(db.load_negotiation(neg.id).unwrap().is_none());
        assert!(!db.delete_product(item.id).unwrap());
    }

    #[test]
    fn delete_negotiation_reports_absence() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.delete_negotiation(Uuid::new_v4()).unwrap());
        assert!(db.get_negotiation_status(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn email_lookup_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        let user = User {
            id: Uuid::new_v4(),
            full_name: "Ada Buyer".into(),
            email: "Ada@Example.com".into(),
            password_hash: "$argon2id$stub".into(),
        };
        db.create_user(&user).unwrap();

        let found = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
    }
}
