use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const SCHEMA_VERSION: i64 = 1;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE products (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL UNIQUE,
                price       TEXT NOT NULL
            );

            CREATE TABLE negotiations (
                id                TEXT PRIMARY KEY,
                product_id        TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                status            TEXT NOT NULL DEFAULT 'Pending',
                created_at        TEXT NOT NULL,
                last_rejected_at  TEXT
            );

            CREATE INDEX idx_negotiations_product
                ON negotiations(product_id);

            CREATE TABLE price_proposals (
                id              TEXT PRIMARY KEY,
                negotiation_id  TEXT NOT NULL REFERENCES negotiations(id) ON DELETE CASCADE,
                seq             INTEGER NOT NULL,
                proposed_price  TEXT NOT NULL,
                proposed_at     TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'Pending',
                UNIQUE(negotiation_id, seq)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }
}
