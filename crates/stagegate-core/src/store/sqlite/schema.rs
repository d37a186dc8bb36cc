//! SQLite schema for the document tree.
//!
//! - `documents` holds one JSON body per owner-level document, keyed by the
//!   first three path segments (`{root}/{collection}/{code}`)
//! - `store_meta` records the schema version alongside `PRAGMA user_version`

/// Migration v1: document table plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    root TEXT NOT NULL,
    collection TEXT NOT NULL,
    code TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (root, collection, code)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST(strftime('%s', 'now') AS INTEGER) * 1000000);
";

/// Migration v2: recency index for exports and operator inspection.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_updated
    ON documents(updated_at_us DESC);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &["idx_documents_updated"];

#[cfg(test)]
mod tests {
    use crate::store::sqlite::migrations;
    use rusqlite::Connection;

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(3))?;
        rows.collect()
    }

    #[test]
    fn collection_scan_uses_primary_key() -> rusqlite::Result<()> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        let details = query_plan_details(
            &conn,
            "SELECT code, body FROM documents WHERE root = 'xoxo' AND collection = 'orders'",
        )?;
        assert!(
            details
                .iter()
                .any(|detail| detail.contains("sqlite_autoindex_documents_1")),
            "expected primary key lookup, got {details:?}"
        );
        Ok(())
    }
}
