//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Book-Spider database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per revision of a book
CREATE TABLE IF NOT EXISTS books (
    site TEXT NOT NULL,
    id INTEGER NOT NULL,
    version INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    writer TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL DEFAULT '',
    last_update TEXT NOT NULL DEFAULT '',
    last_chapter TEXT NOT NULL DEFAULT '',
    is_end INTEGER NOT NULL DEFAULT 0,
    is_downloaded INTEGER NOT NULL DEFAULT 0,
    is_read INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (site, id, version)
);

CREATE INDEX IF NOT EXISTS idx_books_site_id ON books(site, id);
CREATE INDEX IF NOT EXISTS idx_books_error ON books(site, error);

-- Newest revision of every book
CREATE VIEW IF NOT EXISTS latest_books AS
SELECT b.* FROM books b
WHERE b.version = (
    SELECT MAX(i.version) FROM books i WHERE i.site = b.site AND i.id = b.id
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
