//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the BookStorage trait.

use crate::book::{Book, BookStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BookStorage, StorageError, StorageResult};
use crate::storage::SiteSummary;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const BOOK_COLUMNS: &str = "site, id, version, title, writer, category, last_update, \
     last_chapter, is_end, is_downloaded, is_read, error";

/// SQLite storage backend scoped to one site
pub struct SqliteStorage {
    conn: Connection,
    site: String,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` for the given site
    ///
    /// Several sites can open the same database file; each gets its own
    /// connection.
    pub fn open(path: &Path, site: &str) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for concurrent site connections
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            site: site.to_string(),
        })
    }

    /// Creates an in-memory database (for testing and dry runs)
    pub fn open_in_memory(site: &str) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn,
            site: site.to_string(),
        })
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    fn check_site(&self, book: &Book) -> StorageResult<()> {
        if book.site != self.site {
            return Err(StorageError::WrongSite {
                book: book.to_string(),
                expected: self.site.clone(),
            });
        }
        Ok(())
    }

    fn query_books(&self, filter: &str) -> StorageResult<Vec<Book>> {
        let sql = format!(
            "SELECT {} FROM latest_books WHERE site = ?1 {}",
            BOOK_COLUMNS, filter
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let books = stmt
            .query_map(params![self.site], book_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(books)
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        site: row.get(0)?,
        id: row.get(1)?,
        version: row.get(2)?,
        title: row.get(3)?,
        writer: row.get(4)?,
        category: row.get(5)?,
        last_update: row.get(6)?,
        last_chapter: row.get(7)?,
        is_end: row.get(8)?,
        is_downloaded: row.get(9)?,
        is_read: row.get(10)?,
        error: row.get(11)?,
    })
}

impl BookStorage for SqliteStorage {
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Book>> {
        let sql = format!(
            "SELECT {} FROM latest_books WHERE site = ?1 AND id = ?2",
            BOOK_COLUMNS
        );

        let book = self
            .conn
            .query_row(&sql, params![self.site, id], book_from_row)
            .optional()?;

        Ok(book)
    }

    fn find_all(&self) -> StorageResult<Vec<Book>> {
        self.query_books("ORDER BY updated_at DESC, id ASC")
    }

    fn find_all_ids(&self) -> StorageResult<Vec<i64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT id FROM books WHERE site = ?1 ORDER BY id ASC")?;

        let ids = stmt
            .query_map(params![self.site], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids)
    }

    fn list_by_status(&self, status: BookStatus) -> StorageResult<Vec<Book>> {
        let filter = match status {
            BookStatus::Error => "AND error IS NOT NULL ORDER BY id ASC",
            BookStatus::End => "AND error IS NULL AND is_end = 1 ORDER BY id ASC",
            BookStatus::InProgress => "AND error IS NULL AND is_end = 0 ORDER BY id ASC",
        };
        self.query_books(filter)
    }

    fn create(&mut self, book: &Book) -> StorageResult<()> {
        self.check_site(book)?;

        let tx = self.conn.transaction()?;
        if book.version >= 0 {
            tx.execute(
                "DELETE FROM books WHERE site = ?1 AND id = ?2 AND version < 0",
                params![book.site, book.id],
            )?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO books
             (site, id, version, title, writer, category, last_update, last_chapter,
              is_end, is_downloaded, is_read, error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                book.site,
                book.id,
                book.version,
                book.title,
                book.writer,
                book.category,
                book.last_update,
                book.last_chapter,
                book.is_end,
                book.is_downloaded,
                book.is_read,
                book.error,
                Utc::now().to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        Ok(())
    }

    fn update(&mut self, book: &Book) -> StorageResult<()> {
        self.check_site(book)?;

        let changed = self.conn.execute(
            "UPDATE books SET title = ?1, writer = ?2, category = ?3, last_update = ?4,
             last_chapter = ?5, is_end = ?6, is_downloaded = ?7, is_read = ?8, error = ?9,
             updated_at = ?10
             WHERE site = ?11 AND id = ?12 AND version = ?13",
            params![
                book.title,
                book.writer,
                book.category,
                book.last_update,
                book.last_chapter,
                book.is_end,
                book.is_downloaded,
                book.is_read,
                book.error,
                Utc::now().to_rfc3339(),
                book.site,
                book.id,
                book.version,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound {
                site: book.site.clone(),
                id: book.id,
            });
        }

        Ok(())
    }

    fn save_error(&mut self, book: &Book, error: Option<&str>) -> StorageResult<()> {
        self.check_site(book)?;

        let changed = self.conn.execute(
            "UPDATE books SET error = ?1, updated_at = ?2
             WHERE site = ?3 AND id = ?4
             AND version = (SELECT MAX(version) FROM books WHERE site = ?3 AND id = ?4)",
            params![error, Utc::now().to_rfc3339(), book.site, book.id],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound {
                site: book.site.clone(),
                id: book.id,
            });
        }

        Ok(())
    }

    fn summary(&self) -> StorageResult<SiteSummary> {
        let summary = self.conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN error IS NOT NULL THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN error IS NULL AND is_end = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_downloaded = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(MAX(id), 0),
                COALESCE(MAX(CASE WHEN error IS NULL THEN id END), 0)
             FROM latest_books WHERE site = ?1",
            params![self.site],
            |row| {
                Ok(SiteSummary {
                    book_count: row.get::<_, i64>(0)? as u64,
                    error_count: row.get::<_, i64>(1)? as u64,
                    end_count: row.get::<_, i64>(2)? as u64,
                    downloaded_count: row.get::<_, i64>(3)? as u64,
                    max_book_id: row.get(4)?,
                    latest_success_id: row.get(5)?,
                })
            },
        )?;

        Ok(summary)
    }
}
