//! Storage traits and error types
//!
//! This module defines the trait interface for book storage backends and
//! associated error types.

use crate::book::{Book, BookStatus};
use crate::storage::SiteSummary;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Book not found: {site}-{id}")]
    NotFound { site: String, id: i64 },

    #[error("Book {book} belongs to site {expected}")]
    WrongSite { book: String, expected: String },

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for book storage backends
///
/// One instance serves one site. Every version of a book is kept as its own
/// revision; lookups return the newest revision.
pub trait BookStorage {
    /// Gets the newest revision of a book, if any revision is stored
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Book>>;

    /// Gets the newest revision of every book, most recently updated first
    fn find_all(&self) -> StorageResult<Vec<Book>>;

    /// Gets every stored book id in ascending order
    fn find_all_ids(&self) -> StorageResult<Vec<i64>>;

    /// Gets the newest revision of every book in the given status
    fn list_by_status(&self, status: BookStatus) -> StorageResult<Vec<Book>>;

    /// Stores a new revision
    ///
    /// Creating a versioned revision supersedes the unversioned placeholder
    /// of the same book.
    fn create(&mut self, book: &Book) -> StorageResult<()>;

    /// Overwrites the stored revision matching `book.version`
    fn update(&mut self, book: &Book) -> StorageResult<()>;

    /// Records (or clears) the error of the newest revision
    fn save_error(&mut self, book: &Book, error: Option<&str>) -> StorageResult<()>;

    /// Computes the aggregate view used to seed explore ranges
    fn summary(&self) -> StorageResult<SiteSummary>;
}
