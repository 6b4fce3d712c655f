//! Storage module for persisting book records
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Book revision persistence and error recording
//! - Site summaries used to seed explore ranges

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{BookStorage, StorageError, StorageResult};

use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared by concurrent crawl workers
///
/// The lock is only held for the duration of a single storage call.
pub type SharedStorage = Arc<Mutex<dyn BookStorage + Send>>;

/// Wraps a storage backend for sharing between workers
pub fn share<S: BookStorage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn BookStorage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// Aggregate view over a site's stored books
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteSummary {
    /// Number of distinct books
    pub book_count: u64,

    /// Books whose newest revision carries an error
    pub error_count: u64,

    /// Healthy books marked as ended
    pub end_count: u64,

    /// Books whose newest revision is downloaded
    pub downloaded_count: u64,

    /// Highest stored id (0 when empty)
    pub max_book_id: i64,

    /// Highest id whose newest revision has no error (0 when none)
    pub latest_success_id: i64,
}
