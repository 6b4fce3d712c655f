//! Book model and revision tracking
//!
//! A book is identified by `(site, id)`. Its `version` counts content
//! revisions: it starts at -1 before the first successful parse and only
//! moves forward when [`Book::apply_fields`] decides that the freshly fetched
//! page represents a new revision.

mod status;

pub use status::BookStatus;

use std::fmt;
use std::path::{Path, PathBuf};

/// Version of a book that was never parsed successfully
pub const UNSET_VERSION: i64 = -1;

/// A tracked work on a fiction site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub site: String,
    pub id: i64,
    pub version: i64,
    pub title: String,
    pub writer: String,
    pub category: String,
    pub last_update: String,
    pub last_chapter: String,
    pub is_end: bool,
    pub is_downloaded: bool,
    pub is_read: bool,
    pub error: Option<String>,
}

/// The five fields extracted from a book's detail page
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookFields {
    pub title: String,
    pub writer: String,
    pub category: String,
    pub last_update: String,
    pub last_chapter: String,
}

impl Book {
    /// Creates an unversioned record for a newly probed id
    pub fn new(site: impl Into<String>, id: i64) -> Self {
        Self {
            site: site.into(),
            id,
            version: UNSET_VERSION,
            title: String::new(),
            writer: String::new(),
            category: String::new(),
            last_update: String::new(),
            last_chapter: String::new(),
            is_end: false,
            is_downloaded: false,
            is_read: false,
            error: None,
        }
    }

    /// Whether the book was ever parsed successfully
    pub fn is_versioned(&self) -> bool {
        self.version > UNSET_VERSION
    }

    pub fn status(&self) -> BookStatus {
        if self.error.is_some() {
            BookStatus::Error
        } else if self.is_end {
            BookStatus::End
        } else {
            BookStatus::InProgress
        }
    }

    /// Applies freshly extracted fields to the record
    ///
    /// Returns true iff the stored fields were synced. A sync bumps the
    /// version (and clears the end/download/read flags) when the book was
    /// already downloaded, when title/writer/category changed, or when the
    /// book was never versioned. Any other difference, e.g. only the last
    /// chapter moved, is synced in place under the current version.
    pub fn apply_fields(&mut self, fields: BookFields) -> bool {
        let identity_changed = fields.title != self.title
            || fields.writer != self.writer
            || fields.category != self.category;
        let changed = identity_changed
            || fields.last_update != self.last_update
            || fields.last_chapter != self.last_chapter;

        if !changed {
            return false;
        }

        if self.is_downloaded || identity_changed || !self.is_versioned() {
            if self.is_downloaded {
                tracing::debug!(book = %self, "downloaded book has a new revision");
            }
            self.version += 1;
            self.is_end = false;
            self.is_downloaded = false;
            self.is_read = false;
        }

        self.title = fields.title;
        self.writer = fields.writer;
        self.category = fields.category;
        self.last_update = fields.last_update;
        self.last_chapter = fields.last_chapter;

        true
    }

    /// Name of the downloaded text file: `<id>.txt` for the first revision,
    /// `<id>-v<version>.txt` afterwards
    pub fn file_name(&self) -> String {
        if self.version > 0 {
            format!("{}-v{}.txt", self.id, self.version)
        } else {
            format!("{}.txt", self.id)
        }
    }

    pub fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-v{}", self.site, self.id, self.version)
    }
}
