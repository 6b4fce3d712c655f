//! Book-Spider: a fiction-site crawl engine
//!
//! This crate tracks every book a fiction-hosting site publishes, keeps a
//! versioned record of each one, and downloads complete books as plain text
//! in chapter order.

pub mod book;
pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;
pub mod vendor;

use thiserror::Error;

/// Main error type for Book-Spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url} after {attempts} attempts")]
    TransientFetch { url: String, attempts: u32 },

    #[error("Failed to extract {field} from page")]
    Extraction { field: &'static str },

    #[error("Defective table of contents: {urls} chapter urls, {titles} chapter titles")]
    DefectiveToc { urls: usize, titles: usize },

    #[error("Incomplete download: {failed} chapters failed, {allowed} allowed")]
    IncompleteDownload { failed: usize, allowed: usize },

    #[error("Site {site} is not available")]
    Unavailable { site: String },

    #[error("Book {site}-{id} not found")]
    BookNotFound { site: String, id: i64 },

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task pool is closed")]
    PoolClosed,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL template in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern {name}: {message}")]
    InvalidPattern { name: String, message: String },
}

/// Result type alias for Book-Spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use book::{Book, BookStatus};
pub use config::Config;
pub use crawler::SiteService;
pub use storage::{SiteSummary, SqliteStorage};
