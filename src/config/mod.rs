//! Configuration module for Book-Spider
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use book_spider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Shared worker pool: {}", config.batch.max_working_threads);
//! ```

mod parser;
mod types;
pub(crate) mod validation;

// Re-export types
pub use types::{BatchConfig, Config, DatabaseConfig, PatternConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
