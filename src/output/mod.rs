//! Output module for downloaded books and reports
//!
//! This module handles:
//! - Writing downloaded books as plain text
//! - Formatting site statistics

pub mod stats;
mod text;

pub use stats::{format_statistics, print_statistics, SiteStatistics};
pub use text::{TextBookWriter, FAILED_CHAPTER, SEPARATOR};
