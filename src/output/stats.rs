//! Statistics display for stored sites
//!
//! This module turns the storage layer's `SiteSummary` into the report
//! printed by the `stats` command.

use crate::book::BookStatus;
use crate::storage::SiteSummary;
use std::fmt::Write;

/// Statistics of one site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteStatistics {
    pub site: String,
    pub summary: SiteSummary,
}

impl SiteStatistics {
    pub fn new(site: impl Into<String>, summary: SiteSummary) -> Self {
        Self {
            site: site.into(),
            summary,
        }
    }

    /// Number of books currently in the given status
    pub fn count(&self, status: BookStatus) -> u64 {
        let summary = &self.summary;
        match status {
            BookStatus::Error => summary.error_count,
            BookStatus::End => summary.end_count,
            BookStatus::InProgress => summary
                .book_count
                .saturating_sub(summary.error_count + summary.end_count),
        }
    }

    /// Percentage of books whose newest revision has no error
    pub fn success_rate(&self) -> f64 {
        let total = self.summary.book_count;
        if total == 0 {
            return 0.0;
        }
        (total - self.summary.error_count.min(total)) as f64 / total as f64 * 100.0
    }
}

/// Formats statistics as a plain-text report
pub fn format_statistics(stats: &SiteStatistics) -> String {
    let summary = &stats.summary;
    let mut report = String::new();

    let _ = writeln!(report, "=== {} ===\n", stats.site);

    let _ = writeln!(report, "Overview:");
    let _ = writeln!(report, "  Books tracked: {}", summary.book_count);
    let _ = writeln!(report, "  Highest id: {}", summary.max_book_id);
    let _ = writeln!(report, "  Latest healthy id: {}", summary.latest_success_id);
    let _ = writeln!(report, "  Downloaded: {}", summary.downloaded_count);
    let _ = writeln!(report);

    let _ = writeln!(report, "Books by Status:");
    for status in BookStatus::all_statuses() {
        let count = stats.count(status);
        let percentage = if summary.book_count > 0 {
            count as f64 / summary.book_count as f64 * 100.0
        } else {
            0.0
        };
        let _ = writeln!(report, "  {}: {} ({:.1}%)", status, count, percentage);
    }
    let _ = writeln!(report);

    let _ = writeln!(
        report,
        "Success Rate: {:.1}% ({} / {} books without errors)",
        stats.success_rate(),
        summary.book_count - summary.error_count.min(summary.book_count),
        summary.book_count
    );

    report
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &SiteStatistics) {
    println!("{}", format_statistics(stats));
}
