//! Crawl engine
//!
//! This module contains the core crawling logic, including:
//! - Single HTTP fetches and the retry/slow-down policy around them
//! - A reusable bounded task pool
//! - The explore/update orchestrator and the book state machine entry point
//! - The chapter fetch-and-reassembly pipeline

mod chapters;
mod explore;
mod fetcher;
mod pool;
mod retry;
mod service;
mod throttle;

pub use chapters::{allowed_failures, ChapterPipeline, DownloadReport};
pub use explore::{ExploreReport, FailureStreak};
pub use fetcher::{build_http_client, FetchOutcome, Fetcher};
pub use pool::{Reservation, TaskBatch, TaskPool};
pub use retry::{Fetched, RetryPolicy};
pub use service::{CrawlContext, PassReport, SiteService};
pub use throttle::{SlowRequest, SLOW_REQUEST_PAUSE};

use crate::config::Config;
use crate::SpiderError;

/// Builds one service per configured site, all sharing `context`
///
/// When `only` names a site, just that site is opened. Every site opens its
/// own connection to the configured database.
pub fn load_services(
    config: &Config,
    context: &CrawlContext,
    only: Option<&str>,
) -> Result<Vec<SiteService>, SpiderError> {
    if let Some(name) = only {
        if config.site(name).is_none() {
            return Err(SpiderError::UnknownSite(name.to_string()));
        }
    }

    config
        .sites
        .iter()
        .filter(|site| only.map_or(true, |name| site.name == name))
        .map(|site| {
            tracing::debug!(site = %site.name, "opening site");
            SiteService::from_config(site, &config.database.path, context)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, BatchConfig};
    use tempfile::TempDir;

    fn site_block(name: &str) -> String {
        format!(
            r#"
[[site]]
name = "{name}"
storage = "./library/{name}"
book-url = "https://{name}.example/book/{{id}}.html"
toc-url = "https://{name}.example/read/{{id}}/"
chapter-url = "https://{name}.example{{path}}"

[site.patterns]
title = '<h1>(.*?)</h1>'
writer = 'writer: (.*?)<'
category = 'category: (.*?)<'
last-update = 'updated: (.*?)<'
last-chapter = 'latest: (.*?)<'
chapter-url = '<a href="(.*?)">'
chapter-title = '<a href=".*?">(.*?)</a>'
chapter-content = '<div id="content">(.*?)</div>'
"#
        )
    }

    fn config(dir: &TempDir) -> Config {
        let content = format!(
            "[database]\npath = {:?}\n{}{}",
            dir.path().join("books.db").display().to_string(),
            site_block("alpha"),
            site_block("beta")
        );
        parse_config(&content).unwrap()
    }

    #[tokio::test]
    async fn test_load_services() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let context = CrawlContext::new(&BatchConfig::default()).unwrap();

        let services = load_services(&config, &context, None).unwrap();
        let names: Vec<&str> = services.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        let only = load_services(&config, &context, Some("beta")).unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name(), "beta");
    }

    #[tokio::test]
    async fn test_load_unknown_site() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let context = CrawlContext::new(&BatchConfig::default()).unwrap();

        let result = load_services(&config, &context, Some("gamma"));
        assert!(matches!(result, Err(SpiderError::UnknownSite(name)) if name == "gamma"));
    }
}
