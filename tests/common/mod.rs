//! Shared fixtures for the integration tests
//!
//! Every test talks to a wiremock server laid out like a small fiction site:
//! `/book/<id>` detail pages, `/toc/<id>/` tables of contents and chapter
//! pages anywhere below.

#![allow(dead_code)]

use book_spider::config::{BatchConfig, PatternConfig, SiteConfig};
use book_spider::crawler::{CrawlContext, SiteService};
use book_spider::storage::{self, SharedStorage, SqliteStorage};
use book_spider::vendor::{RegexVendor, Vendor};
use book_spider::Book;
use std::path::Path;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SITE: &str = "mock";

/// Fast retry settings: two attempts per url, millisecond backoff
pub fn batch_config(pool_size: usize) -> BatchConfig {
    BatchConfig {
        max_working_threads: pool_size,
        max_chapter_threads: 8,
        const_sleep_ms: 1,
        max_attempts: 1,
        max_rate_limited_attempts: 1,
        ..BatchConfig::default()
    }
}

pub fn site_config(base: &str, storage: &Path, max_explore_error: usize) -> SiteConfig {
    SiteConfig {
        name: SITE.to_string(),
        max_explore_error,
        storage: storage.to_path_buf(),
        charset: None,
        book_url: format!("{}/book/{{id}}", base),
        toc_url: format!("{}/toc/{{id}}/", base),
        chapter_url: format!("{}{{path}}", base),
        availability_url: None,
        end_keywords: vec!["THE END".to_string()],
        patterns: PatternConfig {
            title: "<h1>(.*?)</h1>".to_string(),
            writer: "<p class=\"writer\">(.*?)</p>".to_string(),
            category: "<p class=\"category\">(.*?)</p>".to_string(),
            last_update: "<p class=\"update\">(.*?)</p>".to_string(),
            last_chapter: "<p class=\"last\">(.*?)</p>".to_string(),
            chapter_url: r#"<li><a href="(.*?)">"#.to_string(),
            chapter_title: r#"<li><a href=".*?">(.*?)</a>"#.to_string(),
            chapter_content: r#"(?s)<div id="content">(.*?)</div>"#.to_string(),
            available: None,
        },
    }
}

/// A service over an in-memory database
pub fn service(
    server: &MockServer,
    storage_dir: &Path,
    max_explore_error: usize,
    batch: &BatchConfig,
) -> SiteService {
    let context = CrawlContext::new(batch).unwrap();
    service_in(server, storage_dir, max_explore_error, &context)
}

/// A service over an in-memory database, sharing an existing context
pub fn service_in(
    server: &MockServer,
    storage_dir: &Path,
    max_explore_error: usize,
    context: &CrawlContext,
) -> SiteService {
    let site = site_config(&server.uri(), storage_dir, max_explore_error);
    service_for_site(&site, context)
}

/// A service over an in-memory database for a customized site
pub fn service_for_site(site: &SiteConfig, context: &CrawlContext) -> SiteService {
    let vendor: Arc<dyn Vendor> = Arc::new(RegexVendor::from_config(site).unwrap());
    let storage: SharedStorage = storage::share(SqliteStorage::open_in_memory(SITE).unwrap());
    SiteService::new(site, vendor, storage, context)
}

pub fn detail_page(title: &str, writer: &str, last_chapter: &str) -> String {
    format!(
        "<html><h1>{}</h1><p class=\"writer\">{}</p><p class=\"category\">Fantasy</p>\
         <p class=\"update\">2024-05-01</p><p class=\"last\">{}</p></html>",
        title, writer, last_chapter
    )
}

pub fn toc_page(links: &[(String, String)]) -> String {
    let items: String = links
        .iter()
        .map(|(url, title)| format!("<li><a href=\"{}\">{}</a></li>\n", url, title))
        .collect();
    format!("<html><ul>\n{}</ul></html>", items)
}

pub fn chapter_page(content: &str) -> String {
    format!("<html><div id=\"content\">{}</div></html>", content)
}

pub async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub async fn mount_detail(server: &MockServer, id: i64, title: &str, last_chapter: &str) {
    mount_page(
        server,
        &format!("/book/{}", id),
        detail_page(title, "Writer", last_chapter),
    )
    .await;
}

/// A parsed, healthy book as stored after its first successful probe
pub fn stored_book(id: i64, title: &str, last_chapter: &str) -> Book {
    let mut book = Book::new(SITE, id);
    book.version = 0;
    book.title = title.to_string();
    book.writer = "Writer".to_string();
    book.category = "Fantasy".to_string();
    book.last_update = "2024-05-01".to_string();
    book.last_chapter = last_chapter.to_string();
    book
}

pub fn seed(service: &SiteService, book: &Book) {
    storage::lock(service.storage())
        .unwrap()
        .create(book)
        .unwrap();
}

pub fn seed_error(service: &SiteService, book: &Book, error: &str) {
    let mut store = storage::lock(service.storage()).unwrap();
    store.create(book).unwrap();
    store.save_error(book, Some(error)).unwrap();
}
