//! Integration tests for the chapter pipeline and the download passes

mod common;

use book_spider::config::BatchConfig;
use book_spider::crawler::{CrawlContext, SLOW_REQUEST_PAUSE};
use book_spider::output::{FAILED_CHAPTER, SEPARATOR};
use book_spider::SpiderError;
use common::*;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chapter_links(count: usize) -> Vec<(String, String)> {
    (1..=count)
        .map(|i| (format!("/c/{}.html", i), format!("Chapter {}", i)))
        .collect()
}

/// Mounts a table of contents for book 1 and one page per chapter
///
/// Chapters listed in `broken` answer 404.
async fn mount_book(server: &MockServer, count: usize, broken: &[usize]) {
    mount_page(server, "/toc/1/", toc_page(&chapter_links(count))).await;
    for i in 1..=count {
        if broken.contains(&i) {
            continue;
        }
        mount_page(server, &format!("/c/{}.html", i), chapter_page(&format!("content {}", i))).await;
    }
}

fn expected_text(count: usize, failed: &[usize]) -> String {
    let mut text = format!("Title\nWriter\n{}\n\n", SEPARATOR);
    for i in 1..=count {
        let content = if failed.contains(&i) {
            FAILED_CHAPTER.to_string()
        } else {
            format!("content {}", i)
        };
        text.push_str(&format!("Chapter {}\n{}\n{}\n\n", i, SEPARATOR, content));
    }
    text
}

fn ended_book() -> book_spider::Book {
    let mut book = stored_book(1, "Title", "Chapter 12 THE END");
    book.is_end = true;
    book
}

#[tokio::test]
async fn test_chapters_are_written_in_toc_order() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = service(&server, dir.path(), 2, &batch_config(4));

    let count = 12;
    mount_page(&server, "/toc/1/", toc_page(&chapter_links(count))).await;
    // earlier chapters answer later
    for i in 1..=count {
        let delay = Duration::from_millis(((count - i) * 20) as u64 + (i % 3) as u64 * 7);
        Mock::given(method("GET"))
            .and(path(format!("/c/{}.html", i)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(chapter_page(&format!("content {}", i)))
                    .set_delay(delay),
            )
            .mount(&server)
            .await;
    }

    let mut book = ended_book();
    seed(&service, &book);
    let report = service.download_book(&mut book).await.unwrap();

    assert_eq!(report.chapters, count);
    assert_eq!(report.failed, 0);
    assert_eq!(report.path, dir.path().join("1.txt"));

    let text = std::fs::read_to_string(&report.path).unwrap();
    assert_eq!(text, expected_text(count, &[]));
    assert!(service.find_book(1).unwrap().is_downloaded);
}

#[tokio::test]
async fn test_defective_toc_makes_no_chapter_requests() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = service(&server, dir.path(), 2, &batch_config(4));

    // 20 urls, the last entry has no closing tag so only 19 titles match
    let mut toc = String::from("<html><ul>\n");
    for i in 1..=19 {
        toc.push_str(&format!("<li><a href=\"/c/{0}.html\">Chapter {0}</a></li>\n", i));
    }
    toc.push_str("<li><a href=\"/c/20.html\">Chapter 20</li>\n</ul></html>");
    mount_page(&server, "/toc/1/", toc).await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/c/.*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut book = ended_book();
    seed(&service, &book);
    let result = service.download_book(&mut book).await;

    assert!(matches!(
        result,
        Err(SpiderError::DefectiveToc { urls: 20, titles: 19 })
    ));
    assert!(!dir.path().join("1.txt").exists());
    assert!(!service.find_book(1).unwrap().is_downloaded);
}

#[tokio::test]
async fn test_incomplete_download_leaves_no_file() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = service(&server, dir.path(), 2, &batch_config(4));

    // 20 chapters tolerate 2 failures
    mount_book(&server, 20, &[3, 9, 17]).await;

    let mut book = ended_book();
    seed(&service, &book);
    let result = service.download_book(&mut book).await;

    assert!(matches!(
        result,
        Err(SpiderError::IncompleteDownload { failed: 3, allowed: 2 })
    ));
    assert!(!dir.path().join("1.txt").exists());
    assert!(!service.find_book(1).unwrap().is_downloaded);
}

#[tokio::test]
async fn test_tolerated_failures_are_marked() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = service(&server, dir.path(), 2, &batch_config(4));

    mount_book(&server, 20, &[5, 11]).await;

    let mut book = ended_book();
    seed(&service, &book);
    let report = service.download_book(&mut book).await.unwrap();

    assert_eq!(report.failed, 2);
    let text = std::fs::read_to_string(&report.path).unwrap();
    assert_eq!(text, expected_text(20, &[5, 11]));
}

#[tokio::test]
async fn test_download_pass_and_download_status_patch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let library = dir.path().join("library");
    let service = service(&server, &library, 2, &batch_config(4));

    mount_book(&server, 3, &[]).await;

    seed(&service, &ended_book());
    // in progress: not part of the download pass
    seed(&service, &stored_book(2, "Ongoing", "Chapter 3"));

    let report = service.download().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert!(library.join("1.txt").exists());
    assert!(service.find_book(1).unwrap().is_downloaded);

    // nothing left to download
    assert_eq!(service.download().await.unwrap().total(), 0);

    // file of book 1 lost, file of book 2 appeared
    std::fs::remove_file(library.join("1.txt")).unwrap();
    std::fs::write(library.join("2.txt"), "text").unwrap();

    assert_eq!(service.patch_download_status().await.unwrap(), 2);
    assert!(!service.find_book(1).unwrap().is_downloaded);
    assert!(service.find_book(2).unwrap().is_downloaded);

    assert_eq!(service.patch_download_status().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unreachable_toc_is_a_transient_failure() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let service = service(&server, dir.path(), 2, &batch_config(4));

    let mut book = ended_book();
    seed(&service, &book);
    let result = service.download_book(&mut book).await;

    assert!(matches!(
        result,
        Err(SpiderError::TransientFetch { attempts: 2, .. })
    ));
}

#[tokio::test]
async fn test_raised_flag_slows_chapter_dispatch() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let batch = BatchConfig {
        slow_request_secs: 3,
        ..batch_config(4)
    };
    let context = CrawlContext::new(&batch).unwrap();
    let service = service_in(&server, dir.path(), 2, &context);

    mount_book(&server, 5, &[]).await;
    let mut book = ended_book();
    seed(&service, &book);

    context.throttle().raise();
    let start = Instant::now();
    let report = service.download_book(&mut book).await.unwrap();

    assert_eq!(report.failed, 0);
    // the flag is up for the toc request and at least the first two chapters
    assert!(start.elapsed() >= SLOW_REQUEST_PAUSE * 3);
    assert_eq!(
        std::fs::read_to_string(&report.path).unwrap(),
        expected_text(5, &[])
    );
}
