//! Chapter fetch-and-reassembly pipeline
//!
//! Downloads every chapter of a book concurrently, then writes them in the
//! order of the table of contents:
//!
//! 1. Fetch the table of contents and extract the chapter list. A defective
//!    list aborts before any chapter request is made.
//! 2. Dispatch one task per chapter through the task pool. Each task pushes
//!    `(position, content)` onto an unbounded completion channel.
//! 3. Drain the channel every [`DRAIN_INTERVAL`] dispatches, and once more
//!    after the join barrier.
//! 4. Walk the chapter list in table-of-contents order and write each chapter.
//!    A failed chapter is written as [`FAILED_CHAPTER`].
//! 5. Discard the file if too many chapters failed.
//!
//! Every request, the table of contents included, waits out the slow-request
//! flag before it is dispatched.

use crate::book::Book;
use crate::crawler::pool::TaskPool;
use crate::crawler::retry::RetryPolicy;
use crate::output::{TextBookWriter, FAILED_CHAPTER};
use crate::vendor::{ChapterLink, Vendor};
use crate::SpiderError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Dispatches between two drains of the completion channel
pub const DRAIN_INTERVAL: usize = 100;

/// Upper bound on tolerated chapter failures, whatever the book size
pub const MAX_FAILED_CHAPTERS: usize = 50;

/// Chapter failures tolerated for a book of `chapters` chapters
pub fn allowed_failures(chapters: usize) -> usize {
    MAX_FAILED_CHAPTERS.min(chapters / 10)
}

/// Result of a completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub chapters: usize,
    pub failed: usize,
}

/// Result slot of one chapter: `None` until its task reports
type Slot = Option<Option<String>>;

/// Downloads books of one site
#[derive(Clone)]
pub struct ChapterPipeline {
    vendor: Arc<dyn Vendor>,
    retry: RetryPolicy,
    pool: TaskPool,
    charset: Option<String>,
}

impl ChapterPipeline {
    pub fn new(
        vendor: Arc<dyn Vendor>,
        retry: RetryPolicy,
        pool: TaskPool,
        charset: Option<String>,
    ) -> Self {
        Self {
            vendor,
            retry,
            pool,
            charset,
        }
    }

    /// Downloads `book` into `dir` as [`Book::file_name`]
    ///
    /// On failure no file is left behind.
    pub async fn download(&self, book: &Book, dir: &Path) -> Result<DownloadReport, SpiderError> {
        let toc_url = self.vendor.toc_url(book.id);
        self.retry.throttle().pause_if_raised().await;
        let toc = self
            .retry
            .fetch_with_retry(&toc_url, self.charset.as_deref())
            .await
            .into_html(&toc_url)?;

        let links = match self.vendor.parse_chapter_list(&toc) {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(book = %book, error = %e, "defective table of contents");
                return Err(e);
            }
        };
        let total = links.len();
        tracing::info!(book = %book, chapters = total, "downloading chapters");

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Option<String>)>();
        let mut slots: Vec<Slot> = vec![None; total];
        let mut batch = self.pool.batch::<()>();

        for (position, link) in links.iter().enumerate() {
            let url = self.vendor.chapter_url(&toc_url, &link.url);
            let vendor = Arc::clone(&self.vendor);
            let retry = self.retry.clone();
            let charset = self.charset.clone();
            let tx = tx.clone();

            self.retry.throttle().pause_if_raised().await;
            batch
                .spawn(async move {
                    let fetched = retry.fetch_with_retry(&url, charset.as_deref()).await;
                    let content = if fetched.html.is_empty() {
                        tracing::debug!(url = %url, attempts = fetched.attempts, "chapter fetch failed");
                        None
                    } else {
                        vendor.parse_chapter(&fetched.html)
                    };
                    // receiver outlives every task
                    let _ = tx.send((position, content));
                })
                .await?;

            if (position + 1) % DRAIN_INTERVAL == 0 {
                while let Ok(result) = rx.try_recv() {
                    store(&mut slots, result);
                }
            }
        }

        batch.join().await;
        drop(tx);
        while let Some(result) = rx.recv().await {
            store(&mut slots, result);
        }

        let path = book.file_path(dir);
        let failed = match write_book(&path, book, &links, slots) {
            Ok(failed) => failed,
            Err(e) => {
                let _ = std::fs::remove_file(&path);
                return Err(e.into());
            }
        };

        let allowed = allowed_failures(total);
        if failed > allowed {
            tracing::warn!(book = %book, failed, allowed, "too many failed chapters, discarding download");
            std::fs::remove_file(&path)?;
            return Err(SpiderError::IncompleteDownload { failed, allowed });
        }
        tracing::info!(book = %book, path = %path.display(), failed, "download complete");

        Ok(DownloadReport {
            path,
            chapters: total,
            failed,
        })
    }
}

/// Writes the chapters in list order; returns the number of failed chapters
fn write_book(path: &Path, book: &Book, links: &[ChapterLink], slots: Vec<Slot>) -> io::Result<usize> {
    let mut writer = TextBookWriter::create(path, &book.title, &book.writer)?;
    let mut failed = 0;

    for (link, slot) in links.iter().zip(slots) {
        match slot {
            Some(Some(content)) => writer.write_chapter(&link.title, &content)?,
            Some(None) => {
                failed += 1;
                writer.write_chapter(&link.title, FAILED_CHAPTER)?;
            }
            None => {
                tracing::warn!(book = %book, chapter = %link.title, "no result for chapter, skipping");
            }
        }
    }

    writer.finish()?;
    Ok(failed)
}

fn store(slots: &mut [Slot], (position, content): (usize, Option<String>)) {
    if let Some(slot) = slots.get_mut(position) {
        *slot = Some(content);
    }
}
