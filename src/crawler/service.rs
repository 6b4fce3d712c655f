//! Per-site crawl service
//!
//! `SiteService` wires a site's vendor, its storage and the shared crawl
//! context together. It owns the book state machine entry point
//! ([`SiteService::update_book`]), probe persistence, downloads and the
//! maintenance passes. The explore/update passes live in `explore.rs`.

use crate::book::{Book, BookStatus};
use crate::config::{BatchConfig, SiteConfig};
use crate::crawler::chapters::{ChapterPipeline, DownloadReport};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::pool::TaskPool;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::throttle::SlowRequest;
use crate::storage::{self, SharedStorage, SiteSummary, SqliteStorage};
use crate::vendor::{RegexVendor, Vendor};
use crate::SpiderError;
use std::path::Path;
use std::sync::Arc;

/// Network and concurrency resources shared by every site
#[derive(Debug, Clone)]
pub struct CrawlContext {
    retry: RetryPolicy,
    pool: TaskPool,
    chapter_threads: usize,
}

impl CrawlContext {
    /// Builds the HTTP client, slow-request flag and shared token pool
    pub fn new(batch: &BatchConfig) -> Result<Self, SpiderError> {
        let client = build_http_client(batch)?;
        let throttle = SlowRequest::new(batch.slow_request_window());
        let retry = RetryPolicy::new(Fetcher::new(client), throttle, batch);

        Ok(Self {
            retry,
            pool: TaskPool::new(batch.max_working_threads),
            chapter_threads: batch.max_chapter_threads,
        })
    }

    pub fn throttle(&self) -> &SlowRequest {
        self.retry.throttle()
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }
}

/// Counts of one pass over a set of books
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl PassReport {
    pub fn from_outcomes(outcomes: &[bool]) -> Self {
        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Crawl engine of one site
#[derive(Clone)]
pub struct SiteService {
    pub(super) site: Arc<SiteConfig>,
    pub(super) vendor: Arc<dyn Vendor>,
    pub(super) storage: SharedStorage,
    pub(super) retry: RetryPolicy,
    pub(super) pool: TaskPool,
    chapters: ChapterPipeline,
}

impl SiteService {
    pub fn new(
        site: &SiteConfig,
        vendor: Arc<dyn Vendor>,
        storage: SharedStorage,
        context: &CrawlContext,
    ) -> Self {
        let chapters = ChapterPipeline::new(
            Arc::clone(&vendor),
            context.retry.clone(),
            TaskPool::new(context.chapter_threads),
            site.charset.clone(),
        );

        Self {
            site: Arc::new(site.clone()),
            vendor,
            storage,
            retry: context.retry.clone(),
            pool: context.pool.clone(),
            chapters,
        }
    }

    /// Builds a service backed by the regex vendor and the SQLite database
    pub fn from_config(
        site: &SiteConfig,
        database: &Path,
        context: &CrawlContext,
    ) -> Result<Self, SpiderError> {
        let vendor: Arc<dyn Vendor> = Arc::new(RegexVendor::from_config(site)?);
        let storage = storage::share(SqliteStorage::open(database, &site.name)?);
        Ok(Self::new(site, vendor, storage, context))
    }

    pub fn name(&self) -> &str {
        &self.site.name
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    fn charset(&self) -> Option<&str> {
        self.site.charset.as_deref()
    }

    /// Runs the book state machine against the live detail page
    ///
    /// Returns true iff the record changed. On any fetch or extraction
    /// failure the fields are left untouched, `book.error` records the
    /// failure and false is returned. A successful probe clears the error.
    pub async fn update_book(&self, book: &mut Book) -> bool {
        let url = self.vendor.book_url(book.id);
        let parsed = self
            .retry
            .fetch_with_retry(&url, self.charset())
            .await
            .into_html(&url)
            .and_then(|html| self.vendor.parse_book(&html));

        match parsed {
            Ok(fields) => {
                book.error = None;
                book.apply_fields(fields)
            }
            Err(e) => {
                tracing::debug!(book = %book, error = %e, "probe failed");
                book.error = Some(e.to_string());
                false
            }
        }
    }

    /// Probes a stored book and persists the outcome
    ///
    /// Returns whether the probe succeeded. Only persistence failures are
    /// returned as errors.
    pub async fn refresh(&self, mut book: Book) -> Result<bool, SpiderError> {
        let previous_version = book.version;
        let had_error = book.error.is_some();

        let changed = self.update_book(&mut book).await;

        let mut store = storage::lock(&self.storage)?;
        if let Some(error) = book.error.as_deref() {
            store.save_error(&book, Some(error))?;
            return Ok(false);
        }

        if changed && book.version != previous_version {
            tracing::info!(book = %book, title = %book.title, "new revision");
            store.create(&book)?;
        } else if changed {
            tracing::debug!(book = %book, "record refreshed");
            store.update(&book)?;
        } else if had_error {
            store.save_error(&book, None)?;
        }

        Ok(true)
    }

    /// Stores a placeholder for an unseen id, then probes it
    pub async fn probe_new(&self, id: i64) -> Result<bool, SpiderError> {
        let book = Book::new(self.site.name.as_str(), id);
        storage::lock(&self.storage)?.create(&book)?;
        self.refresh(book).await
    }

    /// Downloads a book and marks it as downloaded
    pub async fn download_book(&self, book: &mut Book) -> Result<DownloadReport, SpiderError> {
        std::fs::create_dir_all(&self.site.storage)?;

        let report = self.chapters.download(book, &self.site.storage).await?;

        book.is_downloaded = true;
        storage::lock(&self.storage)?.update(book)?;
        Ok(report)
    }

    /// Downloads every ended book that has not been downloaded yet
    ///
    /// Books are downloaded one after another; a failed book is logged and
    /// does not stop the pass.
    pub async fn download(&self) -> Result<PassReport, SpiderError> {
        let books: Vec<Book> = storage::lock(&self.storage)?
            .list_by_status(BookStatus::End)?
            .into_iter()
            .filter(|book| !book.is_downloaded)
            .collect();
        tracing::info!(site = %self.name(), books = books.len(), "starting download pass");

        let mut outcomes = Vec::with_capacity(books.len());
        for mut book in books {
            match self.download_book(&mut book).await {
                Ok(_) => outcomes.push(true),
                Err(e) => {
                    tracing::warn!(book = %book, error = %e, "download failed");
                    outcomes.push(false);
                }
            }
        }

        Ok(PassReport::from_outcomes(&outcomes))
    }

    /// Reconciles the downloaded flag with the files on disk
    ///
    /// Returns the number of records that were corrected.
    pub async fn patch_download_status(&self) -> Result<usize, SpiderError> {
        let books = storage::lock(&self.storage)?.find_all()?;
        let mut batch = self.pool.batch::<bool>();

        for mut book in books {
            let service = self.clone();
            batch
                .spawn(async move {
                    let on_disk = book.file_path(&service.site.storage).exists();
                    if on_disk == book.is_downloaded {
                        return false;
                    }

                    book.is_downloaded = on_disk;
                    let saved = storage::lock(&service.storage).and_then(|mut s| s.update(&book));
                    match saved {
                        Ok(()) => {
                            tracing::info!(book = %book, downloaded = on_disk, "download status patched");
                            true
                        }
                        Err(e) => {
                            tracing::error!(book = %book, error = %e, "failed to patch download status");
                            false
                        }
                    }
                })
                .await?;
        }

        let patched = batch.join().await.into_iter().filter(|p| *p).count();
        Ok(patched)
    }

    /// Explores every id missing below the highest stored id
    pub async fn patch_missing_records(&self) -> Result<PassReport, SpiderError> {
        let ids = storage::lock(&self.storage)?.find_all_ids()?;
        let missing = self.vendor.find_missing_ids(&ids);
        tracing::info!(site = %self.name(), missing = missing.len(), "patching missing records");

        let mut batch = self.pool.batch::<bool>();
        for id in missing {
            self.retry.throttle().pause_if_raised().await;
            let service = self.clone();
            batch.spawn(async move { service.probe_logged(id).await }).await?;
        }

        Ok(PassReport::from_outcomes(&batch.join().await))
    }

    /// Checks that the site answers with its expected front page
    pub async fn check_availability(&self) -> Result<(), SpiderError> {
        let Some(url) = self.vendor.availability_url() else {
            return Ok(());
        };

        let fetched = self.retry.fetch_with_retry(&url, self.charset()).await;
        if fetched.html.is_empty() || !self.vendor.is_available(&fetched.html) {
            return Err(SpiderError::Unavailable {
                site: self.site.name.clone(),
            });
        }
        Ok(())
    }

    /// Marks in-progress books whose metadata says they are complete
    ///
    /// Returns the number of books marked as ended.
    pub fn validate_end(&self) -> Result<usize, SpiderError> {
        let books = storage::lock(&self.storage)?.list_by_status(BookStatus::InProgress)?;

        let mut marked = 0;
        for mut book in books {
            if !self.vendor.is_end(&book) {
                continue;
            }
            book.is_end = true;
            storage::lock(&self.storage)?.update(&book)?;
            tracing::debug!(book = %book, "marked as ended");
            marked += 1;
        }

        Ok(marked)
    }

    pub fn stats(&self) -> Result<SiteSummary, SpiderError> {
        Ok(storage::lock(&self.storage)?.summary()?)
    }

    /// Looks up the newest stored revision of a book
    pub fn find_book(&self, id: i64) -> Result<Book, SpiderError> {
        storage::lock(&self.storage)?
            .find_by_id(id)?
            .ok_or_else(|| SpiderError::BookNotFound {
                site: self.site.name.clone(),
                id,
            })
    }

    /// [`Self::probe_new`] for pool tasks: persistence failures are logged
    /// and count as a failed probe
    pub(super) async fn probe_logged(&self, id: i64) -> bool {
        match self.probe_new(id).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(site = %self.name(), id, error = %e, "failed to persist probe");
                false
            }
        }
    }
}
