//! Explore and update passes
//!
//! # Explore
//!
//! 1. Read the site summary.
//! 2. Re-examine every id in `(latest_success_id, max_book_id]`.
//! 3. Probe new ids from `max_book_id + 1` upward.
//!
//! Both phases stop dispatching once `max_explore_error` consecutive probes
//! have failed, then join what was already dispatched. The failure streak is
//! carried from the first phase into the second.
//!
//! The cap is checked each time the dispatch loop obtains a pool slot. The
//! streak is updated by concurrent probes while the loop keeps issuing work,
//! so the stop point is approximate: up to a pool's worth of probes past the
//! cap may already be in flight when it is reached.
//!
//! # Update
//!
//! Refreshes every stored book (or only errored ones) under the same pool,
//! without any failure cap. Update never probes new ids.

use crate::book::BookStatus;
use crate::crawler::service::{PassReport, SiteService};
use crate::storage::{self, SiteSummary};
use crate::SpiderError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Consecutive-failure counter shared by the probes of one explore call
#[derive(Debug, Default)]
pub struct FailureStreak {
    count: AtomicUsize,
}

impl FailureStreak {
    pub fn record(&self, success: bool) {
        if success {
            self.count.store(0, Ordering::SeqCst);
        } else {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn reached(&self, cap: usize) -> bool {
        self.current() >= cap
    }
}

/// Counts of one explore call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExploreReport {
    /// Stored ids that were probed again
    pub reexamined: PassReport,

    /// Ids above the previous maximum that were probed
    pub discovered: PassReport,
}

impl SiteService {
    /// Re-examines the trailing errored ids and advances the id frontier
    pub async fn explore(&self) -> Result<ExploreReport, SpiderError> {
        let summary = self.stats()?;
        let streak = Arc::new(FailureStreak::default());
        tracing::info!(
            site = %self.name(),
            latest_success_id = summary.latest_success_id,
            max_book_id = summary.max_book_id,
            "starting explore"
        );

        let reexamined = self.explore_existing(&summary, &streak).await?;
        let discovered = self.explore_new(summary.max_book_id, &streak).await?;

        tracing::info!(
            site = %self.name(),
            reexamined = reexamined.total(),
            discovered = discovered.succeeded,
            "explore finished"
        );
        Ok(ExploreReport {
            reexamined,
            discovered,
        })
    }

    /// Probes every id in `(latest_success_id, max_book_id]`
    pub async fn explore_existing(
        &self,
        summary: &SiteSummary,
        streak: &Arc<FailureStreak>,
    ) -> Result<PassReport, SpiderError> {
        let cap = self.site.max_explore_error;
        let mut batch = self.pool.batch::<bool>();

        for id in (summary.latest_success_id + 1)..=summary.max_book_id {
            let slot = batch.reserve().await?;
            if streak.reached(cap) {
                tracing::info!(site = %self.name(), id, "failure cap reached while re-examining");
                break;
            }
            self.retry.throttle().pause_if_raised().await;

            let service = self.clone();
            let streak = Arc::clone(streak);
            batch.spawn_reserved(slot, async move {
                let ok = service.reexamine(id).await;
                streak.record(ok);
                ok
            });
        }

        Ok(PassReport::from_outcomes(&batch.join().await))
    }

    /// Probes ids above `max_book_id` until the failure cap is reached
    pub async fn explore_new(
        &self,
        max_book_id: i64,
        streak: &Arc<FailureStreak>,
    ) -> Result<PassReport, SpiderError> {
        let cap = self.site.max_explore_error;
        let mut batch = self.pool.batch::<bool>();
        let mut id = max_book_id + 1;

        loop {
            let slot = batch.reserve().await?;
            if streak.reached(cap) {
                break;
            }
            self.retry.throttle().pause_if_raised().await;

            let service = self.clone();
            let streak = Arc::clone(streak);
            batch.spawn_reserved(slot, async move {
                let ok = service.probe_logged(id).await;
                streak.record(ok);
                ok
            });
            id += 1;
        }
        tracing::debug!(site = %self.name(), frontier = id, "new-id phase stopped");

        Ok(PassReport::from_outcomes(&batch.join().await))
    }

    /// Refreshes stored books, optionally only those in error
    pub async fn update(&self, error_focus: bool) -> Result<PassReport, SpiderError> {
        let books = {
            let store = storage::lock(&self.storage)?;
            if error_focus {
                store.list_by_status(BookStatus::Error)?
            } else {
                store.find_all()?
            }
        };
        tracing::info!(site = %self.name(), books = books.len(), error_focus, "starting update");

        let mut batch = self.pool.batch::<bool>();
        for book in books {
            self.retry.throttle().pause_if_raised().await;

            let service = self.clone();
            batch
                .spawn(async move {
                    let label = book.to_string();
                    match service.refresh(book).await {
                        Ok(ok) => ok,
                        Err(e) => {
                            tracing::error!(book = %label, error = %e, "failed to persist refresh");
                            false
                        }
                    }
                })
                .await?;
        }

        Ok(PassReport::from_outcomes(&batch.join().await))
    }

    /// Probes a stored id again; a missing record counts as a failure
    async fn reexamine(&self, id: i64) -> bool {
        let found = storage::lock(&self.storage).and_then(|store| store.find_by_id(id));

        let book = match found {
            Ok(Some(book)) => book,
            Ok(None) => {
                tracing::debug!(site = %self.name(), id, "no stored record to re-examine");
                return false;
            }
            Err(e) => {
                tracing::error!(site = %self.name(), id, error = %e, "failed to load record");
                return false;
            }
        };

        match self.refresh(book).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(site = %self.name(), id, error = %e, "failed to persist probe");
                false
            }
        }
    }
}
