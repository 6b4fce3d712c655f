//! Process-wide cooperative slow-down
//!
//! Any retry loop that sees a rate-limit response raises the flag; it clears
//! itself after a fixed window. Dispatch loops read it (never wait on it) and
//! pause briefly before issuing new work while it is up. In-flight requests
//! are never stopped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pause taken by a dispatcher while the flag is raised
pub const SLOW_REQUEST_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct FlagState {
    raised: AtomicBool,
    generation: AtomicU64,
    window: Duration,
}

/// Shared slow-request flag with timed auto-clear
#[derive(Debug, Clone)]
pub struct SlowRequest {
    state: Arc<FlagState>,
}

impl SlowRequest {
    /// Creates a lowered flag that stays up for `window` after each raise
    pub fn new(window: Duration) -> Self {
        Self {
            state: Arc::new(FlagState {
                raised: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                window,
            }),
        }
    }

    pub fn is_raised(&self) -> bool {
        self.state.raised.load(Ordering::Acquire)
    }

    /// Raises the flag and schedules its clearing
    ///
    /// Must be called from within a tokio runtime. A later raise extends the
    /// window: only the clear task of the most recent raise lowers the flag.
    /// Concurrent raisers do not coordinate beyond that (last write wins).
    pub fn raise(&self) {
        let generation = self.state.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.raised.store(true, Ordering::Release);

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(state.window).await;
            if state.generation.load(Ordering::Acquire) == generation {
                state.raised.store(false, Ordering::Release);
            }
        });
    }

    /// Sleeps for [`SLOW_REQUEST_PAUSE`] if the flag is raised
    pub async fn pause_if_raised(&self) {
        if self.is_raised() {
            tracing::debug!("slow-request flag raised, pausing dispatch");
            tokio::time::sleep(SLOW_REQUEST_PAUSE).await;
        }
    }
}

impl Default for SlowRequest {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
