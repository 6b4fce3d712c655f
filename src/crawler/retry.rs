//! Bounded retry with adaptive slow-down
//!
//! # Retry Logic
//!
//! | Outcome | Action |
//! |---------|--------|
//! | Body | Return it |
//! | HTTP 503 | Give up after `max_rate_limited_attempts`, else raise the slow-request flag and sleep `attempt` seconds |
//! | Other status / empty | Give up after `max_attempts`, else sleep `(attempt + 1) * const_sleep` |

use crate::config::BatchConfig;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::crawler::throttle::SlowRequest;
use crate::SpiderError;
use std::time::Duration;

/// Text obtained by [`RetryPolicy::fetch_with_retry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Decoded page, empty when every attempt failed
    pub html: String,

    /// Number of requests issued
    pub attempts: u32,
}

impl Fetched {
    /// Turns an exhausted fetch into a transient fetch error
    pub fn into_html(self, url: &str) -> Result<String, SpiderError> {
        if self.html.is_empty() {
            return Err(SpiderError::TransientFetch {
                url: url.to_string(),
                attempts: self.attempts,
            });
        }
        Ok(self.html)
    }
}

/// Retry policy wrapped around a [`Fetcher`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    fetcher: Fetcher,
    throttle: SlowRequest,
    const_sleep: Duration,
    max_attempts: u32,
    max_rate_limited_attempts: u32,
}

impl RetryPolicy {
    pub fn new(fetcher: Fetcher, throttle: SlowRequest, config: &BatchConfig) -> Self {
        Self {
            fetcher,
            throttle,
            const_sleep: config.const_sleep(),
            max_attempts: config.max_attempts,
            max_rate_limited_attempts: config.max_rate_limited_attempts,
        }
    }

    pub fn throttle(&self) -> &SlowRequest {
        &self.throttle
    }

    /// Fetches a URL until it yields a body or a retry cap is reached
    ///
    /// Never fails; an exhausted fetch returns an empty `html`.
    pub async fn fetch_with_retry(&self, url: &str, charset: Option<&str>) -> Fetched {
        let mut attempt: u32 = 0;

        loop {
            let outcome = self.fetcher.fetch(url, charset).await;

            match outcome {
                FetchOutcome::Body(html) => {
                    return Fetched {
                        html,
                        attempts: attempt + 1,
                    };
                }
                FetchOutcome::Status(503) => {
                    if attempt >= self.max_rate_limited_attempts {
                        tracing::warn!(url, attempts = attempt + 1, "giving up on rate-limited url");
                        return Fetched {
                            html: String::new(),
                            attempts: attempt + 1,
                        };
                    }
                    tracing::warn!(url, attempt, "rate limited, raising slow-request flag");
                    self.throttle.raise();
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
                other => {
                    if attempt >= self.max_attempts {
                        tracing::debug!(
                            url,
                            attempts = attempt + 1,
                            last = %other.pseudo_body(),
                            "giving up on url"
                        );
                        return Fetched {
                            html: String::new(),
                            attempts: attempt + 1,
                        };
                    }
                    tracing::debug!(url, attempt, "retrying");
                    tokio::time::sleep(self.const_sleep * (attempt + 1)).await;
                }
            }

            attempt += 1;
        }
    }
}
