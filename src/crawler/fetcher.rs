//! HTTP fetcher implementation
//!
//! This module performs single HTTP GET requests for the crawler:
//! - Building HTTP clients with the configured user agent and timeout
//! - Decoding bodies with the site's text encoding
//! - Classifying the outcome (body, status code, or nothing usable)
//!
//! There are no retries at this layer; see `RetryPolicy`.

use crate::config::BatchConfig;
use encoding_rs::{Encoding, UTF_8};
use reqwest::Client;
use std::borrow::Cow;
use std::time::Duration;

/// Result of a single fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Non-empty decoded body of a successful response
    Body(String),

    /// Response status was 300 or above
    Status(u16),

    /// Transport error, timeout, or empty body
    Empty,
}

impl FetchOutcome {
    /// Text form of the outcome: the body, the status code digits, or ""
    pub fn pseudo_body(&self) -> Cow<'_, str> {
        match self {
            Self::Body(body) => Cow::Borrowed(body),
            Self::Status(code) => Cow::Owned(code.to_string()),
            Self::Empty => Cow::Borrowed(""),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Status(503))
    }
}

/// Builds an HTTP client with the configured user agent and request timeout
pub fn build_http_client(config: &BatchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout().min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Single-shot HTTP GET
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches a URL once
    ///
    /// When `charset` (the site's encoding label) is set, the raw body is
    /// always decoded with it, whatever the server declares. Otherwise the
    /// declared charset is used, falling back to UTF-8.
    pub async fn fetch(&self, url: &str, charset: Option<&str>) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "request failed");
                return FetchOutcome::Empty;
            }
        };

        let status = response.status();
        if status.as_u16() >= 300 {
            return FetchOutcome::Status(status.as_u16());
        }

        let body = match charset {
            Some(label) => response
                .bytes()
                .await
                .map(|bytes| decode_with_label(&bytes, label)),
            None => response.text().await,
        };

        match body {
            Ok(body) if !body.is_empty() => FetchOutcome::Body(body),
            Ok(_) => FetchOutcome::Empty,
            Err(e) => {
                tracing::debug!(url, error = %e, "failed to read body");
                FetchOutcome::Empty
            }
        }
    }
}

/// Decodes `bytes` with the encoding named by `label`
///
/// Unknown labels decode as UTF-8. Malformed sequences become U+FFFD.
pub fn decode_with_label(bytes: &[u8], label: &str) -> String {
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(charset = encoding.name(), "body contained malformed sequences");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(build_http_client(&BatchConfig::default()).unwrap())
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&BatchConfig::default()).is_ok());
    }

    #[test]
    fn test_pseudo_body() {
        assert_eq!(FetchOutcome::Status(503).pseudo_body(), "503");
        assert_eq!(FetchOutcome::Empty.pseudo_body(), "");
        assert_eq!(FetchOutcome::Body("x".to_string()).pseudo_body(), "x");
        assert!(FetchOutcome::Status(503).is_rate_limited());
        assert!(!FetchOutcome::Status(404).is_rate_limited());
    }

    #[tokio::test]
    async fn test_fetch_classifies_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = fetcher();
        let base = server.uri();

        assert_eq!(
            fetcher.fetch(&format!("{}/ok", base), None).await,
            FetchOutcome::Body("hello".to_string())
        );
        assert_eq!(
            fetcher.fetch(&format!("{}/empty", base), None).await,
            FetchOutcome::Empty
        );
        assert_eq!(
            fetcher.fetch(&format!("{}/busy", base), None).await,
            FetchOutcome::Status(503)
        );
        assert_eq!(
            fetcher.fetch(&format!("{}/missing", base), None).await,
            FetchOutcome::Status(404)
        );
    }

    #[tokio::test]
    async fn test_fetch_decodes_with_site_charset() {
        let server = MockServer::start().await;
        // "中文" in GBK
        Mock::given(method("GET"))
            .and(path("/gbk"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xD6, 0xD0, 0xCE, 0xC4]))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&format!("{}/gbk", server.uri()), Some("gbk"))
            .await;
        assert_eq!(body, FetchOutcome::Body("中文".to_string()));
    }

    #[tokio::test]
    async fn test_site_charset_overrides_declared_charset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mislabeled"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_bytes(vec![0xD6, 0xD0, 0xCE, 0xC4]),
            )
            .mount(&server)
            .await;

        let url = format!("{}/mislabeled", server.uri());
        assert_eq!(
            fetcher().fetch(&url, Some("gbk")).await,
            FetchOutcome::Body("中文".to_string())
        );
        // without a site charset the declared one is trusted
        assert_ne!(
            fetcher().fetch(&url, None).await,
            FetchOutcome::Body("中文".to_string())
        );
    }

    #[test]
    fn test_decode_with_label() {
        assert_eq!(decode_with_label(&[0xD6, 0xD0, 0xCE, 0xC4], "gbk"), "中文");
        assert_eq!(decode_with_label("abc".as_bytes(), "no-such-label"), "abc");
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_empty() {
        let outcome = fetcher().fetch("http://127.0.0.1:1/", None).await;
        assert_eq!(outcome, FetchOutcome::Empty);
    }
}
