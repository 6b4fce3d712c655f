use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Book-Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub batch: BatchConfig,
    pub database: DatabaseConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Looks up a site by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.name == name)
    }
}

/// Concurrency and network behaviour shared by every site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchConfig {
    /// Token pool size shared by explore/update/patch passes across all sites
    #[serde(default = "default_threads")]
    pub max_working_threads: usize,

    /// Token pool size for chapter fetches inside one download
    #[serde(default = "default_threads")]
    pub max_chapter_threads: usize,

    /// Timeout of a single HTTP request (seconds)
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Backoff unit between retries of failed requests (milliseconds)
    #[serde(default = "default_const_sleep_ms")]
    pub const_sleep_ms: u64,

    /// Retry cap for empty bodies and non-503 status codes
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry cap for 503 responses
    #[serde(default = "default_max_rate_limited_attempts")]
    pub max_rate_limited_attempts: u32,

    /// How long the slow-request flag stays raised after a 503 (seconds)
    #[serde(default = "default_slow_request_secs")]
    pub slow_request_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl BatchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn const_sleep(&self) -> Duration {
        Duration::from_millis(self.const_sleep_ms)
    }

    pub fn slow_request_window(&self) -> Duration {
        Duration::from_secs(self.slow_request_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_working_threads: default_threads(),
            max_chapter_threads: default_threads(),
            request_timeout_secs: default_timeout_secs(),
            const_sleep_ms: default_const_sleep_ms(),
            max_attempts: default_max_attempts(),
            max_rate_limited_attempts: default_max_rate_limited_attempts(),
            slow_request_secs: default_slow_request_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_threads() -> usize {
    1000
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_const_sleep_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_max_rate_limited_attempts() -> u32 {
    100
}

fn default_slow_request_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("book-spider/{}", env!("CARGO_PKG_VERSION"))
}

/// Database location
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

/// One fiction-hosting site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    pub name: String,

    /// Consecutive failures that stop an explore phase
    #[serde(default = "default_max_explore_error")]
    pub max_explore_error: usize,

    /// Directory downloaded books are written to
    pub storage: PathBuf,

    /// Encoding label of the site's pages (e.g. "gbk"); UTF-8 when absent
    #[serde(default)]
    pub charset: Option<String>,

    /// Detail page template, `{id}` is replaced by the book id
    pub book_url: String,

    /// Table-of-contents template, `{id}` is replaced by the book id
    pub toc_url: String,

    /// Template for rooted/absolute chapter links, `{path}` is replaced by the link
    pub chapter_url: String,

    /// Page checked by `check-availability`
    #[serde(default)]
    pub availability_url: Option<String>,

    /// Last-chapter keywords that mark a book as ended
    #[serde(default = "default_end_keywords")]
    pub end_keywords: Vec<String>,

    pub patterns: PatternConfig,
}

fn default_max_explore_error() -> usize {
    1000
}

fn default_end_keywords() -> Vec<String> {
    [
        "番外", "結局", "新書", "完結", "尾聲", "感言", "後記", "完本", "全書完", "全文完",
        "全文終", "全文結", "劇終", "（完）", "終章", "外傳", "結尾",
    ]
    .iter()
    .map(|keyword| keyword.to_string())
    .collect()
}

/// Field extraction patterns; the first capture group of each is the value
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PatternConfig {
    pub title: String,
    pub writer: String,
    pub category: String,
    pub last_update: String,
    pub last_chapter: String,
    pub chapter_url: String,
    pub chapter_title: String,
    pub chapter_content: String,
    #[serde(default)]
    pub available: Option<String>,
}
