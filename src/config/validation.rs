use crate::config::types::{BatchConfig, Config, PatternConfig, SiteConfig};
use crate::ConfigError;
use encoding_rs::Encoding;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_batch_config(&config.batch)?;

    if config.database.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for site in &config.sites {
        if !names.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "site '{}' is configured more than once",
                site.name
            )));
        }
        validate_site_config(site)?;
    }

    Ok(())
}

/// Validates batch (concurrency and retry) configuration
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("max_working_threads", config.max_working_threads),
        ("max_chapter_threads", config.max_chapter_threads),
    ] {
        if !(1..=10_000).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 10000, got {}",
                name, value
            )));
        }
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates one site definition
fn validate_site_config(site: &SiteConfig) -> Result<(), ConfigError> {
    if site.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    if site.max_explore_error < 1 {
        return Err(ConfigError::Validation(format!(
            "max_explore_error of site '{}' must be >= 1",
            site.name
        )));
    }

    validate_template(&site.book_url, "{id}", "1")?;
    validate_template(&site.toc_url, "{id}", "1")?;
    validate_template(&site.chapter_url, "{path}", "/1.html")?;
    if let Some(url) = &site.availability_url {
        Url::parse(url)
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", url, e)))?;
    }

    if let Some(label) = &site.charset {
        if Encoding::for_label(label.as_bytes()).is_none() {
            return Err(ConfigError::Validation(format!(
                "unknown charset '{}' for site '{}'",
                label, site.name
            )));
        }
    }

    validate_patterns(&site.patterns)
}

/// Checks a URL template carries its placeholder and expands to a valid URL
fn validate_template(template: &str, placeholder: &str, sample: &str) -> Result<(), ConfigError> {
    if !template.contains(placeholder) {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' is missing the {} placeholder",
            template, placeholder
        )));
    }

    let expanded = template.replace(placeholder, sample);
    Url::parse(&expanded)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", template, e)))?;

    Ok(())
}

fn validate_patterns(patterns: &PatternConfig) -> Result<(), ConfigError> {
    let mut all = vec![
        ("title", &patterns.title),
        ("writer", &patterns.writer),
        ("category", &patterns.category),
        ("last-update", &patterns.last_update),
        ("last-chapter", &patterns.last_chapter),
        ("chapter-url", &patterns.chapter_url),
        ("chapter-title", &patterns.chapter_title),
        ("chapter-content", &patterns.chapter_content),
    ];
    if let Some(available) = &patterns.available {
        all.push(("available", available));
    }

    for (name, pattern) in all {
        compile_pattern(name, pattern)?;
    }

    Ok(())
}

/// Compiles a field pattern, requiring at least one capture group
pub(crate) fn compile_pattern(name: &str, pattern: &str) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    // captures_len counts the implicit whole-match group
    if regex.captures_len() < 2 {
        return Err(ConfigError::InvalidPattern {
            name: name.to_string(),
            message: "pattern needs a capture group".to_string(),
        });
    }

    Ok(regex)
}
