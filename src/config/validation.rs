use crate::config::types::{Config, CrawlerConfig, EngineEntry, SourceEntry, TransportConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_transport_config(&config.transport)?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    for entry in &config.engines {
        validate_engine(entry)?;
    }
    for entry in config
        .feeds
        .iter()
        .chain(&config.directories)
        .chain(&config.seeds)
    {
        validate_source(entry)?;
    }

    for category in &config.categories {
        if category.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "category name cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.flush_threshold < 1 {
        return Err(ConfigError::Validation(
            "flush_threshold must be >= 1".to_string(),
        ));
    }

    if config.default_depth > config.max_depth {
        return Err(ConfigError::Validation(format!(
            "default_depth ({}) cannot exceed max_depth ({})",
            config.default_depth, config.max_depth
        )));
    }

    Ok(())
}

/// Validates transport configuration
fn validate_transport_config(config: &TransportConfig) -> Result<(), ConfigError> {
    if let Some(proxy) = &config.proxy {
        let parsed = Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
        if !matches!(parsed.scheme(), "http" | "https" | "socks5" | "socks5h") {
            return Err(ConfigError::Validation(format!(
                "unsupported proxy scheme: {}",
                parsed.scheme()
            )));
        }
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter_min_ms ({}) cannot exceed jitter_max_ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(entry: &EngineEntry) -> Result<(), ConfigError> {
    validate_http_url(&entry.name, &entry.url)?;

    if entry.query_param.is_empty() {
        return Err(ConfigError::Validation(format!(
            "engine '{}' has an empty query_param",
            entry.name
        )));
    }

    Selector::parse(&entry.selector).map_err(|e| {
        ConfigError::Validation(format!(
            "engine '{}' has an invalid selector '{}': {:?}",
            entry.name, entry.selector, e
        ))
    })?;

    Ok(())
}

fn validate_source(entry: &SourceEntry) -> Result<(), ConfigError> {
    if entry.name.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source for {} has an empty name",
            entry.url
        )));
    }
    validate_http_url(&entry.name, &entry.url)
}

fn validate_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(url)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}' for {}: {}", url, name, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' for {} must use HTTP or HTTPS",
            url, name
        )));
    }

    Ok(())
}
