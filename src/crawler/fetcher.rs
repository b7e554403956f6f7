//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests made by source adapters, including:
//! - Building the HTTP client with the anonymizing proxy and timeouts
//! - Rotating browser user agents and sending browser-like headers
//! - Random jitter and per-domain rate limiting before each request
//! - Classifying non-2xx responses as transport failures

use super::rate_limiter::RateLimiter;
use crate::config::TransportConfig;
use crate::url::extract_domain;
use crate::HuntError;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Fetch capability handed to source adapters
///
/// Implementations must apply rate limiting themselves; adapters only ask
/// for a body.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// GETs `url` with the given query parameters and returns the body text
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Response body of a 2xx response
    /// * `Err(HuntError)` - Transport failure (connect, timeout, non-2xx)
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<String, HuntError>;
}

/// Builds an HTTP client with the transport configuration
///
/// # Arguments
///
/// * `config` - The transport configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Invalid proxy URL or TLS backend failure
pub fn build_http_client(config: &TransportConfig) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    default_headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    default_headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));

    let mut builder = Client::builder()
        .default_headers(default_headers)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        // socks5h resolves .onion names on the proxy side
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    } else {
        builder = builder.no_proxy();
    }

    builder.build()
}

/// Production fetcher: reqwest through the configured proxy
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    user_agents: Vec<String>,
    jitter: Option<(u64, u64)>,
}

impl HttpFetcher {
    /// Creates a fetcher from the transport configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Proxy, timeouts, jitter and user agent pool
    /// * `limiter` - The run-wide per-domain gate
    pub fn new(config: &TransportConfig, limiter: Arc<RateLimiter>) -> Result<Self, HuntError> {
        let client = build_http_client(config)?;
        let jitter = (config.jitter_max_ms > 0).then_some((config.jitter_min_ms, config.jitter_max_ms));

        Ok(Self {
            client,
            limiter,
            user_agents: config.user_agents.clone(),
            jitter,
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(FALLBACK_USER_AGENT)
    }

    fn pick_jitter(&self) -> Option<Duration> {
        let (min, max) = self.jitter?;
        let millis = rand::thread_rng().gen_range(min..=max);
        Some(Duration::from_millis(millis))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<String, HuntError> {
        let parsed = Url::parse(url)?;
        let domain = extract_domain(&parsed).ok_or_else(|| HuntError::Transport {
            url: url.to_string(),
            message: "URL has no host".to_string(),
        })?;

        if let Some(delay) = self.pick_jitter() {
            tokio::time::sleep(delay).await;
        }
        self.limiter.wait(&domain).await;

        let user_agent = self.pick_user_agent().to_string();
        tracing::trace!("GET {} ({} params)", url, params.len());

        let response = self
            .client
            .get(parsed)
            .query(params)
            .header(USER_AGENT, user_agent)
            .send()
            .await
            .map_err(|e| HuntError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HuntError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| HuntError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
