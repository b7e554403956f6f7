//! Search engine result page adapter

use super::registry::AdapterContext;
use super::{clip_title, Discovery, DiscoveryStream, SourceAdapter};
use crate::config::EngineEntry;
use crate::crawler::{select_anchors, unwrap_redirect};
use crate::url::{domain_of, is_onion};
use futures::{stream, StreamExt};
use scraper::Selector;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

const MAX_TITLE_CHARS: usize = 100;

/// Queries one search engine, one request per keyword
pub struct SearchEngineAdapter {
    name: String,
    url: String,
    excluded_hosts: Vec<String>,
    params: Vec<(String, String)>,
    query_param: String,
    selector: Selector,
    depth: u32,
    ctx: AdapterContext,
    failures: AtomicUsize,
}

impl SearchEngineAdapter {
    /// Creates the adapter for an engine entry
    ///
    /// Returns `None` if the entry's result selector does not parse.
    pub fn new(entry: &EngineEntry, depth: u32, ctx: AdapterContext) -> Option<Self> {
        let selector = match Selector::parse(&entry.selector) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!("Invalid selector for {}: {:?}", entry.name, e);
                return None;
            }
        };

        let mut excluded_hosts: Vec<String> = entry
            .exclude_hosts
            .iter()
            .map(|host| host.trim().to_lowercase())
            .collect();
        excluded_hosts.extend(domain_of(&entry.url));

        Some(Self {
            name: entry.name.clone(),
            url: entry.url.clone(),
            excluded_hosts,
            params: entry
                .extra_params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            query_param: entry.query_param.clone(),
            selector,
            depth,
            ctx,
            failures: AtomicUsize::new(0),
        })
    }

    async fn search_keyword(&self, keyword: &str) -> Vec<Discovery> {
        let mut params = vec![(self.query_param.clone(), keyword.to_string())];
        params.extend(self.params.iter().cloned());

        match self.ctx.fetcher.fetch(&self.url, &params).await {
            Ok(body) => {
                let found = self.extract(&body, keyword);
                if !found.is_empty() {
                    tracing::info!("{} captured {} links for '{}'", self.name, found.len(), keyword);
                }
                found
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("{} failed for '{}': {}", self.name, keyword, e);
                Vec::new()
            }
        }
    }

    fn extract(&self, body: &str, keyword: &str) -> Vec<Discovery> {
        let base = Url::parse(&self.url).ok();

        select_anchors(body, &self.selector, base.as_ref())
            .into_iter()
            .filter(|anchor| anchor.href.contains(".onion"))
            .filter_map(|anchor| {
                let url = unwrap_redirect(&anchor.href);
                if !Url::parse(&url).map(|u| is_onion(&u)).unwrap_or(false) {
                    return None;
                }
                if domain_of(&url).is_some_and(|host| self.excluded_hosts.contains(&host)) {
                    return None;
                }

                let title = if anchor.text.is_empty() {
                    format!("Match: {}", keyword)
                } else {
                    clip_title(&anchor.text, MAX_TITLE_CHARS)
                };

                let category = self.ctx.classifier.classify(&title, &url).to_string();
                Some(Discovery::leaf(url, title, category, &self.name, self.depth))
            })
            .collect()
    }
}

impl SourceAdapter for SearchEngineAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, keywords: &'a [String]) -> DiscoveryStream<'a> {
        stream::iter(keywords)
            .then(move |keyword| self.search_keyword(keyword))
            .flat_map(stream::iter)
            .boxed()
    }

    fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}
