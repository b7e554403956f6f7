//! Static feed adapter: plain-text or markdown lists of onion addresses

use super::classify::first_match;
use super::registry::AdapterContext;
use super::{Discovery, DiscoveryStream, SourceAdapter};
use crate::crawler::extract_onion_addresses;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Downloads one feed and emits the onion services it lists
///
/// In keyword mode an address is emitted when its line mentions a keyword
/// (the address itself is part of the line).
pub struct FeedAdapter {
    name: String,
    url: String,
    depth: u32,
    ctx: AdapterContext,
    failures: AtomicUsize,
}

impl FeedAdapter {
    pub fn new(name: &str, url: &str, depth: u32, ctx: AdapterContext) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            depth,
            ctx,
            failures: AtomicUsize::new(0),
        }
    }

    async fn scan(&self, keywords: &[String]) -> Vec<Discovery> {
        let body = match self.ctx.fetcher.fetch(&self.url, &[]).await {
            Ok(body) => body,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Feed {} unavailable: {}", self.name, e);
                return Vec::new();
            }
        };

        let found: Vec<Discovery> = extract_onion_addresses(&body)
            .into_iter()
            .filter_map(|mention| {
                let title = if self.ctx.match_all {
                    "Massive Discovery".to_string()
                } else {
                    format!("Match: {}", first_match(&mention.context, keywords)?)
                };
                let url = mention.url();
                let category = self.ctx.classifier.classify(&mention.context, &url).to_string();
                Some(Discovery::leaf(url, title, category, &self.name, self.depth))
            })
            .collect();

        if !found.is_empty() {
            tracing::info!("{} extracted {} links", self.name, found.len());
        }
        found
    }
}

impl SourceAdapter for FeedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, keywords: &'a [String]) -> DiscoveryStream<'a> {
        stream::once(self.scan(keywords))
            .flat_map(stream::iter)
            .boxed()
    }

    fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}
