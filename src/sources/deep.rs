//! Deep crawl adapter
//!
//! Built per task from `(target, depth, dedup)`. It fetches only its own
//! target and emits the onion services mentioned there as crawl seeds; the
//! scheduler decides whether they become new tasks. The adapter never
//! recurses by itself.

use super::classify::first_match;
use super::registry::AdapterContext;
use super::{Discovery, DiscoveryStream, SourceAdapter};
use crate::crawler::extract_onion_addresses;
use crate::url::normalize_url;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};

const SOURCE_NAME: &str = "Crawler";

pub struct DeepCrawlAdapter {
    target: String,
    identity: String,
    depth: u32,
    ctx: AdapterContext,
    failures: AtomicUsize,
}

impl DeepCrawlAdapter {
    pub fn new(target: &str, depth: u32, ctx: AdapterContext) -> Self {
        let identity = normalize_url(target)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| target.to_string());

        Self {
            target: target.to_string(),
            identity,
            depth,
            ctx,
            failures: AtomicUsize::new(0),
        }
    }

    async fn crawl(&self, keywords: &[String]) -> Vec<Discovery> {
        let body = match self.ctx.fetcher.fetch(&self.target, &[]).await {
            Ok(body) => body,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Deep crawl of {} failed: {}", self.target, e);
                return Vec::new();
            }
        };

        let found: Vec<Discovery> = extract_onion_addresses(&body)
            .into_iter()
            .filter_map(|mention| {
                let url = mention.url();
                let identity = normalize_url(&url).ok()?.to_string();
                if identity == self.identity || self.ctx.dedup.contains(&identity) {
                    return None;
                }

                let title = if self.ctx.match_all {
                    "Deep Discovery".to_string()
                } else {
                    format!("Deep Match: {}", first_match(&mention.context, keywords)?)
                };
                let category = self.ctx.classifier.classify(&mention.context, &url).to_string();
                Some(Discovery::crawl_seed(url, title, category, SOURCE_NAME, self.depth))
            })
            .collect();

        if !found.is_empty() {
            tracing::info!("Crawl of {} found {} links", self.target, found.len());
        }
        found
    }
}

impl SourceAdapter for DeepCrawlAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn search<'a>(&'a self, keywords: &'a [String]) -> DiscoveryStream<'a> {
        stream::once(self.crawl(keywords))
            .flat_map(stream::iter)
            .boxed()
    }

    fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}
