//! Link directory adapter

use super::classify::first_match;
use super::registry::AdapterContext;
use super::{clip_title, Discovery, DiscoveryStream, SourceAdapter};
use crate::crawler::parse_html;
use crate::url::{domain_of, extract_domain};
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

const MAX_TITLE_CHARS: usize = 50;

/// Scans the anchors of a directory page for onion links
///
/// Links back into the directory itself are skipped.
pub struct DirectoryAdapter {
    name: String,
    url: String,
    depth: u32,
    ctx: AdapterContext,
    failures: AtomicUsize,
}

impl DirectoryAdapter {
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
                tracing::debug!("Directory {} unavailable: {}", self.name, e);
                return Vec::new();
            }
        };

        let base = Url::parse(&self.url).ok();
        let anchors = parse_html(&body, base.as_ref());
        let own_host = base.as_ref().and_then(extract_domain);

        let found: Vec<Discovery> = anchors
            .into_iter()
            .filter(|anchor| anchor.href.contains(".onion"))
            .filter(|anchor| own_host.is_none() || domain_of(&anchor.href) != own_host)
            .filter_map(|anchor| {
                let haystack = format!("{} {}", anchor.text, anchor.href);
                let title = if self.ctx.match_all {
                    clip_title(&anchor.text, MAX_TITLE_CHARS)
                } else {
                    let keyword = first_match(&haystack, keywords)?;
                    if anchor.text.is_empty() {
                        format!("Match: {}", keyword)
                    } else {
                        clip_title(&anchor.text, MAX_TITLE_CHARS)
                    }
                };
                let category = self.ctx.classifier.classify(&anchor.text, &anchor.href).to_string();
                Some(Discovery::leaf(anchor.href, title, category, &self.name, self.depth))
            })
            .collect();

        if !found.is_empty() {
            tracing::info!("{} harvested {} links", self.name, found.len());
        }
        found
    }
}

impl SourceAdapter for DirectoryAdapter {
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
