//! Source adapters
//!
//! A source adapter turns a list of keywords into a lazy, finite stream of
//! [`Discovery`] values. Adapters own no shared mutable state; everything they
//! need (fetcher, classifier, dedup probe) is injected when the registry
//! builds them for a task.
//!
//! # Components
//!
//! - `SearchEngineAdapter`: result pages of a search engine, one request per keyword
//! - `FeedAdapter`: onion addresses listed in a static text feed
//! - `DirectoryAdapter`: onion anchors on a directory page
//! - `DeepCrawlAdapter`: onion services mentioned on a single crawled page
//! - `AdapterRegistry`: builds the adapter for a `CrawlTask` by its kind

mod classify;
mod deep;
mod directory;
mod feed;
mod registry;
mod search;

pub use classify::{expand_keywords, Classifier, FALLBACK_CATEGORY};
pub use deep::DeepCrawlAdapter;
pub use directory::DirectoryAdapter;
pub use feed::FeedAdapter;
pub use registry::{AdapterContext, AdapterFactory, AdapterRegistry};
pub use search::SearchEngineAdapter;

use futures::stream::BoxStream;

/// Whether a discovery is only recorded or also crawled further
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryKind {
    /// Recorded, never crawled
    Leaf,

    /// Recorded and, within the depth bound, crawled as a new task
    CrawlSeed,
}

/// A link produced by a source adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub url: String,
    pub title: String,
    pub category: String,
    pub source: String,
    pub kind: DiscoveryKind,
    pub depth: u32,
}

impl Discovery {
    /// Creates a leaf discovery
    pub fn leaf(
        url: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        source: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            category: category.into(),
            source: source.into(),
            kind: DiscoveryKind::Leaf,
            depth,
        }
    }

    /// Creates a discovery that should be crawled further
    pub fn crawl_seed(
        url: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        source: impl Into<String>,
        depth: u32,
    ) -> Self {
        Self {
            kind: DiscoveryKind::CrawlSeed,
            ..Self::leaf(url, title, category, source, depth)
        }
    }

    /// Returns true for `DiscoveryKind::CrawlSeed`
    pub fn is_crawl_seed(&self) -> bool {
        self.kind == DiscoveryKind::CrawlSeed
    }
}

/// Lazy stream of discoveries borrowed from its adapter
pub type DiscoveryStream<'a> = BoxStream<'a, Discovery>;

/// Capability: search a source for keywords
///
/// Transport failures never surface as errors. The adapter logs them at debug
/// level, counts them in [`SourceAdapter::failures`], and contributes nothing
/// for the failed request.
pub trait SourceAdapter: Send + Sync {
    /// Source name recorded on every discovery
    fn name(&self) -> &str;

    /// Returns a lazy stream of discoveries for the keywords
    ///
    /// Nothing is fetched until the stream is polled.
    fn search<'a>(&'a self, keywords: &'a [String]) -> DiscoveryStream<'a>;

    /// Transport failures seen so far by this adapter instance
    fn failures(&self) -> usize {
        0
    }
}

/// Truncates a title to at most `max` characters
pub(crate) fn clip_title(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
