//! Crawl task definitions

use crate::url::normalize_url;
use std::fmt;
use std::sync::Arc;

/// The adapter family a task is executed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    /// Query a search engine result page per keyword
    SearchEngine,

    /// Scan a static list of onion addresses
    Feed,

    /// Scan the anchors of a directory page
    Directory,

    /// Fetch a single target and emit the onion services it mentions
    DeepCrawl,
}

impl AdapterKind {
    /// Returns the label used in task identities and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchEngine => "engine",
            Self::Feed => "feed",
            Self::Directory => "directory",
            Self::DeepCrawl => "deep",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work: run one adapter against one target
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// Source name, used as the `source` of produced records
    pub name: String,

    /// The URL the adapter works on
    pub target: String,

    /// 0 for configured sources, D+1 for targets found by a task at depth D
    pub depth: u32,

    /// Adapter family to build for this task
    pub adapter: AdapterKind,

    /// Ordered search keywords, shared between all tasks of a run
    pub keywords: Arc<[String]>,
}

impl CrawlTask {
    /// Creates a new task
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        depth: u32,
        adapter: AdapterKind,
        keywords: Arc<[String]>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            depth,
            adapter,
            keywords,
        }
    }

    /// Returns the key this task is claimed under in the dedup tracker
    ///
    /// Identities are namespaced by adapter kind, so a feed and an engine on
    /// the same host do not shadow each other, and a configured deep crawl
    /// seed never claims the plain URL a discovery of that page is recorded
    /// under.
    pub fn identity(&self) -> String {
        let target = match self.adapter {
            AdapterKind::DeepCrawl => normalize_url(&self.target)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| self.target.clone()),
            _ => self.target.clone(),
        };
        format!("{}:{}", self.adapter, target)
    }
}
