//! Adapter construction keyed by adapter kind

use super::{
    Classifier, DeepCrawlAdapter, DirectoryAdapter, FeedAdapter, SearchEngineAdapter,
    SourceAdapter,
};
use crate::config::EngineEntry;
use crate::crawler::{AdapterKind, CrawlTask, DedupTracker, Fetch};
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborators shared by every adapter of a run
#[derive(Clone)]
pub struct AdapterContext {
    pub fetcher: Arc<dyn Fetch>,
    pub classifier: Arc<Classifier>,
    pub dedup: Arc<DedupTracker>,

    /// Emit every address found instead of only keyword matches
    pub match_all: bool,
}

/// Builds the adapter for a task
///
/// Returning `None` marks the task as failed.
pub trait AdapterFactory: Send + Sync {
    fn build(&self, task: &CrawlTask) -> Option<Box<dyn SourceAdapter>>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&CrawlTask) -> Option<Box<dyn SourceAdapter>> + Send + Sync,
{
    fn build(&self, task: &CrawlTask) -> Option<Box<dyn SourceAdapter>> {
        self(task)
    }
}

/// Registry of adapter factories
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    factories: HashMap<AdapterKind, Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in adapters for every kind
    ///
    /// Search engine tasks are matched to their engine entry by task name.
    pub fn standard(context: AdapterContext, engines: &[EngineEntry]) -> Self {
        let engines: HashMap<String, EngineEntry> = engines
            .iter()
            .map(|entry| (entry.name.clone(), entry.clone()))
            .collect();

        let mut registry = Self::new();

        let ctx = context.clone();
        registry.register(AdapterKind::SearchEngine, move |task: &CrawlTask| {
            let entry = engines.get(&task.name)?;
            let adapter = SearchEngineAdapter::new(entry, task.depth, ctx.clone())?;
            Some(Box::new(adapter) as Box<dyn SourceAdapter>)
        });

        let ctx = context.clone();
        registry.register(AdapterKind::Feed, move |task: &CrawlTask| {
            let adapter = FeedAdapter::new(&task.name, &task.target, task.depth, ctx.clone());
            Some(Box::new(adapter) as Box<dyn SourceAdapter>)
        });

        let ctx = context.clone();
        registry.register(AdapterKind::Directory, move |task: &CrawlTask| {
            let adapter = DirectoryAdapter::new(&task.name, &task.target, task.depth, ctx.clone());
            Some(Box::new(adapter) as Box<dyn SourceAdapter>)
        });

        registry.register(AdapterKind::DeepCrawl, move |task: &CrawlTask| {
            let adapter = DeepCrawlAdapter::new(&task.target, task.depth, context.clone());
            Some(Box::new(adapter) as Box<dyn SourceAdapter>)
        });

        registry
    }

    /// Registers (or replaces) the factory for an adapter kind
    pub fn register(&mut self, kind: AdapterKind, factory: impl AdapterFactory + 'static) {
        self.factories.insert(kind, Arc::new(factory));
    }

    /// Builds the adapter for a task, if a factory for its kind is registered
    pub fn build(&self, task: &CrawlTask) -> Option<Box<dyn SourceAdapter>> {
        self.factories.get(&task.adapter)?.build(task)
    }

    /// Returns true if a factory is registered for the kind
    pub fn supports(&self, kind: AdapterKind) -> bool {
        self.factories.contains_key(&kind)
    }
}
