//! Hunt coordinator - run orchestration
//!
//! This module wires a run together:
//! - Opening the knowledge store (fatal if unavailable)
//! - Expanding the query into keywords and seeding one task per source
//! - Building the fetcher, the adapter registry and the scheduler
//! - Recording the run and appending its new records to the leads file

use crate::config::Config;
use crate::crawler::fetcher::{Fetch, HttpFetcher};
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::scheduler::{CrawlScheduler, RunReport, SchedulerConfig};
use crate::crawler::task::{AdapterKind, CrawlTask};
use crate::crawler::DedupTracker;
use crate::output::append_leads;
use crate::sources::{expand_keywords, AdapterContext, AdapterRegistry, Classifier};
use crate::storage::{timestamp_now, RunStatus, SqliteStore};
use crate::HuntError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// What the user asked for
#[derive(Debug, Clone)]
pub struct HuntRequest {
    /// Search term, expanded through the synonym table
    pub query: String,

    /// Record every address found instead of keyword matches only
    pub match_all: bool,

    /// Recursion depth; defaults to `crawler.default-depth`
    pub depth: Option<u32>,
}

impl HuntRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            match_all: false,
            depth: None,
        }
    }
}

/// Outcome of a finished (or cancelled) run
#[derive(Debug, Clone)]
pub struct HuntSummary {
    pub run_id: i64,
    pub keywords: Vec<String>,
    pub depth: u32,
    pub status: RunStatus,
    pub report: RunReport,
    pub leads_written: usize,
    pub leads_path: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Main coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    config_hash: String,
    store: Arc<SqliteStore>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `config_hash` - Hash of the configuration source, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Store opened
    /// * `Err(HuntError::StorageUnavailable)` - The database could not be opened
    pub fn new(config: Config, config_hash: String) -> Result<Self, HuntError> {
        let path = Path::new(&config.output.database_path);
        let store = SqliteStore::open(path).map_err(|e| {
            HuntError::StorageUnavailable(format!("{}: {}", path.display(), e))
        })?;

        Ok(Self::with_store(config, config_hash, Arc::new(store)))
    }

    /// Creates a coordinator over an already opened store
    pub fn with_store(config: Config, config_hash: String, store: Arc<SqliteStore>) -> Self {
        Self {
            config: Arc::new(config),
            config_hash,
            store,
        }
    }

    /// The knowledge store of this coordinator
    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Resolves the requested depth against the configured maximum
    pub fn effective_depth(&self, request: &HuntRequest) -> u32 {
        let requested = request.depth.unwrap_or(self.config.crawler.default_depth);
        if requested > self.config.crawler.max_depth {
            tracing::warn!(
                "Requested depth {} exceeds max-depth {}, clamping",
                requested,
                self.config.crawler.max_depth
            );
            return self.config.crawler.max_depth;
        }
        requested
    }

    /// Creates one depth-0 task per configured source
    pub fn seed_tasks(&self, keywords: Arc<[String]>) -> Vec<CrawlTask> {
        let config = &self.config;
        let engines = config
            .engines
            .iter()
            .map(|e| (e.name.as_str(), e.url.as_str(), AdapterKind::SearchEngine));
        let feeds = config
            .feeds
            .iter()
            .map(|s| (s.name.as_str(), s.url.as_str(), AdapterKind::Feed));
        let directories = config
            .directories
            .iter()
            .map(|s| (s.name.as_str(), s.url.as_str(), AdapterKind::Directory));
        let seeds = config
            .seeds
            .iter()
            .map(|s| (s.name.as_str(), s.url.as_str(), AdapterKind::DeepCrawl));

        engines
            .chain(feeds)
            .chain(directories)
            .chain(seeds)
            .map(|(name, url, kind)| CrawlTask::new(name, url, 0, kind, Arc::clone(&keywords)))
            .collect()
    }

    /// Builds the standard adapter registry around a fetcher
    pub fn build_registry(
        &self,
        fetcher: Arc<dyn Fetch>,
        dedup: Arc<DedupTracker>,
        match_all: bool,
    ) -> AdapterRegistry {
        let context = AdapterContext {
            fetcher,
            classifier: Arc::new(Classifier::new(&self.config.categories)),
            dedup,
            match_all,
        };
        AdapterRegistry::standard(context, &self.config.engines)
    }

    /// Runs a hunt with the HTTP fetcher built from the transport config
    pub async fn run(
        &self,
        request: &HuntRequest,
        cancel: CancellationToken,
    ) -> Result<HuntSummary, HuntError> {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(
            self.config.crawler.min_domain_interval_ms,
        )));
        let fetcher = HttpFetcher::new(&self.config.transport, limiter)?;
        self.run_with_fetcher(request, Arc::new(fetcher), cancel).await
    }

    /// Runs a hunt with the given fetch capability
    ///
    /// Storage failures during the run do not return `Err`; they are reported
    /// in `HuntSummary::report` and the run is recorded as failed.
    pub async fn run_with_fetcher(
        &self,
        request: &HuntRequest,
        fetcher: Arc<dyn Fetch>,
        cancel: CancellationToken,
    ) -> Result<HuntSummary, HuntError> {
        let started = Instant::now();
        let keywords = expand_keywords(&request.query, &self.config.synonyms);
        let depth = self.effective_depth(request);

        if request.match_all {
            tracing::info!("Starting hunt in match-all mode (depth {})", depth);
        } else {
            tracing::info!("Starting hunt for {:?} (depth {})", keywords, depth);
        }

        let run_id = self.store.create_run(&self.config_hash, &request.query)?;
        let since = timestamp_now();

        let dedup = Arc::new(DedupTracker::new());
        let registry = self.build_registry(fetcher, Arc::clone(&dedup), request.match_all);
        let scheduler_config = SchedulerConfig {
            max_depth: depth,
            ..SchedulerConfig::from(&self.config.crawler)
        };
        let scheduler = CrawlScheduler::new(
            scheduler_config,
            Arc::new(registry),
            dedup,
            self.store.clone(),
        );

        let seeds = self.seed_tasks(Arc::from(keywords.clone()));
        let report = scheduler.run(seeds, cancel).await;

        let status = if report.storage_failed() {
            RunStatus::Failed
        } else if report.cancelled {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };

        let leads_path = self.config.output.leads_path.as_ref().map(PathBuf::from);
        let leads_written = match &leads_path {
            Some(path) if report.inserted > 0 => self.write_leads(path, &since),
            _ => 0,
        };

        if let Err(e) = self.store.finish_run(run_id, status, report.inserted) {
            tracing::error!("Failed to record end of run {}: {}", run_id, e);
        }

        let summary = HuntSummary {
            run_id,
            keywords,
            depth,
            status,
            report,
            leads_written,
            leads_path,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Run {} {}: {} new records, {} tasks ({} failed)",
            summary.run_id,
            summary.status.to_db_string(),
            summary.report.inserted,
            summary.report.tasks_completed + summary.report.tasks_failed,
            summary.report.tasks_failed
        );

        Ok(summary)
    }

    fn write_leads(&self, path: &Path, since: &str) -> usize {
        let records = match self.store.records_since(since) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Could not read new records for the leads file: {}", e);
                return 0;
            }
        };

        match append_leads(path, &records) {
            Ok(written) => {
                tracing::info!("Appended {} leads to {}", written, path.display());
                written
            }
            Err(e) => {
                tracing::warn!("Could not write leads to {}: {}", path.display(), e);
                0
            }
        }
    }
}

/// Runs a complete hunt
///
/// This is the main library entry point. It will:
/// 1. Open the knowledge store
/// 2. Seed one task per configured source
/// 3. Run the scheduler until quiescence or cancellation
/// 4. Record the run and append new leads
///
/// # Returns
///
/// * `Ok(HuntSummary)` - The run finished or was cancelled
/// * `Err(HuntError)` - Startup failed, or storage failed during the run
pub async fn run_hunt(
    config: Config,
    config_hash: String,
    request: &HuntRequest,
    cancel: CancellationToken,
) -> Result<HuntSummary, HuntError> {
    let coordinator = Coordinator::new(config, config_hash)?;
    let summary = coordinator.run(request, cancel).await?;

    match &summary.report.storage_error {
        Some(message) => Err(HuntError::StorageUnavailable(message.clone())),
        None => Ok(summary),
    }
}
