//! Crawl scheduler
//!
//! This module handles:
//! - A fixed pool of workers pulling tasks from a dynamic queue
//! - Run-wide deduplication of discoveries before they are buffered
//! - Re-submitting crawl seeds as deep crawl tasks, bounded by depth
//! - Batching writes into the knowledge store
//! - Quiescent termination and cooperative cancellation with a grace period

use super::dedup::DedupTracker;
use super::queue::{TaskLease, TaskQueue};
use super::task::{AdapterKind, CrawlTask};
use crate::config::CrawlerConfig;
use crate::sources::{AdapterRegistry, Discovery};
use crate::state::TaskState;
use crate::storage::{KnowledgeStore, StorageResult};
use crate::url::normalize_url;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Tuning knobs of the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// No task deeper than this is ever created
    pub max_depth: u32,

    /// Buffered discoveries that trigger a flush
    pub flush_threshold: usize,

    /// How long in-flight workers may run after cancellation
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for SchedulerConfig {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            workers: config.workers as usize,
            max_depth: config.max_depth,
            flush_threshold: config.flush_threshold.max(1),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }
}

/// What happened during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Seed tasks admitted (duplicates among the seeds are skipped)
    pub seeded: usize,

    /// Deep crawl tasks created from accepted crawl seeds
    pub tasks_spawned: usize,

    pub tasks_completed: usize,
    pub tasks_failed: usize,

    /// Discoveries received from adapters
    pub discoveries: usize,

    /// Discoveries dropped because their identity was already claimed
    pub duplicates: usize,

    /// Discoveries dropped because their URL could not be normalized
    pub invalid: usize,

    /// Discoveries claimed and buffered for storage
    pub accepted: usize,

    /// Records newly inserted into the store
    pub inserted: usize,

    /// Crawl seeds recorded but not crawled because of the depth bound
    pub depth_limited: usize,

    /// Deepest task created during the run
    pub max_task_depth: u32,

    /// Accepted records that never reached the store
    pub records_lost: usize,

    /// Workers that panicked (and were replaced)
    pub worker_panics: usize,

    /// The run was stopped by the cancellation token
    pub cancelled: bool,

    /// First storage failure, if any; flushing halts after it
    pub storage_error: Option<String>,
}

impl RunReport {
    /// Returns true if a storage failure ended the run
    pub fn storage_failed(&self) -> bool {
        self.storage_error.is_some()
    }
}

/// Worker pool over a dynamic task queue
pub struct CrawlScheduler {
    config: SchedulerConfig,
    registry: Arc<AdapterRegistry>,
    dedup: Arc<DedupTracker>,
    store: Arc<dyn KnowledgeStore>,
}

impl CrawlScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Worker width, depth bound, flush threshold and grace period
    /// * `registry` - Builds the adapter of each task
    /// * `dedup` - Run-wide claimed identities, shared with deep crawl adapters
    /// * `store` - Destination of accepted discoveries
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<AdapterRegistry>,
        dedup: Arc<DedupTracker>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            config,
            registry,
            dedup,
            store,
        }
    }

    /// Runs the seed tasks, and everything they discover, to completion
    ///
    /// Returns when the queue is empty with nothing running, or after
    /// `cancel` fired and the in-flight workers finished or were aborted.
    /// The write buffer is flushed in both cases.
    pub async fn run(&self, seeds: Vec<CrawlTask>, cancel: CancellationToken) -> RunReport {
        let run = Arc::new(RunState {
            config: self.config.clone(),
            queue: TaskQueue::new(),
            registry: Arc::clone(&self.registry),
            dedup: Arc::clone(&self.dedup),
            store: Arc::clone(&self.store),
            buffer: Mutex::new(Vec::new()),
            halted: AtomicBool::new(false),
            storage_error: Mutex::new(None),
            flushes_in_flight: AtomicUsize::new(0),
            flush_settled: Notify::new(),
            counters: Counters::default(),
        });

        for seed in seeds {
            if run.dedup.try_claim(&seed.identity()) {
                run.queue.push(seed);
                run.counters.seeded.fetch_add(1, Ordering::Relaxed);
            } else {
                tracing::debug!("Skipping duplicate seed {} ({})", seed.name, seed.target);
            }
        }

        tracing::info!(
            "Starting {} seed tasks with {} workers (max depth {})",
            run.queue.pending(),
            self.config.workers,
            self.config.max_depth
        );

        let mut workers = JoinSet::new();
        for id in 0..self.config.workers.max(1) {
            run.spawn_worker(&mut workers, id);
        }

        let cancelled = tokio::select! {
            _ = run.drain(&mut workers) => false,
            _ = cancel.cancelled() => true,
        };

        if cancelled {
            let dropped = run.queue.close();
            tracing::info!(
                "Cancellation requested: {} queued tasks dropped, waiting up to {:?} for {} workers",
                dropped,
                self.config.shutdown_grace,
                run.queue.running()
            );

            let grace = tokio::time::timeout(self.config.shutdown_grace, run.drain(&mut workers));
            if grace.await.is_err() {
                tracing::warn!("Grace period elapsed, aborting {} workers", workers.len());
                workers.abort_all();
                run.drain(&mut workers).await;
            }
        }

        let remaining = run.take_buffer();
        run.flush(remaining).await;
        run.settle_flushes().await;

        run.report(cancelled)
    }
}

#[derive(Debug, Default)]
struct Counters {
    seeded: AtomicUsize,
    tasks_spawned: AtomicUsize,
    tasks_completed: AtomicUsize,
    tasks_failed: AtomicUsize,
    discoveries: AtomicUsize,
    duplicates: AtomicUsize,
    invalid: AtomicUsize,
    accepted: AtomicUsize,
    inserted: AtomicUsize,
    depth_limited: AtomicUsize,
    max_task_depth: AtomicU32,
    records_lost: AtomicUsize,
    worker_panics: AtomicUsize,
}

/// State shared by the workers of one run
struct RunState {
    config: SchedulerConfig,
    queue: Arc<TaskQueue>,
    registry: Arc<AdapterRegistry>,
    dedup: Arc<DedupTracker>,
    store: Arc<dyn KnowledgeStore>,
    buffer: Mutex<Vec<Discovery>>,
    halted: AtomicBool,
    storage_error: Mutex<Option<String>>,
    /// Store inserts started but not yet accounted for
    flushes_in_flight: AtomicUsize,
    flush_settled: Notify,
    counters: Counters,
}

/// Marks one store insert as settled when dropped, even if the insert panicked
struct FlushGuard<'a>(&'a RunState);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.flushes_in_flight.fetch_sub(1, Ordering::AcqRel);
        self.0.flush_settled.notify_one();
    }
}

impl RunState {
    fn spawn_worker(self: &Arc<Self>, workers: &mut JoinSet<()>, id: usize) {
        let run = Arc::clone(self);
        workers.spawn(async move { run.worker(id).await });
    }

    /// Waits for every worker, replacing the ones that panic
    async fn drain(self: &Arc<Self>, workers: &mut JoinSet<()>) {
        let mut next_id = workers.len();
        while let Some(joined) = workers.join_next().await {
            let Err(e) = joined else { continue };
            if !e.is_panic() {
                continue;
            }

            self.counters.worker_panics.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Worker panicked: {}", e);
            if !self.queue.is_closed() {
                self.spawn_worker(workers, next_id);
                next_id += 1;
            }
        }
    }

    async fn worker(self: &Arc<Self>, id: usize) {
        tracing::trace!("Worker {} started", id);

        while let Some(mut lease) = self.queue.next().await {
            let outcome = self.run_task(&lease).await;
            lease.advance(outcome);
            match lease.state() {
                TaskState::Completed => self.counters.tasks_completed.fetch_add(1, Ordering::Relaxed),
                _ => self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed),
            };
            tracing::debug!(
                "Task {} [{}] {} at depth {}: {}",
                lease.name,
                lease.adapter,
                lease.target,
                lease.depth,
                lease.state()
            );
        }

        tracing::trace!("Worker {} finished", id);
    }

    async fn run_task(self: &Arc<Self>, lease: &TaskLease) -> TaskState {
        let task = lease.task();

        let Some(adapter) = self.registry.build(task) else {
            tracing::warn!("No adapter could be built for {} ({})", task.name, task.adapter);
            return TaskState::Failed;
        };

        let mut produced = 0;
        {
            let mut discoveries = adapter.search(&task.keywords);
            while let Some(discovery) = discoveries.next().await {
                produced += 1;
                self.accept(task, discovery).await;
            }
        }

        let failures = adapter.failures();
        if produced == 0 && failures > 0 {
            tracing::debug!("{} produced nothing after {} transport failures", task.name, failures);
            TaskState::Failed
        } else {
            TaskState::Completed
        }
    }

    /// Dedup filter, depth-bounded re-submission and buffering of one discovery
    async fn accept(self: &Arc<Self>, task: &CrawlTask, discovery: Discovery) {
        self.counters.discoveries.fetch_add(1, Ordering::Relaxed);

        let identity = match normalize_url(&discovery.url) {
            Ok(url) => url.to_string(),
            Err(e) => {
                self.counters.invalid.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Dropping {}: {}", discovery.url, e);
                return;
            }
        };

        if !self.dedup.try_claim(&identity) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);

        // The record's depth is the depth of the task that found it
        let record = Discovery {
            url: identity,
            depth: task.depth,
            ..discovery
        };

        if record.is_crawl_seed() {
            self.submit_deep_crawl(task, &record);
        }

        let batch = {
            let mut buffer = self.lock_buffer();
            buffer.push(record);
            if buffer.len() >= self.config.flush_threshold {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };

        if let Some(batch) = batch {
            self.flush(batch).await;
        }
    }

    fn submit_deep_crawl(&self, parent: &CrawlTask, record: &Discovery) {
        let depth = parent.depth + 1;
        if depth > self.config.max_depth {
            self.counters.depth_limited.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let child = CrawlTask::new(
            record.source.clone(),
            record.url.clone(),
            depth,
            AdapterKind::DeepCrawl,
            Arc::clone(&parent.keywords),
        );

        if self.queue.push(child) {
            self.counters.tasks_spawned.fetch_add(1, Ordering::Relaxed);
            self.counters.max_task_depth.fetch_max(depth, Ordering::Relaxed);
        }
    }

    async fn flush(self: &Arc<Self>, batch: Vec<Discovery>) {
        if batch.is_empty() {
            return;
        }
        let size = batch.len();

        if self.halted.load(Ordering::Acquire) {
            self.counters.records_lost.fetch_add(size, Ordering::Relaxed);
            tracing::error!("Storage halted, dropping batch of {} records", size);
            return;
        }

        // The blocking insert settles its own outcome: it keeps running, and
        // commits, even when the awaiting worker is aborted.
        self.flushes_in_flight.fetch_add(1, Ordering::AcqRel);
        let run = Arc::clone(self);
        let insert = tokio::task::spawn_blocking(move || {
            let _settled = FlushGuard(&run);
            let result = run.store.insert_batch(&batch);
            run.settle_flush(size, result);
        });

        if let Err(e) = insert.await {
            self.halt(size, e.to_string());
        }
    }

    fn settle_flush(&self, size: usize, result: StorageResult<usize>) {
        match result {
            Ok(inserted) => {
                self.counters.inserted.fetch_add(inserted, Ordering::Relaxed);
                tracing::debug!("Flushed {} records ({} new)", size, inserted);
            }
            Err(e) => self.halt(size, e.to_string()),
        }
    }

    /// Waits for inserts whose workers were aborted mid-flush
    async fn settle_flushes(&self) {
        while self.flushes_in_flight.load(Ordering::Acquire) > 0 {
            self.flush_settled.notified().await;
        }
    }

    /// Records a storage failure and stops admitting new work
    fn halt(&self, size: usize, message: String) {
        self.counters.records_lost.fetch_add(size, Ordering::Relaxed);
        tracing::error!("Storage failure, batch of {} records lost: {}", size, message);

        if !self.halted.swap(true, Ordering::AcqRel) {
            let mut error = self
                .storage_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *error = Some(message);

            let dropped = self.queue.close();
            tracing::error!("Halting flushes; {} queued tasks dropped", dropped);
        }
    }

    fn take_buffer(&self) -> Vec<Discovery> {
        std::mem::take(&mut *self.lock_buffer())
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Vec<Discovery>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn report(&self, cancelled: bool) -> RunReport {
        let c = &self.counters;
        let storage_error = self
            .storage_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        RunReport {
            seeded: c.seeded.load(Ordering::Relaxed),
            tasks_spawned: c.tasks_spawned.load(Ordering::Relaxed),
            tasks_completed: c.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: c.tasks_failed.load(Ordering::Relaxed),
            discoveries: c.discoveries.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
            invalid: c.invalid.load(Ordering::Relaxed),
            accepted: c.accepted.load(Ordering::Relaxed),
            inserted: c.inserted.load(Ordering::Relaxed),
            depth_limited: c.depth_limited.load(Ordering::Relaxed),
            max_task_depth: c.max_task_depth.load(Ordering::Relaxed),
            records_lost: c.records_lost.load(Ordering::Relaxed),
            worker_panics: c.worker_panics.load(Ordering::Relaxed),
            cancelled,
            storage_error,
        }
    }
}
