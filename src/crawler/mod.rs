//! Crawler module: the crawl scheduler and its collaborators
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching through the anonymizing proxy
//! - HTML parsing, onion address extraction and redirect unwrapping
//! - Per-domain rate limiting and run-wide deduplication
//! - The task queue and the worker pool that drains it
//! - Overall run coordination (store, run record, leads file)

mod coordinator;
mod dedup;
mod fetcher;
mod parser;
mod queue;
mod rate_limiter;
mod scheduler;
mod task;

pub use coordinator::{run_hunt, Coordinator, HuntRequest, HuntSummary};
pub use dedup::DedupTracker;
pub use fetcher::{build_http_client, Fetch, HttpFetcher};
pub use parser::{
    extract_onion_addresses, parse_html, select_anchors, unwrap_redirect, Anchor, OnionMention,
};
pub use queue::{TaskLease, TaskQueue};
pub use rate_limiter::RateLimiter;
pub use scheduler::{CrawlScheduler, RunReport, SchedulerConfig};
pub use task::{AdapterKind, CrawlTask};
