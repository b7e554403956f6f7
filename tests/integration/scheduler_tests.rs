//! Scheduler tests with scripted adapters and in-memory stores

use futures::stream::{self, StreamExt};
use hunt::crawler::{AdapterKind, CrawlScheduler, CrawlTask, DedupTracker, SchedulerConfig};
use hunt::normalize_url;
use hunt::sources::{AdapterRegistry, Discovery, DiscoveryStream, SourceAdapter};
use hunt::storage::{KnowledgeStore, LinkRecord, SqliteStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ENGINE_A: &str = "http://enginea.onion/search";
const X: &str = "http://xxxxxxxxxxxxxxxx.onion/";
const Y: &str = "http://yyyyyyyyyyyyyyyy.onion/";

/// What a scripted adapter does once polled
#[derive(Clone)]
enum Script {
    Yield(Vec<Discovery>),
    YieldThenHang(Vec<Discovery>),
    FailTransport,
    Panic,
}

struct ScriptedAdapter {
    name: String,
    script: Script,
}

impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, _keywords: &'a [String]) -> DiscoveryStream<'a> {
        match &self.script {
            Script::Yield(items) => stream::iter(items.clone()).boxed(),
            Script::YieldThenHang(items) => stream::iter(items.clone())
                .chain(stream::pending())
                .boxed(),
            Script::FailTransport => stream::empty().boxed(),
            Script::Panic => stream::iter(vec![0])
                .map(|_| -> Discovery { panic!("adapter exploded") })
                .boxed(),
        }
    }

    fn failures(&self) -> usize {
        match self.script {
            Script::FailTransport => 1,
            _ => 0,
        }
    }
}

/// Registers a scripted factory for every adapter kind, keyed by task target
fn registry(scripts: HashMap<String, Script>) -> AdapterRegistry {
    let scripts = Arc::new(scripts);
    let mut registry = AdapterRegistry::new();
    for kind in [
        AdapterKind::SearchEngine,
        AdapterKind::Feed,
        AdapterKind::Directory,
        AdapterKind::DeepCrawl,
    ] {
        let scripts = Arc::clone(&scripts);
        registry.register(kind, move |task: &CrawlTask| {
            let script = scripts
                .get(&task.target)
                .cloned()
                .unwrap_or(Script::Yield(Vec::new()));
            Some(Box::new(ScriptedAdapter {
                name: task.name.clone(),
                script,
            }) as Box<dyn SourceAdapter>)
        });
    }
    registry
}

fn config(workers: usize, max_depth: u32, flush_threshold: usize) -> SchedulerConfig {
    SchedulerConfig {
        workers,
        max_depth,
        flush_threshold,
        shutdown_grace: Duration::from_millis(100),
    }
}

fn scheduler(
    config: SchedulerConfig,
    registry: AdapterRegistry,
    store: Arc<dyn KnowledgeStore>,
) -> CrawlScheduler {
    CrawlScheduler::new(
        config,
        Arc::new(registry),
        Arc::new(DedupTracker::new()),
        store,
    )
}

fn seed(name: &str, target: &str, kind: AdapterKind) -> CrawlTask {
    CrawlTask::new(name, target, 0, kind, Arc::from(vec!["market".to_string()]))
}

fn leaf(url: &str, source: &str) -> Discovery {
    Discovery::leaf(url, "Match: market", "Other / General", source, 0)
}

fn crawl_seed(url: &str, source: &str) -> Discovery {
    Discovery::crawl_seed(url, "Deep Match: market", "Other / General", source, 0)
}

fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

fn stored(store: &SqliteStore, url: &str) -> Option<LinkRecord> {
    let key = normalize_url(url).unwrap().to_string();
    store.get(&key).unwrap()
}

/// Records the size of every batch, then delegates to SQLite
struct CountingStore {
    inner: SqliteStore,
    batches: Mutex<Vec<usize>>,
}

impl KnowledgeStore for CountingStore {
    fn insert_batch(&self, records: &[Discovery]) -> StorageResult<usize> {
        self.batches.lock().unwrap().push(records.len());
        self.inner.insert_batch(records)
    }

    fn search_local(&self, query: &str) -> StorageResult<Vec<LinkRecord>> {
        self.inner.search_local(query)
    }

    fn count(&self) -> StorageResult<usize> {
        self.inner.count()
    }

    fn get(&self, url: &str) -> StorageResult<Option<LinkRecord>> {
        self.inner.get(url)
    }
}

/// Takes its time on every write
struct SlowStore {
    inner: SqliteStore,
    delay: Duration,
}

impl KnowledgeStore for SlowStore {
    fn insert_batch(&self, records: &[Discovery]) -> StorageResult<usize> {
        std::thread::sleep(self.delay);
        self.inner.insert_batch(records)
    }

    fn search_local(&self, query: &str) -> StorageResult<Vec<LinkRecord>> {
        self.inner.search_local(query)
    }

    fn count(&self) -> StorageResult<usize> {
        self.inner.count()
    }

    fn get(&self, url: &str) -> StorageResult<Option<LinkRecord>> {
        self.inner.get(url)
    }
}

/// Rejects every write
struct FailingStore;

impl KnowledgeStore for FailingStore {
    fn insert_batch(&self, _records: &[Discovery]) -> StorageResult<usize> {
        Err(StorageError::Database("disk full".to_string()))
    }

    fn search_local(&self, _query: &str) -> StorageResult<Vec<LinkRecord>> {
        Ok(Vec::new())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(0)
    }

    fn get(&self, _url: &str) -> StorageResult<Option<LinkRecord>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_engine_seed_and_self_loop() {
    // EngineA yields crawl seed X and leaf Y; X's page links back to X
    let mut scripts = HashMap::new();
    scripts.insert(
        ENGINE_A.to_string(),
        Script::Yield(vec![crawl_seed(X, "EngineA"), leaf(Y, "EngineA")]),
    );
    let x_identity = normalize_url(X).unwrap().to_string();
    scripts.insert(x_identity, Script::Yield(vec![crawl_seed(X, "EngineA")]));

    let store = memory_store();
    let scheduler = scheduler(config(4, 1, 20), registry(scripts), store.clone());
    let report = scheduler
        .run(
            vec![seed("EngineA", ENGINE_A, AdapterKind::SearchEngine)],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.seeded, 1);
    assert_eq!(report.tasks_spawned, 1);
    assert_eq!(report.max_task_depth, 1);
    assert_eq!(report.tasks_completed, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.inserted, 2);
    assert!(!report.cancelled);

    assert_eq!(store.count().unwrap(), 2);
    let x = stored(&store, X).unwrap();
    assert_eq!(x.source, "EngineA");
    assert!(stored(&store, Y).is_some());
}

#[tokio::test]
async fn test_no_task_deeper_than_max_depth() {
    // Every crawled page links to a new page one level further down
    let chain = [
        "http://aaaaaaaaaaaaaaaa.onion/p",
        "http://aaaaaaaaaaaaaaaa.onion/pa",
        "http://aaaaaaaaaaaaaaaa.onion/paa",
        "http://aaaaaaaaaaaaaaaa.onion/paaa",
        "http://aaaaaaaaaaaaaaaa.onion/paaaa",
    ];
    let mut scripts = HashMap::new();
    scripts.insert(
        "https://feed.example/list".to_string(),
        Script::Yield(vec![crawl_seed(chain[0], "Feed_1")]),
    );
    for pair in chain.windows(2) {
        scripts.insert(
            pair[0].to_string(),
            Script::Yield(vec![crawl_seed(pair[1], "Feed_1")]),
        );
    }

    let depths = Arc::new(Mutex::new(Vec::new()));
    let mut registry = registry(scripts.clone());
    let seen = Arc::clone(&depths);
    let scripts = Arc::new(scripts);
    registry.register(AdapterKind::DeepCrawl, move |task: &CrawlTask| {
        seen.lock().unwrap().push(task.depth);
        let script = scripts
            .get(&task.target)
            .cloned()
            .unwrap_or(Script::Yield(Vec::new()));
        Some(Box::new(ScriptedAdapter {
            name: task.name.clone(),
            script,
        }) as Box<dyn SourceAdapter>)
    });

    let store = memory_store();
    let scheduler = scheduler(config(2, 2, 20), registry, store.clone());
    let report = scheduler
        .run(
            vec![seed("Feed_1", "https://feed.example/list", AdapterKind::Feed)],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.tasks_spawned, 2);
    assert_eq!(report.max_task_depth, 2);
    assert_eq!(report.depth_limited, 1);
    assert_eq!(report.tasks_completed, 3);

    let mut depths = depths.lock().unwrap().clone();
    depths.sort();
    assert_eq!(depths, vec![1, 2]);

    // The link found at the depth bound is still recorded
    assert_eq!(store.count().unwrap(), 3);
    assert!(stored(&store, chain[2]).is_some());
    assert!(stored(&store, chain[3]).is_none());
}

#[tokio::test]
async fn test_concurrent_duplicates_are_recorded_once() {
    let shared: Vec<Discovery> = "abcde"
        .chars()
        .map(|c| leaf(&format!("http://{}.onion/", c.to_string().repeat(16)), "Feed"))
        .collect();

    let mut scripts = HashMap::new();
    let mut seeds = Vec::new();
    for i in 0..10 {
        let target = format!("https://feed{}.example/list", i);
        scripts.insert(target.clone(), Script::Yield(shared.clone()));
        seeds.push(seed(&format!("Feed_{}", i), &target, AdapterKind::Feed));
    }

    let store = memory_store();
    let scheduler = scheduler(config(8, 1, 3), registry(scripts), store.clone());
    let report = scheduler.run(seeds, CancellationToken::new()).await;

    assert_eq!(report.tasks_completed, 10);
    assert_eq!(report.discoveries, 50);
    assert_eq!(report.accepted, 5);
    assert_eq!(report.duplicates, 45);
    assert_eq!(report.inserted, 5);
    assert_eq!(store.count().unwrap(), 5);
}

#[tokio::test]
async fn test_duplicate_seeds_are_skipped() {
    let store = memory_store();
    let scheduler = scheduler(config(2, 1, 20), registry(HashMap::new()), store);
    let report = scheduler
        .run(
            vec![
                seed("Feed_1", "https://feed.example/list", AdapterKind::Feed),
                seed("Feed_1", "https://feed.example/list", AdapterKind::Feed),
            ],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.seeded, 1);
    assert_eq!(report.tasks_completed, 1);
}

#[tokio::test]
async fn test_configured_deep_seed_is_still_recorded_when_found() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "https://feed.example/list".to_string(),
        Script::Yield(vec![leaf(X, "Feed_1")]),
    );

    let store = memory_store();
    let scheduler = scheduler(config(2, 1, 20), registry(scripts), store.clone());
    let report = scheduler
        .run(
            vec![
                seed("DeepCrawler_1", X, AdapterKind::DeepCrawl),
                seed("Feed_1", "https://feed.example/list", AdapterKind::Feed),
            ],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.seeded, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.inserted, 1);
    assert_eq!(stored(&store, X).unwrap().source, "Feed_1");
}

#[tokio::test]
async fn test_flush_threshold_batches_writes() {
    let items: Vec<Discovery> = "abcdefg"
        .chars()
        .map(|c| leaf(&format!("http://{}.onion/", c.to_string().repeat(16)), "Feed_1"))
        .collect();
    let mut scripts = HashMap::new();
    scripts.insert("https://feed.example/list".to_string(), Script::Yield(items));

    let store = Arc::new(CountingStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        batches: Mutex::new(Vec::new()),
    });
    let scheduler = scheduler(config(1, 1, 3), registry(scripts), store.clone());
    let report = scheduler
        .run(
            vec![seed("Feed_1", "https://feed.example/list", AdapterKind::Feed)],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.inserted, 7);
    assert_eq!(*store.batches.lock().unwrap(), vec![3, 3, 1]);
}

#[tokio::test]
async fn test_storage_failure_halts_flushes() {
    let batch_a: Vec<Discovery> = "abcde"
        .chars()
        .map(|c| leaf(&format!("http://{}.onion/", c.to_string().repeat(16)), "Feed_A"))
        .collect();
    let batch_b: Vec<Discovery> = "vwxyz"
        .chars()
        .map(|c| leaf(&format!("http://{}.onion/", c.to_string().repeat(16)), "Feed_B"))
        .collect();

    let mut scripts = HashMap::new();
    scripts.insert("https://a.example/list".to_string(), Script::Yield(batch_a));
    scripts.insert("https://b.example/list".to_string(), Script::Yield(batch_b));

    let scheduler = scheduler(config(1, 1, 2), registry(scripts), Arc::new(FailingStore));
    let report = scheduler
        .run(
            vec![
                seed("Feed_A", "https://a.example/list", AdapterKind::Feed),
                seed("Feed_B", "https://b.example/list", AdapterKind::Feed),
            ],
            CancellationToken::new(),
        )
        .await;

    assert!(report.storage_failed());
    assert_eq!(report.storage_error.as_deref(), Some("Database error: disk full"));
    assert_eq!(report.inserted, 0);
    assert_eq!(report.records_lost, 5);
    // The queued second feed is dropped once storage fails
    assert_eq!(report.tasks_completed + report.tasks_failed, 1);
}

#[tokio::test]
async fn test_cancellation_flushes_buffer_and_aborts_after_grace() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "https://feed.example/list".to_string(),
        Script::YieldThenHang(vec![leaf(X, "Feed_1"), leaf(Y, "Feed_1")]),
    );
    scripts.insert(
        "https://other.example/list".to_string(),
        Script::Yield(vec![leaf("http://zzzzzzzzzzzzzzzz.onion/", "Feed_2")]),
    );

    let store = memory_store();
    let scheduler = scheduler(config(1, 1, 20), registry(scripts), store.clone());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(
            vec![
                seed("Feed_1", "https://feed.example/list", AdapterKind::Feed),
                seed("Feed_2", "https://other.example/list", AdapterKind::Feed),
            ],
            cancel,
        ),
    )
    .await
    .expect("scheduler did not stop after cancellation");

    assert!(report.cancelled);
    assert_eq!(report.tasks_completed, 0);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(store.count().unwrap(), 2);
    assert!(stored(&store, "http://zzzzzzzzzzzzzzzz.onion/").is_none());
}

#[tokio::test]
async fn test_insert_outliving_aborted_worker_is_counted() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "https://feed.example/list".to_string(),
        Script::Yield(vec![leaf(X, "Feed_1"), leaf(Y, "Feed_1")]),
    );

    let store = Arc::new(SlowStore {
        inner: SqliteStore::open_in_memory().unwrap(),
        delay: Duration::from_millis(400),
    });
    let config = SchedulerConfig {
        shutdown_grace: Duration::from_millis(20),
        ..config(1, 1, 2)
    };
    let scheduler = scheduler(config, registry(scripts), store.clone());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    // The only worker is aborted while its batch is still being written
    let report = scheduler
        .run(
            vec![seed("Feed_1", "https://feed.example/list", AdapterKind::Feed)],
            cancel,
        )
        .await;

    assert!(report.cancelled);
    assert_eq!(report.tasks_completed, 0);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.records_lost, 0);
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_terminates_when_queue_drains() {
    // Two pages that link to each other
    let a = "http://aaaaaaaaaaaaaaaa.onion/";
    let b = "http://bbbbbbbbbbbbbbbb.onion/";
    let mut scripts = HashMap::new();
    scripts.insert(
        "https://feed.example/list".to_string(),
        Script::Yield(vec![crawl_seed(a, "Feed_1")]),
    );
    scripts.insert(
        normalize_url(a).unwrap().to_string(),
        Script::Yield(vec![crawl_seed(b, "Feed_1")]),
    );
    scripts.insert(
        normalize_url(b).unwrap().to_string(),
        Script::Yield(vec![crawl_seed(a, "Feed_1")]),
    );

    let store = memory_store();
    let scheduler = scheduler(config(3, 3, 20), registry(scripts), store.clone());
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(
            vec![seed("Feed_1", "https://feed.example/list", AdapterKind::Feed)],
            CancellationToken::new(),
        ),
    )
    .await
    .expect("scheduler did not reach quiescence");

    assert!(!report.cancelled);
    assert_eq!(report.tasks_completed, 3);
    assert_eq!(report.tasks_spawned, 2);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.count().unwrap(), 2);
}

#[tokio::test]
async fn test_empty_seed_list_terminates() {
    let store = memory_store();
    let scheduler = scheduler(config(4, 1, 20), registry(HashMap::new()), store);
    let report = scheduler.run(Vec::new(), CancellationToken::new()).await;

    assert_eq!(report.seeded, 0);
    assert_eq!(report.tasks_completed, 0);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_failed_tasks() {
    let mut scripts = HashMap::new();
    scripts.insert("https://down.example/list".to_string(), Script::FailTransport);

    let mut registry = registry(scripts);
    // No factory can build a directory adapter
    registry.register(
        AdapterKind::Directory,
        |_: &CrawlTask| -> Option<Box<dyn SourceAdapter>> { None },
    );

    let store = memory_store();
    let scheduler = scheduler(config(2, 1, 20), registry, store);
    let report = scheduler
        .run(
            vec![
                seed("Feed_1", "https://down.example/list", AdapterKind::Feed),
                seed("Spider_1", "http://dir.onion/", AdapterKind::Directory),
                seed("Feed_2", "https://empty.example/list", AdapterKind::Feed),
            ],
            CancellationToken::new(),
        )
        .await;

    assert_eq!(report.tasks_failed, 2);
    assert_eq!(report.tasks_completed, 1);
}

#[tokio::test]
async fn test_worker_panic_does_not_wedge_the_run() {
    let mut scripts = HashMap::new();
    scripts.insert("https://bad.example/list".to_string(), Script::Panic);
    scripts.insert(
        "https://good.example/list".to_string(),
        Script::Yield(vec![leaf(Y, "Feed_2")]),
    );

    let store = memory_store();
    let scheduler = scheduler(config(1, 1, 20), registry(scripts), store.clone());
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.run(
            vec![
                seed("Feed_1", "https://bad.example/list", AdapterKind::Feed),
                seed("Feed_2", "https://good.example/list", AdapterKind::Feed),
            ],
            CancellationToken::new(),
        ),
    )
    .await
    .expect("scheduler wedged after a worker panic");

    assert_eq!(report.worker_panics, 1);
    assert_eq!(report.tasks_completed, 1);
    assert_eq!(store.count().unwrap(), 1);
}
