//! Integration tests for a complete hunt
//!
//! These tests use wiremock to serve a search engine, a feed, a directory
//! and a seed page, and run the coordinator end-to-end against them.

use hunt::config::{Config, CrawlerConfig, EngineEntry, OutputConfig, SourceEntry, TransportConfig};
use hunt::crawler::{run_hunt, Coordinator, HuntRequest};
use hunt::normalize_url;
use hunt::output::LEADS_HEADER;
use hunt::storage::{KnowledgeStore, RunStatus, SqliteStore};
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENGINE_PAGE: &str = r#"
<html><body>
    <a href="http://aaaaaaaaaaaaaaaa.onion/">Market One</a>
    <a href="http://bbbbbbbbbbbbbbbb.onion/shop">Second Shop</a>
    <a href="/about">About</a>
</body></html>
"#;

const FEED: &str = "\
# Community list
Market: cccccccccccccccc.onion
Forum: dddddddddddddddd.onion
Market mirror: aaaaaaaaaaaaaaaa.onion
";

const DIRECTORY_PAGE: &str = r#"
<html><body>
    <a href="http://eeeeeeeeeeeeeeee.onion/">Market list</a>
    <a href="http://ffffffffffffffff.onion/">Forum</a>
</body></html>
"#;

const SEED_PAGE: &str = r#"
<html><body>
    <p>Our market moved to gggggggggggggggg.onion</p>
</body></html>
"#;

/// Creates a test configuration pointing every source at the mock server
fn create_test_config(base_url: &str, db_path: &Path, leads_path: Option<&Path>) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers: 4,
            min_domain_interval_ms: 10,
            default_depth: 1,
            max_depth: 3,
            flush_threshold: 2,
            shutdown_grace_ms: 500,
        },
        transport: TransportConfig {
            proxy: None,
            connect_timeout_secs: 2,
            request_timeout_secs: 5,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            ..TransportConfig::default()
        },
        output: OutputConfig {
            database_path: db_path.display().to_string(),
            leads_path: leads_path.map(|p| p.display().to_string()),
        },
        engines: vec![EngineEntry {
            name: "Engine".to_string(),
            url: format!("{}/search", base_url),
            query_param: "q".to_string(),
            selector: "a[href]".to_string(),
            extra_params: BTreeMap::new(),
            exclude_hosts: Vec::new(),
        }],
        feeds: vec![SourceEntry {
            name: "Feed_1".to_string(),
            url: format!("{}/feed.txt", base_url),
        }],
        directories: vec![SourceEntry {
            name: "Spider_1".to_string(),
            url: format!("{}/dir", base_url),
        }],
        seeds: vec![SourceEntry {
            name: "DeepCrawler_1".to_string(),
            url: format!("{}/seed", base_url),
        }],
        synonyms: BTreeMap::new(),
        ..Config::default()
    }
}

async fn mount_sources(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "market"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ENGINE_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/feed.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/dir"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DIRECTORY_PAGE))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/seed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEED_PAGE))
        .mount(server)
        .await;
}

fn request(query: &str) -> HuntRequest {
    HuntRequest {
        // Keep the crawl on the mock server: no onion page is fetched
        depth: Some(0),
        ..HuntRequest::new(query)
    }
}

fn key(url: &str) -> String {
    normalize_url(url).unwrap().to_string()
}

#[tokio::test]
async fn test_full_hunt_against_mock_sources() {
    let mock_server = MockServer::start().await;
    mount_sources(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kb.db");
    let leads_path = dir.path().join("leads.csv");
    let config = create_test_config(&mock_server.uri(), &db_path, Some(&leads_path));

    let summary = run_hunt(
        config,
        "test-hash".to_string(),
        &request("market"),
        CancellationToken::new(),
    )
    .await
    .expect("hunt failed");

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.keywords, vec!["market".to_string()]);
    assert_eq!(summary.report.seeded, 4);
    assert_eq!(summary.report.tasks_completed, 4);
    assert_eq!(summary.report.tasks_failed, 0);
    assert_eq!(summary.report.tasks_spawned, 0);
    assert_eq!(summary.report.depth_limited, 1);
    assert_eq!(summary.report.duplicates, 1);
    assert_eq!(summary.report.inserted, 5);

    let store = SqliteStore::open(&db_path).unwrap();
    assert_eq!(store.count().unwrap(), 5);
    for url in [
        "http://aaaaaaaaaaaaaaaa.onion/",
        "http://bbbbbbbbbbbbbbbb.onion/shop",
        "http://cccccccccccccccc.onion/",
        "http://eeeeeeeeeeeeeeee.onion/",
        "http://gggggggggggggggg.onion/",
    ] {
        assert!(store.get(&key(url)).unwrap().is_some(), "{} not stored", url);
    }
    assert!(store.get(&key("http://dddddddddddddddd.onion/")).unwrap().is_none());
    assert!(store.get(&key("http://ffffffffffffffff.onion/")).unwrap().is_none());

    let directory_hit = store.get(&key("http://eeeeeeeeeeeeeeee.onion/")).unwrap().unwrap();
    assert_eq!(directory_hit.source, "Spider_1");
    assert_eq!(directory_hit.title, "Market list");

    let run = store.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.inserted, 5);
    assert_eq!(run.config_hash, "test-hash");

    let leads = std::fs::read_to_string(&leads_path).unwrap();
    let lines: Vec<_> = leads.lines().collect();
    assert_eq!(lines[0], LEADS_HEADER);
    assert_eq!(lines.len(), 6);
    assert_eq!(summary.leads_written, 5);
}

#[tokio::test]
async fn test_second_run_stores_nothing_new() {
    let mock_server = MockServer::start().await;
    mount_sources(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kb.db");
    let leads_path = dir.path().join("leads.csv");

    let coordinator = Coordinator::new(
        create_test_config(&mock_server.uri(), &db_path, Some(&leads_path)),
        "hash".to_string(),
    )
    .unwrap();

    let first = coordinator
        .run(&request("market"), CancellationToken::new())
        .await
        .unwrap();
    let second = coordinator
        .run(&request("market"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.report.inserted, 5);
    assert_eq!(second.report.inserted, 0);
    assert_eq!(second.leads_written, 0);
    assert_eq!(coordinator.store().count().unwrap(), 5);

    let leads = std::fs::read_to_string(&leads_path).unwrap();
    assert_eq!(leads.lines().count(), 6);
}

#[tokio::test]
async fn test_match_all_records_every_address() {
    let mock_server = MockServer::start().await;
    mount_sources(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kb.db");
    let mut config = create_test_config(&mock_server.uri(), &db_path, None);
    // Engines are queried per keyword; leave them out of this run
    config.engines.clear();

    let request = HuntRequest {
        match_all: true,
        ..request("market")
    };
    let summary = run_hunt(config, "hash".to_string(), &request, CancellationToken::new())
        .await
        .unwrap();

    // Feed: a, c, d. Directory: e, f. Seed page: g.
    assert_eq!(summary.report.inserted, 6);
    assert!(summary.leads_path.is_none());

    let store = SqliteStore::open(&db_path).unwrap();
    let forum = store.get(&key("http://dddddddddddddddd.onion/")).unwrap().unwrap();
    assert_eq!(forum.title, "Massive Discovery");
}

#[tokio::test]
async fn test_unreachable_sources_fail_their_tasks() {
    let mock_server = MockServer::start().await;
    // Nothing mounted: every request answers 404

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kb.db");
    let config = create_test_config(&mock_server.uri(), &db_path, None);

    let summary = run_hunt(config, "hash".to_string(), &request("market"), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.report.tasks_failed, 4);
    assert_eq!(summary.report.inserted, 0);
}

#[tokio::test]
async fn test_local_search_after_hunt() {
    let mock_server = MockServer::start().await;
    mount_sources(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("kb.db");
    let config = create_test_config(&mock_server.uri(), &db_path, None);

    run_hunt(config, "hash".to_string(), &request("market"), CancellationToken::new())
        .await
        .unwrap();

    let store = SqliteStore::open(&db_path).unwrap();
    let results = store.search_local("shop").unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, key("http://bbbbbbbbbbbbbbbb.onion/shop"));
}
