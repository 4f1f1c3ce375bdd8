//! Integration tests for the retrieval engine
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full discover, fetch and record cycle end-to-end.

use edgar_getter::config::{Config, OutputConfig, RetrievalConfig, UserAgentConfig};
use edgar_getter::retrieval::Coordinator;
use edgar_getter::state::{BatchStatus, FetchState};
use edgar_getter::storage::{record_retrieval, RunStatus, SqliteStorage, Storage};
use edgar_getter::telemetry::{MemoryTelemetry, DISPATCHED_COUNTER, RETRIEVE_DURATION};
use edgar_getter::url::LinkJoin;
use edgar_getter::GetterError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration that saves into `dir`
fn create_test_config(dir: &TempDir) -> Config {
    Config {
        retrieval: RetrievalConfig {
            save_location: dir.path().to_path_buf(),
            max_retry_attempts: 1,
            max_concurrent_fetches: 4,
            fetch_timeout_secs: 10,
            link_join: LinkJoin::Concat,
            ..RetrievalConfig::default()
        },
        user_agent: UserAgentConfig {
            name: "TestGetter".to_string(),
            version: "1.0.0".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: None,
        },
    }
}

/// Builds an index page with one table row per href
fn index_page(hrefs: &[&str]) -> String {
    let rows: String = hrefs
        .iter()
        .map(|href| format!("<tr><td><a href=\"{0}\">{0}</a></td></tr>", href))
        .collect();
    format!(
        "<html><body><h1>Index</h1><table>{}</table></body></html>",
        rows
    )
}

async fn mount_index(server: &MockServer, hrefs: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/feed/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(index_page(hrefs)))
        .mount(server)
        .await;
}

async fn mount_resource(server: &MockServer, resource: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(resource))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_index_page_filters_ineligible_links() {
    let server = MockServer::start().await;
    mount_index(&server, &["a.gz", "b.js"]).await;

    Mock::given(method("GET"))
        .and(path("/feed/a.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("gzip bytes"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/b.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("script"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files, vec!["a.gz".to_string()]);
    assert_eq!(result.discovered, 2);
    assert_eq!(result.dispatched, 2);
    assert_eq!(result.status, BatchStatus::Completed);

    let filtered: Vec<_> = result
        .outcomes
        .iter()
        .filter(|o| o.state == FetchState::Filtered)
        .collect();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].filename, "b.js");

    let written = std::fs::read_to_string(dir.path().join("a.gz")).unwrap();
    assert_eq!(written, "gzip bytes");
    assert!(!dir.path().join("b.js").exists());
}

#[tokio::test]
async fn test_single_resource_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/path/file.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tarball"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/path/file.tar.gz", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files, vec!["file.tar.gz".to_string()]);
    assert_eq!(result.discovered, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("file.tar.gz")).unwrap(),
        "tarball"
    );
}

#[tokio::test]
async fn test_single_resource_mode_ignores_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/path/file.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tarball"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let telemetry = Arc::new(MemoryTelemetry::new());
    let coordinator =
        Coordinator::with_telemetry(create_test_config(&dir), telemetry.clone()).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/path/file.tar.gz", server.uri()), 3)
        .await
        .unwrap();

    assert_eq!(result.files, vec!["file.tar.gz".to_string()]);
    assert_eq!(result.discovered, 1);
    assert_eq!(result.dispatched, 1);
    assert_eq!(telemetry.counter(DISPATCHED_COUNTER), 1);
}

#[tokio::test]
async fn test_limit_caps_dispatch() {
    let server = MockServer::start().await;
    mount_index(&server, &["one.gz", "two.gz", "three.gz"]).await;
    mount_resource(&server, "/feed/one.gz", "1").await;
    Mock::given(method("GET"))
        .and(path("/feed/two.gz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/three.gz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let telemetry = Arc::new(MemoryTelemetry::new());
    let coordinator =
        Coordinator::with_telemetry(create_test_config(&dir), telemetry.clone()).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 1)
        .await
        .unwrap();

    assert_eq!(result.discovered, 3);
    assert_eq!(result.dispatched, 1);
    assert_eq!(result.files, vec!["one.gz".to_string()]);
    assert_eq!(telemetry.counter(DISPATCHED_COUNTER), 1);
}

#[tokio::test]
async fn test_ceiling_exceeded_dispatches_nothing() {
    let server = MockServer::start().await;
    mount_index(&server, &["a.gz", "b.gz", "c.gz"]).await;
    Mock::given(method("GET"))
        .and(path("/feed/a.gz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retrieval.max_retrieval_size = 2;

    let telemetry = Arc::new(MemoryTelemetry::new());
    let coordinator = Coordinator::with_telemetry(config, telemetry.clone()).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await;

    match result {
        Err(e @ GetterError::TooManyResources { .. }) => {
            assert!(e.is_batch_fatal());
            assert!(matches!(e, GetterError::TooManyResources { found: 3, max: 2 }));
        }
        other => panic!("expected TooManyResources, got {:?}", other),
    }
    assert_eq!(telemetry.counter(DISPATCHED_COUNTER), 0);
}

#[tokio::test]
async fn test_repeated_retrieval_yields_same_files() {
    let server = MockServer::start().await;
    mount_index(&server, &["a.gz", "b.xls", "c.docx", "skip.html"]).await;
    mount_resource(&server, "/feed/a.gz", "a").await;
    mount_resource(&server, "/feed/b.xls", "b").await;
    mount_resource(&server, "/feed/c.docx", "c").await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();
    let source = format!("{}/feed/", server.uri());

    let first = coordinator.retrieve(&source, 0).await.unwrap();
    let second = coordinator.retrieve(&source, 0).await.unwrap();

    let first: BTreeSet<_> = first.files.into_iter().collect();
    let second: BTreeSet<_> = second.files.into_iter().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[tokio::test]
async fn test_every_dispatched_task_reports_once() {
    let server = MockServer::start().await;
    mount_index(&server, &["ok.gz", "missing.gz", "broken.gz", "page.html"]).await;
    mount_resource(&server, "/feed/ok.gz", "ok").await;
    Mock::given(method("GET"))
        .and(path("/feed/missing.gz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    // One initial attempt plus one retry
    Mock::given(method("GET"))
        .and(path("/feed/broken.gz"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let telemetry = Arc::new(MemoryTelemetry::new());
    let coordinator =
        Coordinator::with_telemetry(create_test_config(&dir), telemetry.clone()).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), result.dispatched);
    assert_eq!(result.files, vec!["ok.gz".to_string()]);

    let state_of = |name: &str| {
        result
            .outcomes
            .iter()
            .find(|o| o.filename == name)
            .map(|o| o.state)
    };
    assert_eq!(state_of("ok.gz"), Some(FetchState::Succeeded));
    assert_eq!(state_of("missing.gz"), Some(FetchState::HttpRejected));
    assert_eq!(state_of("broken.gz"), Some(FetchState::RetriesExhausted));
    assert_eq!(state_of("page.html"), Some(FetchState::Filtered));

    assert!(!dir.path().join("missing.gz").exists());
    assert!(!dir.path().join("broken.gz").exists());
    assert_eq!(result.unsuccessful().count(), 3);
    assert_eq!(telemetry.durations(RETRIEVE_DURATION).len(), 1);
}

#[tokio::test]
async fn test_cancellation_returns_partial_result() {
    let server = MockServer::start().await;
    mount_index(&server, &["slow.gz"]).await;
    Mock::given(method("GET"))
        .and(path("/feed/slow.gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let result = coordinator
        .retrieve_with_cancel(&format!("{}/feed/", server.uri()), 0, cancel)
        .await
        .unwrap();

    assert!(result.is_cancelled());
    assert_eq!(result.status, BatchStatus::Cancelled);
    assert!(result.files.is_empty());
    assert_eq!(result.outcomes.len(), 1);
    assert_eq!(result.outcomes[0].state, FetchState::Cancelled);
    assert!(result.elapsed < Duration::from_secs(5));
}

#[tokio::test]
async fn test_resolve_join_handles_absolute_hrefs() {
    let server = MockServer::start().await;
    mount_index(&server, &["/archive/a.gz"]).await;
    mount_resource(&server, "/archive/a.gz", "resolved").await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retrieval.link_join = LinkJoin::Resolve;
    let coordinator = Coordinator::new(config).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files, vec!["a.gz".to_string()]);
    assert_eq!(
        result.outcomes[0].uri,
        format!("{}/archive/a.gz", server.uri())
    );
}

#[tokio::test]
async fn test_retrieval_recorded_in_ledger() {
    let server = MockServer::start().await;
    mount_index(&server, &["a.gz", "b.js"]).await;
    mount_resource(&server, "/feed/a.gz", "payload").await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();
    let source = format!("{}/feed/", server.uri());

    let result = coordinator.retrieve(&source, 0).await.unwrap();

    let db_dir = TempDir::new().unwrap();
    let mut storage = SqliteStorage::new(&db_dir.path().join("runs.db")).unwrap();
    let run_id = record_retrieval(&mut storage, &result, "hash123").unwrap();

    let run = storage.get_run(run_id).unwrap();
    assert_eq!(run.source_uri, source);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash123");
    assert_eq!(run.discovered, 2);
    assert_eq!(run.dispatched, 2);
    assert_eq!(run.succeeded, 1);
    assert!(run.finished_at.is_some());

    let outcomes = storage.list_outcomes(run_id).unwrap();
    assert_eq!(outcomes.len(), 2);

    let counts = storage.count_outcomes_by_state(run_id).unwrap();
    assert_eq!(counts.get(&FetchState::Succeeded), Some(&1));
    assert_eq!(counts.get(&FetchState::Filtered), Some(&1));

    let succeeded = outcomes
        .iter()
        .find(|o| o.state == FetchState::Succeeded)
        .unwrap();
    assert_eq!(succeeded.filename, "a.gz");
    assert_eq!(succeeded.bytes_written, 7);
}

/// Mounts `count` slow resources under /feed/ and returns their hrefs
async fn mount_slow_resources(server: &MockServer, count: usize, delay: Duration) -> Vec<String> {
    let hrefs: Vec<String> = (0..count).map(|i| format!("slow{}.gz", i)).collect();
    for href in &hrefs {
        Mock::given(method("GET"))
            .and(path(format!("/feed/{}", href)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("slow")
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }
    hrefs
}

#[tokio::test]
async fn test_concurrency_bound_serializes_fetches() {
    let delay = Duration::from_millis(250);
    let server = MockServer::start().await;
    let hrefs = mount_slow_resources(&server, 4, delay).await;
    let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
    mount_index(&server, &hrefs).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retrieval.max_concurrent_fetches = 1;
    let coordinator = Coordinator::new(config).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files.len(), 4);
    assert!(
        result.elapsed >= delay * 4,
        "one fetch at a time should take at least {:?}, took {:?}",
        delay * 4,
        result.elapsed
    );
}

#[tokio::test]
async fn test_wider_concurrency_bound_overlaps_fetches() {
    let delay = Duration::from_millis(250);
    let server = MockServer::start().await;
    let hrefs = mount_slow_resources(&server, 4, delay).await;
    let hrefs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
    mount_index(&server, &hrefs).await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.retrieval.max_concurrent_fetches = 4;
    let coordinator = Coordinator::new(config).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files.len(), 4);
    assert!(
        result.elapsed < delay * 4,
        "four concurrent fetches should overlap, took {:?}",
        result.elapsed
    );
}

#[tokio::test]
async fn test_failed_fetch_leaves_same_named_download_in_place() {
    let server = MockServer::start().await;
    mount_index(&server, &["x/a.gz", "y/a.gz"]).await;
    Mock::given(method("GET"))
        .and(path("/feed/x/a.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("good"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/y/a.gz"))
        .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(400)))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(create_test_config(&dir)).unwrap();

    let result = coordinator
        .retrieve(&format!("{}/feed/", server.uri()), 0)
        .await
        .unwrap();

    assert_eq!(result.files, vec!["a.gz".to_string()]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("a.gz")).unwrap(),
        "good"
    );

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "unexpected files: {:?}", leftovers);
}
