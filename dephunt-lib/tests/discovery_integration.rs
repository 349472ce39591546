//! Integration tests for bulk discovery, cursor checkpoints, and index reuse

use core::time::Duration;
use dephunt_lib::harvest::{
    Ecosystem, Endpoints, Fetcher, IndexSnapshot, NoProgress, Orchestrator, PackageId, PackageRequest, RegistryClient,
    RetryPolicy, RunOptions,
};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use url::Url;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(server: &MockServer, output_dir: &Path) -> Orchestrator {
    let client = RegistryClient {
        fetcher: Fetcher::new(
            "dephunt-tests",
            RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                timeout: Duration::from_secs(5),
            },
        )
        .expect("Failed to create fetcher"),
        endpoints: Endpoints::rooted_at(&Url::parse(&server.uri()).unwrap()).unwrap(),
        page_delay: Duration::ZERO,
    };

    Orchestrator::new(client, output_dir)
}

fn options(resume: bool, refresh_index: bool) -> RunOptions {
    RunOptions {
        resume,
        refresh_index,
        concurrency: 4,
    }
}

fn ids(names: &[&str]) -> Vec<PackageId> {
    names.iter().copied().map(PackageId::new).collect()
}

async fn mount_record(server: &MockServer, p: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(p))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "path": p })))
        .expect(times)
        .mount(server)
        .await;
}

fn npm_rows(names: &[&str]) -> Value {
    json!({ "rows": names.iter().map(|n| json!({ "id": n, "key": n })).collect::<Vec<_>>() })
}

fn crates_page(names: &[&str]) -> Value {
    json!({ "crates": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>() })
}

async fn mount_crates_page(server: &MockServer, page: &str, names: &[&str], times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v1/crates"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_json(crates_page(names)))
        .expect(times)
        .mount(server)
        .await;
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_npm_pages_until_limit_then_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_all_docs"))
        .and(query_param_is_missing("startkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_rows(&["a", "b"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all_docs"))
        .and(query_param("startkey", "\"b\""))
        .and(query_param("skip", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_rows(&["c", "d"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all_docs"))
        .and(query_param("startkey", "\"d\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_rows(&[])))
        .expect(1)
        .mount(&server)
        .await;
    for name in ["/a", "/b", "/c", "/d"] {
        mount_record(&server, name, 1).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let store = orchestrator.store_for(Ecosystem::Npm);

    let first = orchestrator
        .run(Ecosystem::Npm, &PackageRequest::Discover { limit: 3 }, options(true, false), &NoProgress)
        .await
        .unwrap();
    assert_eq!(first.requested, 3);
    assert_eq!(first.downloaded, 3);

    let snapshot = IndexSnapshot::load(&store, Ecosystem::Npm).unwrap().unwrap();
    assert_eq!(snapshot.packages, ids(&["a", "b", "c", "d"]));
    assert_eq!(snapshot.cursor.as_deref(), Some("d"));
    assert!(!snapshot.complete);

    let bulk_progress: Value =
        serde_json::from_str(&fs::read_to_string(store.path_of("indexes/bulk_progress.json")).unwrap()).unwrap();
    assert_eq!(bulk_progress, json!({ "last_key": "d" }));

    let second = orchestrator
        .run(Ecosystem::Npm, &PackageRequest::Discover { limit: 10 }, options(true, false), &NoProgress)
        .await
        .unwrap();
    assert_eq!(second.requested, 4);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.downloaded, 1);

    let snapshot = IndexSnapshot::load(&store, Ecosystem::Npm).unwrap().unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.packages.len(), 4);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_npm_resume_seeds_cursor_from_bulk_progress() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_all_docs"))
        .and(query_param_is_missing("startkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_rows(&["a"])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_all_docs"))
        .and(query_param("startkey", "\"m\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(npm_rows(&["n", "o"])))
        .expect(1)
        .mount(&server)
        .await;
    mount_record(&server, "/n", 1).await;
    mount_record(&server, "/o", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    orchestrator
        .store_for(Ecosystem::Npm)
        .put("indexes/bulk_progress.json", &json!({ "last_key": "m" }))
        .unwrap();

    let summary = orchestrator
        .run(Ecosystem::Npm, &PackageRequest::Discover { limit: 2 }, options(true, false), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_cargo_stops_on_empty_page_and_reuses_complete_index() {
    let server = MockServer::start().await;
    mount_crates_page(&server, "1", &["syn", "serde"], 1).await;
    mount_crates_page(&server, "2", &["tokio"], 1).await;
    mount_crates_page(&server, "3", &[], 1).await;
    for name in ["syn", "serde", "tokio"] {
        mount_record(&server, &format!("/api/v1/crates/{name}"), 1).await;
    }

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());

    let first = orchestrator
        .run(Ecosystem::Cargo, &PackageRequest::Discover { limit: 10 }, options(true, false), &NoProgress)
        .await
        .unwrap();
    assert_eq!(first.requested, 3);
    assert_eq!(first.downloaded, 3);

    let snapshot = IndexSnapshot::load(&orchestrator.store_for(Ecosystem::Cargo), Ecosystem::Cargo)
        .unwrap()
        .unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.cursor.as_deref(), Some("2"));
    assert_eq!(snapshot.packages, ids(&["syn", "serde", "tokio"]));

    // The complete index is reused without listing again and everything is already stored.
    let second = orchestrator
        .run(Ecosystem::Cargo, &PackageRequest::Discover { limit: 10 }, options(true, false), &NoProgress)
        .await
        .unwrap();
    assert_eq!(second.requested, 3);
    assert_eq!(second.skipped, 3);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_cached_index_prefix_satisfies_smaller_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(crates_page(&["never"])))
        .expect(0)
        .mount(&server)
        .await;
    mount_record(&server, "/api/v1/crates/first", 1).await;
    mount_record(&server, "/api/v1/crates/second", 0).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let store = orchestrator.store_for(Ecosystem::Cargo);
    let mut snapshot = IndexSnapshot::new(Ecosystem::Cargo);
    snapshot.packages = ids(&["first", "second"]);
    snapshot.cursor = Some("1".to_string());
    snapshot.save(&store).unwrap();

    let summary = orchestrator
        .run(Ecosystem::Cargo, &PackageRequest::Discover { limit: 1 }, options(false, false), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.requested, 1);
    assert_eq!(summary.downloaded, 1);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_refresh_index_ignores_cached_snapshot() {
    let server = MockServer::start().await;
    mount_crates_page(&server, "1", &["fresh"], 1).await;
    mount_crates_page(&server, "2", &[], 1).await;
    mount_record(&server, "/api/v1/crates/fresh", 1).await;
    mount_record(&server, "/api/v1/crates/stale", 0).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let store = orchestrator.store_for(Ecosystem::Cargo);
    let mut snapshot = IndexSnapshot::new(Ecosystem::Cargo);
    snapshot.packages = ids(&["stale"]);
    snapshot.complete = true;
    snapshot.save(&store).unwrap();

    let summary = orchestrator
        .run(Ecosystem::Cargo, &PackageRequest::Discover { limit: 5 }, options(false, true), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.requested, 1);
    assert_eq!(summary.downloaded, 1);
    let snapshot = IndexSnapshot::load(&store, Ecosystem::Cargo).unwrap().unwrap();
    assert_eq!(snapshot.packages, ids(&["fresh"]));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_discovery_error_keeps_partial_list() {
    let server = MockServer::start().await;
    mount_crates_page(&server, "1", &["a", "b"], 1).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_record(&server, "/api/v1/crates/a", 1).await;
    mount_record(&server, "/api/v1/crates/b", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let summary = orchestrator
        .run(Ecosystem::Cargo, &PackageRequest::Discover { limit: 10 }, options(false, false), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.requested, 2);
    assert_eq!(summary.downloaded, 2);

    let snapshot = IndexSnapshot::load(&orchestrator.store_for(Ecosystem::Cargo), Ecosystem::Cargo)
        .unwrap()
        .unwrap();
    assert!(!snapshot.complete);
    assert_eq!(snapshot.cursor.as_deref(), Some("1"));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_pypi_simple_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/simple/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<!DOCTYPE html><html><body>\
             <a href=\"/simple/requests/\">requests</a>\
             <a href=\"/simple/numpy/\">numpy</a>\
             <a href=\"/simple/flask/\">flask</a>\
             </body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    mount_record(&server, "/pypi/requests/json", 1).await;
    mount_record(&server, "/pypi/numpy/json", 1).await;
    mount_record(&server, "/pypi/flask/json", 0).await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let summary = orchestrator
        .run(Ecosystem::Pypi, &PackageRequest::Discover { limit: 2 }, options(false, false), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.downloaded, 2);
    let snapshot = IndexSnapshot::load(&orchestrator.store_for(Ecosystem::Pypi), Ecosystem::Pypi)
        .unwrap()
        .unwrap();
    assert!(snapshot.complete);
    assert_eq!(snapshot.packages, ids(&["requests", "numpy", "flask"]));
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort on Windows")]
async fn test_maven_search_stops_once_limit_reached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/solrsearch/select"))
        .and(query_param("q", "g:org.apache"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "numFound": 2, "docs": [
                { "id": "org.apache.commons:commons-lang3", "g": "org.apache.commons", "a": "commons-lang3" },
                { "id": "broken", "g": "org.apache.commons" }
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/solrsearch/select"))
        .and(query_param("q", "g:com.google"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": { "docs": [] } })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/maven2/org/apache/commons/commons-lang3/maven-metadata.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<metadata><versioning><release>3.17.0</release></versioning></metadata>",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/maven2/org/apache/commons/commons-lang3/3.17.0/commons-lang3-3.17.0.pom"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<project/>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let orchestrator = orchestrator(&server, dir.path());
    let summary = orchestrator
        .run(Ecosystem::Maven, &PackageRequest::Discover { limit: 1 }, options(false, false), &NoProgress)
        .await
        .unwrap();

    assert_eq!(summary.requested, 1);
    assert_eq!(summary.downloaded, 1);

    let snapshot = IndexSnapshot::load(&orchestrator.store_for(Ecosystem::Maven), Ecosystem::Maven).unwrap().unwrap();
    assert_eq!(snapshot.packages, ids(&["org.apache.commons:commons-lang3"]));
    assert_eq!(snapshot.cursor.as_deref(), Some("org.apache"));
    assert!(!snapshot.complete);
}
