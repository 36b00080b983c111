//! End-to-end poll runs
//!
//! A wiremock server plays the catalog, the store is a SQLite file in a
//! temporary directory.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tpb_poller::config::{
    ClassifierConfig, Config, FetchConfig, FetchStrategy, PollConfig, StorageConfig,
};
use tpb_poller::storage::{open_storage, SqliteStorage, Storage};
use tpb_poller::{build_fetcher, EditionClassifier, PollOptions, Poller};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a results page listing the given titles in order
fn results_page(titles: &[&str]) -> String {
    let entries: String = titles
        .iter()
        .map(|title| {
            let slug = title.to_lowercase().replace(' ', "-");
            format!(
                r#"<article><h2 class="post-title"><a href="https://getcomics.org/other-comics/{}/">{}</a></h2></article>"#,
                slug, title
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", entries)
}

/// Serves `body` for the search query of `series`
async fn mount_search(server: &MockServer, series: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("s", format!("{} tpb", series)))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Creates a direct-fetch configuration against the mock catalog
fn create_test_config(search_url: &str, db_path: &str) -> Config {
    Config {
        fetch: FetchConfig {
            strategy: FetchStrategy::Direct,
            search_url: search_url.to_string(),
            qualifier: "tpb".to_string(),
            timeout_secs: 15,
            endpoint: None,
            api_key: None,
            challenge_markers: vec!["Just a moment".to_string(), "cf_challenge".to_string()],
        },
        classifier: ClassifierConfig::default(),
        storage: StorageConfig {
            database_path: db_path.to_string(),
        },
        poll: PollConfig::default(),
    }
}

struct TestStore {
    _dir: TempDir,
    db_path: String,
    storage: Arc<Mutex<SqliteStorage>>,
}

impl TestStore {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("tpb.db");
        let storage = open_storage(&path).expect("Failed to open storage");
        Self {
            db_path: path.to_string_lossy().into_owned(),
            _dir: dir,
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    fn add_series(&self, name: &str) -> i64 {
        self.storage.lock().unwrap().add_series(name).unwrap()
    }

    fn poller(&self, config: &Config) -> Poller<SqliteStorage> {
        Poller::from_config(config, self.storage.clone(), "test-hash")
            .expect("Failed to create poller")
    }
}

#[tokio::test]
async fn test_new_edition_is_recorded_and_dismissals_cleared() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Saga",
        ResponseTemplate::new(200).set_body_string(results_page(&[
            "Saga #66 (2023)",
            "Saga Vol. 10 TPB",
            "Saga Vol. 9 TPB",
        ])),
    )
    .await;

    let store = TestStore::new();
    let saga = store.add_series("Saga");
    store.storage.lock().unwrap().add_dismissal(saga).unwrap();

    let config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    let summary = store.poller(&config).run().await.expect("Poll failed");

    assert_eq!(summary.checked, 1);
    assert_eq!(summary.inserted, 1);
    assert!(summary.errors.is_empty());

    let storage = store.storage.lock().unwrap();
    let editions = storage.list_editions(saga).unwrap();
    assert_eq!(editions.len(), 1);
    assert_eq!(editions[0].series_id, saga);
    assert_eq!(editions[0].title, "Saga Vol. 10 TPB");
    assert_eq!(
        editions[0].link,
        "https://getcomics.org/other-comics/saga-vol.-10-tpb/"
    );
    assert_eq!(storage.count_dismissals(saga).unwrap(), 0);
    assert!(storage.get_series(saga).unwrap().last_polled_at.is_some());
}

#[tokio::test]
async fn test_repeat_poll_only_updates_last_poll() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Saga",
        ResponseTemplate::new(200).set_body_string(results_page(&["Saga Vol. 10 TPB"])),
    )
    .await;

    let store = TestStore::new();
    let saga = store.add_series("Saga");
    let config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    let poller = store.poller(&config);

    poller.run().await.expect("First poll failed");
    let (editions_before, polled_before) = {
        let mut storage = store.storage.lock().unwrap();
        storage.add_dismissal(saga).unwrap();
        (
            storage.list_editions(saga).unwrap(),
            storage.get_series(saga).unwrap().last_polled_at.unwrap(),
        )
    };

    let summary = poller.run().await.expect("Second poll failed");

    assert_eq!(summary.inserted, 0);
    assert!(summary.errors.is_empty());

    let storage = store.storage.lock().unwrap();
    assert_eq!(storage.list_editions(saga).unwrap(), editions_before);
    assert_eq!(storage.count_dismissals(saga).unwrap(), 1);
    let polled_after = storage.get_series(saga).unwrap().last_polled_at.unwrap();
    assert!(polled_after >= polled_before);
}

#[tokio::test]
async fn test_blocked_series_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Saga",
        ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Just a moment...</title></head><body>cf_challenge</body></html>",
        ),
    )
    .await;
    mount_search(
        &server,
        "Monstress",
        ResponseTemplate::new(200).set_body_string(results_page(&["Monstress Vol. 9 TPB"])),
    )
    .await;

    let store = TestStore::new();
    let saga = store.add_series("Saga");
    let monstress = store.add_series("Monstress");

    let config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    let summary = store.poller(&config).run().await.expect("Poll failed");

    assert_eq!(summary.checked, 2);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].series_id, saga);
    assert!(summary.errors[0].error.contains("Blocked"));

    let storage = store.storage.lock().unwrap();
    assert!(storage.list_editions(saga).unwrap().is_empty());
    assert_eq!(storage.list_editions(monstress).unwrap().len(), 1);
    assert!(storage.get_series(saga).unwrap().last_polled_at.is_some());
    assert!(storage.get_series(monstress).unwrap().last_polled_at.is_some());
}

#[tokio::test]
async fn test_every_series_is_touched_when_every_fetch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = TestStore::new();
    let ids: Vec<i64> = ["Saga", "Monstress", "Paper Girls"]
        .iter()
        .map(|name| store.add_series(name))
        .collect();

    let mut config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    config.poll.max_concurrent_series = 3;
    let summary = store.poller(&config).run().await.expect("Poll failed");

    assert_eq!(summary.checked, 3);
    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.errors.len(), 3);
    assert!(!summary.timed_out);

    let storage = store.storage.lock().unwrap();
    for id in ids {
        assert!(storage.get_series(id).unwrap().last_polled_at.is_some());
    }

    let runs = storage.recent_runs(1).unwrap();
    assert_eq!(runs[0].checked, 3);
    assert_eq!(runs[0].errors, 3);
    assert_eq!(runs[0].config_hash, "test-hash");
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_concurrent_series_each_reconcile_once() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Saga",
        ResponseTemplate::new(200)
            .set_body_string(results_page(&["Saga Vol. 10 TPB"]))
            .set_delay(Duration::from_millis(100)),
    )
    .await;
    mount_search(
        &server,
        "Monstress",
        ResponseTemplate::new(200)
            .set_body_string(results_page(&["Monstress Vol. 9 TPB"]))
            .set_delay(Duration::from_millis(100)),
    )
    .await;
    mount_search(
        &server,
        "Paper Girls",
        ResponseTemplate::new(200)
            .set_body_string(results_page(&["Paper Girls Deluxe Edition Book One"]))
            .set_delay(Duration::from_millis(100)),
    )
    .await;

    let store = TestStore::new();
    // Two rows tracking the same name see the same page at the same time
    let ids: Vec<i64> = ["Saga", "Saga", "Monstress", "Paper Girls"]
        .iter()
        .map(|name| store.add_series(name))
        .collect();

    let mut config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    config.poll.max_concurrent_series = 4;
    let poller = store.poller(&config);

    let first = poller.run().await.expect("First poll failed");
    let second = poller.run().await.expect("Second poll failed");

    assert_eq!(first.checked, 4);
    assert!(first.errors.is_empty(), "errors: {:?}", first.errors);
    assert_eq!(first.inserted, 4);
    assert_eq!(second.inserted, 0);
    assert!(second.errors.is_empty(), "errors: {:?}", second.errors);

    let storage = store.storage.lock().unwrap();
    let mut stored = 0;
    for id in &ids {
        let editions = storage.list_editions(*id).unwrap();
        assert_eq!(editions.len(), 1, "series {} has {:?}", id, editions);
        stored += editions.len();
    }
    assert_eq!(stored, first.inserted);
    assert_eq!(
        storage.list_editions(ids[0]).unwrap()[0].title,
        storage.list_editions(ids[1]).unwrap()[0].title
    );

    let runs = storage.recent_runs(2).unwrap();
    assert_eq!(runs[0].inserted, 0);
    assert_eq!(runs[1].inserted, 4);
}

#[tokio::test]
async fn test_run_timeout_leaves_unreached_series_untouched() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Saga",
        ResponseTemplate::new(200).set_body_string(results_page(&["Saga Vol. 10 TPB"])),
    )
    .await;
    mount_search(
        &server,
        "Monstress",
        ResponseTemplate::new(200)
            .set_body_string(results_page(&["Monstress Vol. 9 TPB"]))
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let store = TestStore::new();
    let saga = store.add_series("Saga");
    let monstress = store.add_series("Monstress");

    let config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    let options = PollOptions {
        run_timeout: Some(Duration::from_millis(1500)),
        ..PollOptions::from_config(&config, "test-hash")
    };
    let poller = Poller::new(
        store.storage.clone(),
        build_fetcher(&config.fetch).unwrap(),
        EditionClassifier::from_config(&config.classifier).unwrap(),
        options,
    );

    let summary = poller.run().await.expect("Poll failed");

    assert!(summary.timed_out);
    assert_eq!(summary.checked, 1);
    assert_eq!(summary.skipped, 1);

    let storage = store.storage.lock().unwrap();
    assert!(storage.get_series(saga).unwrap().last_polled_at.is_some());
    let unreached = storage.get_series(monstress).unwrap();
    assert!(unreached.last_polled_at.is_none());
    assert!(storage.list_editions(monstress).unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_store_polls_nothing() {
    let server = MockServer::start().await;
    let store = TestStore::new();

    let config = create_test_config(&format!("{}/", server.uri()), &store.db_path);
    let summary = store.poller(&config).run().await.expect("Poll failed");

    assert_eq!(summary.checked, 0);
    assert!(summary.errors.is_empty());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
