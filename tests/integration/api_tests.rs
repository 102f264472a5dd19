//! Integration tests for the crawl API
//!
//! These tests run the real router, workers and task database, with wiremock
//! standing in for the search engine, and talk to the API over HTTP.

use lantern_crawl::api::{routes, CrawlService};
use lantern_crawl::config::Config;
use lantern_crawl::crawler::TaskPipeline;
use lantern_crawl::dispatch::Dispatcher;
use lantern_crawl::storage::StoragePool;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A running API server bound to an ephemeral port
struct TestApi {
    base_url: String,
    client: reqwest::Client,
    _dir: TempDir,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn submit(&self, keyword: &str) -> reqwest::Response {
        self.send_crawl(serde_json::json!({ "keyword": keyword })).await
    }

    async fn submit_to(&self, keyword: &str, engine: &str) -> reqwest::Response {
        self.send_crawl(serde_json::json!({ "keyword": keyword, "engine": engine }))
            .await
    }

    async fn send_crawl(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/crawl"))
            .json(&body)
            .send()
            .await
            .expect("Submit request failed")
    }

    async fn list(&self) -> Value {
        self.client
            .get(self.url("/tasks"))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON")
    }

    async fn poll(&self, task_id: &str) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/crawl/{}", task_id)))
            .send()
            .await
            .expect("Poll request failed")
    }

    /// Polls until the task leaves `processing` or the deadline passes
    async fn wait_for_terminal(&self, task_id: &str) -> Value {
        for _ in 0..300 {
            let body: Value = self.poll(task_id).await.json().await.expect("Invalid JSON");
            if body["status"] != "processing" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Task {} did not finish in time", task_id);
    }
}

/// Starts the API with the given worker count and queue capacity
///
/// Bing is served at `search_url`; Google at the same host under `/rss/search`.
async fn start_api(search_url: &str, workers: u32, queue_capacity: u32) -> TestApi {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let mut config = Config::default();
    config.search.endpoints.bing = search_url.to_string();
    config.search.endpoints.google = search_url.replace("/search", "/rss/search");
    config.search.debug_artifact_path = dir
        .path()
        .join("debug_{engine}.xml")
        .to_string_lossy()
        .into_owned();
    config.search.failure_log_path = dir
        .path()
        .join("crawl_failures.log")
        .to_string_lossy()
        .into_owned();
    config.storage.database_path = dir.path().join("tasks.db").to_string_lossy().into_owned();
    config.retry.unit_ms = 1;

    let pool = StoragePool::open(&config.storage.database_path, 8).expect("Failed to open pool");
    let pipeline =
        Arc::new(TaskPipeline::from_config(&config, pool.clone()).expect("Failed to build pipeline"));
    let (dispatcher, _workers) =
        Dispatcher::start(pipeline, workers as usize, queue_capacity as usize);
    let service = Arc::new(CrawlService::new(
        pool,
        dispatcher,
        config.search.default_engine,
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, routes::router(service))
            .await
            .expect("Server failed");
    });

    TestApi {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        _dir: dir,
    }
}

fn rss_feed(link: &str) -> String {
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel>
<title>Results</title><link>https://search.example.com</link><description>feed</description>
<item><title>Rust</title><link>{}</link><description>A language</description></item>
</channel></rss>"#,
        link
    )
}

#[tokio::test]
async fn test_health() {
    let api = start_api("http://127.0.0.1:1/search", 1, 4).await;

    let response = api.client.get(api.url("/")).send().await.expect("Request failed");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["message"], "Lantern crawl API is running");
}

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let mock_server = MockServer::start().await;
    let page = format!("{}/rust", mock_server.uri());

    // The delay keeps the task in processing long enough to observe it
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed(&page))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rust"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><main><p>Rust is fast.</p></main></body></html>"),
        )
        .mount(&mock_server)
        .await;

    let api = start_api(&format!("{}/search", mock_server.uri()), 2, 8).await;

    let response = api.submit("rust language").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["message"], "Crawl started");
    let task_id = body["task_id"].as_str().expect("task_id missing").to_string();

    // The record exists as soon as the submission returns
    let immediate: Value = api.poll(&task_id).await.json().await.expect("Invalid JSON");
    assert_eq!(immediate["status"], "processing");
    assert_eq!(immediate["keyword"], "rust language");
    assert_eq!(immediate["engine"], "bing");
    assert!(immediate["results"].as_array().expect("results").is_empty());
    assert!(immediate["first_page_html"].is_null());

    let done = api.wait_for_terminal(&task_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["results"][0]["link"], page.as_str());
    assert_eq!(done["results"][0]["title"], "Rust");
    assert_eq!(done["results"][0]["snippet"], "A language");
    assert_eq!(done["extracted_text"], "Rust is fast.");
    assert!(done["meta_author"].is_null());
    assert!(done["completed_at"].is_string());

    // Repeated polls of a finished task are byte-identical
    let first = api.poll(&task_id).await.text().await.expect("Body");
    let second = api.poll(&task_id).await.text().await.expect("Body");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_task_is_404() {
    let api = start_api("http://127.0.0.1:1/search", 1, 4).await;

    let response = api.poll("00000000-0000-0000-0000-000000000000").await;
    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.expect("Invalid JSON");
    assert_eq!(body["detail"], "Task not found");
}

#[tokio::test]
async fn test_empty_keyword_is_rejected() {
    let api = start_api("http://127.0.0.1:1/search", 1, 4).await;

    let response = api.submit("   ").await;
    assert_eq!(response.status(), 400);

    let tasks = api.list().await;
    assert!(tasks.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn test_each_submission_gets_a_new_task() {
    let api = start_api("http://127.0.0.1:1/search", 2, 8).await;

    let first: Value = api.submit("same").await.json().await.expect("Invalid JSON");
    let second: Value = api.submit("same").await.json().await.expect("Invalid JSON");
    assert_ne!(first["task_id"], second["task_id"]);

    let tasks = api.list().await;
    let tasks = tasks.as_array().expect("array");
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t["keyword"] == "same"));

    // An unreachable search still completes the task, with no results
    let task_id = first["task_id"].as_str().expect("task_id");
    let done = api.wait_for_terminal(task_id).await;
    assert_eq!(done["status"], "completed");
    assert!(done["results"].as_array().expect("results").is_empty());
}

#[tokio::test]
async fn test_full_queue_rejects_and_fails_task() {
    let mock_server = MockServer::start().await;

    // A slow search keeps the single worker busy
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed("http://127.0.0.1:1/page"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let api = start_api(&format!("{}/search", mock_server.uri()), 1, 1).await;

    // One job can run and one can wait; the rest must be turned away
    let mut rejected = 0;
    for n in 0..5 {
        let response = api.submit(&format!("burst {}", n)).await;
        if response.status() == 503 {
            let body: Value = response.json().await.expect("Invalid JSON");
            assert!(body["detail"].as_str().expect("detail").contains("queue full"));
            rejected += 1;
        } else {
            assert_eq!(response.status(), 200);
        }
    }
    assert!(rejected >= 3, "expected at least 3 rejections, got {}", rejected);

    // Rejected submissions leave a failed record behind
    let tasks = api.list().await;
    let failed = tasks
        .as_array()
        .expect("array")
        .iter()
        .filter(|t| t["status"] == "failed")
        .count();
    assert_eq!(failed, rejected);
}

#[tokio::test]
async fn test_google_submission_uses_google_endpoint() {
    let mock_server = MockServer::start().await;
    let page = format!("{}/article", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&page)))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><p>Google picked this.</p></body></html>"),
        )
        .mount(&mock_server)
        .await;

    let api = start_api(&format!("{}/search", mock_server.uri()), 1, 4).await;

    let response = api.submit_to("rust", "Google").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Invalid JSON");
    let task_id = body["task_id"].as_str().expect("task_id missing").to_string();

    let done = api.wait_for_terminal(&task_id).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["engine"], "google");
    assert_eq!(done["extracted_text"], "Google picked this.");

    let tasks = api.list().await;
    assert_eq!(tasks[0]["id"], task_id.as_str());
    assert_eq!(tasks[0]["engine"], "google");
}

#[tokio::test]
async fn test_unknown_engine_is_rejected() {
    let api = start_api("http://127.0.0.1:1/search", 1, 4).await;

    let response = api.submit_to("rust", "altavista").await;
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.expect("Invalid JSON");
    let detail = body["detail"].as_str().expect("detail");
    assert!(detail.contains("unknown search engine 'altavista'"), "{}", detail);

    let tasks = api.list().await;
    assert!(tasks.as_array().expect("array").is_empty());
}
