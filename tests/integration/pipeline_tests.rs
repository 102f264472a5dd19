//! Integration tests for the crawl task pipeline
//!
//! These tests use wiremock to stand in for the search engine and the result
//! pages, and run full pipeline passes against a temporary task database.

use lantern_crawl::config::{Config, SearchEngine};
use lantern_crawl::crawler::{SearchFailure, TaskPipeline, REASON_NO_RESULTS};
use lantern_crawl::state::TaskStatus;
use lantern_crawl::storage::{StoragePool, TaskRecord, TaskStore};
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing every search engine at `search_url`
fn create_test_config(search_url: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.search.endpoints.bing = search_url.to_string();
    config.search.endpoints.google = search_url.to_string();
    config.search.timeout_secs = 5;
    config.search.debug_artifact_path = dir
        .path()
        .join("debug_{engine}.xml")
        .to_string_lossy()
        .into_owned();
    config.search.failure_log_path = failure_log_path(dir).to_string_lossy().into_owned();
    config.fetch.timeout_secs = 5;
    config.storage.database_path = dir.path().join("tasks.db").to_string_lossy().into_owned();
    // Millisecond backoff keeps the three-attempt scenarios fast
    config.retry.unit_ms = 1;
    config
}

fn artifact_path(dir: &TempDir) -> PathBuf {
    dir.path().join("debug_bing.xml")
}

fn failure_log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("crawl_failures.log")
}

fn create_pipeline(config: &Config) -> TaskPipeline {
    let pool = StoragePool::open(&config.storage.database_path, 4).expect("Failed to open pool");
    TaskPipeline::from_config(config, pool).expect("Failed to build pipeline")
}

/// Renders an RSS feed with one item per (title, link, snippet)
fn rss_feed(items: &[(&str, &str, &str)]) -> String {
    let items = items
        .iter()
        .map(|(title, link, snippet)| {
            format!(
                "<item><title>{}</title><link>{}</link><description>{}</description></item>",
                title, link, snippet
            )
        })
        .collect::<String>();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<rss version="2.0"><channel>
<title>Search results</title><link>https://search.example.com</link><description>feed</description>
{}
</channel></rss>"#,
        items
    )
}

async fn create_task(pipeline: &TaskPipeline, task_id: &str, keyword: &str) {
    pipeline
        .pool()
        .acquire()
        .await
        .expect("Failed to acquire store")
        .create_task(task_id, keyword, SearchEngine::Bing)
        .expect("Failed to create task");
}

async fn load_task(pipeline: &TaskPipeline, task_id: &str) -> TaskRecord {
    pipeline
        .pool()
        .acquire()
        .await
        .expect("Failed to acquire store")
        .get_task(task_id)
        .expect("Failed to read task")
        .expect("Task missing")
}

const ARTICLE_HTML: &str = r#"<html>
<head>
  <title>History of the Internet</title>
  <meta name="description" content="How the network of networks came to be">
  <meta name="author" content="A. Historian">
  <meta property="article:published_time" content="2022-10-29">
</head>
<body>
  <nav>Home | Topics</nav>
  <article>
    <h1>History of the Internet</h1>
    <p>The first message was sent over ARPANET in 1969.</p>
  </article>
</body>
</html>"#;

#[tokio::test]
async fn test_keyword_with_results_completes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let first_link = format!("{}/wiki/internet", base_url);
    let second_link = format!("{}/other", base_url);

    // Mock the search feed
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("format", "rss"))
        .and(query_param("q", "history of the internet"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[
            ("History of the Internet", first_link.as_str(), "Origins of the Internet"),
            ("Another result", second_link.as_str(), "Second snippet"),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Mock the first result page
    Mock::given(method("GET"))
        .and(path("/wiki/internet"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ARTICLE_HTML)
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    // Only the first hit is ever fetched
    Mock::given(method("GET"))
        .and(path("/other"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", base_url), &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-history", "history of the internet").await;
    let status = pipeline
        .run("task-history", "history of the internet", SearchEngine::Bing)
        .await;
    assert_eq!(status, TaskStatus::Completed);

    let task = load_task(&pipeline, "task-history").await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.keyword, "history of the internet");
    assert!(task.completed_at.is_some());
    assert!(task.error.is_none());

    // Results keep the search order and values
    assert_eq!(task.results.len(), 2);
    assert_eq!(task.results[0].title, "History of the Internet");
    assert_eq!(task.results[0].link, first_link);
    assert_eq!(task.results[0].snippet, "Origins of the Internet");
    assert_eq!(task.results[1].link, second_link);

    // Page fields come from the first hit
    assert_eq!(task.first_page_html.as_deref(), Some(ARTICLE_HTML));
    assert_eq!(
        task.extracted_text.as_deref(),
        Some("History of the Internet\nThe first message was sent over ARPANET in 1969.")
    );
    assert_eq!(
        task.meta_description.as_deref(),
        Some("How the network of networks came to be")
    );
    assert_eq!(task.meta_author.as_deref(), Some("A. Historian"));
    assert_eq!(task.meta_date.as_deref(), Some("2022-10-29"));

    assert!(!artifact_path(&dir).exists());
}

#[tokio::test]
async fn test_unreachable_search_completes_with_no_results() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    // Nothing listens on port 1, so every attempt is refused
    let config = create_test_config("http://127.0.0.1:1/search", &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-offline", "rust").await;
    let status = pipeline.run("task-offline", "rust", SearchEngine::Bing).await;
    assert_eq!(status, TaskStatus::Completed);

    let task = load_task(&pipeline, "task-offline").await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.results.is_empty());
    assert!(task.first_page_html.is_none());
    assert!(task.extracted_text.is_none());
    assert!(task.meta_description.is_none());
    assert!(task.meta_author.is_none());
    assert!(task.meta_date.is_none());
}

#[tokio::test]
async fn test_search_server_errors_are_retried_three_times() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", mock_server.uri()), &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-503", "rust").await;
    assert_eq!(
        pipeline.run("task-503", "rust", SearchEngine::Bing).await,
        TaskStatus::Completed
    );

    let task = load_task(&pipeline, "task-503").await;
    assert!(task.results.is_empty());
    assert!(task.first_page_html.is_none());
}

#[tokio::test]
async fn test_unreachable_first_link_stores_placeholder() {
    let mock_server = MockServer::start().await;
    let dead_link = format!("{}/dead", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed(&[("Dead page", dead_link.as_str(), "Gone")])),
        )
        .mount(&mock_server)
        .await;

    // The fetch is attempted three times before giving up
    Mock::given(method("GET"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", mock_server.uri()), &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-dead-link", "dead").await;
    assert_eq!(
        pipeline.run("task-dead-link", "dead", SearchEngine::Bing).await,
        TaskStatus::Completed
    );

    let task = load_task(&pipeline, "task-dead-link").await;
    assert_eq!(task.results.len(), 1);
    assert_eq!(task.results[0].link, dead_link);

    let html = task.first_page_html.expect("Placeholder html missing");
    assert!(html.starts_with("Error fetching page:"), "got: {}", html);
    assert!(html.contains("HTTP 500"), "got: {}", html);
    assert!(task.extracted_text.is_none());
    assert!(task.meta_description.is_none());
    assert!(task.meta_author.is_none());
    assert!(task.meta_date.is_none());
}

#[tokio::test]
async fn test_zero_hits_writes_diagnostic_artifact() {
    let mock_server = MockServer::start().await;
    let empty_feed = rss_feed(&[]);

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(empty_feed.clone()))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", mock_server.uri()), &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-empty", "zxqv").await;
    assert_eq!(
        pipeline.run("task-empty", "zxqv", SearchEngine::Bing).await,
        TaskStatus::Completed
    );

    let task = load_task(&pipeline, "task-empty").await;
    assert!(task.results.is_empty());
    assert!(task.first_page_html.is_none());

    let artifact = std::fs::read_to_string(artifact_path(&dir)).expect("Artifact missing");
    assert_eq!(artifact, empty_feed);

    let log = std::fs::read_to_string(failure_log_path(&dir)).expect("Failure log missing");
    let entries = log
        .lines()
        .map(|line| serde_json::from_str::<SearchFailure>(line).expect("Invalid log line"))
        .collect::<Vec<_>>();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].keyword, "zxqv");
    assert_eq!(entries[0].engine, SearchEngine::Bing);
    assert_eq!(entries[0].reason, REASON_NO_RESULTS);
}

#[tokio::test]
async fn test_polling_completed_task_is_idempotent() {
    let mock_server = MockServer::start().await;
    let link = format!("{}/page", mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(rss_feed(&[("Page", link.as_str(), "Snippet")])),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE_HTML))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", mock_server.uri()), &dir);
    let pipeline = create_pipeline(&config);

    create_task(&pipeline, "task-idem", "page").await;
    pipeline.run("task-idem", "page", SearchEngine::Bing).await;

    let first = load_task(&pipeline, "task-idem").await;
    let second = load_task(&pipeline, "task-idem").await;
    assert_eq!(first, second);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.completed_at, second.completed_at);
}

#[tokio::test]
async fn test_concurrent_tasks_do_not_interfere() {
    let mock_server = MockServer::start().await;

    for n in 0..4 {
        let link = format!("{}/page/{}", mock_server.uri(), n);
        let keyword = format!("keyword {}", n);
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", keyword.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(&[(
                "Result",
                link.as_str(),
                "Snippet",
            )])))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/page/{}", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<html><body><p>Page number {}</p></body></html>",
                n
            )))
            .mount(&mock_server)
            .await;
    }

    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&format!("{}/search", mock_server.uri()), &dir);
    let pipeline = std::sync::Arc::new(create_pipeline(&config));

    let mut handles = Vec::new();
    for n in 0..4 {
        let pipeline = std::sync::Arc::clone(&pipeline);
        handles.push(tokio::spawn(async move {
            let task_id = format!("task-{}", n);
            let keyword = format!("keyword {}", n);
            create_task(&pipeline, &task_id, &keyword).await;
            pipeline.run(&task_id, &keyword, SearchEngine::Bing).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("Task panicked"), TaskStatus::Completed);
    }

    for n in 0..4 {
        let task = load_task(&pipeline, &format!("task-{}", n)).await;
        assert_eq!(task.keyword, format!("keyword {}", n));
        assert_eq!(
            task.extracted_text.as_deref(),
            Some(format!("Page number {}", n).as_str())
        );
    }
}
