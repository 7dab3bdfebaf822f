//! Control API tests, driving the router without a socket

use crate::support::{test_config, SPIDER};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wsf_scraper::server::{router, AppState};
use wsf_scraper::store::content_hash;
use wsf_scraper::{Article, ContentStore, JobManager};

const BOUNDARY: &str = "wsf-test-boundary";

struct TestApp {
    state: Arc<AppState>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    fn new(seed: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(seed, dir.path());
        let store = ContentStore::in_memory(dir.path().join("blobs"));
        let manager = JobManager::new(&config, store).unwrap();

        Self {
            state: Arc::new(AppState::new(manager)),
            _dir: dir,
        }
    }

    fn app(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    fn store(&self) -> &ContentStore {
        self.state.store()
    }

    async fn get(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(self.app(), request).await
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

fn upload(filename: &str, content_type: &str, payload: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file_url\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\
         \r\n\
         {payload}\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri("/scraped/import")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_index_lists_routes() {
    let app = TestApp::new("http://127.0.0.1:9/");

    let (status, body) = app.get("/").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["meta"]["project"], "WSF Web Scraper");
    let routes = body["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 7);
    assert!(routes
        .iter()
        .any(|r| r["url"] == "/spiders/:spider/run" && r["arguments"]["spider"].is_string()));
}

#[tokio::test]
async fn test_list_spiders() {
    let app = TestApp::new("http://127.0.0.1:9/");

    let (status, body) = app.get("/spiders/list").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body)["data"]["spiders"],
        serde_json::json!(["gov_uk", SPIDER, "who_iris"])
    );
}

#[tokio::test]
async fn test_run_unknown_spider_is_not_found() {
    let app = TestApp::new("http://127.0.0.1:9/");

    let (status, body) = app.get("/spiders/nope/run").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_list_and_stop_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html><body></body></html>", "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    let app = TestApp::new(&format!("{}/slow", server.uri()));

    let (status, body) = app.get(&format!("/spiders/{SPIDER}/run")).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["data"]["status"], "running");
    assert_eq!(body["data"]["spider"], SPIDER);

    let (status, _) = app.get(&format!("/spiders/{SPIDER}/run")).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Reset is refused while the crawl runs
    let (status, body) = app.get("/scraped/reset").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json(&body)["errors"][0].is_string());

    let (status, body) = app.get("/crawls/list").await;
    assert_eq!(status, StatusCode::OK);
    let crawls = json(&body);
    let entry = &crawls["data"]["spiders"][0];
    assert_eq!(entry["spider"], SPIDER);
    assert!(entry["start_time"].is_string());
    assert!(entry["total_time"].is_number());
    assert!(entry["item_scraped"].is_number());

    let (status, body) = app.get("/crawls/stop").await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["data"]["status"], "success");
    assert_eq!(body["data"]["stopped"], 1);

    let snapshot = app.state.manager.wait(SPIDER).await.unwrap();
    assert_eq!(snapshot.state.to_string(), "stopped");

    let (status, _) = app.get("/scraped/reset").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_import_then_export() {
    let app = TestApp::new("http://127.0.0.1:9/");
    let payload = serde_json::json!([
        { "title": "One", "file_hash": content_hash(b"one"), "url": "https://example.com/1.pdf" },
        { "title": "Two", "file_hash": content_hash(b"two"), "url": "https://example.com/2.pdf" },
        { "title": 42, "file_hash": "abc", "url": "https://example.com/bad.pdf" }
    ])
    .to_string();

    let (status, body) = send(app.app(), upload("export.json", "application/json", &payload)).await;

    assert_eq!(status, StatusCode::CREATED);
    let report = json(&body);
    assert_eq!(report["data"]["inserted"], 2);
    assert_eq!(report["data"]["errors"][0]["index"], 2);
    assert_eq!(report["data"]["errors"][0]["reason"], "title must be a string");

    let request = Request::builder()
        .uri("/scraped/export")
        .body(Body::empty())
        .unwrap();
    let response = app.app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"export.json\""
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let exported = json(&body);
    let exported = exported.as_array().unwrap();
    assert_eq!(exported.len(), 2);
    assert!(exported.iter().any(|r| r["title"] == "One"));
}

#[tokio::test]
async fn test_import_rejects_bad_uploads() {
    let app = TestApp::new("http://127.0.0.1:9/");

    let (status, body) = send(app.app(), upload("notes.txt", "text/plain", "[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["errors"][0], "File format is not json.");

    let (status, body) = send(app.app(), upload("", "application/json", "[]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["errors"][0], "Filename must not be blank");

    let request = Request::builder()
        .method("POST")
        .uri("/scraped/import")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["errors"][0], "No JSON file in request");

    let (status, _) = send(
        app.app(),
        upload("export.json", "application/json", "{\"not\": \"a list\"}"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store().count().unwrap(), 0);
}

#[tokio::test]
async fn test_reset_clears_catalog() {
    let app = TestApp::new("http://127.0.0.1:9/");
    let article = Article {
        title: "Doomed".to_string(),
        file_hash: content_hash(b"doomed"),
        ..Article::default()
    };
    app.store()
        .record_article(&article, "https://example.com/doomed.pdf")
        .unwrap();

    let (status, body) = app.get("/scraped/reset").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(app.store().count().unwrap(), 0);
}
