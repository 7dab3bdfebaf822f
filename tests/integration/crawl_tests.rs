//! End-to-end crawl tests against a mock site

use crate::support::{listing, test_config, SPIDER};
use std::time::Duration;
use wsf_scraper::crawler::JobError;
use wsf_scraper::store::content_hash;
use wsf_scraper::{Article, ContentStore, JobManager, JobState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

fn pdf(body: &[u8]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_vec(), "application/pdf")
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_known_document_is_dropped_as_duplicate() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&format!("{}/a", server.uri()), dir.path());

    mount(&server, "/a", html(listing(&["/b", "/c"], &["/d.pdf"]))).await;
    mount(&server, "/b", html(listing(&[], &[]))).await;
    mount(&server, "/c", html(listing(&[], &[]))).await;
    mount(&server, "/d.pdf", pdf(b"%PDF-1.4 known report")).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let known = Article {
        title: "Known report".to_string(),
        file_hash: content_hash(b"%PDF-1.4 known report"),
        ..Article::default()
    };
    store.record_article(&known, "https://elsewhere.example/report.pdf").unwrap();

    let manager = JobManager::new(&config, store.clone()).unwrap();
    manager.start(SPIDER).unwrap();
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counters.requested, 4);
    assert_eq!(snapshot.counters.scraped, 0);
    assert_eq!(snapshot.counters.dropped, 1);
    assert_eq!(snapshot.counters.errors, 0);
    assert!(snapshot.finished_at.is_some());

    // The ledger still points at the first URL that produced the content
    let record = store.dedup_record(&known.file_hash).unwrap().unwrap();
    assert_eq!(record.url, "https://elsewhere.example/report.pdf");
    assert_eq!(store.count().unwrap(), 1);
}

#[tokio::test]
async fn test_new_documents_are_saved_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&format!("{}/", server.uri()), dir.path());

    mount(
        &server,
        "/",
        html(listing(&["/more"], &["/one.pdf", "/copy-of-one.pdf"])),
    )
    .await;
    mount(&server, "/more", html(listing(&[], &["/two.pdf"]))).await;
    mount(&server, "/one.pdf", pdf(b"first document")).await;
    mount(&server, "/copy-of-one.pdf", pdf(b"first document")).await;
    mount(&server, "/two.pdf", pdf(b"second document")).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store.clone()).unwrap();
    manager.start(SPIDER).unwrap();
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counters.requested, 5);
    assert_eq!(snapshot.counters.scraped, 2);
    assert_eq!(snapshot.counters.dropped, 1);
    assert_eq!(store.count().unwrap(), 2);

    let articles: Vec<Article> = store.export_all().map(Result::unwrap).collect();
    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Document /two.pdf"));

    for article in &articles {
        let body = std::fs::read(&article.local_path).unwrap();
        assert_eq!(content_hash(&body), article.file_hash);
        assert!(article.local_path.ends_with(".pdf"));
    }
}

#[tokio::test]
async fn test_transient_errors_are_retried_and_permanent_ones_dropped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&format!("{}/", server.uri()), dir.path());

    // First request fails, the retry succeeds
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(
        &server,
        "/",
        html(listing(&[], &["/ok.pdf", "/missing.pdf", "/broken.pdf"])),
    )
    .await;
    mount(&server, "/ok.pdf", pdf(b"retrievable")).await;
    mount(&server, "/missing.pdf", ResponseTemplate::new(404)).await;
    mount(&server, "/broken.pdf", ResponseTemplate::new(500)).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store).unwrap();
    manager.start(SPIDER).unwrap();
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counters.requested, 4);
    assert_eq!(snapshot.counters.scraped, 1);
    assert_eq!(snapshot.counters.dropped, 1);
    assert_eq!(snapshot.counters.errors, 1);

    // 1 failure + 1 success for the seed, and every attempt for the 500
    let requests = server.received_requests().await.unwrap();
    let seed_hits = requests.iter().filter(|r| r.url.path() == "/").count();
    let broken_hits = requests.iter().filter(|r| r.url.path() == "/broken.pdf").count();
    assert_eq!(seed_hits, 2);
    assert_eq!(broken_hits, 3);
}

#[tokio::test]
async fn test_stop_before_workers_start_ends_stopped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&format!("{}/slow", server.uri()), dir.path());

    mount(
        &server,
        "/slow",
        html(listing(&["/next"], &[])).set_delay(Duration::from_millis(500)),
    )
    .await;
    mount(&server, "/next", html(listing(&[], &[]))).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store).unwrap();
    manager.start(SPIDER).unwrap();

    assert!(manager.stop(SPIDER));
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Stopped);
    assert!(snapshot.counters.requested <= 1);
    assert!(!manager.has_active_jobs());

    // Stopping a finished job is a no-op
    assert!(!manager.stop(SPIDER));
}

#[tokio::test]
async fn test_stopping_a_running_job_keeps_saved_articles() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), dir.path());
    config.crawler.concurrency = 1;

    let docs: Vec<String> = (1..=6).map(|i| format!("/doc{i}.pdf")).collect();
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    mount(&server, "/", html(listing(&[], &doc_refs))).await;
    for doc in &docs {
        mount(
            &server,
            doc,
            pdf(format!("body of {doc}").as_bytes()).set_delay(Duration::from_millis(300)),
        )
        .await;
    }

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store.clone()).unwrap();
    manager.start(SPIDER).unwrap();

    // The seed and the first document are done, the second is in flight
    tokio::time::sleep(Duration::from_millis(450)).await;
    let running = manager.job(SPIDER).unwrap();
    assert_eq!(running.state, JobState::Running);
    assert!(running.counters.scraped >= 1);

    assert!(manager.stop(SPIDER));
    assert_eq!(manager.job(SPIDER).unwrap().state, JobState::Stopping);

    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Stopped);
    assert!(snapshot.finished_at.is_some());
    // The fetch in flight at stop time still completes and is saved
    assert!(snapshot.counters.scraped >= 2);
    assert!(snapshot.counters.requested < 7);
    assert_eq!(store.count().unwrap(), snapshot.counters.scraped);
    assert_eq!(
        snapshot.counters.requested,
        snapshot.counters.scraped + snapshot.counters.dropped + snapshot.counters.errors + 1
    );
}

#[tokio::test]
async fn test_oversized_documents_are_dropped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    // test_config caps bodies at 4096 bytes
    let config = test_config(&format!("{}/", server.uri()), dir.path());

    mount(&server, "/", html(listing(&[], &["/big.pdf", "/small.pdf"]))).await;
    mount(&server, "/big.pdf", pdf(&vec![b'x'; 8192])).await;
    mount(&server, "/small.pdf", pdf(b"fits")).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store.clone()).unwrap();
    manager.start(SPIDER).unwrap();
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counters.requested, 3);
    assert_eq!(snapshot.counters.scraped, 1);
    assert_eq!(snapshot.counters.dropped, 1);
    assert_eq!(snapshot.counters.errors, 0);
    assert!(!store.is_scraped(&content_hash(&vec![b'x'; 8192])).unwrap());

    // Too large is permanent: no retries
    let requests = server.received_requests().await.unwrap();
    let big_hits = requests.iter().filter(|r| r.url.path() == "/big.pdf").count();
    assert_eq!(big_hits, 1);
}

#[tokio::test]
async fn test_retries_wait_for_the_host_slot() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&format!("{}/", server.uri()), dir.path());
    config.crawler.politeness_delay_ms = 300;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(&server, "/", html(listing(&[], &[]))).await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store).unwrap();
    let started = std::time::Instant::now();
    manager.start(SPIDER).unwrap();
    let snapshot = manager.wait(SPIDER).await.unwrap();

    assert_eq!(snapshot.state, JobState::Completed);
    assert_eq!(snapshot.counters.errors, 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    // The 10 ms backoff alone would retry well before the host's next slot
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_one_active_job_per_spider() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&format!("{}/slow", server.uri()), dir.path());

    mount(
        &server,
        "/slow",
        html(listing(&[], &[])).set_delay(Duration::from_millis(300)),
    )
    .await;

    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store).unwrap();

    let first = manager.start(SPIDER).unwrap();
    let second = manager.start(SPIDER);
    assert!(matches!(second, Err(JobError::AlreadyRunning(_))));

    let finished = manager.wait(SPIDER).await.unwrap();
    assert_eq!(finished.job_id, first.job_id);
    assert_eq!(finished.state, JobState::Completed);

    // A finished job does not block a new run
    let third = manager.start(SPIDER).unwrap();
    assert_ne!(third.job_id, first.job_id);
    manager.wait(SPIDER).await.unwrap();

    let jobs = manager.list();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, third.job_id);
}

#[tokio::test]
async fn test_unknown_spider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let store = ContentStore::open(&config.storage).unwrap();
    let manager = JobManager::new(&config, store).unwrap();

    let result = manager.start("no_such_spider");

    assert!(matches!(result, Err(JobError::UnknownSpider(_))));
    assert!(manager.list().is_empty());
}
