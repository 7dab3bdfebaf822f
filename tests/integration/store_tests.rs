//! Content store tests against the SQLite backend

use crate::support::test_config;
use std::sync::atomic::{AtomicUsize, Ordering};
use wsf_scraper::store::content_hash;
use wsf_scraper::{Article, ContentStore, RecordOutcome};

fn article(body: &[u8], title: &str) -> Article {
    Article {
        title: title.to_string(),
        uri: format!("https://example.com/{title}.pdf"),
        file_hash: content_hash(body),
        ..Article::default()
    }
}

#[test]
fn test_concurrent_identical_saves_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let store = ContentStore::open(&config.storage).unwrap();
    let doc = article(b"same bytes", "report");
    let inserted = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let store = store.clone();
            let doc = doc.clone();
            let inserted = &inserted;
            scope.spawn(move || {
                let url = format!("https://mirror-{worker}.example.com/report.pdf");
                if store.record_article(&doc, &url).unwrap() == RecordOutcome::Inserted {
                    inserted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(inserted.load(Ordering::SeqCst), 1);
    assert_eq!(store.count().unwrap(), 1);
    assert!(store.is_scraped(&doc.file_hash).unwrap());
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let doc = article(b"persisted", "kept");

    {
        let store = ContentStore::open(&config.storage).unwrap();
        store.record_article(&doc, &doc.uri).unwrap();
    }

    let store = ContentStore::open(&config.storage).unwrap();
    assert!(store.is_scraped(&doc.file_hash).unwrap());

    let exported: Vec<Article> = store.export_all().map(Result::unwrap).collect();
    assert_eq!(exported, vec![doc]);
}

#[test]
fn test_export_pages_through_whole_catalog() {
    let dir = tempfile::tempdir().unwrap();
    // export-page-size is 2, so five rows take three pages
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let store = ContentStore::open(&config.storage).unwrap();

    for i in 0..5 {
        let body = format!("document {i}");
        store
            .record_article(&article(body.as_bytes(), &format!("doc-{i}")), "https://example.com")
            .unwrap();
    }

    let hashes: Vec<String> = store
        .export_all()
        .map(|a| a.unwrap().file_hash)
        .collect();

    assert_eq!(hashes.len(), 5);
    let mut sorted = hashes.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted, hashes);
}

#[test]
fn test_reset_clears_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let store = ContentStore::open(&config.storage).unwrap();
    let doc = article(b"to be cleared", "gone");
    store.record_article(&doc, &doc.uri).unwrap();

    store.reset().unwrap();

    assert_eq!(store.count().unwrap(), 0);
    assert!(!store.is_scraped(&doc.file_hash).unwrap());
    assert_eq!(
        store.record_article(&doc, &doc.uri).unwrap(),
        RecordOutcome::Inserted
    );
}

#[tokio::test]
async fn test_save_blob_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::in_memory(dir.path().join("blobs"));
    let hash = content_hash(b"blob body");

    let first = store.save_blob(&hash, "pdf", b"blob body").await.unwrap();
    let second = store.save_blob(&hash, "pdf", b"blob body").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&first).unwrap(), b"blob body");

    let entries: Vec<_> = std::fs::read_dir(dir.path().join("blobs"))
        .unwrap()
        .collect();
    assert_eq!(entries.len(), 1);
}
