//! Export and import between two catalogs

use crate::support::test_config;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use wsf_scraper::exchange::{export_json, import_json, ExchangeError};
use wsf_scraper::store::content_hash;
use wsf_scraper::{Article, ContentStore};

fn seeded_store() -> ContentStore {
    let store = ContentStore::in_memory(std::env::temp_dir());
    for (title, body) in [("Alpha", "alpha body"), ("Beta", "beta body"), ("Gamma", "gamma body")] {
        let article = Article {
            title: title.to_string(),
            uri: format!("https://example.com/{title}.pdf"),
            file_hash: content_hash(body.as_bytes()),
            ..Article::default()
        };
        store.record_article(&article, &article.uri).unwrap();
    }
    store
}

/// Every catalogued `(title, file_hash, url)`
fn records_of(store: &ContentStore) -> BTreeSet<(String, String, String)> {
    store
        .export_all()
        .map(|a| a.unwrap())
        .map(|a| (a.title, a.file_hash, a.uri))
        .collect()
}

#[test]
fn test_export_then_import_into_fresh_catalog() {
    let source = seeded_store();
    let mut buffer = Vec::new();
    let written = export_json(&source, &mut buffer).unwrap();
    assert_eq!(written, 3);

    // Append one record without a hash
    let mut records: Vec<Value> = serde_json::from_slice(&buffer).unwrap();
    records.push(json!({ "title": "Broken", "url": "https://example.com/broken" }));
    let payload = serde_json::to_vec(&records).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = test_config("http://127.0.0.1:9/", dir.path());
    let target = ContentStore::open(&config.storage).unwrap();

    let report = import_json(&target, &payload).unwrap();

    assert_eq!(report.inserted, 3);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].index, 3);
    assert_eq!(report.errors[0].reason, "file_hash is required");

    assert_eq!(records_of(&target), records_of(&source));
    assert!(records_of(&target).contains(&(
        "Alpha".to_string(),
        content_hash(b"alpha body"),
        "https://example.com/Alpha.pdf".to_string(),
    )));

    // Importing the same file again only finds duplicates
    let again = import_json(&target, &payload).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 3);
    assert_eq!(target.count().unwrap(), 3);
}

#[test]
fn test_import_rejects_non_array_payload() {
    let store = ContentStore::in_memory(std::env::temp_dir());

    let result = import_json(&store, br#"{"title": "not a list"}"#);

    assert!(matches!(result, Err(ExchangeError::Malformed(_))));
    assert_eq!(store.count().unwrap(), 0);
}
