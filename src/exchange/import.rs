use crate::exchange::{ExchangeError, ExchangeRecord};
use crate::store::{Article, ContentStore, ImportReport, RecordError};
use serde_json::{Map, Value};

/// Longest record excerpt quoted in an error report
const SUMMARY_CHARS: usize = 80;

/// Imports a JSON array of exchange records into the catalog
///
/// A payload that is not a JSON array fails as a whole with
/// [`ExchangeError::Malformed`]. Inside the array, each element is checked on
/// its own:
/// - it must be an object
/// - `file_hash` must be a non-empty string
/// - `title` and `url` must be strings when present (missing means empty)
///
/// Invalid elements and store failures are listed in the report with their
/// position; every other element is inserted or counted as a duplicate.
pub fn import_json(store: &ContentStore, payload: &[u8]) -> Result<ImportReport, ExchangeError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| ExchangeError::Malformed(format!("invalid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(ExchangeError::Malformed(
            "expected a JSON array of records".to_string(),
        ));
    };

    let mut rejected = Vec::new();
    let mut valid = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match validate_record(item) {
            Ok(record) => valid.push((index, Article::from(record))),
            Err(reason) => rejected.push(RecordError {
                index,
                record: summarize(item),
                reason,
            }),
        }
    }

    let mut report = store.import_batch(valid);
    report.errors.extend(rejected);
    report.errors.sort_by_key(|error| error.index);

    tracing::info!(
        "Imported {} records: {} inserted, {} duplicates, {} errors",
        items.len(),
        report.inserted,
        report.duplicates,
        report.errors.len()
    );

    Ok(report)
}

fn validate_record(item: &Value) -> Result<ExchangeRecord, String> {
    let Value::Object(fields) = item else {
        return Err("record must be a JSON object".to_string());
    };

    let file_hash = match fields.get("file_hash") {
        Some(Value::String(hash)) if !hash.trim().is_empty() => hash.clone(),
        Some(Value::String(_)) => return Err("file_hash cannot be empty".to_string()),
        Some(_) => return Err("file_hash must be a string".to_string()),
        None => return Err("file_hash is required".to_string()),
    };

    Ok(ExchangeRecord {
        title: optional_string(fields, "title")?,
        file_hash,
        url: optional_string(fields, "url")?,
    })
}

fn optional_string(fields: &Map<String, Value>, key: &str) -> Result<String, String> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(format!("{key} must be a string")),
    }
}

fn summarize(item: &Value) -> String {
    let text = item.to_string();
    if text.chars().count() <= SUMMARY_CHARS {
        return text;
    }
    let mut short: String = text.chars().take(SUMMARY_CHARS).collect();
    short.push_str("...");
    short
}
