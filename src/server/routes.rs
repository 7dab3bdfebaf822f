use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::io::ReaderStream;

use crate::exchange::{export_json, import_json};
use crate::server::dto::{
    CrawlEntry, CrawlList, DataResponse, IndexResponse, Meta, RouteInfo, RunStarted, SpiderList,
    StopResult,
};
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// Multipart field carrying the import file
const IMPORT_FIELD: &str = "file_url";

/// Build the full router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/spiders/list", get(list_spiders))
        .route("/spiders/{name}/run", get(run_spider))
        .route("/crawls/list", get(list_crawls))
        .route("/crawls/stop", get(stop_crawls))
        .route("/scraped/export", get(export_scraped))
        .route("/scraped/import", post(import_scraped))
        .route("/scraped/reset", get(reset_scraped))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let route = |url, method| RouteInfo {
        url,
        method,
        arguments: None,
    };

    let routes = vec![
        route("/spiders/list", "GET"),
        RouteInfo {
            url: "/spiders/:spider/run",
            method: "GET",
            arguments: Some(serde_json::json!({ "spider": "name of the spider to run" })),
        },
        route("/crawls/list", "GET"),
        route("/crawls/stop", "GET"),
        route("/scraped/export", "GET"),
        route("/scraped/import", "POST"),
        route("/scraped/reset", "GET"),
    ];

    Json(IndexResponse {
        routes,
        meta: Meta {
            project: state.project.clone(),
        },
    })
}

// ---------------------------------------------------------------------------
// Spiders
// ---------------------------------------------------------------------------

pub async fn list_spiders(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(DataResponse::new(SpiderList {
        spiders: state.manager.spiders(),
    }))
}

pub async fn run_spider(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.manager.start(&name)?;

    Ok(Json(DataResponse::new(RunStarted {
        status: "running",
        spider: snapshot.spider,
        job_id: snapshot.job_id,
    })))
}

// ---------------------------------------------------------------------------
// Crawls
// ---------------------------------------------------------------------------

pub async fn list_crawls(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let spiders = state
        .manager
        .list()
        .into_iter()
        .map(CrawlEntry::from)
        .collect();

    Json(DataResponse::new(CrawlList { spiders }))
}

pub async fn stop_crawls(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stopped = state.manager.stop_all();

    Json(DataResponse::new(StopResult {
        status: "success",
        stopped,
    }))
}

// ---------------------------------------------------------------------------
// Scraped
// ---------------------------------------------------------------------------

/// Streams the catalog as an `export.json` attachment
///
/// The export is spooled to an anonymous temp file first, so the catalog is
/// read in pages and the response is streamed from disk.
pub async fn export_scraped(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let store = state.store().clone();

    let file = tokio::task::spawn_blocking(move || -> Result<std::fs::File, ApiError> {
        let mut file = tempfile::tempfile().map_err(|e| ApiError::Internal(e.to_string()))?;
        export_json(&store, std::io::BufWriter::new(&mut file))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(file)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let stream = ReaderStream::new(tokio::fs::File::from_std(file));

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"export.json\"",
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// Imports an uploaded JSON export from the `file_url` multipart field
pub async fn import_scraped(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let no_file = || ApiError::BadRequest("No JSON file in request".to_string());
    let mut multipart = multipart.map_err(|_| no_file())?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMPORT_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("").trim().to_string();
        if file_name.is_empty() {
            return Err(ApiError::BadRequest(
                "Filename must not be blank".to_string(),
            ));
        }

        let is_json = field
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|ct| ct.trim().eq_ignore_ascii_case("application/json"));
        if !is_json {
            return Err(ApiError::BadRequest("File format is not json.".to_string()));
        }

        let payload = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let store = state.store().clone();
        let report = tokio::task::spawn_blocking(move || import_json(&store, &payload))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;

        tracing::info!("Imported {} from {}", report.inserted, file_name);
        return Ok((StatusCode::CREATED, Json(DataResponse::new(report))));
    }

    Err(no_file())
}

/// Clears the catalog; refused while a crawl is running
pub async fn reset_scraped(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    if state.manager.has_active_jobs() {
        return Err(ApiError::Conflict(
            "Cannot reset the catalog while a crawl is running".to_string(),
        ));
    }

    state.store().reset()?;
    Ok(StatusCode::NO_CONTENT)
}
