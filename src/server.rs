use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{ServiceError, ValidationError};
use crate::scanner::DomainScanner;
use crate::store::BucketStore;
use crate::visits::{links_from_form, links_from_json, VisitRecorder};

const STORAGE_UNAVAILABLE: &str = "Storage unavailable";

#[derive(Clone)]
pub struct AppState {
    recorder: Arc<VisitRecorder>,
    scanner: Arc<DomainScanner>,
}

impl AppState {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            recorder: Arc::new(VisitRecorder::new(store.clone(), clock)),
            scanner: Arc::new(DomainScanner::new(store)),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Serialize)]
struct DomainsBody {
    status: &'static str,
    domains: Vec<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct IntervalParams {
    from: Option<String>,
    to: Option<String>,
}

impl IntervalParams {
    /// Reads `from`/`to` from a raw query string; a repeated key keeps its last value.
    fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        for (name, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match name.as_ref() {
                "from" => params.from = Some(value.into_owned()),
                "to" => params.to = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

type ApiError = (StatusCode, Json<StatusBody>);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/visited_links", post(visited_links))
        .route("/api/visited_domains", get(visited_domains))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(action = "listen", component = "http_server", address = %addr, "Serving visited-domains API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;

    info!(action = "stop", component = "http_server", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(action = "signal", component = "http_server", error = %err, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn visited_links(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<StatusBody>), ApiError> {
    let links = parse_links_body(&headers, &body).map_err(bad_request)?;

    let recorder = state.recorder.clone();
    tokio::task::spawn_blocking(move || recorder.record(&links))
        .await
        .map_err(|err| {
            error!(action = "join", component = "visit_recorder", error = %err, "Record task failed");
            unavailable()
        })?
        .map_err(service_error)?;

    Ok((StatusCode::CREATED, Json(ok())))
}

async fn visited_domains(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<DomainsBody>, ApiError> {
    let params = IntervalParams::from_query(query.as_deref());
    let scanner = state.scanner.clone();
    let scan = tokio::task::spawn_blocking(move || {
        scanner.scan_domains(params.from.as_deref(), params.to.as_deref())
    })
    .await
    .map_err(|err| {
        error!(action = "join", component = "domain_scan", error = %err, "Scan task failed");
        unavailable()
    })?
    .map_err(service_error)?;

    Ok(Json(DomainsBody {
        status: "ok",
        domains: scan.sorted_domains(),
    }))
}

/// Form posts carry repeated `links` fields; every other body is read as JSON.
fn parse_links_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<String>, ValidationError> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return links_from_form(body);
    }

    // An unparseable body has no "links" key either.
    let value: Value =
        serde_json::from_slice(body).map_err(|_| ValidationError::MissingLinksField)?;
    links_from_json(&value)
}

fn ok() -> StatusBody {
    StatusBody {
        status: "ok".to_string(),
    }
}

fn bad_request(err: ValidationError) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(StatusBody {
            status: err.to_string(),
        }),
    )
}

fn unavailable() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(StatusBody {
            status: STORAGE_UNAVAILABLE.to_string(),
        }),
    )
}

fn service_error(err: ServiceError) -> ApiError {
    match err {
        ServiceError::Validation(err) => bad_request(err),
        ServiceError::Storage(err) => {
            error!(action = "store", component = "http_server", error = %err, "Storage call failed");
            unavailable()
        }
    }
}
