pub mod collector;
pub mod config;
pub mod directory;
pub mod error;
pub mod factory;
pub mod github;
pub mod service;
pub mod store;
pub mod types;
pub mod window;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use collector::Report;
use config::AppConfig;
use error::CollectionFailure;
use github::{GitHubClient, HostingApi, SerializedApi};
use serde::{Deserialize, Serialize};
use service::ReportingService;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use types::{Item, ItemKind};
use window::ReportingWindow;

type ApiError = (StatusCode, String);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Rows for the dashboard table.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub data: Vec<Item>,
}

/// Accepts both `start_time` and the dashboard's `startTime` spelling. Values are
/// RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
#[derive(Debug, Deserialize)]
pub struct DataQuery {
    #[serde(default, alias = "startTime", deserialize_with = "deserialize_query_time")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, alias = "endTime", deserialize_with = "deserialize_query_time")]
    pub end_time: Option<DateTime<Utc>>,
}

fn deserialize_query_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.filter(|s| !s.trim().is_empty())
        .map(|s| parse_query_time(s.trim()).map_err(serde::de::Error::custom))
        .transpose()
}

fn parse_query_time(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("invalid time '{}', expected RFC 3339 or YYYY-MM-DD", s))
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Collection, storage and scheduling of reports.
    pub service: Arc<ReportingService>,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state against the real GitHub API.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = GitHubClient::new(config.github_token.clone())?;
        Self::with_api(config, Arc::new(SerializedApi::new(client)))
    }

    pub fn with_api(config: AppConfig, api: Arc<dyn HostingApi>) -> anyhow::Result<Self> {
        let service = Arc::new(ReportingService::new(&config, api)?);
        Ok(Self { service, config })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let serve_dir = ServeDir::new("dist").not_found_service(ServeFile::new("dist/index.html"));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/reporting/status", get(get_status))
        .route("/reporting/enable", get(enable_reporting).post(enable_reporting))
        .route("/reporting/disable", get(disable_reporting).post(disable_reporting))
        .route("/reporting/start-time", get(get_start_time))
        .route("/reporting/end-time", get(get_end_time))
        .route("/reporting/window", get(get_window))
        .route("/reporting/users", get(get_users))
        .route("/reporting/organizations", get(get_organizations))
        .route("/reporting/collect/{kind}", get(collect).post(collect))
        .route("/reporting/data/{kind}", get(get_data))
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "github-reporter",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<bool> {
    Json(state.service.is_enabled())
}

pub async fn enable_reporting(State(state): State<Arc<AppState>>) -> Json<bool> {
    state.service.set_enabled(true);
    Json(true)
}

pub async fn disable_reporting(State(state): State<Arc<AppState>>) -> Json<bool> {
    state.service.set_enabled(false);
    Json(false)
}

pub async fn get_start_time(State(state): State<Arc<AppState>>) -> Json<DateTime<Utc>> {
    Json(state.service.current_window().start)
}

pub async fn get_end_time(State(state): State<Arc<AppState>>) -> Json<DateTime<Utc>> {
    Json(state.service.current_window().end)
}

pub async fn get_window(State(state): State<Arc<AppState>>) -> Json<ReportingWindow> {
    Json(state.service.current_window())
}

pub async fn get_users(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.service.factory().users().iter().cloned().collect())
}

pub async fn get_organizations(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.service.factory().organizations().iter().cloned().collect())
}

pub async fn collect(
    Path(kind): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Report>, ApiError> {
    let kind = parse_kind(&kind)?;
    match state.service.collect(kind).await {
        Ok(report) => {
            tracing::debug!(%kind, "Returning collected report");
            Ok(Json(Report::clone(&report)))
        }
        Err(e) => {
            tracing::error!(%kind, "Collection failed: {}: {:#}", e, e.cause());
            Err(collection_error(&e))
        }
    }
}

pub async fn get_data(
    Path(kind): Path<String>,
    Query(query): Query<DataQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DataResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let window = state.service.current_window();
    let start = query.start_time.unwrap_or(window.start);
    let end = query.end_time.unwrap_or(window.end);

    let data = state.service.items_between(kind, start, end).await;
    Ok(Json(DataResponse { data }))
}

fn parse_kind(kind: &str) -> Result<ItemKind, ApiError> {
    kind.parse()
        .map_err(|e: types::UnknownItemKind| (StatusCode::NOT_FOUND, e.to_string()))
}

fn collection_error(e: &CollectionFailure) -> ApiError {
    let github = e.cause().downcast_ref::<octocrab::Error>();
    if let Some(octocrab::Error::GitHub { source, .. }) = github {
        let message = source.message.to_lowercase();
        if message.contains("rate limit") {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                "GitHub Rate Limit Exceeded".to_string(),
            );
        }
        if message.contains("not found") {
            return (StatusCode::NOT_FOUND, "Repository Not Found".to_string());
        }
    }

    (StatusCode::BAD_GATEWAY, e.to_string())
}
