use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use ft_core::{
    Error, RunLogEntry, RunLogStore, Source, SourceRegistry, StartupFilter, StartupRecord,
    StartupStore, Storage,
};
use ft_storage::{export, stats};

use crate::AppState;

/// JSON error envelope. Storage failures surface as 500, everything the
/// client can fix stays 4xx.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        tracing::error!(error = %self.0, "Request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct StartupQuery {
    pub industry: Option<String>,
    pub location: Option<String>,
    pub funding_stage: Option<String>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
}

impl From<StartupQuery> for StartupFilter {
    fn from(q: StartupQuery) -> Self {
        StartupFilter {
            industry: q.industry,
            location: q.location,
            funding_stage: q.funding_stage,
            skip: q.skip.unwrap_or(0),
            limit: q.limit,
        }
    }
}

pub async fn list_startups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StartupQuery>,
) -> Result<Json<Vec<StartupRecord>>, ApiError> {
    let records = state.storage.list(&query.into()).await?;
    Ok(Json(records))
}

pub async fn startup_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<stats::StartupStats>, ApiError> {
    Ok(Json(stats::compute_stats(&state.storage).await?))
}

#[derive(Debug, Deserialize, Default)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<RunLogEntry>>, ApiError> {
    let entries = state.storage.recent(query.limit.unwrap_or(50)).await?;
    Ok(Json(entries))
}

pub async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let records = state.storage.all().await?;
    let mut out = Vec::new();
    export::write_csv(&records, &mut out)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"startups.csv\"",
            ),
        ],
        out,
    )
        .into_response())
}

/// Fire-and-forget manual run. Sources already in flight are skipped by
/// the pipeline's per-source claim, so double triggers are harmless.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.pipeline.spawn_run();
    (StatusCode::ACCEPTED, Json(json!({ "status": "accepted" })))
}

pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Source>>, ApiError> {
    Ok(Json(state.storage.list_sources().await?))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.storage.health().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "error": e.to_string() })),
        )
            .into_response(),
    }
}
