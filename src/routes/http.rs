// Handlers: targets, interval, samples, buckets, raw export, version

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::models::{BucketExtremes, Sample};
use crate::monitor::DEFAULT_LOOKBACK_DAYS;
use crate::prober::Probe;
use crate::sample_store::StoreError;

/// Store failures surface as 500 with a JSON body; nothing is swallowed.
pub(super) struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self.0, "sample store error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct TargetBody {
    url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct IntervalBody {
    /// Number or string; anything unusable falls back to the default interval.
    #[serde(default)]
    interval: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct SamplesQuery {
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TargetBuckets {
    site: String,
    #[serde(flatten)]
    extremes: BucketExtremes,
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/targets
pub(super) async fn list_targets<P: Probe>(State(state): State<AppState<P>>) -> Json<Vec<String>> {
    Json(state.monitor.list_targets())
}

/// POST /api/targets: adds and measures immediately; returns the new sample, if any.
pub(super) async fn add_target<P: Probe>(
    State(state): State<AppState<P>>,
    Json(body): Json<TargetBody>,
) -> Result<Response, ApiError> {
    match state.monitor.add_target(&body.url).await? {
        Some(sample) => Ok((StatusCode::CREATED, Json(sample)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// DELETE /api/targets: unknown targets are not an error.
pub(super) async fn remove_target<P: Probe>(
    State(state): State<AppState<P>>,
    Json(body): Json<TargetBody>,
) -> StatusCode {
    state.monitor.remove_target(&body.url);
    StatusCode::NO_CONTENT
}

/// GET /api/interval
pub(super) async fn get_interval<P: Probe>(State(state): State<AppState<P>>) -> impl IntoResponse {
    Json(serde_json::json!({ "interval_minutes": state.monitor.interval_minutes() }))
}

/// PUT /api/interval
pub(super) async fn set_interval<P: Probe>(
    State(state): State<AppState<P>>,
    Json(body): Json<IntervalBody>,
) -> impl IntoResponse {
    let raw = match &body.interval {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    let applied = state.monitor.set_interval(&raw);
    Json(serde_json::json!({ "interval_minutes": applied }))
}

/// GET /api/samples?days=N (default 3)
pub(super) async fn recent_samples<P: Probe>(
    State(state): State<AppState<P>>,
    Query(q): Query<SamplesQuery>,
) -> Result<Json<Vec<Sample>>, ApiError> {
    let days = q.days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
    Ok(Json(state.monitor.get_recent_samples(days).await?))
}

/// GET /api/buckets: best/worst 15-minute window per current target.
pub(super) async fn buckets<P: Probe>(
    State(state): State<AppState<P>>,
) -> Result<impl IntoResponse, ApiError> {
    let out: Vec<TargetBuckets> = state
        .monitor
        .get_buckets()
        .await?
        .into_iter()
        .map(|(site, extremes)| TargetBuckets { site, extremes })
        .collect();
    Ok(Json(out))
}

/// GET /download_csv: the whole log as an attachment.
pub(super) async fn download_csv<P: Probe>(
    State(state): State<AppState<P>>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = state.monitor.export_raw().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=load_time_log.csv",
            ),
        ],
        csv,
    ))
}
