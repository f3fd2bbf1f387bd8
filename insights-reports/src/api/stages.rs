//! Stage endpoints
//!
//! `POST /api/industry-tariff-reports/:industry/:stage` and
//! `POST /api/public-equity/:ticker/:stage`. The stage segment may carry a
//! `generate-` prefix. The body is an optional `StageRequest`; the response
//! is the full report after the write.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use tracing::info;

use crate::api::report_ref;
use crate::pipeline::{Report, ReportKind, Stage, StageRequest};
use crate::{ApiError, ApiResult, AppState};

pub fn stage_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/industry-tariff-reports/:report_id/:stage",
            post(run_industry_tariff_stage),
        )
        .route("/api/public-equity/:report_id/:stage", post(run_public_equity_stage))
}

pub async fn run_industry_tariff_stage(
    State(state): State<AppState>,
    Path((report_id, stage)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Report>> {
    run_stage(state, ReportKind::IndustryTariff, report_id, &stage, &body).await
}

pub async fn run_public_equity_stage(
    State(state): State<AppState>,
    Path((report_id, stage)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<Report>> {
    run_stage(state, ReportKind::PublicEquity, report_id, &stage, &body).await
}

async fn run_stage(
    state: AppState,
    kind: ReportKind,
    report_id: String,
    stage_segment: &str,
    body: &[u8],
) -> ApiResult<Json<Report>> {
    let stage = Stage::parse(kind, stage_segment)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown {} stage: {}", kind, stage_segment)))?;
    let report = report_ref(kind, report_id)?;
    let request = parse_request(body)?;

    let outcome = state.executor.run(&report, stage, &request).await?;

    if request.trigger_next {
        // Detached; the response does not wait for the webhook
        if state.relay.trigger_after(&outcome.report, &outcome.key).is_some() {
            info!(report = %report, section = %outcome.key, "Next stage handed to relay");
        }
    }

    Ok(Json(outcome.report))
}

/// Empty or whitespace-only bodies mean "no options"
fn parse_request(body: &[u8]) -> ApiResult<StageRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StageRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Malformed stage request: {}", e)))
}
