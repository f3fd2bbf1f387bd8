//! Report read endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::{parse_kind, report_ref};
use crate::cache::report_tag;
use crate::db::invocations::{self, InvocationRecord};
use crate::pipeline::{markdown, Report, ReportSummary, SectionArtifact, SectionKey, SectionSlot, Stage};
use crate::{ApiError, ApiResult, AppState};

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reports/:kind", get(list_reports))
        .route("/api/reports/:kind/:report_id", get(get_report))
        .route("/api/reports/:kind/:report_id/markdown", get(get_report_markdown))
        .route("/api/reports/:kind/:report_id/sections/:stage", get(get_section))
        .route("/api/reports/:kind/:report_id/invocations", get(list_report_invocations))
}

/// GET /api/reports/:kind
pub async fn list_reports(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> ApiResult<Json<Vec<ReportSummary>>> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.store.list_reports(kind).await?))
}

/// GET /api/reports/:kind/:report_id
pub async fn get_report(
    State(state): State<AppState>,
    Path((kind, report_id)): Path<(String, String)>,
) -> ApiResult<Json<Report>> {
    Ok(Json(load_report(&state, &kind, report_id).await?))
}

/// GET /api/reports/:kind/:report_id/markdown
///
/// Served from the page cache until a stage write invalidates the report tag.
pub async fn get_report_markdown(
    State(state): State<AppState>,
    Path((kind, report_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let report = report_ref(parse_kind(&kind)?, report_id)?;
    let tag = report_tag(&report);

    let page = match state.pages.get(&tag).await {
        Some(page) => page,
        None => {
            let loaded = state
                .store
                .load_report(&report)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report)))?;
            state.pages.insert(tag, markdown::render_report(&loaded)).await
        }
    };

    Ok((
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        page.as_str().to_owned(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SectionQuery {
    /// `h.s` for industry areas, the criterion key for criterion evaluations
    #[serde(default)]
    pub slot: Option<String>,
}

/// GET /api/reports/:kind/:report_id/sections/:stage?slot=
pub async fn get_section(
    State(state): State<AppState>,
    Path((kind, report_id, stage)): Path<(String, String, String)>,
    Query(query): Query<SectionQuery>,
) -> ApiResult<Json<SectionArtifact>> {
    let kind = parse_kind(&kind)?;
    let report = report_ref(kind, report_id)?;
    let stage = Stage::parse(kind, &stage)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown {} stage: {}", kind, stage)))?;
    let slot = SectionSlot::decode(stage.slot_kind(), query.slot.as_deref().unwrap_or(""))?;
    let key = SectionKey { stage, slot };

    state
        .store
        .load_section(&report, &key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Section {} not found for {}", key, report)))
}

/// GET /api/reports/:kind/:report_id/invocations
pub async fn list_report_invocations(
    State(state): State<AppState>,
    Path((kind, report_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<InvocationRecord>>> {
    let report = report_ref(parse_kind(&kind)?, report_id)?;
    Ok(Json(invocations::list_invocations(&state.db, &report).await?))
}

async fn load_report(state: &AppState, kind: &str, report_id: String) -> ApiResult<Report> {
    let report = report_ref(parse_kind(kind)?, report_id)?;
    state
        .store
        .load_report(&report)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Report not found: {}", report)))
}
