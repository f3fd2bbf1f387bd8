//! HTTP API handlers for insights-reports

pub mod health;
pub mod prompts;
pub mod reports;
pub mod sse;
pub mod stages;

pub use health::health_routes;
pub use prompts::prompt_routes;
pub use reports::report_routes;
pub use sse::event_stream;
pub use stages::stage_routes;

use crate::pipeline::{ReportKind, ReportRef};
use crate::{ApiError, ApiResult};

/// Parse a `:kind` path segment; unknown kinds are 404
pub(crate) fn parse_kind(segment: &str) -> ApiResult<ReportKind> {
    ReportKind::parse(segment)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown report kind: {}", segment)))
}

pub(crate) fn report_ref(kind: ReportKind, id: String) -> ApiResult<ReportRef> {
    Ok(ReportRef::new(kind, id)?)
}
