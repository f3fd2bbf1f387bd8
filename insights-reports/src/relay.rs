//! Trigger-next relay
//!
//! After a successful stage run with `triggerNext`, works out the next step
//! and hands it to an external webhook, which calls back into the stage API.
//! Dispatch is fire-and-forget: the original request never waits on it.
//! Failures only show up in logs and as `NextStageDispatchFailed` events.

use chrono::Utc;
use insights_common::config::env_value;
use insights_common::events::{EventBus, InsightsEvent};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::{Report, ReportKind, SectionKey, SectionSlot, SlotKind, Stage, StageRequest};

/// Read on every dispatch so the target can change without a restart
pub const WEBHOOK_URL_ENV: &str = "INSIGHTS_RELAY_WEBHOOK_URL";

const DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// What the relay will ask the webhook to run next
#[derive(Debug, Clone, PartialEq)]
pub struct NextStep {
    pub stage: Stage,
    pub request: StageRequest,
}

/// Next step after `completed` was written to `report`
///
/// Indexed stages advance their slot first (next sub-heading, first
/// sub-heading of the next heading, next criterion) before moving to the
/// next stage. Returns `None` after the last stage, or when the next stage
/// is indexed but has no slots.
pub fn plan_next(report: &Report, completed: &SectionKey) -> Option<NextStep> {
    let next_slot = match &completed.slot {
        SectionSlot::Whole => None,
        SectionSlot::Area {
            heading,
            sub_heading,
        } => report.headings().and_then(|headings| {
            let slots = headings.area_slots();
            let current = slots.iter().position(|&s| s == (*heading, *sub_heading))?;
            slots.get(current + 1).map(|&(h, s)| SectionSlot::Area {
                heading: h,
                sub_heading: s,
            })
        }),
        SectionSlot::Criterion(key) => report.criteria().and_then(|criteria| {
            let current = criteria.criteria.iter().position(|c| &c.key == key)?;
            criteria
                .criteria
                .get(current + 1)
                .map(|c| SectionSlot::Criterion(c.key.clone()))
        }),
    };
    if let Some(slot) = next_slot {
        return Some(NextStep {
            stage: completed.stage,
            request: StageRequest::for_slot(&slot, true),
        });
    }

    let stage = completed.stage.next_in_order()?;
    let slot = match stage.slot_kind() {
        SlotKind::Whole => SectionSlot::Whole,
        SlotKind::Area => {
            let (heading, sub_heading) = report.headings()?.area_slots().into_iter().next()?;
            SectionSlot::Area {
                heading,
                sub_heading,
            }
        }
        SlotKind::Criterion => {
            SectionSlot::Criterion(report.criteria()?.criteria.first()?.key.clone())
        }
    };
    Some(NextStep {
        stage,
        request: StageRequest::for_slot(&slot, true),
    })
}

/// Body POSTed to the webhook
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayPayload {
    pub report_kind: ReportKind,
    pub report_id: String,
    pub stage: Stage,
    /// Stage endpoint the webhook should call
    pub path: String,
    pub body: StageRequest,
}

impl RelayPayload {
    pub fn new(report: &Report, step: &NextStep) -> Self {
        Self {
            report_kind: report.report.kind,
            report_id: report.report.id.clone(),
            stage: step.stage,
            path: format!(
                "/api/{}/{}/generate-{}",
                report.report.kind, report.report.id, step.stage
            ),
            body: step.request.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TriggerNextRelay {
    client: reqwest::Client,
    configured_url: Option<String>,
    event_bus: EventBus,
}

impl TriggerNextRelay {
    pub fn new(configured_url: Option<String>, event_bus: EventBus) -> Self {
        Self {
            client: reqwest::Client::new(),
            configured_url,
            event_bus,
        }
    }

    /// Environment first, then the configured value
    pub fn webhook_url(&self) -> Option<String> {
        env_value(WEBHOOK_URL_ENV).or_else(|| {
            self.configured_url
                .as_ref()
                .filter(|url| !url.trim().is_empty())
                .cloned()
        })
    }

    /// Plan the step after `completed` and dispatch it in the background
    ///
    /// Returns the spawned task, or `None` when there is nothing to chain or
    /// no webhook is configured.
    pub fn trigger_after(&self, report: &Report, completed: &SectionKey) -> Option<JoinHandle<()>> {
        let Some(step) = plan_next(report, completed) else {
            info!(report = %report.report, section = %completed, "Last step reached, nothing to chain");
            return None;
        };
        let Some(url) = self.webhook_url() else {
            warn!(
                report = %report.report,
                next_stage = %step.stage,
                "No relay webhook configured ({} unset), skipping next stage",
                WEBHOOK_URL_ENV
            );
            return None;
        };

        let payload = RelayPayload::new(report, &step);
        let client = self.client.clone();
        let event_bus = self.event_bus.clone();

        Some(tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(DISPATCH_TIMEOUT)
                .json(&payload)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(_) => {
                    info!(
                        report_id = %payload.report_id,
                        next_stage = %payload.stage,
                        "Dispatched next stage to relay webhook"
                    );
                    event_bus.emit_lossy(InsightsEvent::NextStageDispatched {
                        report_kind: payload.report_kind.to_string(),
                        report_id: payload.report_id.clone(),
                        next_stage: payload.stage.to_string(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(
                        report_id = %payload.report_id,
                        next_stage = %payload.stage,
                        error = %e,
                        "Relay webhook dispatch failed"
                    );
                    event_bus.emit_lossy(InsightsEvent::NextStageDispatchFailed {
                        report_kind: payload.report_kind.to_string(),
                        report_id: payload.report_id.clone(),
                        next_stage: payload.stage.to_string(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }))
    }
}
