//! Stage executor
//!
//! Runs one stage for one report slot: dependency check, input assembly,
//! prompt rendering, generation, shape check, persistence and cache
//! invalidation. Nothing is retried and nothing is rolled back; a failed run
//! leaves the previous section (if any) in place.

use chrono::Utc;
use insights_common::events::{EventBus, InsightsEvent};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::CacheInvalidator;
use crate::db::{invocations, prompts};
use crate::generation::{templates, GenerationRequest, GenerationService};
use crate::pipeline::input::load_upstream;
use crate::pipeline::{
    PipelineError, Report, ReportRef, SectionArtifact, SectionBody, SectionKey, SectionSlot, Stage,
    StageRequest,
};
use crate::store::ArtifactStore;

/// Result of a successful stage run
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Section that was written
    pub key: SectionKey,
    /// Report as stored after the write
    pub report: Report,
}

#[derive(Clone)]
pub struct StageExecutor {
    store: Arc<dyn ArtifactStore>,
    generator: Arc<dyn GenerationService>,
    db: SqlitePool,
    cache: CacheInvalidator,
    event_bus: EventBus,
}

impl StageExecutor {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        generator: Arc<dyn GenerationService>,
        db: SqlitePool,
        cache: CacheInvalidator,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            generator,
            db,
            cache,
            event_bus,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Run `stage` for `report` with the slot addressed by `request`
    pub async fn run(
        &self,
        report: &ReportRef,
        stage: Stage,
        request: &StageRequest,
    ) -> Result<StageOutcome, PipelineError> {
        if stage.kind() != report.kind {
            return Err(PipelineError::InvalidRequest(format!(
                "Stage {} does not belong to {}",
                stage, report.kind
            )));
        }
        let key = SectionKey {
            stage,
            slot: request.slot_for(stage)?,
        };

        let started = Instant::now();
        info!(report = %report, section = %key, "Stage started");
        self.event_bus.emit_lossy(InsightsEvent::StageStarted {
            report_kind: report.kind.to_string(),
            report_id: report.id.clone(),
            stage: stage.to_string(),
            slot: key.slot.encode(),
            timestamp: Utc::now(),
        });

        match self.execute(report, &key).await {
            Ok(outcome) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(report = %report, section = %key, duration_ms, "Stage completed");
                self.event_bus.emit_lossy(InsightsEvent::StageCompleted {
                    report_kind: report.kind.to_string(),
                    report_id: report.id.clone(),
                    stage: stage.to_string(),
                    slot: key.slot.encode(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(report = %report, section = %key, error = %e, "Stage failed");
                self.event_bus.emit_lossy(InsightsEvent::StageFailed {
                    report_kind: report.kind.to_string(),
                    report_id: report.id.clone(),
                    stage: stage.to_string(),
                    slot: key.slot.encode(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    async fn execute(&self, report: &ReportRef, key: &SectionKey) -> Result<StageOutcome, PipelineError> {
        // (a) dependencies, before any generation call or write
        let upstream = load_upstream(self.store.as_ref(), report, key.stage).await?;
        upstream.check_slot(&key.slot)?;

        // (b) input document and prompt
        let input = upstream.input_document(report, key);
        let prompt = prompts::active_prompt(&self.db, key.stage.prompt_key())
            .await?
            .ok_or_else(|| PipelineError::PromptMissing(key.stage.prompt_key().to_string()))?;

        let invocation = invocations::start_invocation(
            &self.db,
            report,
            key,
            &prompt.prompt_key,
            prompt.version,
            &input,
        )
        .await?;

        let request = GenerationRequest {
            prompt_key: prompt.prompt_key,
            prompt_version: prompt.version,
            prompt: templates::render(&prompt.template, &input),
            input,
        };

        // (c) generation
        debug!(
            section = %key,
            provider = self.generator.provider(),
            prompt_version = request.prompt_version,
            "Calling generation service"
        );
        let raw = match self.generator.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                self.record_failure(invocation, &e.to_string(), None).await;
                return Err(e.into());
            }
        };

        // (d) shape check
        let body = match parse_output(key, raw.clone()) {
            Ok(body) => body,
            Err(e) => {
                self.record_failure(invocation, &e.to_string(), Some(&raw)).await;
                return Err(e);
            }
        };
        let canonical = body.to_value().map_err(insights_common::Error::from)?;
        invocations::complete_invocation(&self.db, invocation, &canonical).await?;

        // (e) persist
        let artifact = SectionArtifact::new(key.clone(), body);
        self.store.save_section(report, &artifact).await?;

        // (f) cache tags, after the write
        self.cache.invalidate(report, key.stage).await;

        let updated = self.store.load_report(report).await?.ok_or_else(|| {
            PipelineError::Storage(insights_common::Error::Internal(format!(
                "Report {} missing after write",
                report
            )))
        })?;

        Ok(StageOutcome {
            key: key.clone(),
            report: updated,
        })
    }

    async fn record_failure(&self, invocation: Uuid, error: &str, raw: Option<&Value>) {
        if let Err(e) = invocations::fail_invocation(&self.db, invocation, error, raw).await {
            warn!(invocation = %invocation, error = %e, "Failed to record invocation failure");
        }
    }
}

/// Parse generation output into the stage's shape
///
/// Criterion evaluations are stamped with the requested key, whatever the
/// model put there.
fn parse_output(key: &SectionKey, raw: Value) -> Result<SectionBody, PipelineError> {
    let mut body =
        SectionBody::parse(key.stage, raw).map_err(|reason| PipelineError::UnexpectedOutput {
            stage: key.stage,
            reason,
        })?;
    if let (SectionBody::CriterionEvaluation(evaluation), SectionSlot::Criterion(criterion)) =
        (&mut body, &key.slot)
    {
        evaluation.criterion_key = criterion.clone();
    }
    Ok(body)
}
