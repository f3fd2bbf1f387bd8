//! Shared fixtures for insights-reports integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use insights_common::events::EventBus;
use insights_reports::cache::PageCache;
use insights_reports::generation::{GenerationError, GenerationRequest, GenerationService};
use insights_reports::pipeline::{ReportKind, ReportRef, Stage};
use insights_reports::store::{ArtifactStore, FileArtifactStore, SqliteArtifactStore};
use insights_reports::AppState;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Generation service that answers from a per-stage script
///
/// Stages without a scripted answer fail with an API error.
#[derive(Default)]
pub struct ScriptedGenerator {
    responses: Mutex<HashMap<String, Value>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Every stage scripted with a valid answer
    pub fn complete() -> Self {
        let generator = Self::default();
        for stage in Stage::all() {
            generator.set(stage, fixture(stage));
        }
        generator
    }

    pub fn set(&self, stage: Stage, response: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(stage.prompt_key().to_string(), response);
    }

    pub fn clear(&self, stage: Stage) {
        self.responses.lock().unwrap().remove(stage.prompt_key());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&request.prompt_key)
            .cloned()
            .ok_or_else(|| GenerationError::Api {
                status: 503,
                body: format!("no scripted answer for {}", request.prompt_key),
            })
    }
}

/// Valid generation output for `stage`
pub fn fixture(stage: Stage) -> Value {
    match stage {
        Stage::Headings => json!({
            "headings": [
                {
                    "title": "Upstream",
                    "subHeadings": [
                        {"title": "Iron ore", "overview": "Raw material supply"},
                        {"title": "Coking coal", "overview": "Energy inputs"}
                    ]
                },
                {
                    "title": "Downstream",
                    "subHeadings": [
                        {"title": "Automotive", "overview": "Flat steel demand"}
                    ]
                }
            ]
        }),
        Stage::Introduction => json!({
            "aboutSector": "Steel is a core industrial input.",
            "aboutConsumption": "Construction dominates demand.",
            "pastGrowth": "Flat for a decade.",
            "futureGrowth": "Modest growth expected."
        }),
        Stage::TariffUpdates => json!({
            "countrySpecificTariffs": [
                {
                    "countryName": "Canada",
                    "tariffDetails": "25% on all steel imports",
                    "existingTradeAmount": 12500000000.0,
                    "newChanges": "Exemption revoked"
                }
            ]
        }),
        Stage::EvaluateIndustryAreas => json!({
            "title": "Area evaluation",
            "summary": "Margins compress as inputs reprice.",
            "tailwinds": ["Domestic demand"],
            "headwinds": ["Retaliation"],
            "establishedPlayers": [{"name": "Nucor", "summary": "Mini-mill leader"}],
            "newChallengers": []
        }),
        Stage::ExecutiveSummary => json!({
            "title": "Executive Summary",
            "summary": "Tariffs shift sourcing toward domestic mills."
        }),
        Stage::FinalConclusion => json!({
            "title": "Conclusion",
            "conclusion": "Net positive for domestic producers.",
            "positiveImpacts": ["Pricing power"],
            "negativeImpacts": ["Higher input costs for manufacturers"],
            "finalStatements": "Watch retaliation risk."
        }),
        Stage::ReportCover => json!({
            "title": "Steel and the 2025 Tariffs",
            "coverText": "How tariffs reshape the steel value chain."
        }),
        Stage::Criteria => json!({
            "criteria": [
                {"key": "moat", "name": "Competitive moat", "shortDescription": "Durable advantages"},
                {"key": "balance-sheet", "name": "Balance sheet", "shortDescription": "Leverage and liquidity"}
            ]
        }),
        Stage::EvaluateCriterion => json!({
            "summary": "Strong position.",
            "performanceChecklist": [
                {"checklistItem": "Pricing power", "oneLineExplanation": "Raised prices twice", "score": 1},
                {"checklistItem": "Switching costs", "oneLineExplanation": "Low", "score": 0}
            ],
            "importantMetrics": [
                {"metricName": "Gross margin", "value": 0.45, "explanation": "Trailing twelve months"}
            ]
        }),
        Stage::FinalSummary => json!({
            "summary": "High quality business at a fair price.",
            "strengths": ["Brand"],
            "risks": ["Regulation"]
        }),
    }
}

pub fn steel() -> ReportRef {
    ReportRef::new(ReportKind::IndustryTariff, "steel").unwrap()
}

pub fn aapl() -> ReportRef {
    ReportRef::new(ReportKind::PublicEquity, "AAPL").unwrap()
}

/// Service state over an in-memory database
pub struct TestContext {
    pub state: AppState,
    pub generator: Arc<ScriptedGenerator>,
    /// Root of the files backend, when used
    pub artifact_dir: Option<TempDir>,
}

pub enum Backend {
    Database,
    Files,
}

pub async fn test_context(backend: Backend, generator: ScriptedGenerator) -> TestContext {
    test_context_with_relay(backend, generator, None).await
}

pub async fn test_context_with_relay(
    backend: Backend,
    generator: ScriptedGenerator,
    relay_webhook_url: Option<String>,
) -> TestContext {
    let db = insights_common::db::init_memory_database().await.unwrap();
    insights_reports::db::init_tables(&db).await.unwrap();
    insights_reports::db::prompts::seed_default_prompts(&db)
        .await
        .unwrap();

    let (store, artifact_dir): (Arc<dyn ArtifactStore>, _) = match backend {
        Backend::Database => (Arc::new(SqliteArtifactStore::new(db.clone())), None),
        Backend::Files => {
            let dir = TempDir::new().unwrap();
            (Arc::new(FileArtifactStore::new(dir.path())), Some(dir))
        }
    };

    let generator = Arc::new(generator);
    let state = AppState::new(
        db,
        store,
        generator.clone(),
        relay_webhook_url,
        PageCache::new(100, Duration::from_secs(300)),
        EventBus::new(256),
    );

    TestContext {
        state,
        generator,
        artifact_dir,
    }
}
