//! insights-reports library interface
//!
//! Stage-driven generation of industry tariff and public equity reports.
//! Exposes the router and state so integration tests can drive the service
//! without a socket.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod relay;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use insights_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cache::{CacheInvalidator, PageCache};
use crate::generation::GenerationService;
use crate::pipeline::StageExecutor;
use crate::relay::TriggerNextRelay;
use crate::store::ArtifactStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Prompts and invocation records (and sections, with the database backend)
    pub db: SqlitePool,
    /// Configured artifact backend
    pub store: Arc<dyn ArtifactStore>,
    pub executor: StageExecutor,
    pub relay: TriggerNextRelay,
    /// Pipeline events for SSE clients
    pub event_bus: EventBus,
    /// Rendered report pages
    pub pages: PageCache,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        store: Arc<dyn ArtifactStore>,
        generator: Arc<dyn GenerationService>,
        relay_webhook_url: Option<String>,
        pages: PageCache,
        event_bus: EventBus,
    ) -> Self {
        let invalidator = CacheInvalidator::new(pages.clone(), event_bus.clone());
        let executor = StageExecutor::new(
            store.clone(),
            generator,
            db.clone(),
            invalidator,
            event_bus.clone(),
        );
        Self {
            db,
            store,
            executor,
            relay: TriggerNextRelay::new(relay_webhook_url, event_bus.clone()),
            event_bus,
            pages,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::stage_routes())
        .merge(api::report_routes())
        .merge(api::prompt_routes())
        .merge(api::health_routes())
        .route("/events", axum::routing::get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
