//! insights-reports - Report generation service
//!
//! Runs industry tariff and public equity report stages on request, stores
//! each stage's section and serves the assembled reports.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use insights_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use insights_reports::cache::PageCache;
use insights_reports::config::{
    CliOverrides, ConfigSource, ServiceConfig, StorageBackend, TomlConfig,
};
use insights_reports::generation::{ChatCompletionGenerator, GenerationService};
use insights_reports::store::{ArtifactStore, FileArtifactStore, SqliteArtifactStore};
use insights_reports::AppState;

/// Command-line arguments for insights-reports
#[derive(Parser, Debug)]
#[command(name = "insights-reports")]
#[command(about = "Stage-driven report generation service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "INSIGHTS_REPORTS_PORT")]
    port: Option<u16>,

    /// TOML bootstrap file (default: <config dir>/insights/reports.toml)
    #[arg(short, long, env = "INSIGHTS_REPORTS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder for the database and artifact files
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Where sections are stored
    #[arg(long, value_enum)]
    storage: Option<StorageBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| insights_common::config::default_config_path("reports"));
    let config_source = ConfigSource::detect(config_path.as_deref());
    let toml_config: TomlConfig = match &config_path {
        Some(path) => insights_common::config::load_toml_config(path)?,
        None => TomlConfig::default(),
    };

    let config = ServiceConfig::resolve(
        CliOverrides {
            port: args.port,
            data_folder: args.data_folder,
            storage_backend: args.storage,
        },
        toml_config,
    );

    // RUST_LOG wins over the TOML level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "insights_reports={},insights_common={},tower_http=info",
                    config.logging.level, config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting insights-reports v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();
    info!("Data folder: {}", config.data_folder.display());
    info!("Database: {}", config.database_path.display());

    let db_pool = insights_reports::db::init_database_pool(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    insights_reports::db::prompts::seed_default_prompts(&db_pool)
        .await
        .context("Failed to seed default prompts")?;

    let store: Arc<dyn ArtifactStore> = match config.storage_backend {
        StorageBackend::Database => Arc::new(SqliteArtifactStore::new(db_pool.clone())),
        StorageBackend::Files => {
            info!("Artifact directory: {}", config.artifact_dir.display());
            Arc::new(FileArtifactStore::new(config.artifact_dir.clone()))
        }
    };
    info!("Storage backend: {}", store.backend());

    let chat_settings = config.generation.chat_settings();
    if chat_settings.api_key.is_none() {
        warn!("No generation API key configured; stage runs will fail until one is set");
    }
    info!("Generation model: {} at {}", chat_settings.model, chat_settings.base_url);
    let generator: Arc<dyn GenerationService> = Arc::new(
        ChatCompletionGenerator::new(chat_settings).context("Failed to build generation client")?,
    );

    let event_bus = EventBus::new(256);
    let pages = PageCache::new(config.cache.max_pages, config.cache.ttl());

    let state = AppState::new(
        db_pool,
        store,
        generator,
        config.relay.webhook_url.clone(),
        pages,
        event_bus,
    );
    if state.relay.webhook_url().is_none() {
        info!("Relay webhook not configured; triggerNext requests will not chain");
    }

    let app = insights_reports::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.bind, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
