//! Configuration for insights-reports
//!
//! Bootstrap values come from a TOML file; each can be overridden by an
//! environment variable and, for the common ones, a command-line flag.
//! Priority: CLI → ENV → TOML → built-in default.

use insights_common::config::{env_value, LoggingConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::generation::ChatSettings;

pub const DEFAULT_PORT: u16 = 5780;
pub const DATA_FOLDER_ENV: &str = "INSIGHTS_DATA_FOLDER";
pub const STORAGE_BACKEND_ENV: &str = "INSIGHTS_STORAGE_BACKEND";
pub const LLM_API_KEY_ENV: &str = "INSIGHTS_LLM_API_KEY";
pub const LLM_BASE_URL_ENV: &str = "INSIGHTS_LLM_BASE_URL";
pub const LLM_MODEL_ENV: &str = "INSIGHTS_LLM_MODEL";

/// Bootstrap configuration loaded from `reports.toml`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP port (default 5780)
    pub port: Option<u16>,
    /// Bind address (default 127.0.0.1)
    pub bind: Option<String>,
    /// Folder holding the database and, for the files backend, artifacts
    pub data_folder: Option<PathBuf>,
    /// SQLite file; relative paths resolve against the data folder
    pub database_path: Option<PathBuf>,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    pub relay: RelayConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite tables `reports` and `report_sections`
    #[default]
    Database,
    /// JSON files under the artifact directory
    Files,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" | "sqlite" => Some(StorageBackend::Database),
            "files" | "file" => Some(StorageBackend::Files),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the files backend; relative paths resolve against the data folder
    pub artifact_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            temperature: Some(0.2),
            max_tokens: None,
        }
    }
}

impl GenerationConfig {
    /// Client settings with environment overrides applied
    pub fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            base_url: env_value(LLM_BASE_URL_ENV).unwrap_or_else(|| self.base_url.clone()),
            api_key: env_value(LLM_API_KEY_ENV).or_else(|| self.api_key.clone()),
            model: env_value(LLM_MODEL_ENV).unwrap_or_else(|| self.model.clone()),
            timeout_secs: self.timeout_secs,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Fallback when `INSIGHTS_RELAY_WEBHOOK_URL` is unset
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_pages: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_pages: 500,
            ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(1))
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind: String,
    pub data_folder: PathBuf,
    pub database_path: PathBuf,
    pub storage_backend: StorageBackend,
    pub artifact_dir: PathBuf,
    pub generation: GenerationConfig,
    pub relay: RelayConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Command-line values that take priority over everything else
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub data_folder: Option<PathBuf>,
    pub storage_backend: Option<StorageBackend>,
}

impl ServiceConfig {
    pub fn resolve(cli: CliOverrides, toml: TomlConfig) -> Self {
        let data_folder = insights_common::config::resolve_data_folder(
            cli.data_folder.as_deref(),
            DATA_FOLDER_ENV,
            toml.data_folder.as_deref(),
        );

        let storage_backend = cli
            .storage_backend
            .or_else(|| env_value(STORAGE_BACKEND_ENV).and_then(|v| StorageBackend::parse(&v)))
            .unwrap_or(toml.storage.backend);

        let database_path = under(
            &data_folder,
            toml.database_path.unwrap_or_else(|| PathBuf::from("insights.db")),
        );
        let artifact_dir = under(
            &data_folder,
            toml.storage.artifact_dir.unwrap_or_else(|| PathBuf::from("reports")),
        );

        Self {
            port: cli.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            bind: toml.bind.unwrap_or_else(|| "127.0.0.1".to_string()),
            data_folder,
            database_path,
            storage_backend,
            artifact_dir,
            generation: toml.generation,
            relay: toml.relay,
            cache: toml.cache,
            logging: toml.logging,
        }
    }
}

fn under(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Where the TOML bootstrap settings came from
///
/// The TOML file is read before tracing is installed, so `main` reports
/// this once the subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Loaded(PathBuf),
    Missing(PathBuf),
    NoConfigDir,
}

impl ConfigSource {
    pub fn detect(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => ConfigSource::Loaded(path.to_path_buf()),
            Some(path) => ConfigSource::Missing(path.to_path_buf()),
            None => ConfigSource::NoConfigDir,
        }
    }

    pub fn log(&self) {
        match self {
            ConfigSource::Loaded(path) => tracing::info!("Loaded config file: {}", path.display()),
            ConfigSource::Missing(path) => tracing::warn!(
                "Config file not found at {}, using built-in defaults",
                path.display()
            ),
            ConfigSource::NoConfigDir => {
                tracing::warn!("No config directory on this platform, using built-in defaults")
            }
        }
    }
}
