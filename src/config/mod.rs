use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub sections: SectionIds,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which page session implementation drives the fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    #[default]
    Http,
    Browser,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_page_url")]
    pub page_url: String,

    /// Element id that only exists once the market widgets have rendered.
    #[serde(default = "default_readiness_marker")]
    pub readiness_marker: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub fetcher: FetcherKind,

    #[serde(default)]
    pub browser_binary: Option<PathBuf>,

    #[serde(default)]
    pub driver_path: Option<PathBuf>,
}

impl ScraperConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// `id` attributes of the four table containers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SectionIds {
    #[serde(default = "default_snapshot_id")]
    pub snapshot: String,
    #[serde(default = "default_trades_id")]
    pub trades: String,
    #[serde(default = "default_advancers_id")]
    pub advancers: String,
    #[serde(default = "default_decliners_id")]
    pub decliners: String,
}

/// What to do with a row that has the wrong shape or an unparseable number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Log a warning and leave the row out of the batch.
    #[default]
    Skip,
    /// Fail the whole run.
    Abort,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub row_policy: RowPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Duckdb,
    FlatFile,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding the append-only `;`-delimited files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Opaque connection string; overrides `db_path` when set.
    #[serde(default)]
    pub connection_string: Option<String>,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.connection_string
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.db_path.clone())
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_page_url() -> String {
    "http://www.nse.com.ng".to_string()
}
fn default_readiness_marker() -> String {
    "advancers".to_string()
}
fn default_max_retries() -> u32 {
    12
}
fn default_backoff_secs() -> u64 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "ngx-market-grabber/0.1 (market summary snapshots)".to_string()
}
fn default_snapshot_id() -> String {
    "snapshot".to_string()
}
fn default_trades_id() -> String {
    "traders".to_string()
}
fn default_advancers_id() -> String {
    "advancers".to_string()
}
fn default_decliners_id() -> String {
    "decliners".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/ngx_market.duckdb")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_true() -> bool {
    true
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            readiness_marker: default_readiness_marker(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            fetcher: FetcherKind::default(),
            browser_binary: None,
            driver_path: None,
        }
    }
}

impl Default for SectionIds {
    fn default() -> Self {
        Self {
            snapshot: default_snapshot_id(),
            trades: default_trades_id(),
            advancers: default_advancers_id(),
            decliners: default_decliners_id(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            db_path: default_db_path(),
            data_dir: default_data_dir(),
            connection_string: None,
            run_migrations: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    /// (e.g. `NGX__SCRAPER__BROWSER_BINARY=/usr/bin/chromium`).
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_with(config::Environment::with_prefix("NGX").separator("__"))
    }

    /// Same layering as [`AppConfig::load`] with the environment source given.
    /// A value that fails to parse is an error, never a silent default.
    pub fn load_with(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env)
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}
