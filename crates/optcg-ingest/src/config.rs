// Ingestion configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::error::{IngestError, Result};

/// Official English card list site
pub const DEFAULT_BASE_URL: &str = "https://en.onepiece-cardgame.com";

/// Environment variable naming the remote database
pub const DATABASE_NAME_ENV: &str = "D1_DATABASE_NAME";

pub const DEFAULT_DATABASE_NAME: &str = "op-tcg-cards";

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Configuration for fetching pages and assets from the card list site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Site root, without a trailing path
    pub base_url: String,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Attempts per page or asset before giving up
    pub max_retries: u32,

    /// Backoff unit; attempt `n` waits `2^n` units
    pub retry_base_delay_ms: u64,

    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            user_agent: "OPTCG-Catalog-Ingester/1.0".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.retry_base_delay_ms = ms;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Base URL without trailing slashes, used to absolutize `../` asset paths
    pub fn base_url_trimmed(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Index page listing every pack
    pub fn cardlist_url(&self) -> Result<Url> {
        let base = Url::parse(&format!("{}/", self.base_url_trimmed()))
            .map_err(|e| IngestError::Config(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        base.join("cardlist")
            .map_err(|e| IngestError::Config(format!("Invalid card list URL: {}", e)))
    }

    /// Card list page scoped to one pack
    pub fn series_url(&self, pack_id: &str) -> Result<Url> {
        let mut url = self.cardlist_url()?;
        url.query_pairs_mut().append_pair("series", pack_id);
        Ok(url)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if Url::parse(&self.base_url).is_err() {
            return Err(format!("Base URL is not a valid URL: {}", self.base_url));
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.max_retries == 0 {
            return Err("Max retries must be at least 1".to_string());
        }

        Ok(())
    }
}

/// Configuration for the `wrangler d1` bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub database_name: String,

    /// Target the remote database rather than wrangler's local one
    pub remote: bool,

    /// Upper bound for a single bridge call
    pub timeout_secs: u64,

    /// Program override; `None` resolves wrangler from `node_modules` or `npx`
    pub program: Option<String>,

    /// Arguments placed before `execute` when `program` is overridden
    pub program_args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            remote: true,
            timeout_secs: 300,
            program: None,
            program_args: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Defaults with the database name taken from `D1_DATABASE_NAME` when set
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(DATABASE_NAME_ENV) {
            if !name.trim().is_empty() {
                config.database_name = name;
            }
        }
        config
    }

    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    pub fn with_remote(mut self, remote: bool) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = Some(program.into());
        self.program_args = args;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.database_name.trim().is_empty() {
            return Err("Database name cannot be empty".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Bridge timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// What to do when the existing-id lookup disagrees with the card count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationPolicy {
    /// Log a warning and upload everything
    #[default]
    Warn,
    /// Abort before any pack is processed
    Fail,
}

/// How recorded run errors affect the exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Errors are reported but the run still succeeds
    #[default]
    Advisory,
    /// Any recorded error fails the run
    Strict,
}

impl ExitPolicy {
    pub fn run_failed(self, error_count: usize) -> bool {
        match self {
            ExitPolicy::Advisory => false,
            ExitPolicy::Strict => error_count > 0,
        }
    }
}

/// Per-run behaviour switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Snapshot root; `json/` and `images/` live below it
    pub output_dir: PathBuf,

    /// Only packs whose id contains this substring
    pub filter: Option<String>,

    /// Pause between packs in milliseconds
    pub delay_ms: u64,

    /// Upload packs and cards to the remote database
    pub upload: bool,

    pub mirror_images: bool,
    pub verbose: bool,

    /// Stop after discovery and pack metadata upload
    pub packs_only: bool,

    pub batch_size: usize,
    pub retry_failed: bool,
    pub reconciliation_policy: ReconciliationPolicy,
    pub exit_policy: ExitPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            output_dir: PathBuf::from("./data"),
            filter: None,
            delay_ms: 1000,
            upload: false,
            mirror_images: false,
            verbose: false,
            packs_only: false,
            batch_size: DEFAULT_BATCH_SIZE,
            retry_failed: true,
            reconciliation_policy: ReconciliationPolicy::default(),
            exit_policy: ExitPolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn with_upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    pub fn with_mirror_images(mut self, mirror: bool) -> Self {
        self.mirror_images = mirror;
        self
    }

    pub fn with_packs_only(mut self, packs_only: bool) -> Self {
        self.packs_only = packs_only;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_retry_failed(mut self, retry: bool) -> Self {
        self.retry_failed = retry;
        self
    }

    pub fn with_reconciliation_policy(mut self, policy: ReconciliationPolicy) -> Self {
        self.reconciliation_policy = policy;
        self
    }

    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether a pack id passes the substring filter
    pub fn selects(&self, pack_id: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |filter| pack_id.contains(filter))
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.batch_size == 0 {
            return Err("Batch size must be greater than 0".to_string());
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err("Output directory cannot be empty".to_string());
        }

        Ok(())
    }
}

/// Everything a run needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    pub source: SourceConfig,
    pub bridge: BridgeConfig,
    pub run: RunOptions,
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        self.source
            .validate()
            .and_then(|_| self.bridge.validate())
            .and_then(|_| self.run.validate())
            .map_err(IngestError::Config)
    }
}
