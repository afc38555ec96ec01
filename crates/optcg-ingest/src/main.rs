//! OPTCG Ingest - card catalog ingestion tool

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use optcg_common::logging::{init_logging, LogConfig, LogLevel};
use optcg_ingest::bridge::WranglerBridge;
use optcg_ingest::config::{
    BridgeConfig, ExitPolicy, IngestConfig, ReconciliationPolicy, RunOptions, SourceConfig,
    DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE,
};
use optcg_ingest::orchestrator::Orchestrator;
use optcg_ingest::progress::{create_upload_progress, upload_observer};
use optcg_ingest::source::OfficialSite;
use optcg_ingest::store::BulkStore;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "optcg-ingest")]
#[command(author, version, about = "One Piece card game catalog ingestion tool")]
struct Cli {
    /// Output directory
    #[arg(value_name = "OUTPUT_DIR", conflicts_with = "output")]
    output_dir: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only process packs whose id contains this substring
    #[arg(short, long)]
    filter: Option<String>,

    /// Delay between packs in milliseconds
    #[arg(short, long, default_value_t = 1000)]
    delay: u64,

    /// Upload packs and cards to the D1 database
    #[arg(long)]
    d1: bool,

    /// Download card images
    #[arg(long)]
    images: bool,

    /// Only fetch and upload pack information
    #[arg(long)]
    packs_only: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Cards per bridge call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Do not retry failed cards individually
    #[arg(long)]
    no_retry: bool,

    /// Upper bound for one bridge call in seconds
    #[arg(long, default_value_t = 300)]
    bridge_timeout_secs: u64,

    /// Attempts per page or image download
    #[arg(long, default_value_t = 3)]
    fetch_retries: u32,

    /// Card list site
    #[arg(long, env = "OPTCG_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Behaviour when existing ids and card count disagree
    #[arg(long, value_enum, default_value_t = ReconciliationPolicy::Warn)]
    reconciliation_policy: ReconciliationPolicy,

    /// Whether recorded errors fail the process
    #[arg(long, value_enum, default_value_t = ExitPolicy::Advisory)]
    exit_policy: ExitPolicy,
}

impl Cli {
    fn into_config(self) -> IngestConfig {
        let output_dir = self
            .output
            .or(self.output_dir)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let mut run = RunOptions::default()
            .with_output_dir(output_dir)
            .with_delay_ms(self.delay)
            .with_upload(self.d1)
            .with_mirror_images(self.images && !self.packs_only)
            .with_packs_only(self.packs_only)
            .with_batch_size(self.batch_size)
            .with_retry_failed(!self.no_retry)
            .with_reconciliation_policy(self.reconciliation_policy)
            .with_exit_policy(self.exit_policy);
        run.verbose = self.verbose;
        if let Some(filter) = self.filter {
            run = run.with_filter(filter);
        }

        IngestConfig {
            source: SourceConfig::default()
                .with_base_url(self.base_url)
                .with_max_retries(self.fetch_retries),
            bridge: BridgeConfig::from_env().with_timeout_secs(self.bridge_timeout_secs),
            run,
        }
    }
}

/// Cancel the run on Ctrl+C
fn spawn_ctrl_c_handler(token: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received Ctrl+C, finishing the current pack and stopping");
                token.cancel();
            },
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}

async fn run(config: IngestConfig) -> Result<bool> {
    config.validate().context("Invalid configuration")?;

    let source = OfficialSite::new(config.source.clone()).context("Failed to create HTTP client")?;
    let token = CancellationToken::new();
    spawn_ctrl_c_handler(token.clone());

    let mut orchestrator =
        Orchestrator::new(source, config.run.clone()).with_cancellation(token);

    if config.run.upload {
        info!(database = %config.bridge.database_name, "Will upload to D1");
        let mut store = BulkStore::new(WranglerBridge::new(&config.bridge));
        if config.run.verbose {
            store = store.with_progress(upload_observer(create_upload_progress("D1 upload")));
        }
        orchestrator = orchestrator.with_store(store);
    }

    let summary = orchestrator.run().await.context("Ingestion failed")?;

    Ok(config.run.exit_policy.run_failed(summary.errors.len()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the CLI level
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("optcg-ingest")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    let config = cli.into_config();
    let failed = run(config).await?;

    if failed {
        error!("Run finished with errors");
        return Ok(ExitCode::FAILURE);
    }

    info!("Ingestion complete");
    Ok(ExitCode::SUCCESS)
}
