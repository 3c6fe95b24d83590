//! Stocklens - run the inventory dataset pipeline locally

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use stocklens_common::logging::{init_logging, LogConfig, LogLevel};
use stocklens_engine::{analysis, frame, transform};
use stocklens_pipeline::config::PipelineConfig;
use stocklens_pipeline::storage::FsStorage;
use stocklens_pipeline::store::MemoryStateStore;
use stocklens_pipeline::worker::WorkerConfig;
use stocklens_pipeline::PipelineService;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stocklens")]
#[command(author, version, about = "Inventory dataset processing pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Drive a CSV file through the full pipeline (clean, transform, EDA)
    Run {
        /// Input CSV file
        #[arg(short, long)]
        file: PathBuf,

        /// Directory for stored dataset files
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Run the engines directly and print the analysis payload
    Analyze {
        /// Input CSV file
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_file_prefix("stocklens");
    init_logging(&log_config)?;

    match cli.command {
        Command::Run { file, data_dir } => run_pipeline(file, data_dir).await,
        Command::Analyze { file } => analyze_file(file),
    }
}

async fn run_pipeline(file: PathBuf, data_dir: Option<PathBuf>) -> Result<()> {
    let config = PipelineConfig::load()?;
    let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(&config.storage.base_dir));

    let store = Arc::new(MemoryStateStore::new());
    let storage = Arc::new(FsStorage::new(data_dir));
    let service = PipelineService::new(
        store,
        storage,
        WorkerConfig {
            max_concurrent_workflows: config.max_concurrent_workflows,
            retry: config.retry,
            execution: config.execution,
        },
    );

    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dataset.csv")
        .to_string();
    let bytes = std::fs::read(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let (dataset, clean) = service.upload_dataset(&file_name, bytes).await?;
    info!(dataset_id = %dataset.id, "Dataset uploaded, cleaning");
    clean
        .join()
        .await
        .context("Clean workflow failed")?;

    info!(dataset_id = %dataset.id, "Dataset ready, transforming");
    let transform_handle = service.request_transform(dataset.id, Vec::new()).await?;
    transform_handle
        .join()
        .await
        .context("Transform workflow failed")?;

    let progress = service.query_progress(dataset.id).await?;
    info!(dataset_id = %dataset.id, status = %progress.status, "Pipeline complete");

    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}

fn analyze_file(file: PathBuf) -> Result<()> {
    let bytes = std::fs::read(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let raw = frame::load_csv(&bytes)?;
    let result = transform::transform_dataset(&bytes)?;
    let results = analysis::analyze_inventory(&raw, &result)?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
