use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use landscout_common::{AppConfig, FileConfig};
use landscout_enrichment::{CensusAdapter, DistanceAdapter, EnrichmentOrchestrator};
use landscout_store::{RawBatch, RecordStore};
use maps_client::MapsClient;

#[derive(Parser)]
#[command(name = "landscout")]
#[command(about = "Listing ingestion and census/landmark enrichment")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge a listings CSV into the master table
    Ingest {
        /// Listings file with Latitude and Longitude columns
        csv: PathBuf,

        /// Market code (NY, I85, FL, or any configured market)
        #[arg(short, long)]
        market: String,
    },

    /// Fill census metrics for incomplete records
    Census {
        /// Retry passes after the initial pass (defaults to config)
        #[arg(long)]
        max_passes: Option<u32>,
    },

    /// Fill nearest-landmark distance and travel time
    Distance,

    /// Report which records are still missing census data
    Audit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("landscout=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env();
    let file_config = config.file_config()?;

    let store = RecordStore::open(config.master_path(), config.log_dir())
        .with_context(|| format!("Failed to open {}", config.master_path().display()))?;

    match cli.command {
        Commands::Ingest { csv, market } => ingest(store, &file_config, &csv, &market),
        Commands::Census { max_passes } => census(store, &config, &file_config, max_passes).await,
        Commands::Distance => distance(store, &config, &file_config).await,
        Commands::Audit => {
            let mut orchestrator = EnrichmentOrchestrator::new(store);
            println!("{}", orchestrator.audit()?);
            Ok(())
        }
    }
}

fn ingest(store: RecordStore, file_config: &FileConfig, csv: &Path, code: &str) -> Result<()> {
    let Some(market) = file_config.market(code) else {
        let known: Vec<&str> = file_config.markets.iter().map(|m| m.code.as_str()).collect();
        bail!("Unknown market {code:?}; configured markets: {}", known.join(", "));
    };

    let batch = RawBatch::from_path(csv)
        .with_context(|| format!("Failed to read listings from {}", csv.display()))?;
    info!(file = %csv.display(), rows = batch.len(), market = %market.code, "ingesting batch");

    let mut orchestrator = EnrichmentOrchestrator::new(store);
    let report = orchestrator.ingest(&batch, market)?;
    println!("{report}");
    Ok(())
}

async fn census(
    store: RecordStore,
    config: &AppConfig,
    file_config: &FileConfig,
    max_passes: Option<u32>,
) -> Result<()> {
    let adapter = CensusAdapter::from_config(config, &file_config.census);
    let mut orchestrator = EnrichmentOrchestrator::new(store)
        .with_census(Box::new(adapter), file_config.census.cooldown());

    let passes = max_passes.unwrap_or(file_config.enrichment.max_retry_passes);
    let report = orchestrator.run_census_enrichment(passes).await?;
    println!("{report}");
    Ok(())
}

async fn distance(store: RecordStore, config: &AppConfig, file_config: &FileConfig) -> Result<()> {
    let Some(api_key) = config.google_maps_api_key.clone() else {
        bail!("GOOGLE_MAPS_API_KEY is not set; distance enrichment needs it");
    };
    let client = MapsClient::new(api_key)?;
    let adapter = DistanceAdapter::new(Box::new(client), &file_config.distance);
    let mut orchestrator = EnrichmentOrchestrator::new(store)
        .with_distance(adapter, file_config.distance.cooldown());

    let report = orchestrator.run_distance_enrichment().await?;
    println!("{report}");
    Ok(())
}
