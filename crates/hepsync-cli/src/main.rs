//! hepsync - publication record synchronization tool

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use hepsync_common::ids::InspireId;
use hepsync_common::logging::{init_logging, LogConfig, LogLevel};
use hepsync_core::finalize::StoreFinalizer;
use hepsync_core::store::{MemoryStore, PgStore, SubmissionStore};
use hepsync_core::{BatchSummary, DispatchMode, SyncConfig, SyncService};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "hepsync")]
#[command(author, version, about = "Publication record synchronization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Run against an in-memory store instead of Postgres
    #[arg(long)]
    memory_store: bool,

    /// Run units sequentially instead of fanning out
    #[arg(long)]
    sequential: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List catalog identifiers, optionally modified since a date
    List {
        /// Date in YYYYMMDD form, e.g. 20160705
        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,
    },

    /// Add or update every record modified since a date (default: yesterday)
    Catchup {
        /// Date in YYYYMMDD form, e.g. 20160705
        #[arg(long, value_parser = parse_date)]
        since: Option<NaiveDate>,
    },

    /// Synchronize a set of identifiers through the full pipeline
    Load {
        /// Identifiers to load, e.g. ins1283842 ins1245023
        ids: Vec<String>,
    },

    /// Update existing records
    Update {
        /// Identifiers to update
        ids: Vec<String>,

        /// Refresh publication metadata only; leave data tables untouched
        #[arg(long)]
        metadata_only: bool,
    },

    /// List identifiers present remotely but absent locally
    Missing,

    /// Remove local records
    Unload {
        /// Identifiers to remove
        ids: Vec<String>,
    },
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .map_err(|e| format!("expected YYYYMMDD date, got '{s}': {e}"))
}

async fn build_store(memory: bool) -> Result<Arc<dyn SubmissionStore>> {
    if memory {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set (or pass --memory-store)")?;
    let pool = sqlx::PgPool::connect(&url)
        .await
        .context("Failed to connect to the submission database")?;
    PgStore::migrate(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

/// Log a batch summary and translate it into a process exit code.
fn finish(summary: BatchSummary) -> Result<()> {
    for unit in &summary.units {
        match &unit.result {
            Ok(outcome) => info!(inspire_id = %unit.inspire_id, ?outcome, "ok"),
            Err(e) => tracing::error!(inspire_id = %unit.inspire_id, "failed: {}", e),
        }
    }
    if summary.is_clean() {
        Ok(())
    } else {
        anyhow::bail!(
            "{} of {} identifiers failed",
            summary.failed(),
            summary.units.len()
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_file_prefix("hepsync");
    init_logging(&log_config)?;

    let config = SyncConfig::from_env()?;
    let store = build_store(cli.memory_store).await?;
    let finalizer = Arc::new(StoreFinalizer::new(store.clone()));
    let mode = if cli.sequential {
        DispatchMode::Sync
    } else {
        DispatchMode::Async
    };
    let service = SyncService::new(config, store, finalizer, mode)?;

    match cli.command {
        Command::List { since } => {
            let ids = service.list_since(since).await?;
            for id in &ids {
                println!("{id}");
            }
            info!("{} identifiers listed", ids.len());
        },
        Command::Catchup { since } => {
            let summary = service.add_or_update_since(since).await?;
            finish(summary)?;
        },
        Command::Load { ids } => {
            let summary = service.load_records(to_inspire_ids(ids)).await;
            finish(summary)?;
        },
        Command::Update { ids, metadata_only } => {
            let summary = service
                .update_records(to_inspire_ids(ids), metadata_only)
                .await;
            finish(summary)?;
        },
        Command::Missing => {
            let missing = service.missing_ids().await?;
            for id in &missing {
                println!("{id}");
            }
            info!("{} identifiers missing locally", missing.len());
        },
        Command::Unload { ids } => {
            for id in to_inspire_ids(ids) {
                if !service.unload(&id).await? {
                    tracing::warn!(inspire_id = %id, "No local record to remove");
                }
            }
        },
    }

    Ok(())
}

fn to_inspire_ids(ids: Vec<String>) -> Vec<InspireId> {
    ids.iter()
        .flat_map(|chunk| chunk.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(InspireId::new)
        .collect()
}
