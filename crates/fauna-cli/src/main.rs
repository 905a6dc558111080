use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use fauna_sync::{BackfillMethod, Mirror, MirrorConfig, SyncOutcome};

#[derive(Debug, Parser)]
#[command(name = "fauna-cli")]
#[command(about = "Mirror a wildlife observation provider into a local store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Mirror the reference tables (everything but observations).
    Tables,
    /// Full observation backfill.
    Backfill {
        /// Partition ids to backfill; all active partitions when omitted.
        #[arg(long = "partition")]
        partitions: Vec<String>,
        #[arg(long, value_enum, default_value = "search")]
        method: Method,
        /// With the list method, one request per species in use.
        #[arg(long)]
        by_species: bool,
    },
    /// Incremental observation sync since the stored watermarks.
    Update {
        /// Partition ids to update; all active partitions when omitted.
        #[arg(long = "partition")]
        partitions: Vec<String>,
        /// Explicit RFC 3339 start instead of the stored watermark.
        #[arg(long)]
        since: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Search,
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mirror = Mirror::connect(MirrorConfig::from_env()).await?;

    let outcome = match cli.command {
        Commands::Tables => mirror.sync_tables().await?,
        Commands::Backfill {
            partitions,
            method,
            by_species,
        } => {
            let method = match method {
                Method::Search => BackfillMethod::Search,
                Method::List => BackfillMethod::List { by_species },
            };
            mirror
                .backfill_observations(optional(&partitions), method)
                .await?
        }
        Commands::Update { partitions, since } => {
            let since = since
                .map(|value| {
                    DateTime::parse_from_rfc3339(&value)
                        .map(|ts| ts.with_timezone(&Utc))
                        .with_context(|| format!("invalid --since value {value}"))
                })
                .transpose()?;
            mirror
                .update_observations(optional(&partitions), since)
                .await?
        }
    };
    mirror.close().await;

    report(&outcome);
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn optional(partitions: &[String]) -> Option<&[String]> {
    if partitions.is_empty() {
        None
    } else {
        Some(partitions)
    }
}

fn report(outcome: &SyncOutcome) {
    println!(
        "sync complete: ok={} skipped={} failed={} records={}",
        outcome.partitions_ok,
        outcome.partitions_skipped,
        outcome.partitions_failed,
        outcome.records
    );
}
