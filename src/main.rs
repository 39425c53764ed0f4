use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orca_sync::clients::hsdb::DEFAULT_PAGE_SIZE;
use orca_sync::reconcile::{
    LocalSnapshot, ReconcileConfig, ReconcileOutputs, Reconciler,
};
use orca_sync::{
    snapshot, AlertFilters, DslFilter, Error, HsdbClient, HsdbConfig, HsdbTransport, OrcaClient,
    OrcaConfig, OrcaTransport,
};

#[derive(Parser)]
#[command(
    name = "orca-sync",
    about = "Fetch Orca security alerts and reconcile them against the HSDB alert database"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every HSDB alert into a timestamped snapshot file
    Dump {
        /// Output file format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        output_format: OutputFormat,
        /// Alerts per listing page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// Only alerts with this status
        #[arg(long)]
        status: Option<String>,
        /// Only the alert with this id
        #[arg(long)]
        alert_id: Option<String>,
        /// Only alerts of this type
        #[arg(long)]
        type_string: Option<String>,
        /// Only alerts for this cloud account
        #[arg(long)]
        cloud_id: Option<String>,
        /// Only alerts with this Orca score
        #[arg(long)]
        orca_score: Option<String>,
        /// Only alerts at this risk level
        #[arg(long)]
        risk_level: Option<String>,
    },
    /// Compare live Orca alerts against a local snapshot
    Reconcile {
        /// Refresh the local snapshot from HSDB first (may take hours)
        #[arg(long)]
        refresh: bool,
        /// Snapshot file name, without the .csv extension
        #[arg(long, default_value = "hsdb")]
        filename: String,
        /// Alert statuses to query, comma-separated
        #[arg(long, value_delimiter = ',', default_values_t = [String::from("open"), String::from("in_progress")])]
        status: Vec<String>,
        /// Alerts per query page
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
        /// Report progress every this many pages
        #[arg(long, default_value_t = 5)]
        progress_every: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orca_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Dump {
            output_format,
            page_size,
            status,
            alert_id,
            type_string,
            cloud_id,
            orca_score,
            risk_level,
        } => {
            let filters = AlertFilters {
                status,
                alert_id,
                type_string,
                cloud_id,
                orca_score,
                risk_level,
            };
            run_dump(output_format, &filters, page_size).await?;
        }
        Command::Reconcile {
            refresh,
            filename,
            status,
            page_size,
            progress_every,
        } => {
            run_reconcile(refresh, &filename, status, page_size, progress_every).await?;
        }
    }

    Ok(())
}

fn hsdb_client() -> Result<HsdbClient, Error> {
    let config = HsdbConfig::from_env()?;
    let transport = Arc::new(HsdbTransport::new(
        &config.base_url,
        &config.username,
        &config.password,
        Duration::from_secs(config.timeout_secs),
        None,
    )?);
    Ok(HsdbClient::new(transport))
}

async fn run_dump(
    format: OutputFormat,
    filters: &AlertFilters,
    page_size: u32,
) -> Result<(), Error> {
    let client = hsdb_client()?;
    let alerts = client.fetch_all(filters, page_size).await?;

    if alerts.is_empty() {
        println!("No alerts to write.");
        return Ok(());
    }

    let path = match format {
        OutputFormat::Json => {
            let path = snapshot::timestamped_path("orca_alerts", "json");
            snapshot::write_json_file(&alerts, &path)?;
            path
        }
        OutputFormat::Csv => {
            let path = snapshot::timestamped_path("orca_alerts", "csv");
            snapshot::write_tabular_file(&alerts, &path)?;
            path
        }
    };

    println!("Wrote {} alerts to {}.", alerts.len(), path.display());
    Ok(())
}

async fn run_reconcile(
    refresh: bool,
    filename: &str,
    statuses: Vec<String>,
    page_size: u32,
    progress_every: u32,
) -> Result<(), Error> {
    let snapshot_path = PathBuf::from(format!("{filename}.csv"));

    if refresh {
        info!(path = %snapshot_path.display(), "refreshing local snapshot from HSDB");
        let client = hsdb_client()?;
        let alerts = client.fetch_all(&AlertFilters::default(), page_size).await?;
        snapshot::write_tabular_file(&alerts, &snapshot_path)?;
        println!(
            "Refreshed {} with {} alerts.",
            snapshot_path.display(),
            alerts.len()
        );
    }

    // Snapshot must load before any output file is touched.
    let local = LocalSnapshot::load(&snapshot_path)?;
    info!(ids = local.len(), "local snapshot loaded");

    let config = OrcaConfig::from_env()?;
    let transport = Arc::new(OrcaTransport::new(
        &config.base_url,
        &config.api_key,
        Duration::from_secs(config.timeout_secs),
    )?);
    let client = OrcaClient::new(transport);

    let dsl_filter = DslFilter::custom_rules().including("state.status", statuses);
    let mut pager = client.query(dsl_filter, page_size);
    let mut outputs = ReconcileOutputs::create_in(Path::new("."))?;

    let reconciler = Reconciler::new(ReconcileConfig { progress_every });
    let summary = reconciler.run(&mut pager, &local, &mut outputs).await?;

    println!(
        "Alerts processed: {} - Found: {} - Missing: {}",
        summary.processed, summary.found, summary.missing
    );
    if !summary.completed {
        println!("Run stopped early on a fetch failure; results above are partial.");
    }
    Ok(())
}
