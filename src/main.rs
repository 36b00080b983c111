//! TPB-Poller main entry point
//!
//! Command-line interface for the scheduled poll and the ad-hoc lookup.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tpb_poller::config::{load_config_with_hash, Config};
use tpb_poller::storage::{open_storage, Storage};
use tpb_poller::{build_fetcher, lookup_series, ConfigError, EditionClassifier, Poller, PollerError};
use tracing_subscriber::EnvFilter;

/// TPB-Poller: watches a comics catalog for new collected editions
///
/// Each poll searches the catalog for every tracked series and records the
/// first listed trade paperback, hardcover or omnibus when it is new.
#[derive(Parser, Debug)]
#[command(name = "tpb-poller")]
#[command(version)]
#[command(about = "Watches a comics catalog for new collected editions", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll every tracked series and print the run summary
    Poll,

    /// Look up the current collected edition for one series without storing it
    Lookup {
        /// Series name as searched on the catalog
        name: String,
    },

    /// Manage tracked series
    Series {
        #[command(subcommand)]
        action: SeriesAction,
    },

    /// Dismiss the current notification for a series
    Dismiss {
        /// Series id as shown by `series list`
        series_id: i64,
    },

    /// Show recent poll runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
enum SeriesAction {
    /// Start tracking a series
    Add { name: String },

    /// List tracked series with their last poll time
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet, cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(config_error) = as_config_error(&e) {
                tracing::error!("Invalid configuration: {}", config_error);
                let payload = serde_json::json!({
                    "error": config_error.to_string(),
                    "kind": "config",
                });
                println!("{}", payload);
                return ExitCode::from(2);
            }

            tracing::error!("{:#}", e);
            println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
            ExitCode::FAILURE
        }
    }
}

/// Finds a configuration error anywhere in the chain
fn as_config_error(err: &anyhow::Error) -> Option<&ConfigError> {
    err.chain().find_map(|cause| {
        cause.downcast_ref::<ConfigError>().or_else(|| {
            match cause.downcast_ref::<PollerError>() {
                Some(PollerError::Config(inner)) => Some(inner),
                _ => None,
            }
        })
    })
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout carries the command's JSON output.
fn setup_logging(verbose: u8, quiet: bool, json: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tpb_poller=info,warn"),
            1 => EnvFilter::new("tpb_poller=debug,info"),
            2 => EnvFilter::new("tpb_poller=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);

    if json {
        builder.json().with_current_span(true).init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::debug!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Poll => handle_poll(&config, config_hash).await,
        Command::Lookup { name } => handle_lookup(&config, &name).await,
        Command::Series { action } => handle_series(&config, action),
        Command::Dismiss { series_id } => handle_dismiss(&config, series_id),
        Command::History { limit } => handle_history(&config, limit),
    }
}

fn open_database(config: &Config) -> anyhow::Result<tpb_poller::storage::SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles `poll`: the scheduled entry point
async fn handle_poll(config: &Config, config_hash: String) -> anyhow::Result<()> {
    let storage = Arc::new(Mutex::new(open_database(config)?));

    tracing::info!(
        "Starting poll with the {} fetch strategy",
        config.fetch.strategy.as_str()
    );

    let poller = Poller::from_config(config, storage, config_hash)?;
    let summary = poller.run().await.context("Poll run failed")?;

    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

/// Handles `lookup`: fetch and classify one series, no store access
async fn handle_lookup(config: &Config, name: &str) -> anyhow::Result<()> {
    let fetcher = build_fetcher(&config.fetch)?;
    let classifier = EditionClassifier::from_config(&config.classifier)?;

    let response =
        lookup_series(fetcher.as_ref(), &classifier, &config.fetch.qualifier, name).await;

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

fn handle_series(config: &Config, action: SeriesAction) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;

    match action {
        SeriesAction::Add { name } => {
            let name = name.trim();
            anyhow::ensure!(!name.is_empty(), "Series name is required");
            let id = storage.add_series(name)?;
            tracing::info!("Tracking \"{}\" as series {}", name, id);
            println!("{}", serde_json::json!({ "id": id, "name": name }));
        }
        SeriesAction::List => {
            let series = storage.list_series()?;
            println!("{}", serde_json::to_string(&series)?);
        }
    }

    Ok(())
}

fn handle_dismiss(config: &Config, series_id: i64) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    storage.add_dismissal(series_id)?;
    tracing::info!("Dismissed series {}", series_id);
    println!("{}", serde_json::json!({ "dismissed": series_id }));
    Ok(())
}

fn handle_history(config: &Config, limit: u32) -> anyhow::Result<()> {
    let storage = open_database(config)?;
    let runs = storage.recent_runs(limit)?;
    println!("{}", serde_json::to_string(&runs)?);
    Ok(())
}
