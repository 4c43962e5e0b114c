//! rcactl - incident root-cause correlation CLI
//!
//! Runs analyses locally from JSON files, or talks to a running
//! rca-service to correlate incidents and manage the service topology.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{analyze, configure, status, topology};
use rca_engine::TimeRange;

/// Default correlation half-window when neither flag nor config sets one
const DEFAULT_WINDOW_SECS: u64 = 300;

/// Incident root-cause correlation CLI
#[derive(Parser)]
#[command(name = "rcactl")]
#[command(author, version, about = "CLI for the incident root-cause correlation engine", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via RCA_API_URL env var)
    #[arg(long, env = "RCA_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze an incident locally from JSON files
    Analyze {
        /// JSON array of log records
        #[arg(long)]
        logs: Option<PathBuf>,

        /// JSON array of metric samples
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// JSON array of infrastructure events
        #[arg(long)]
        events: Option<PathBuf>,

        /// JSON array of service descriptors
        #[arg(long)]
        services: Option<PathBuf>,

        /// Correlation half-window in seconds
        #[arg(long)]
        window: Option<u64>,

        /// Ignore records before this unix timestamp
        #[arg(long)]
        since: Option<i64>,

        /// Ignore records after this unix timestamp
        #[arg(long)]
        until: Option<i64>,
    },

    /// Send an incident file ({logs, metrics, events}) to the service
    Correlate {
        /// Incident JSON file
        input: PathBuf,

        /// Correlation half-window in seconds (service default if omitted)
        #[arg(long)]
        window: Option<u64>,
    },

    /// Show the upstream root-cause chain of a service
    Chain {
        /// Service name
        service: String,
    },

    /// Manage the service topology
    #[command(subcommand)]
    Topology(TopologyCommands),

    /// Show service health and readiness
    Status,

    /// View or change saved CLI defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum TopologyCommands {
    /// Replace the topology with a JSON array of service descriptors
    Apply {
        /// Service descriptor file
        file: PathBuf,
    },

    /// Export the current topology
    Export {
        /// Output file path (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the saved configuration
    Show,

    /// Save new defaults
    Set {
        /// Default API endpoint URL
        #[arg(long)]
        api_url: Option<String>,

        /// Default output format
        #[arg(long)]
        default_format: Option<output::OutputFormat>,

        /// Default correlation half-window in seconds
        #[arg(long)]
        window: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;
    let format = config.resolve_format(cli.format);

    match cli.command {
        Commands::Analyze {
            logs,
            metrics,
            events,
            services,
            window,
            since,
            until,
        } => {
            let inputs = analyze::LocalInputs {
                logs,
                metrics,
                events,
                services,
            };
            let window = window.or(config.window_secs).unwrap_or(DEFAULT_WINDOW_SECS);
            let range = TimeRange {
                start: since,
                end: until,
            };
            analyze::run_local(&inputs, window, range, format).await?;
        }
        Commands::Correlate { input, window } => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            let window = window.or(config.window_secs);
            analyze::run_remote(&client, &input, window, format).await?;
        }
        Commands::Chain { service } => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            topology::chain(&client, &service, format).await?;
        }
        Commands::Topology(topology_cmd) => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            match topology_cmd {
                TopologyCommands::Apply { file } => topology::apply(&client, &file).await?,
                TopologyCommands::Export { output } => {
                    topology::export(&client, output.as_deref()).await?
                }
            }
        }
        Commands::Status => {
            let client = client::ApiClient::new(&config.resolve_api_url(cli.api_url))?;
            status::show(&client, format).await?;
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => configure::show(&config)?,
            ConfigCommands::Set {
                api_url,
                default_format,
                window,
            } => configure::set(config, api_url, default_format, window)?,
        },
    }

    Ok(())
}
