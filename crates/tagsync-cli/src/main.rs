//! TagSync CLI - Catalog metadata onto warehouse tags
//!
//! Reads governance metadata (business terms, policies, classifications,
//! descriptions) from the data catalog and writes it to the SQL warehouse as
//! tags and comments.
//!
//! # Usage
//!
//! ```bash
//! # Scaffold a local configuration
//! tagsync config init
//!
//! # Show how a resource will be partitioned into queries
//! tagsync plan --resource "Azure Databricks"
//!
//! # Print the statements without touching the warehouse
//! tagsync sync --dry-run
//!
//! # Write tags and comments
//! tagsync sync --confirm
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tagsync_config::{ConfigOverrides, LogFormat, LoggingConfig};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// TagSync - Catalog governance metadata onto warehouse tags
#[derive(Parser, Debug)]
#[command(name = "tagsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "TAGSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Catalog resource to synchronize
    #[arg(long, short = 'r', global = true, env = "TAGSYNC_RESOURCE")]
    resource: Option<String>,

    /// Maximum hits a single search query may return
    #[arg(long, global = true)]
    query_limit: Option<u64>,

    /// Catalog pod (e.g. dmp-us)
    #[arg(long, global = true, env = "TAGSYNC_POD")]
    pod: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TAGSYNC_LOG")]
    log_level: Option<String>,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            pod: self.pod.clone(),
            resource_name: self.resource.clone(),
            query_limit: self.query_limit,
            verbose: self.verbose.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build and print the query plan for a resource
    Plan(commands::plan::PlanArgs),

    /// Fetch the resource graph and write tags and comments
    Sync(commands::sync::SyncArgs),

    /// View and scaffold configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

/// Pick the effective log level: flags win over the configured level.
fn log_level(global: &GlobalOptions, logging: &LoggingConfig) -> Level {
    if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        global
            .log_level
            .as_deref()
            .unwrap_or(&logging.level)
            .parse()
            .unwrap_or(Level::INFO)
    }
}

fn init_logging(global: &GlobalOptions) -> Result<()> {
    // A config that fails to load is reported by the command itself.
    let logging = commands::load_config(global)
        .map(|c| c.logging)
        .unwrap_or_default();
    let level = log_level(global, &logging);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.global)?;

    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, cli.global).await,
        Commands::Sync(args) => commands::sync::execute(args, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
    }
}
