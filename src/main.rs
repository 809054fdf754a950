use std::{path::PathBuf, process::exit};

use clap::{CommandFactory, Parser};
use fever_client::client::ClientConfig;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    commands::{Command, OutputFormat},
    config::{default_config_path, load_config, AppConfig},
    logging::{init_logging, LoggingConfig},
    result::{AppError, Result},
};

mod commands;
mod config;
mod logging;
mod result;

/// A command line client for Fever compatible feed aggregators
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Alternate path to the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print the path to the configuration file and exit.
    #[arg(short, long)]
    print_config_path: bool,
    /// Print records as JSON instead of text.
    #[arg(long, global = true)]
    json: bool,
    /// Accept invalid TLS certificates.
    #[arg(long, global = true)]
    insecure: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> Result<()> {
    color_eyre::install().map_err(|e| AppError::GeneralError(e.to_string()))?;

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(default_config_path);

    if args.print_config_path {
        println!("{}", config_path.display());
        exit(0);
    }

    let Some(command) = args.command else {
        Args::command()
            .print_help()
            .map_err(|e| AppError::GeneralError(e.to_string()))?;
        exit(2);
    };

    let mut config = load_config(&config_path)?.with_env_overrides();
    if args.insecure {
        config.verify_ssl = false;
    }

    let _log_guard = initialize_logging(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "fever starting");

    let debug = std::env::var("FEVER_DEBUG").is_ok();
    let format = if args.json { OutputFormat::Json } else { OutputFormat::Text };

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| AppError::GeneralError(format!("Failed to create runtime: {e}")))?;

    rt.block_on(commands::run(
        command,
        &config_path,
        config,
        |config| Ok(ClientConfig::try_from(config)?.with_debug_logging(debug)),
        format,
    ))
}

fn initialize_logging(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let mut logging_config = LoggingConfig::from_env();

    // config file wins over FEVER_LOG_LEVEL
    if let Some(log_level) = &config.log_level {
        logging_config.apply_level(log_level);
    }

    init_logging(logging_config)
        .map_err(|e| AppError::GeneralError(format!("Failed to initialize logging: {e}")))
}
