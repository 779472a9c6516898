//! Derivo - derivative image cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use derivo::cli::{commands, Cli, Commands};
use derivo::config::{Config, ConfigManager};
use derivo::error::DerivoResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> DerivoResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;

    init_tracing(cli.verbose, &config);
    debug!("Using config {}", manager.path().display());

    match cli.command {
        Commands::Resolve(args) => commands::resolve(args, &config).await,
        Commands::Request(args) => commands::request(args, &config).await,
        Commands::Purge(args) => commands::purge(args, &config).await,
        Commands::Invalidate(args) => commands::invalidate(args, &config).await,
        Commands::Urls(args) => commands::urls(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &manager).await,
        Commands::Status => commands::status(&config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` overrides
fn init_tracing(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "derivo=warn",
        1 => "derivo=info",
        _ => "derivo=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
