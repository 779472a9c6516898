//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Derivo - derivative image cache
///
/// Generates, serves and invalidates cached image variants.
#[derive(Parser, Debug)]
#[command(name = "derivo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DERIVO_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one derivative and print its cache path
    Resolve(ResolveArgs),

    /// Run a single request through the image routes
    Request(RequestArgs),

    /// Delete every cached derivative of a package
    Purge(PurgeArgs),

    /// Delete every cached derivative of a source
    Invalidate(InvalidateArgs),

    /// Print URL and cache path of a source for every package
    Urls(UrlsArgs),

    /// Show or check configuration
    Config(ConfigArgs),

    /// Check engine, directories and packages
    Status,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Source id
    pub id: String,

    /// Package name
    pub package: String,

    /// Requested extension
    pub ext: String,

    /// Regenerate even if cached
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET or DELETE)
    pub method: String,

    /// Request target, e.g. /image/abc-thumb.jpg?noCache=1
    pub path: String,
}

#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Package name
    pub package: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct InvalidateArgs {
    /// Source id
    pub id: String,
}

#[derive(Parser, Debug)]
pub struct UrlsArgs {
    /// Source id
    pub id: String,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Validate packages and paths
    Check,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
