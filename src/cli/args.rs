//! Command-line argument parsing for parafetch
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! a URL, inspecting how a URL resolves or would be planned, and managing
//! the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// parafetch - parallel, integrity-checked HTTP downloads
#[derive(Parser, Debug)]
#[command(
    name = "parafetch",
    version,
    about = "Download files over HTTP with parallel range requests",
    long_about = "Downloads a file over HTTP(S), splitting it into byte ranges fetched concurrently when \
the server allows it. GitHub blob, release and repository URLs are resolved to their downloadable form. \
Files are verified and installed atomically; partial downloads never appear at the destination."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (trace level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a URL
    Fetch(FetchArgs),

    /// Show how a URL is classified and where it would be downloaded from
    Resolve(ResolveArgs),

    /// Inspect a URL and show the transfer plan without downloading
    Plan(PlanArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URL to download (direct link or GitHub URL)
    #[arg(value_name = "URL")]
    pub url: String,

    /// Destination directory (defaults to the configured destination)
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Output file name (derived from the URL when omitted)
    #[arg(short, long, value_name = "NAME")]
    pub output: Option<String>,

    /// Replace an existing file at the destination
    #[arg(long)]
    pub overwrite: bool,

    /// Bearer token (falls back to PARAFETCH_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Maximum number of concurrent chunk workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Minimum chunk size in bytes
    #[arg(long, value_name = "BYTES")]
    pub min_chunk_size: Option<u64>,

    /// Keep repository archives zipped
    #[arg(long)]
    pub no_extract: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the resolve command
#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// URL to classify
    #[arg(value_name = "URL")]
    pub url: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// URL to inspect
    #[arg(value_name = "URL")]
    pub url: String,

    /// Bearer token (falls back to PARAFETCH_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Maximum number of concurrent chunk workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Minimum chunk size in bytes
    #[arg(long, value_name = "BYTES")]
    pub min_chunk_size: Option<u64>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a commented default configuration file
    Init {
        /// Where to write it (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,

    /// Print the default configuration file location
    Path,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level forced by the verbosity flags, if any
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::WARN)
        } else if self.global.very_verbose {
            Some(tracing::Level::TRACE)
        } else if self.global.verbose {
            Some(tracing::Level::DEBUG)
        } else {
            None
        }
    }
}

impl FetchArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("URL must not be empty".to_string());
        }
        if self.workers == Some(0) {
            return Err("Number of workers must be greater than 0".to_string());
        }
        if self.min_chunk_size == Some(0) {
            return Err("Minimum chunk size must be greater than 0".to_string());
        }
        Ok(())
    }
}
