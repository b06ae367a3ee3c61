//! parafetch CLI application
//!
//! Downloads files over HTTP with parallel range requests, resolving GitHub
//! URLs to their downloadable form.

use std::process;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use parafetch::cli::{handle_config, handle_fetch, handle_plan, handle_resolve, Cli, Commands};
use parafetch::config::{tracing_level, AppConfig};
use parafetch::constants::logging::DEFAULT_LOG_LEVEL;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config.clone())
        .await
        .context("Failed to load configuration")?;

    init_logging(&cli, &config)?;

    info!("parafetch v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => {
            debug!("Executing fetch command");
            handle_fetch(args, &config).await?;
        }
        Commands::Resolve(args) => {
            debug!("Executing resolve command");
            handle_resolve(args, &config).await?;
        }
        Commands::Plan(args) => {
            debug!("Executing plan command");
            handle_plan(args, &config).await?;
        }
        Commands::Config(args) => {
            debug!("Executing config command");
            handle_config(args, &config).await?;
        }
    }
    Ok(())
}

/// Initialize logging from CLI verbosity flags, falling back to the config
fn init_logging(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let log_level = cli
        .log_level()
        .or_else(|| tracing_level(&config.logging.level))
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    let directive: Directive = format!("parafetch={}", log_level)
        .parse()
        .context("Invalid log directive")?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}
