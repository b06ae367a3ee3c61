//! Command handlers for the parafetch CLI
//!
//! Each handler takes the parsed arguments plus the loaded [`AppConfig`] and
//! drives the library. Human-readable output goes to stdout; `--json`
//! switches to machine-readable output.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::progress::format_bytes;
use crate::app::{
    BearerToken, PlanLimits, ProgressSink, TransferEngine, TransferRequest, UrlResolver,
};
use crate::cli::{
    ConfigAction, ConfigArgs, FetchArgs, PlanArgs, ProgressConfig, ProgressDisplay, ResolveArgs,
};
use crate::config::AppConfig;
use crate::constants::env;
use crate::errors::{AppError, ResolveError, Result};

/// Handle the fetch command
///
/// Builds a request from arguments layered over configuration, runs it with a
/// progress display, and reports the outcome.
pub async fn handle_fetch(args: FetchArgs, config: &AppConfig) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let request = build_request(&args, config);
    info!(
        "Fetching {} into {} with up to {} workers",
        request.url,
        request.dest_dir.display(),
        request.max_workers
    );

    let engine = TransferEngine::new(config.to_engine_config())?;

    // Bars would interleave with JSON on a shared terminal
    let display = if args.json {
        None
    } else {
        Some(Arc::new(ProgressDisplay::new(ProgressConfig::default())?))
    };
    let sink = display
        .clone()
        .map(|display| display as Arc<dyn ProgressSink>);

    let outcome = engine.transfer(request, sink).await;
    debug!("Fetch finished in {:?}", start_time.elapsed());

    if let Some(display) = &display {
        display.finish(&outcome);
    }

    if args.json {
        print_json(&outcome)?;
    } else if outcome.success && !outcome.skipped {
        print_summary(outcome.progress.total_size, start_time);
    }

    if outcome.success {
        Ok(())
    } else {
        Err(AppError::generic(outcome.message))
    }
}

/// Handle the resolve command
pub async fn handle_resolve(args: ResolveArgs, config: &AppConfig) -> Result<()> {
    let resolver = UrlResolver::new(config.transfer.archive_branch.clone())
        .with_web_origin(&config.transfer.github_origin)?;
    let resolved = resolver.resolve(&args.url)?;

    if args.json {
        return print_json(&resolved);
    }

    println!("Input:        {}", resolved.input);
    println!("Kind:         {}", resolved.kind.label());
    println!("Download URL: {}", resolved.download_url);
    if let Some(name) = resolved.suggested_filename() {
        println!("Saved as:     {}", name);
    }
    if resolved.is_archive() {
        println!("Extracts to:  {}", resolved.extracted_dir_candidates().join(" | "));
    }
    Ok(())
}

/// Handle the plan command
///
/// Inspects the resolved URL and prints the strategy that a fetch would use.
pub async fn handle_plan(args: PlanArgs, config: &AppConfig) -> Result<()> {
    let limits = PlanLimits {
        max_workers: args.workers.unwrap_or(config.transfer.max_workers),
        min_chunk_size: args.min_chunk_size.unwrap_or(config.transfer.min_chunk_size),
    };
    limits.validate().map_err(AppError::generic)?;

    let engine = TransferEngine::new(config.to_engine_config())?;
    let resolved = engine.resolver().resolve(&args.url)?;
    let url = Url::parse(&resolved.download_url).map_err(|e| ResolveError::InvalidUrl {
        url: resolved.download_url.clone(),
        error: e.to_string(),
    })?;

    let token = resolve_token(args.token.as_deref()).and_then(BearerToken::new);
    let plan = engine.planner().plan(&url, token.as_ref(), limits).await;

    if args.json {
        return print_json(&plan);
    }

    println!("URL:           {}", plan.url);
    println!(
        "Size:          {}",
        if plan.size_known() {
            format_bytes(plan.total_size)
        } else {
            "unknown".to_string()
        }
    );
    println!("Range support: {}", if plan.accepts_ranges { "yes" } else { "no" });
    if plan.is_parallel() {
        println!("Strategy:      parallel ({} chunks)", plan.ranges.len());
        for (index, range) in plan.ranges.iter().enumerate() {
            println!("  part_{:<4} {:>24}  {}", index, range.to_string(), format_bytes(range.len()));
        }
    } else {
        println!("Strategy:      single stream");
    }
    Ok(())
}

/// Handle configuration management
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { path, force } => {
            let path = AppConfig::write_default(path, force).await?;
            println!("Configuration file: {}", path.display());
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Path => {
            println!("{}", AppConfig::default_config_path()?.display());
        }
    }
    Ok(())
}

/// Combine arguments with configured defaults into a transfer request
fn build_request(args: &FetchArgs, config: &AppConfig) -> TransferRequest {
    let dest = args
        .dest
        .clone()
        .unwrap_or_else(|| config.transfer.destination.clone());

    let mut request = TransferRequest::new(args.url.trim(), dest)
        .with_overwrite(args.overwrite)
        .with_max_workers(args.workers.unwrap_or(config.transfer.max_workers))
        .with_min_chunk_size(args.min_chunk_size.unwrap_or(config.transfer.min_chunk_size))
        .with_extract_archive(config.transfer.extract_archives && !args.no_extract);

    if let Some(name) = &args.output {
        request = request.with_filename(name.clone());
    }
    if let Some(token) = resolve_token(args.token.as_deref()) {
        request = request.with_token(token);
    }
    request
}

/// Token from the flag, else from the environment
fn resolve_token(flag: Option<&str>) -> Option<String> {
    match flag {
        Some(token) => Some(token.to_string()),
        None => match std::env::var(env::TOKEN) {
            Ok(token) => {
                debug!("Using token from {}", env::TOKEN);
                Some(token)
            }
            Err(std::env::VarError::NotUnicode(_)) => {
                warn!("Ignoring {}: not valid UTF-8", env::TOKEN);
                None
            }
            Err(std::env::VarError::NotPresent) => None,
        },
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::generic(format!("Failed to render JSON: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

fn print_summary(total_size: u64, start_time: Instant) {
    let elapsed = start_time.elapsed();
    if total_size == 0 {
        return;
    }
    let rate = total_size as f64 / elapsed.as_secs_f64().max(0.001);
    println!(
        "{} in {:.1}s ({}/s)",
        format_bytes(total_size),
        elapsed.as_secs_f64(),
        format_bytes(rate as u64)
    );
}
