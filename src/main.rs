// SendGrid Exporter - Prometheus exporter for email-delivery statistics
//
// Fetches delivery statistics from the SendGrid v3 API on every scrape and
// republishes them as gauge metrics.
//
// # Features
// - Aggregate or per-category collection
// - Daily or month-to-date (accumulated) query windows
// - Fixed-offset time zone support for date-window arithmetic
// - Stateless scrapes: a fresh provider fetch per scrape, no history
//
// # Usage
// sendgrid-exporter --username <user> --api-key <key>
//
// Example:
// sendgrid-exporter --username "acme" --api-key "SG...." --by-category

use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Module declarations
mod client;
mod collector;
mod config;
mod server;
mod stats;

// Re-export for convenience
use client::SendGridClient;
use collector::Collector;
use config::ExporterConfig;

/// Application entry point
///
/// This function:
/// 1. Initializes logging
/// 2. Parses command-line arguments into the exporter configuration
/// 3. Builds the statistics client and the collector
/// 4. Serves the scrape endpoint (runs forever)
#[tokio::main]
async fn main() -> Result<()> {
    // Logs are written to stdout/stderr and can be captured by systemd
    init_logging();

    info!("=== SendGrid Exporter Starting ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Parse and validate command-line arguments
    let config = parse_arguments()?;
    config.validate().context("Invalid configuration")?;

    info!("User name: {}", config.user_name);
    info!("Metric namespace: {}", config.namespace);
    info!("Collection mode: {:?}", config.mode());
    if config.accumulated {
        info!("Accumulated mode: query window starts at the first day of the month");
    }
    match config.fixed_zone() {
        Some(zone) => info!("Time zone: {} ({})", config.zone_name, zone),
        None => info!("Time zone: local"),
    }
    info!("API key: {}", mask_api_key(&config.api_key));
    info!("Statistics API: {}", config.api_base_url);

    // Build the provider client and the collector
    let client =
        SendGridClient::new(&config).context("Failed to build the statistics client")?;
    let collector = Arc::new(Collector::new(config.clone(), Arc::new(client)));

    info!("=== SendGrid Exporter Started Successfully ===");

    // Serve scrapes (runs forever)
    server::serve(config.listen_address, collector)
        .await
        .context("Scrape server failed")?;

    Ok(())
}

/// Parses command-line arguments into the exporter configuration
///
/// # Arguments
/// * --username <name> - SendGrid user name, exported as the user_name label (required)
/// * --api-key <key> - SendGrid API key (or SENDGRID_API_KEY environment variable)
/// * --namespace <ns> - Metric name prefix (optional, defaults to "sendgrid")
/// * --by-category - Group statistics by category (optional)
/// * --accumulated - Query from the first day of the current month (optional)
/// * --location <name> - Time zone display name (optional, used with --time-offset)
/// * --time-offset <seconds> - UTC offset of the time zone in seconds (optional)
/// * --listen-address <addr> - Scrape endpoint address (optional, defaults to 0.0.0.0:9154)
/// * --api-url <url> - Statistics API base URL (optional)
/// * --fetch-timeout <seconds> - Deadline for each provider fetch (optional, defaults to 10)
///
/// # Examples
/// ```bash
/// sendgrid-exporter --username "acme" --api-key "SG.xxxx"
/// sendgrid-exporter --username "acme" --by-category --accumulated
/// sendgrid-exporter --username "acme" --location "EST" --time-offset -18000
/// ```
fn parse_arguments() -> Result<ExporterConfig> {
    let args: Vec<String> = env::args().collect();

    // Helper function to find argument value
    let find_arg = |flag: &str| -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .map(|s| s.to_string())
    };

    let has_flag = |flag: &str| -> bool { args.iter().any(|arg| arg == flag) };

    let defaults = ExporterConfig::default();

    // The API key is a secret; prefer the environment over the command line
    let api_key = find_arg("--api-key")
        .or_else(|| env::var("SENDGRID_API_KEY").ok())
        .unwrap_or_default();

    let zone_offset_secs = match find_arg("--time-offset") {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid --time-offset value: {value}"))?,
        None => 0,
    };

    let listen_address = match find_arg("--listen-address") {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid --listen-address value: {value}"))?,
        None => defaults.listen_address,
    };

    let fetch_timeout = match find_arg("--fetch-timeout") {
        Some(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("Invalid --fetch-timeout value: {value}"))?;
            std::time::Duration::from_secs(secs)
        }
        None => defaults.fetch_timeout,
    };

    Ok(ExporterConfig {
        user_name: find_arg("--username").unwrap_or_default(),
        namespace: find_arg("--namespace").unwrap_or(defaults.namespace),
        by_category: has_flag("--by-category"),
        accumulated: has_flag("--accumulated"),
        zone_name: find_arg("--location").unwrap_or_default(),
        zone_offset_secs,
        api_key,
        api_base_url: find_arg("--api-url").unwrap_or(defaults.api_base_url),
        listen_address,
        fetch_timeout,
    })
}

/// Initializes the logging subsystem
///
/// Sets up structured logging with:
/// - Timestamp for each log entry
/// - Log level (INFO, WARN, ERROR, etc.)
/// - Target module name
/// - Colored output when running in terminal
/// - JSON output when running as systemd service
///
/// # Log Levels
/// Default: INFO
/// Can be overridden with RUST_LOG environment variable
///
/// # Examples
/// ```bash
/// RUST_LOG=debug sendgrid-exporter ...  # Enable debug logging
/// RUST_LOG=warn sendgrid-exporter ...   # Only warnings and errors
/// ```
fn init_logging() {
    // Determine if we're running under systemd
    // Systemd sets INVOCATION_ID environment variable
    let is_systemd = env::var("INVOCATION_ID").is_ok();

    // Create env filter
    // Default to INFO level, but allow override via RUST_LOG
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if is_systemd {
        // When running under systemd, use JSON format for structured logging
        // This makes logs easier to parse and analyze
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        // When running in terminal, use human-readable format with colors
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Masks an API key for logging
///
/// Keeps a short identifying prefix and hides the rest.
///
/// # Example
/// ```
/// SG.abcdef.123456
/// becomes
/// SG.****
/// ```
fn mask_api_key(key: &str) -> String {
    if key.len() <= 3 {
        return "****".to_string();
    }
    format!("{}****", &key[..3])
}
