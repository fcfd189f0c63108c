//! CopyVault - Main Entry Point
//!
//! Wires the exchange gateway, subscription store, lifecycle manager and
//! reconciliation reporter together and keeps them available for the
//! serving layer.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use copyvault::config::loader::load_config;
use copyvault::lifecycle::LifecycleManager;
use copyvault::report::{ReportSettings, Reporter};
use copyvault::store::InMemorySubscriptionStore;
use copyvault::ExchangeGateway;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting CopyVault application");
    info!("Configuration file: {}", args.config);

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config))?;

    let gateway = Arc::new(ExchangeGateway::with_timeout(
        &config.exchange,
        std::time::Duration::from_secs(config.settings.request_timeout_seconds),
    )?);
    let store = Arc::new(InMemorySubscriptionStore::new());

    let _manager = LifecycleManager::new(
        gateway.clone(),
        store.clone(),
        config.exchange.credit_currency.clone(),
        config.exchange.reference_currency.clone(),
    );
    let _reporter = Reporter::new(gateway, store, ReportSettings::from_config(&config.report)?);

    info!("Application initialized successfully");

    // Keep the application running
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");

    Ok(())
}
