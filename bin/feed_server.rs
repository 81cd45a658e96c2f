//! # Feed Server
//!
//! HTTP service exposing Chainlink feed prices and Proof of Reserve data on
//! Avalanche.
//!
//! ## Overview
//!
//! This service:
//! - Loads the feed metadata CSV and checks the RPC endpoint serves the expected chain
//! - Runs an initial refresh, then optionally refreshes every `feeds.refresh_interval_seconds`
//! - Serves the HTTP API until Ctrl+C
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin feed_server -- --config Config.toml --bind 0.0.0.0:8000
//! ```

use anyhow::{Context, Result};
use avalanche_feeds_sdk::{
    api, settings::Settings, EthersTransport, FeedError, FeedRegistry, PriceService,
};
use clap::Parser;
use ethers::prelude::Address;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};

#[derive(Parser, Debug)]
#[command(name = "feed_server", about = "Chainlink feed API for Avalanche")]
struct Args {
    /// Settings file
    #[arg(long, default_value = "Config.toml")]
    config: String,
    /// Listen address, overrides server.bind_address
    #[arg(long)]
    bind: Option<String>,
    /// Feed metadata CSV, overrides feeds.metadata_path
    #[arg(long)]
    feeds: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    println!("🚀 Starting Feed Server");
    println!("═══════════════════════════════════════════════════════════════════\n");

    // 1. Load settings
    let mut settings = Settings::from_path(&args.config)?;
    if let Some(bind) = args.bind {
        settings.server.bind_address = bind;
    }
    if let Some(feeds) = args.feeds {
        settings.feeds.metadata_path = feeds;
    }
    let bind_address = settings.server.socket_addr()?;
    println!("✅ Settings loaded");

    #[cfg(feature = "observability")]
    if let Some(metrics_address) = &settings.server.metrics_address {
        let listen = std::net::SocketAddr::from_str(metrics_address)
            .with_context(|| format!("invalid metrics_address {}", metrics_address))?;
        avalanche_feeds_sdk::metrics::install_exporter(listen)?;
        println!("✅ Metrics exporter on {}", listen);
    }

    // 2. Connect to the chain
    let multicall_address = Address::from_str(&settings.contracts.multicall)
        .with_context(|| format!("invalid multicall address {}", settings.contracts.multicall))?;
    let transport = EthersTransport::connect(
        &settings.rpc.http_url,
        multicall_address,
        settings.rpc.expected_chain_id,
        settings.rpc.call_timeout_seconds,
    )
    .await?;
    println!("✅ Connected to chain {}", settings.rpc.expected_chain_id);

    // 3. Load feed metadata
    let registry = FeedRegistry::load_path(&settings.feeds.metadata_path)?;
    println!(
        "✅ {} feeds loaded ({} rows skipped)",
        registry.len(),
        registry.skipped().len()
    );

    let service = Arc::new(
        PriceService::connect(
            Arc::new(registry),
            Arc::new(transport),
            settings.rpc.expected_chain_id,
        )
        .await?,
    );

    // 4. Initial refresh
    match service.refresh().await {
        Ok(outcome) => println!(
            "✅ Initial refresh: {}/{} feeds at block {}",
            outcome.success_count, outcome.total_feeds, outcome.block_number
        ),
        Err(e) => tracing::warn!("⚠️ Initial refresh failed: {}", e),
    }

    // 5. Periodic refresh
    let refresh_interval = settings.feeds.refresh_interval_seconds;
    let refresh_handle = (refresh_interval > 0).then(|| {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(refresh_interval));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately and the initial refresh already ran
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.refresh().await {
                    Ok(outcome) => tracing::debug!(
                        "Scheduled refresh: {} ok, {} failed",
                        outcome.success_count,
                        outcome.failures.len()
                    ),
                    Err(FeedError::RefreshInProgress) => {
                        tracing::debug!("Scheduled refresh skipped, one is already running")
                    }
                    Err(e) => tracing::error!("❌ Scheduled refresh failed: {}", e),
                }
            }
        })
    });

    // 6. Serve
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    println!("💡 Listening on http://{}", bind_address);
    if refresh_interval > 0 {
        println!("   - Prices refresh every {} seconds", refresh_interval);
    }
    println!("\nPress Ctrl+C to stop gracefully...\n");

    axum::serve(listener, api::create_router(service))
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            println!("\n🛑 Shutdown signal received, stopping tasks...");
        })
        .await?;

    if let Some(handle) = refresh_handle {
        handle.abort();
    }

    println!("✅ Shutdown complete");

    Ok(())
}
