//! Capital Bot
//!
//! Answers country and capital questions over a chat transport. The
//! knowledge cache is filled from Russian Wikipedia on first use (or at
//! startup with `EAGER_POPULATION=true`).

mod config;
mod transport;

use anyhow::{Context, Result};
use country_knowledge::{LookupService, QueryHandler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::transport::StdioTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout carries replies, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,country_knowledge=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting Capital Bot");

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        listing = %config.knowledge.listing_url,
        max_concurrent_fetches = config.knowledge.max_concurrent_fetches,
        requests_per_second = ?config.knowledge.fetch.requests_per_second,
        eager = config.eager_population,
        "Configuration loaded"
    );

    let service =
        LookupService::with_http(config.knowledge).context("Failed to build lookup service")?;
    if config.eager_population {
        service.start_population();
    }

    let handler = QueryHandler::new(service.clone());
    let mut transport = StdioTransport::stdio();

    tokio::select! {
        result = transport::run(&mut transport, &handler) => {
            result.context("Transport failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            service.cancel();
        }
    }

    tracing::info!("Capital Bot stopped");
    Ok(())
}
