pub mod api;
pub mod core;
pub mod providers;
pub mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::core::reference::ReferenceTable;
use crate::providers::yahoo_finance::YahooFinanceProvider;
use crate::service::FundService;

pub fn load_reference(config: &AppConfig) -> Result<ReferenceTable> {
    match &config.reference_path {
        Some(path) => ReferenceTable::load_from_path(path),
        None => ReferenceTable::embedded(),
    }
}

pub fn build_service(config: &AppConfig) -> Result<FundService> {
    let reference = load_reference(config)?;
    info!("Loaded {} reference funds", reference.len());

    let yahoo = &config.providers.yahoo;
    let provider = YahooFinanceProvider::new(
        &yahoo.base_url,
        Duration::from_secs(yahoo.timeout_secs),
    )?;

    Ok(FundService::new(
        Arc::new(provider),
        Arc::new(reference),
        config.cache_ttl(),
        config.rate_limit_delay(),
    ))
}

pub async fn run(config: AppConfig) -> Result<()> {
    info!("mfquote starting...");
    debug!("Loaded config: {config:#?}");

    let service = Arc::new(build_service(&config)?);
    let app = api::create_router(service, &config.cors_origins);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
