//! roundupd: round-up donation engine daemon.
//!
//! Loads configuration, initializes storage and the HTTP collaborator
//! clients, then drives the sync/threshold/settlement pipeline on a fixed
//! interval until interrupted.
//!
//! ## Configuration
//! - `ROUNDUP_CONFIG`: path to a YAML config file
//! - `ROUNDUP__*`: environment overrides (e.g. `ROUNDUP__STORAGE__PATH`)
//! - `ROUNDUP_LOG`: tracing filter (defaults to `info`)

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use roundup_engine::clients::{
    http::build_http_client, HttpBankSyncClient, HttpDonorDirectory, HttpPaymentClient,
    HttpTaxCalculator,
};
use roundup_engine::config::Config;
use roundup_engine::ledger::AccumulationLedger;
use roundup_engine::orchestrator::DonationOrchestrator;
use roundup_engine::scheduler::JobScheduler;
use roundup_engine::storage::init_storage;
use roundup_engine::utils::bootstrap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();

    let config_path = bootstrap::parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting roundupd");

    let store = init_storage(&config.storage).await?;
    info!("Storage initialized");

    let http = build_http_client(Duration::from_secs(config.jobs.request_timeout_secs))?;
    let bank_sync = Arc::new(HttpBankSyncClient::new(
        http.clone(),
        config.collaborators.bank_sync_url.clone(),
    ));
    let payments = Arc::new(HttpPaymentClient::new(
        http.clone(),
        config.collaborators.payments_url.clone(),
    ));
    let donors = Arc::new(HttpDonorDirectory::new(
        http.clone(),
        config.collaborators.donors_url.clone(),
    ));
    let tax = Arc::new(HttpTaxCalculator::new(
        http,
        config.collaborators.tax_url.clone(),
    ));

    let ledger = AccumulationLedger::new(store.clone());
    let orchestrator = DonationOrchestrator::new(store.clone(), payments, donors, tax);
    let scheduler = Arc::new(JobScheduler::new(
        store,
        bank_sync,
        ledger,
        orchestrator,
        Duration::from_secs(config.jobs.sync_interval_secs),
    ));

    tokio::select! {
        _ = scheduler.clone().run_loop() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    Ok(())
}
