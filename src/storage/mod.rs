//! Persistence interfaces and implementations.
//!
//! The store traits are the engine's only persistence seam. Settlement is a
//! single atomic operation so the donation update, the config cycle reset
//! and the batch linkage commit together (or not at all) on any backend
//! with native transactions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::model::{ConfigStatus, Donation, RoundUpConfig, RoundUpTransaction};

pub mod mock;
pub mod schema;
pub mod sqlite;

pub use mock::MockStore;
pub use sqlite::SqliteStore;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Invalid decimal in column {column}: {value}")]
    InvalidDecimal { column: &'static str, value: String },

    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    #[error("Invalid {column} value: {value}")]
    InvalidEnum { column: &'static str, value: String },

    #[error("Invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("Category list encoding error: {0}")]
    Categories(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Injected by the mock store for failure-path tests.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a keyed transaction insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The external transaction id already exists; the row was applied by an
    /// earlier batch and must not count again.
    Duplicate,
}

/// Parameters for the atomic settlement write issued when a payment intent
/// has been created for a donation.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub donation_id: Uuid,
    pub payment_intent_id: String,
    pub config_id: Uuid,
    pub transaction_ids: Vec<Uuid>,
    pub settled_at: DateTime<Utc>,
}

/// Round-up config persistence.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn insert_config(&self, config: &RoundUpConfig) -> Result<()>;

    async fn get_config(&self, id: Uuid) -> Result<Option<RoundUpConfig>>;

    /// Configs due for a sync pass: active, enabled, linked to a bank
    /// connection, and not already settling (`status != processing`).
    async fn due_configs(&self) -> Result<Vec<RoundUpConfig>>;

    /// Configs claimable by the month-end sweep: pending with a positive
    /// accumulated balance.
    async fn sweepable_configs(&self) -> Result<Vec<RoundUpConfig>>;

    /// Atomically add `delta` to the cycle balance and return the new total.
    async fn add_to_month_total(&self, id: Uuid, delta: Decimal) -> Result<Decimal>;

    async fn set_config_status(&self, id: Uuid, status: ConfigStatus) -> Result<()>;

    /// Record a failed trigger attempt. The accumulated balance is left
    /// untouched so the next eligible cycle re-attempts with it intact.
    async fn mark_config_failed(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Round-up transaction persistence.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a row keyed by the external transaction id. A uniqueness
    /// violation on that key reports [`InsertOutcome::Duplicate`] instead of
    /// an error; this is the race-safe ingestion dedup.
    async fn insert_transaction(&self, tx: &RoundUpTransaction) -> Result<InsertOutcome>;

    async fn get_transaction(&self, id: Uuid) -> Result<Option<RoundUpTransaction>>;

    /// Pending rows for a config that are not yet claimed by any payment
    /// intent. This is the batch a donation trigger settles.
    async fn undonated_transactions(&self, config_id: Uuid) -> Result<Vec<RoundUpTransaction>>;
}

/// Donation persistence.
#[async_trait]
pub trait DonationStore: Send + Sync {
    async fn insert_donation(&self, donation: &Donation) -> Result<()>;

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>>;

    async fn mark_donation_failed(&self, id: Uuid, reason: &str) -> Result<()>;
}

/// Full persistence seam for the engine.
///
/// The multi-entity operations below must be atomic where the backend
/// supports transactions; their internal order (donation, then config, then
/// batch rows) otherwise leaves a crash-recoverable state guarded by the
/// `processing` status and the transaction-id unique index.
#[async_trait]
pub trait Store: ConfigStore + TransactionStore + DonationStore {
    /// Commit a successful payment-intent hand-off: donation to
    /// `processing` with its intent id, config to `processing` with a zeroed
    /// cycle total and updated cycle timestamps, and the settled batch rows
    /// marked `processed` with donation/intent back-references.
    async fn settle_donation(&self, settlement: &Settlement) -> Result<()>;

    /// Final success reported by the payment subsystem: donation
    /// `completed`, config back to `pending`, batch rows `donated`.
    async fn complete_settlement(&self, donation_id: Uuid) -> Result<()>;

    /// Final failure reported by the payment subsystem. The user was never
    /// charged, so this compensates the settlement write: donation and
    /// config `failed` with the reason, the donation amount restored onto
    /// the cycle balance, and the batch rows returned to `pending` with
    /// their donation/intent claims cleared so a later trigger re-settles
    /// the same funds.
    async fn fail_settlement(&self, donation_id: Uuid, reason: &str) -> Result<()>;
}

/// Initialize storage based on configuration.
pub async fn init_storage(
    config: &StorageConfig,
) -> std::result::Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    info!("Storage: {} at {}", config.storage_type, config.path);

    match config.storage_type.as_str() {
        "sqlite" => {
            if let Some(parent) = std::path::Path::new(&config.path).parent() {
                std::fs::create_dir_all(parent)?;
            }

            let pool =
                sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", config.path)).await?;

            let store = SqliteStore::new(pool);
            store.init().await?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MockStore::new())),
        other => Err(format!("Unknown storage type: {}", other).into()),
    }
}
