//! In-memory store for tests.
//!
//! Mirrors the SQLite semantics, including the unique-transaction-id dedup,
//! and adds failure-injection switches for exercising error paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{
    ConfigStatus, Donation, DonationStatus, RoundUpConfig, RoundUpTransaction, TransactionStatus,
};

use super::{
    ConfigStore, DonationStore, InsertOutcome, Result, Settlement, StorageError, Store,
    TransactionStore,
};

/// Mock store keeping all entities in memory.
#[derive(Default)]
pub struct MockStore {
    configs: RwLock<HashMap<Uuid, RoundUpConfig>>,
    transactions: RwLock<HashMap<Uuid, RoundUpTransaction>>,
    seen_transaction_ids: RwLock<HashSet<String>>,
    donations: RwLock<HashMap<Uuid, Donation>>,
    fail_on_insert_transaction: RwLock<bool>,
    fail_on_settle: RwLock<bool>,
    fail_on_due_configs: RwLock<bool>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert_transaction(&self, fail: bool) {
        *self.fail_on_insert_transaction.write().await = fail;
    }

    pub async fn set_fail_on_settle(&self, fail: bool) {
        *self.fail_on_settle.write().await = fail;
    }

    pub async fn set_fail_on_due_configs(&self, fail: bool) {
        *self.fail_on_due_configs.write().await = fail;
    }

    /// All stored transactions, for assertions.
    pub async fn transactions(&self) -> Vec<RoundUpTransaction> {
        self.transactions.read().await.values().cloned().collect()
    }

    /// All stored donations, for assertions.
    pub async fn donations(&self) -> Vec<Donation> {
        self.donations.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl ConfigStore for MockStore {
    async fn insert_config(&self, config: &RoundUpConfig) -> Result<()> {
        self.configs.write().await.insert(config.id, config.clone());
        Ok(())
    }

    async fn get_config(&self, id: Uuid) -> Result<Option<RoundUpConfig>> {
        Ok(self.configs.read().await.get(&id).cloned())
    }

    async fn due_configs(&self) -> Result<Vec<RoundUpConfig>> {
        if *self.fail_on_due_configs.read().await {
            return Err(StorageError::Unavailable("due_configs".to_string()));
        }
        let configs = self.configs.read().await;
        let mut due: Vec<RoundUpConfig> = configs
            .values()
            .filter(|c| c.is_due() && !c.bank_connection_id.is_empty())
            .cloned()
            .collect();
        due.sort_by_key(|c| c.created_at);
        Ok(due)
    }

    async fn sweepable_configs(&self) -> Result<Vec<RoundUpConfig>> {
        let configs = self.configs.read().await;
        let mut sweepable: Vec<RoundUpConfig> = configs
            .values()
            .filter(|c| {
                c.is_active
                    && c.enabled
                    && c.status == ConfigStatus::Pending
                    && c.current_month_total > Decimal::ZERO
            })
            .cloned()
            .collect();
        sweepable.sort_by_key(|c| c.created_at);
        Ok(sweepable)
    }

    async fn add_to_month_total(&self, id: Uuid, delta: Decimal) -> Result<Decimal> {
        let mut configs = self.configs.write().await;
        let config = configs.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "roundup_config",
            id,
        })?;
        config.current_month_total += delta;
        Ok(config.current_month_total)
    }

    async fn set_config_status(&self, id: Uuid, status: ConfigStatus) -> Result<()> {
        let mut configs = self.configs.write().await;
        let config = configs.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "roundup_config",
            id,
        })?;
        config.status = status;
        Ok(())
    }

    async fn mark_config_failed(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<()> {
        let mut configs = self.configs.write().await;
        let config = configs.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "roundup_config",
            id,
        })?;
        config.status = ConfigStatus::Failed;
        config.failure_reason = Some(reason.to_string());
        config.last_donation_attempt = Some(at);
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for MockStore {
    async fn insert_transaction(&self, tx: &RoundUpTransaction) -> Result<InsertOutcome> {
        if *self.fail_on_insert_transaction.read().await {
            return Err(StorageError::Unavailable("insert_transaction".to_string()));
        }
        let mut seen = self.seen_transaction_ids.write().await;
        if !seen.insert(tx.transaction_id.clone()) {
            return Ok(InsertOutcome::Duplicate);
        }
        self.transactions.write().await.insert(tx.id, tx.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<RoundUpTransaction>> {
        Ok(self.transactions.read().await.get(&id).cloned())
    }

    async fn undonated_transactions(&self, config_id: Uuid) -> Result<Vec<RoundUpTransaction>> {
        let transactions = self.transactions.read().await;
        let mut batch: Vec<RoundUpTransaction> = transactions
            .values()
            .filter(|t| {
                t.config_id == config_id
                    && t.status == TransactionStatus::Pending
                    && t.payment_intent_id.is_none()
            })
            .cloned()
            .collect();
        batch.sort_by_key(|t| t.transaction_date);
        Ok(batch)
    }
}

#[async_trait]
impl DonationStore for MockStore {
    async fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.donations
            .write()
            .await
            .insert(donation.id, donation.clone());
        Ok(())
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>> {
        Ok(self.donations.read().await.get(&id).cloned())
    }

    async fn mark_donation_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let mut donations = self.donations.write().await;
        let donation = donations.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "donation",
            id,
        })?;
        donation.status = DonationStatus::Failed;
        donation.failure_reason = Some(reason.to_string());
        Ok(())
    }
}

#[async_trait]
impl Store for MockStore {
    async fn settle_donation(&self, settlement: &Settlement) -> Result<()> {
        if *self.fail_on_settle.read().await {
            return Err(StorageError::Unavailable("settle_donation".to_string()));
        }

        {
            let mut donations = self.donations.write().await;
            let donation =
                donations
                    .get_mut(&settlement.donation_id)
                    .ok_or(StorageError::NotFound {
                        entity: "donation",
                        id: settlement.donation_id,
                    })?;
            donation.status = DonationStatus::Processing;
            donation.payment_intent_id = Some(settlement.payment_intent_id.clone());
        }

        {
            let mut configs = self.configs.write().await;
            let config =
                configs
                    .get_mut(&settlement.config_id)
                    .ok_or(StorageError::NotFound {
                        entity: "roundup_config",
                        id: settlement.config_id,
                    })?;
            config.status = ConfigStatus::Processing;
            config.current_month_total = Decimal::ZERO;
            config.failure_reason = None;
            config.last_month_reset = Some(settlement.settled_at);
            config.last_donation_attempt = Some(settlement.settled_at);
        }

        let mut transactions = self.transactions.write().await;
        for id in &settlement.transaction_ids {
            if let Some(tx) = transactions.get_mut(id) {
                tx.status = TransactionStatus::Processed;
                tx.donation_id = Some(settlement.donation_id);
                tx.payment_intent_id = Some(settlement.payment_intent_id.clone());
            }
        }

        Ok(())
    }

    async fn complete_settlement(&self, donation_id: Uuid) -> Result<()> {
        let config_id = {
            let mut donations = self.donations.write().await;
            let donation = donations.get_mut(&donation_id).ok_or(StorageError::NotFound {
                entity: "donation",
                id: donation_id,
            })?;
            donation.status = DonationStatus::Completed;
            donation.config_id
        };

        if let Some(config) = self.configs.write().await.get_mut(&config_id) {
            config.status = ConfigStatus::Pending;
        }

        let mut transactions = self.transactions.write().await;
        for tx in transactions.values_mut() {
            if tx.donation_id == Some(donation_id) {
                tx.status = TransactionStatus::Donated;
            }
        }

        Ok(())
    }

    async fn fail_settlement(&self, donation_id: Uuid, reason: &str) -> Result<()> {
        let (config_id, amount) = {
            let mut donations = self.donations.write().await;
            let donation = donations.get_mut(&donation_id).ok_or(StorageError::NotFound {
                entity: "donation",
                id: donation_id,
            })?;
            donation.status = DonationStatus::Failed;
            donation.failure_reason = Some(reason.to_string());
            (donation.config_id, donation.amount)
        };

        // Compensate the settlement: the user was never charged, so the
        // donation amount goes back onto the cycle balance.
        if let Some(config) = self.configs.write().await.get_mut(&config_id) {
            config.status = ConfigStatus::Failed;
            config.failure_reason = Some(reason.to_string());
            config.current_month_total += amount;
        }

        // Release the batch so a later trigger can re-settle it.
        let mut transactions = self.transactions.write().await;
        for tx in transactions.values_mut() {
            if tx.donation_id == Some(donation_id) {
                tx.status = TransactionStatus::Pending;
                tx.donation_id = None;
                tx.payment_intent_id = None;
            }
        }

        Ok(())
    }
}
