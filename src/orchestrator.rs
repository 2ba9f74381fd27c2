//! Donation orchestration.
//!
//! Converts a balance trigger into a persisted donation plus an external
//! payment intent, then commits the settlement bookkeeping atomically. Every
//! failure path leaves the accumulated balance intact: money is only zeroed
//! inside the settlement write that records the issued intent.

use std::sync::Arc;

use backon::Retryable;
use chrono::{DateTime, Datelike, Days, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::{
    ClientError, DonorDirectory, PaymentClient, PaymentIntentRequest, TaxCalculator,
    to_minor_units,
};
use crate::model::{Donation, DonationStatus, RoundUpConfig, TriggerKind};
use crate::storage::{Settlement, StorageError, Store};
use crate::utils::retry::payment_backoff;

/// Result type for trigger operations.
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Errors raised while triggering a donation.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// The user has no payable identity at the payment processor.
    #[error("No donor identity for user {user_id}")]
    DonorNotFound { user_id: Uuid },

    /// No pending round-up rows back the claimed balance; a zero-item
    /// donation must never be created.
    #[error("No pending round-up transactions for config {config_id}")]
    EmptyBatch { config_id: Uuid },

    /// Payment-intent creation failed after the donation row was created.
    #[error("Payment intent creation failed: {0}")]
    Payment(ClientError),

    /// A donor/tax collaborator call failed before any state was written.
    /// Transient: retried on the next scheduler tick.
    #[error("Collaborator call failed: {0}")]
    Collaborator(ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TriggerError {
    /// Business-rule violations mark the config failed; transient errors do
    /// not, so the next tick retries them without operator intervention.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            TriggerError::DonorNotFound { .. } | TriggerError::EmptyBatch { .. }
        )
    }
}

/// Orchestrates donation creation and payment-intent hand-off.
pub struct DonationOrchestrator {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentClient>,
    donors: Arc<dyn DonorDirectory>,
    tax: Arc<dyn TaxCalculator>,
}

impl DonationOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentClient>,
        donors: Arc<dyn DonorDirectory>,
        tax: Arc<dyn TaxCalculator>,
    ) -> Self {
        Self {
            store,
            payments,
            donors,
            tax,
        }
    }

    /// Trigger a donation for a config whose balance qualified at `now`.
    ///
    /// Sequential steps: resolve donor, load the pending batch, persist the
    /// donation, request a payment intent, then commit the settlement (config
    /// reset + batch linkage) atomically. Safe to retry as a whole: nothing
    /// before the settlement write consumes the balance, and the batch rows
    /// stay claimable until an intent id is attached to them.
    pub async fn trigger(
        &self,
        config: &RoundUpConfig,
        kind: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Donation> {
        let donor_id = match self.donors.find_donor_id(config.user_id).await {
            Ok(Some(donor_id)) => donor_id,
            Ok(None) => {
                let err = TriggerError::DonorNotFound {
                    user_id: config.user_id,
                };
                self.record_business_failure(config, &err, now).await;
                return Err(err);
            }
            Err(e) => return Err(TriggerError::Collaborator(e)),
        };

        let batch = self.store.undonated_transactions(config.id).await?;
        if batch.is_empty() {
            let err = TriggerError::EmptyBatch {
                config_id: config.id,
            };
            self.record_business_failure(config, &err, now).await;
            return Err(err);
        }

        let amount: Decimal = batch.iter().map(|t| t.round_up_amount).sum();
        let breakdown = self
            .tax
            .calculate_tax(amount, true)
            .await
            .map_err(TriggerError::Collaborator)?;

        // A sweep on the 1st settles the month that just ended.
        let cycle_date = match kind {
            TriggerKind::MonthEndSweep => now
                .checked_sub_days(Days::new(1))
                .unwrap_or(now),
            TriggerKind::ThresholdCrossed => now,
        };

        let donation = Donation {
            id: Uuid::new_v4(),
            config_id: config.id,
            user_id: config.user_id,
            organization_id: config.organization_id,
            cause_id: config.cause_id,
            status: DonationStatus::Pending,
            amount,
            tax_amount: breakdown.tax_amount,
            total_amount: breakdown.total_amount,
            round_up_transaction_ids: batch.iter().map(|t| t.id).collect(),
            payment_intent_id: None,
            failure_reason: None,
            cycle_month: cycle_date.month(),
            cycle_year: cycle_date.year(),
            trigger: kind,
            created_at: now,
        };
        self.store.insert_donation(&donation).await?;

        info!(
            donation_id = %donation.id,
            config_id = %config.id,
            amount = %amount,
            total = %breakdown.total_amount,
            transactions = batch.len(),
            trigger = kind.as_str(),
            "Created donation, requesting payment intent"
        );

        let request = PaymentIntentRequest {
            donation_id: donation.id,
            user_id: config.user_id,
            organization_id: config.organization_id,
            cause_id: config.cause_id,
            donor_id,
            amount_minor: to_minor_units(breakdown.total_amount),
            currency: "usd".to_string(),
            description: format!(
                "Round-up donation {}/{}",
                donation.cycle_month, donation.cycle_year
            ),
        };

        let intent = (|| async { self.payments.create_payment_intent(&request).await })
            .retry(payment_backoff())
            .when(ClientError::is_transient)
            .await;

        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => {
                self.fail_trigger(&donation, config, &format!("payment intent failed: {}", e), now)
                    .await;
                return Err(TriggerError::Payment(e));
            }
        };

        let settlement = Settlement {
            donation_id: donation.id,
            payment_intent_id: intent.payment_intent_id.clone(),
            config_id: config.id,
            transaction_ids: donation.round_up_transaction_ids.clone(),
            settled_at: now,
        };
        if let Err(e) = self.store.settle_donation(&settlement).await {
            self.fail_trigger(&donation, config, &format!("settlement write failed: {}", e), now)
                .await;
            return Err(e.into());
        }

        info!(
            donation_id = %donation.id,
            payment_intent_id = %intent.payment_intent_id,
            config_id = %config.id,
            "Donation settled, awaiting payment confirmation"
        );

        Ok(Donation {
            status: DonationStatus::Processing,
            payment_intent_id: Some(intent.payment_intent_id),
            ..donation
        })
    }

    /// Final resolution reported by the payment subsystem once the intent
    /// succeeds: donation completed, batch rows donated, config back to
    /// accumulating.
    pub async fn confirm_settlement(&self, donation_id: Uuid) -> Result<()> {
        self.store.complete_settlement(donation_id).await?;
        info!(donation_id = %donation_id, "Donation completed");
        Ok(())
    }

    /// Final failure reported by the payment subsystem. No money moved, so
    /// the settlement is compensated: the donation amount returns to the
    /// config's cycle balance and the batch becomes claimable again.
    pub async fn reject_settlement(&self, donation_id: Uuid, reason: &str) -> Result<()> {
        self.store.fail_settlement(donation_id, reason).await?;
        warn!(donation_id = %donation_id, reason, "Donation failed after intent");
        Ok(())
    }

    async fn record_business_failure(
        &self,
        config: &RoundUpConfig,
        err: &TriggerError,
        now: DateTime<Utc>,
    ) {
        warn!(config_id = %config.id, error = %err, "Donation trigger aborted");
        if let Err(e) = self
            .store
            .mark_config_failed(config.id, &err.to_string(), now)
            .await
        {
            error!(config_id = %config.id, error = %e, "Failed to record trigger failure");
        }
    }

    /// Mark the donation and config failed, leaving the balance untouched so
    /// no funds are dropped.
    async fn fail_trigger(
        &self,
        donation: &Donation,
        config: &RoundUpConfig,
        reason: &str,
        now: DateTime<Utc>,
    ) {
        error!(
            donation_id = %donation.id,
            config_id = %config.id,
            reason,
            "Donation trigger failed"
        );
        if let Err(e) = self.store.mark_donation_failed(donation.id, reason).await {
            error!(donation_id = %donation.id, error = %e, "Failed to mark donation failed");
        }
        if let Err(e) = self.store.mark_config_failed(config.id, reason, now).await {
            error!(config_id = %config.id, error = %e, "Failed to mark config failed");
        }
    }
}
