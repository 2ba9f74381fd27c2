//! Accumulation ledger.
//!
//! Translates a batch of newly observed bank transactions into durable
//! round-up rows and an updated cycle balance. Each external transaction is
//! applied at most once system-wide: the unique index on the external
//! transaction id is the sole deduplication mechanism, so replaying a batch
//! is a no-op.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::calculator::{is_eligible, round_up_amount};
use crate::model::{RawTransaction, RoundUpConfig, RoundUpTransaction};
use crate::storage::{InsertOutcome, Result, Store};

/// Per-batch application outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Newly inserted rows.
    pub processed: usize,
    /// Ineligible or already-applied transactions.
    pub skipped: usize,
    /// Rows that failed to insert for reasons other than duplication.
    pub failed: usize,
    /// Cycle balance after the batch.
    pub new_total: Decimal,
}

/// Applies raw bank transactions to the persistent ledger.
pub struct AccumulationLedger {
    store: Arc<dyn Store>,
}

impl AccumulationLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply a batch of raw transactions for one config.
    ///
    /// Rows are isolated: an insert failure is counted and the rest of the
    /// batch continues. The summed round-ups of newly inserted rows are
    /// added to the config's cycle balance and the new total is returned.
    pub async fn apply_transactions(
        &self,
        config: &RoundUpConfig,
        raw_transactions: &[RawTransaction],
    ) -> Result<BatchOutcome> {
        let mut processed = 0;
        let mut skipped = 0;
        let mut failed = 0;
        let mut batch_total = Decimal::ZERO;

        for raw in raw_transactions {
            if !is_eligible(raw) {
                skipped += 1;
                continue;
            }

            let round_up = round_up_amount(raw.amount);
            let row = RoundUpTransaction::from_raw(config, raw, round_up);

            match self.store.insert_transaction(&row).await {
                Ok(InsertOutcome::Inserted) => {
                    processed += 1;
                    batch_total += round_up;
                }
                Ok(InsertOutcome::Duplicate) => {
                    debug!(
                        transaction_id = %raw.id,
                        config_id = %config.id,
                        "Transaction already applied, skipping"
                    );
                    skipped += 1;
                }
                Err(e) => {
                    warn!(
                        transaction_id = %raw.id,
                        config_id = %config.id,
                        error = %e,
                        "Failed to persist round-up transaction"
                    );
                    failed += 1;
                }
            }
        }

        let new_total = if batch_total > Decimal::ZERO {
            self.store
                .add_to_month_total(config.id, batch_total)
                .await?
        } else {
            config.current_month_total
        };

        debug!(
            config_id = %config.id,
            processed,
            skipped,
            failed,
            new_total = %new_total,
            "Applied transaction batch"
        );

        Ok(BatchOutcome {
            processed,
            skipped,
            failed,
            new_total,
        })
    }
}
