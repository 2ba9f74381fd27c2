//! Mock collaborator implementations for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::RawTransaction;

use super::{
    BankSyncClient, ClientError, DonorDirectory, PaymentClient, PaymentIntent,
    PaymentIntentRequest, Result, TaxBreakdown, TaxCalculator,
};

/// Mock bank-sync source serving canned batches per bank connection.
#[derive(Default)]
pub struct MockBankSyncClient {
    batches: RwLock<HashMap<String, Vec<RawTransaction>>>,
    fail: RwLock<bool>,
    delay: RwLock<Option<std::time::Duration>>,
}

impl MockBankSyncClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_batch(&self, bank_connection_id: &str, batch: Vec<RawTransaction>) {
        self.batches
            .write()
            .await
            .insert(bank_connection_id.to_string(), batch);
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Delay every response, for exercising overlapping scheduler ticks.
    pub async fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.write().await = Some(delay);
    }
}

#[async_trait]
impl BankSyncClient for MockBankSyncClient {
    async fn sync_transactions(
        &self,
        _user_id: Uuid,
        bank_connection_id: &str,
    ) -> Result<Vec<RawTransaction>> {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.read().await {
            return Err(ClientError::Unavailable("bank-sync".to_string()));
        }
        Ok(self
            .batches
            .read()
            .await
            .get(bank_connection_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Mock payment processor recording every intent request.
#[derive(Default)]
pub struct MockPaymentClient {
    requests: RwLock<Vec<PaymentIntentRequest>>,
    fail: RwLock<bool>,
    counter: AtomicU64,
}

impl MockPaymentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Intent requests received so far.
    pub async fn requests(&self) -> Vec<PaymentIntentRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl PaymentClient for MockPaymentClient {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent> {
        if *self.fail.read().await {
            return Err(ClientError::Status {
                status: 402,
                body: "card declined".to_string(),
            });
        }
        self.requests.write().await.push(request.clone());
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            payment_intent_id: format!("pi_mock_{}", n),
        })
    }
}

/// Mock donor directory with a fixed user-to-donor mapping.
#[derive(Default)]
pub struct MockDonorDirectory {
    donors: RwLock<HashMap<Uuid, String>>,
}

impl MockDonorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: Uuid, donor_id: &str) {
        self.donors
            .write()
            .await
            .insert(user_id, donor_id.to_string());
    }
}

#[async_trait]
impl DonorDirectory for MockDonorDirectory {
    async fn find_donor_id(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.donors.read().await.get(&user_id).cloned())
    }
}

/// Mock tax calculator applying a flat rate when taxable.
pub struct MockTaxCalculator {
    rate: Decimal,
}

impl Default for MockTaxCalculator {
    fn default() -> Self {
        Self {
            rate: Decimal::ZERO,
        }
    }
}

impl MockTaxCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(rate: Decimal) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl TaxCalculator for MockTaxCalculator {
    async fn calculate_tax(&self, amount: Decimal, taxable: bool) -> Result<TaxBreakdown> {
        let tax_amount = if taxable {
            (amount * self.rate).round_dp(2)
        } else {
            Decimal::ZERO
        };
        Ok(TaxBreakdown {
            tax_amount,
            total_amount: amount + tax_amount,
        })
    }
}
