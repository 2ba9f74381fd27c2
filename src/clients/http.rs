//! HTTP implementations of the collaborator interfaces.
//!
//! JSON over HTTP with a bounded per-request timeout. Non-2xx responses are
//! surfaced as [`ClientError::Status`] so the caller can classify them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::RawTransaction;

use super::{
    BankSyncClient, ClientError, DonorDirectory, PaymentClient, PaymentIntent,
    PaymentIntentRequest, Result, TaxBreakdown, TaxCalculator,
};

/// Build the shared HTTP client with a bounded timeout.
pub fn build_http_client(timeout: Duration) -> std::result::Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Bank-sync source over HTTP.
pub struct HttpBankSyncClient {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    user_id: Uuid,
    bank_connection_id: &'a str,
}

#[derive(Deserialize)]
struct SyncResponse {
    added: Vec<RawTransaction>,
}

impl HttpBankSyncClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl BankSyncClient for HttpBankSyncClient {
    async fn sync_transactions(
        &self,
        user_id: Uuid,
        bank_connection_id: &str,
    ) -> Result<Vec<RawTransaction>> {
        let url = format!("{}/transactions/sync", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SyncRequest {
                user_id,
                bank_connection_id,
            })
            .send()
            .await?;
        let body: SyncResponse = check_status(response).await?.json().await?;
        Ok(body.added)
    }
}

/// Payment processor over HTTP.
pub struct HttpPaymentClient {
    client: Client,
    base_url: String,
}

impl HttpPaymentClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> Result<PaymentIntent> {
        let url = format!("{}/payment-intents", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let intent: PaymentIntent = check_status(response).await?.json().await?;
        Ok(intent)
    }
}

/// Donor identity resolver over HTTP.
pub struct HttpDonorDirectory {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DonorResponse {
    donor_id: Option<String>,
}

impl HttpDonorDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DonorDirectory for HttpDonorDirectory {
    async fn find_donor_id(&self, user_id: Uuid) -> Result<Option<String>> {
        let url = format!("{}/donors/{}", self.base_url, user_id);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: DonorResponse = check_status(response).await?.json().await?;
        Ok(body.donor_id)
    }
}

/// Tax calculator over HTTP.
pub struct HttpTaxCalculator {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct TaxRequest {
    amount: Decimal,
    taxable: bool,
}

impl HttpTaxCalculator {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TaxCalculator for HttpTaxCalculator {
    async fn calculate_tax(&self, amount: Decimal, taxable: bool) -> Result<TaxBreakdown> {
        let url = format!("{}/tax/calculate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&TaxRequest { amount, taxable })
            .send()
            .await?;
        let breakdown: TaxBreakdown = check_status(response).await?.json().await?;
        Ok(breakdown)
    }
}
