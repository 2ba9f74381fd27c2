//! External collaborator interfaces.
//!
//! The engine consumes four narrow seams: the bank-transaction source, the
//! payment processor, the donor identity resolver, and the tax calculator.
//! HTTP implementations live in [`http`]; in-memory mocks in [`mock`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::RawTransaction;

pub mod http;
pub mod mock;

pub use http::{HttpBankSyncClient, HttpDonorDirectory, HttpPaymentClient, HttpTaxCalculator};
pub use mock::{MockBankSyncClient, MockDonorDirectory, MockPaymentClient, MockTaxCalculator};

/// Result type for collaborator calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Injected by mocks for failure-path tests.
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether a retry can reasonably succeed. Transport failures and
    /// server-side errors are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::Unavailable(_) => true,
        }
    }
}

/// Source of new bank transactions for a linked connection.
#[async_trait]
pub trait BankSyncClient: Send + Sync {
    /// Pull transactions observed since the last sync for this connection.
    async fn sync_transactions(
        &self,
        user_id: Uuid,
        bank_connection_id: &str,
    ) -> Result<Vec<RawTransaction>>;
}

/// Payment-intent creation request. The donation id travels as correlating
/// metadata so the processor can deduplicate on its side.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentRequest {
    pub donation_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub cause_id: Uuid,
    pub donor_id: String,
    /// Charge amount in minor currency units.
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
}

/// Issued payment intent.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub payment_intent_id: String,
}

/// Payment processor seam. Idempotency of the call itself is the
/// processor's responsibility; the engine guarantees it will not issue two
/// intents for a config already in `processing`.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    async fn create_payment_intent(&self, request: &PaymentIntentRequest)
        -> Result<PaymentIntent>;
}

/// Resolves a user's payable identity at the payment processor.
#[async_trait]
pub trait DonorDirectory: Send + Sync {
    async fn find_donor_id(&self, user_id: Uuid) -> Result<Option<String>>;
}

/// Tax breakdown for a donation amount.
#[derive(Debug, Clone, Deserialize)]
pub struct TaxBreakdown {
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

/// External tax calculation seam.
#[async_trait]
pub trait TaxCalculator: Send + Sync {
    async fn calculate_tax(&self, amount: Decimal, taxable: bool) -> Result<TaxBreakdown>;
}

/// Convert a decimal currency amount to minor units (cents). Midpoints
/// round away from zero so a charge is never a cent short.
pub fn to_minor_units(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::RoundingStrategy;

    (amount * Decimal::from(100))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}
