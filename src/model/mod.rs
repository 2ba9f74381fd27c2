//! Domain model for round-up accumulation and settlement.
//!
//! Three persisted entities drive the engine:
//! - [`RoundUpConfig`]: per user/organization/bank-link accumulation state.
//! - [`RoundUpTransaction`]: one row per eligible bank transaction, keyed by
//!   the externally supplied transaction id (the sole deduplication key).
//! - [`Donation`]: created by the orchestrator when a balance trigger fires.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bank transaction as delivered by the bank-sync collaborator.
///
/// Amounts are signed: negative means outgoing spend. Only outgoing
/// transactions are candidates for round-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Externally supplied identifier, globally unique per transaction.
    pub id: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Threshold at which a mid-cycle donation fires.
///
/// Unlimited configs never trigger mid-cycle; they settle only at the
/// month-end sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    Unlimited,
    Amount(Decimal),
}

impl Threshold {
    /// Whether the accumulated total has reached this threshold (strict >=).
    pub fn crossed_by(&self, total: Decimal) -> bool {
        match self {
            Threshold::Unlimited => false,
            Threshold::Amount(limit) => total >= *limit,
        }
    }

    /// Storage encoding: the literal `unlimited` or a decimal string.
    pub fn as_db_string(&self) -> String {
        match self {
            Threshold::Unlimited => "unlimited".to_string(),
            Threshold::Amount(limit) => limit.to_string(),
        }
    }

    /// Parse the storage encoding produced by [`Threshold::as_db_string`].
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("unlimited") {
            return Some(Threshold::Unlimited);
        }
        raw.parse::<Decimal>().ok().map(Threshold::Amount)
    }
}

/// Lifecycle of a round-up config within one billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    /// Idle, accumulating round-ups.
    Pending,
    /// A donation has been initiated and not yet settled.
    Processing,
    /// The last trigger attempt failed; balance preserved for retry.
    Failed,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStatus::Pending => "pending",
            ConfigStatus::Processing => "processing",
            ConfigStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ConfigStatus::Pending),
            "processing" => Some(ConfigStatus::Processing),
            "failed" => Some(ConfigStatus::Failed),
            _ => None,
        }
    }
}

/// Per user/organization/bank-link round-up configuration and cycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundUpConfig {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub cause_id: Uuid,
    /// Identifier of the linked bank connection at the sync provider.
    pub bank_connection_id: String,
    pub threshold: Threshold,
    /// Non-negative accumulated balance for the active cycle. Incremented
    /// only by the ledger, reset to zero only inside a successful settlement.
    pub current_month_total: Decimal,
    pub status: ConfigStatus,
    pub failure_reason: Option<String>,
    pub last_month_reset: Option<DateTime<Utc>>,
    pub last_donation_attempt: Option<DateTime<Utc>>,
    /// Plan/subscription kill-switch.
    pub is_active: bool,
    /// User-preference kill-switch.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl RoundUpConfig {
    /// Whether the scheduler should pick this config up in a sync pass.
    pub fn is_due(&self) -> bool {
        self.is_active && self.enabled && self.status != ConfigStatus::Processing
    }
}

/// Lifecycle of a stored round-up transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processed,
    Donated,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processed => "processed",
            TransactionStatus::Donated => "donated",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(TransactionStatus::Pending),
            "processed" => Some(TransactionStatus::Processed),
            "donated" => Some(TransactionStatus::Donated),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// One eligible bank transaction, persisted append-only. Only the status and
/// donation linkage fields are ever mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundUpTransaction {
    pub id: Uuid,
    pub config_id: Uuid,
    pub user_id: Uuid,
    /// External transaction id; unique index, sole dedup key.
    pub transaction_id: String,
    /// Signed source amount (negative = outgoing spend).
    pub original_amount: Decimal,
    /// Positive derived round-up.
    pub round_up_amount: Decimal,
    pub transaction_date: DateTime<Utc>,
    pub name: String,
    pub categories: Vec<String>,
    pub status: TransactionStatus,
    /// Set once a donation is created referencing this row.
    pub donation_id: Option<Uuid>,
    /// Set once a payment intent exists for the batch containing this row.
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RoundUpTransaction {
    /// Build a pending row for an eligible raw transaction.
    pub fn from_raw(config: &RoundUpConfig, raw: &RawTransaction, round_up: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            config_id: config.id,
            user_id: config.user_id,
            transaction_id: raw.id.clone(),
            original_amount: raw.amount,
            round_up_amount: round_up,
            transaction_date: raw.date,
            name: raw.name.clone(),
            categories: raw.categories.clone(),
            status: TransactionStatus::Pending,
            donation_id: None,
            payment_intent_id: None,
            created_at: Utc::now(),
        }
    }
}

/// Donation lifecycle as visible to this engine. Completion/failure after a
/// payment intent is issued is reported back by the payment subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Processing => "processing",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DonationStatus::Pending),
            "processing" => Some(DonationStatus::Processing),
            "completed" => Some(DonationStatus::Completed),
            "failed" => Some(DonationStatus::Failed),
            _ => None,
        }
    }
}

/// What caused a donation to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    ThresholdCrossed,
    MonthEndSweep,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::ThresholdCrossed => "threshold_crossed",
            TriggerKind::MonthEndSweep => "month_end_sweep",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "threshold_crossed" => Some(TriggerKind::ThresholdCrossed),
            "month_end_sweep" => Some(TriggerKind::MonthEndSweep),
            _ => None,
        }
    }
}

/// A donation created by the orchestrator for one settled batch.
///
/// The transaction-id batch is immutable once the donation reaches
/// `processing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub config_id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub cause_id: Uuid,
    pub status: DonationStatus,
    /// Pre-tax round-up total.
    pub amount: Decimal,
    pub tax_amount: Decimal,
    /// Amount actually charged.
    pub total_amount: Decimal,
    /// The exact batch of ledger rows being settled.
    pub round_up_transaction_ids: Vec<Uuid>,
    pub payment_intent_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Billing cycle this donation settles.
    pub cycle_month: u32,
    pub cycle_year: i32,
    pub trigger: TriggerKind,
    pub created_at: DateTime<Utc>,
}
