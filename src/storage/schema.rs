//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query
//! building. Monetary columns are stored as canonical decimal strings;
//! timestamps as RFC 3339 text.

use sea_query::Iden;

/// Round-up configs table schema.
#[derive(Iden)]
pub enum RoundupConfigs {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "user_id"]
    UserId,
    #[iden = "organization_id"]
    OrganizationId,
    #[iden = "cause_id"]
    CauseId,
    #[iden = "bank_connection_id"]
    BankConnectionId,
    #[iden = "threshold"]
    Threshold,
    #[iden = "current_month_total"]
    CurrentMonthTotal,
    #[iden = "status"]
    Status,
    #[iden = "failure_reason"]
    FailureReason,
    #[iden = "last_month_reset"]
    LastMonthReset,
    #[iden = "last_donation_attempt"]
    LastDonationAttempt,
    #[iden = "is_active"]
    IsActive,
    #[iden = "enabled"]
    Enabled,
    #[iden = "created_at"]
    CreatedAt,
}

/// Round-up transactions table schema.
#[derive(Iden)]
pub enum RoundupTransactions {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "config_id"]
    ConfigId,
    #[iden = "user_id"]
    UserId,
    #[iden = "transaction_id"]
    TransactionId,
    #[iden = "original_amount"]
    OriginalAmount,
    #[iden = "round_up_amount"]
    RoundUpAmount,
    #[iden = "transaction_date"]
    TransactionDate,
    #[iden = "name"]
    Name,
    #[iden = "categories"]
    Categories,
    #[iden = "status"]
    Status,
    #[iden = "donation_id"]
    DonationId,
    #[iden = "payment_intent_id"]
    PaymentIntentId,
    #[iden = "created_at"]
    CreatedAt,
}

/// Donations table schema.
#[derive(Iden)]
pub enum Donations {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "config_id"]
    ConfigId,
    #[iden = "user_id"]
    UserId,
    #[iden = "organization_id"]
    OrganizationId,
    #[iden = "cause_id"]
    CauseId,
    #[iden = "status"]
    Status,
    #[iden = "amount"]
    Amount,
    #[iden = "tax_amount"]
    TaxAmount,
    #[iden = "total_amount"]
    TotalAmount,
    #[iden = "round_up_transaction_ids"]
    RoundUpTransactionIds,
    #[iden = "payment_intent_id"]
    PaymentIntentId,
    #[iden = "failure_reason"]
    FailureReason,
    #[iden = "cycle_month"]
    CycleMonth,
    #[iden = "cycle_year"]
    CycleYear,
    #[iden = "trigger_kind"]
    TriggerKind,
    #[iden = "created_at"]
    CreatedAt,
}

/// SQL for creating the roundup_configs table.
pub const CREATE_ROUNDUP_CONFIGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS roundup_configs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    cause_id TEXT NOT NULL,
    bank_connection_id TEXT NOT NULL,
    threshold TEXT NOT NULL,
    current_month_total TEXT NOT NULL,
    status TEXT NOT NULL,
    failure_reason TEXT,
    last_month_reset TEXT,
    last_donation_attempt TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_roundup_configs_user_status ON roundup_configs(user_id, status);
"#;

/// SQL for creating the roundup_transactions table.
///
/// The unique index on the external transaction id is the sole deduplication
/// mechanism for ingestion; a violation means "already applied".
pub const CREATE_ROUNDUP_TRANSACTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS roundup_transactions (
    id TEXT PRIMARY KEY,
    config_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    transaction_id TEXT NOT NULL,
    original_amount TEXT NOT NULL,
    round_up_amount TEXT NOT NULL,
    transaction_date TEXT NOT NULL,
    name TEXT NOT NULL,
    categories TEXT NOT NULL,
    status TEXT NOT NULL,
    donation_id TEXT,
    payment_intent_id TEXT,
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_roundup_transactions_transaction_id
    ON roundup_transactions(transaction_id);
CREATE INDEX IF NOT EXISTS idx_roundup_transactions_user_status
    ON roundup_transactions(user_id, status);
CREATE INDEX IF NOT EXISTS idx_roundup_transactions_config_status
    ON roundup_transactions(config_id, status);
CREATE INDEX IF NOT EXISTS idx_roundup_transactions_date_status
    ON roundup_transactions(transaction_date, status);
"#;

/// SQL for creating the donations table.
pub const CREATE_DONATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS donations (
    id TEXT PRIMARY KEY,
    config_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    organization_id TEXT NOT NULL,
    cause_id TEXT NOT NULL,
    status TEXT NOT NULL,
    amount TEXT NOT NULL,
    tax_amount TEXT NOT NULL,
    total_amount TEXT NOT NULL,
    round_up_transaction_ids TEXT NOT NULL,
    payment_intent_id TEXT,
    failure_reason TEXT,
    cycle_month INTEGER NOT NULL,
    cycle_year INTEGER NOT NULL,
    trigger_kind TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_donations_config_status ON donations(config_id, status);
"#;
