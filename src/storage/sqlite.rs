//! SQLite implementation of the store interfaces.
//!
//! Monetary values are stored as canonical decimal strings and re-parsed on
//! read; arithmetic never happens in SQL. Multi-entity writes run inside a
//! single database transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};
use sqlx::sqlite::SqliteRow;
use sqlx::{Acquire, Row, SqlitePool};
use uuid::Uuid;

use crate::model::{
    ConfigStatus, Donation, DonationStatus, RoundUpConfig, RoundUpTransaction, Threshold,
    TransactionStatus, TriggerKind,
};

use super::schema::{
    Donations, RoundupConfigs, RoundupTransactions, CREATE_DONATIONS_TABLE,
    CREATE_ROUNDUP_CONFIGS_TABLE, CREATE_ROUNDUP_TRANSACTIONS_TABLE,
};
use super::{
    ConfigStore, DonationStore, InsertOutcome, Result, Settlement, StorageError, Store,
    TransactionStore,
};

/// SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::raw_sql(CREATE_ROUNDUP_CONFIGS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::raw_sql(CREATE_ROUNDUP_TRANSACTIONS_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::raw_sql(CREATE_DONATIONS_TABLE)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_decimal(column: &'static str, value: &str) -> Result<Decimal> {
    value.parse().map_err(|_| StorageError::InvalidDecimal {
        column,
        value: value.to_string(),
    })
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            column,
            value: value.to_string(),
        })
}

fn parse_opt_timestamp(column: &'static str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(|v| parse_timestamp(column, v)).transpose()
}

fn invalid_enum(column: &'static str, value: &str) -> StorageError {
    StorageError::InvalidEnum {
        column,
        value: value.to_string(),
    }
}

fn config_from_row(row: &SqliteRow) -> Result<RoundUpConfig> {
    let threshold_raw: String = row.get("threshold");
    let status_raw: String = row.get("status");
    let total_raw: String = row.get("current_month_total");
    let created_at: String = row.get("created_at");
    let is_active: i64 = row.get("is_active");
    let enabled: i64 = row.get("enabled");

    Ok(RoundUpConfig {
        id: Uuid::parse_str(row.get("id"))?,
        user_id: Uuid::parse_str(row.get("user_id"))?,
        organization_id: Uuid::parse_str(row.get("organization_id"))?,
        cause_id: Uuid::parse_str(row.get("cause_id"))?,
        bank_connection_id: row.get("bank_connection_id"),
        threshold: Threshold::parse(&threshold_raw)
            .ok_or_else(|| invalid_enum("threshold", &threshold_raw))?,
        current_month_total: parse_decimal("current_month_total", &total_raw)?,
        status: ConfigStatus::parse(&status_raw).ok_or_else(|| invalid_enum("status", &status_raw))?,
        failure_reason: row.get("failure_reason"),
        last_month_reset: parse_opt_timestamp("last_month_reset", row.get("last_month_reset"))?,
        last_donation_attempt: parse_opt_timestamp(
            "last_donation_attempt",
            row.get("last_donation_attempt"),
        )?,
        is_active: is_active != 0,
        enabled: enabled != 0,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn transaction_from_row(row: &SqliteRow) -> Result<RoundUpTransaction> {
    let original_raw: String = row.get("original_amount");
    let round_up_raw: String = row.get("round_up_amount");
    let date_raw: String = row.get("transaction_date");
    let categories_raw: String = row.get("categories");
    let status_raw: String = row.get("status");
    let created_at: String = row.get("created_at");
    let donation_id: Option<String> = row.get("donation_id");

    Ok(RoundUpTransaction {
        id: Uuid::parse_str(row.get("id"))?,
        config_id: Uuid::parse_str(row.get("config_id"))?,
        user_id: Uuid::parse_str(row.get("user_id"))?,
        transaction_id: row.get("transaction_id"),
        original_amount: parse_decimal("original_amount", &original_raw)?,
        round_up_amount: parse_decimal("round_up_amount", &round_up_raw)?,
        transaction_date: parse_timestamp("transaction_date", &date_raw)?,
        name: row.get("name"),
        categories: serde_json::from_str(&categories_raw)?,
        status: TransactionStatus::parse(&status_raw)
            .ok_or_else(|| invalid_enum("status", &status_raw))?,
        donation_id: donation_id.as_deref().map(Uuid::parse_str).transpose()?,
        payment_intent_id: row.get("payment_intent_id"),
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

fn donation_from_row(row: &SqliteRow) -> Result<Donation> {
    let status_raw: String = row.get("status");
    let amount_raw: String = row.get("amount");
    let tax_raw: String = row.get("tax_amount");
    let total_raw: String = row.get("total_amount");
    let batch_raw: String = row.get("round_up_transaction_ids");
    let trigger_raw: String = row.get("trigger_kind");
    let created_at: String = row.get("created_at");
    let cycle_month: i64 = row.get("cycle_month");
    let cycle_year: i64 = row.get("cycle_year");

    let batch: Vec<String> = serde_json::from_str(&batch_raw)?;
    let round_up_transaction_ids = batch
        .iter()
        .map(|id| Uuid::parse_str(id))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Donation {
        id: Uuid::parse_str(row.get("id"))?,
        config_id: Uuid::parse_str(row.get("config_id"))?,
        user_id: Uuid::parse_str(row.get("user_id"))?,
        organization_id: Uuid::parse_str(row.get("organization_id"))?,
        cause_id: Uuid::parse_str(row.get("cause_id"))?,
        status: DonationStatus::parse(&status_raw)
            .ok_or_else(|| invalid_enum("status", &status_raw))?,
        amount: parse_decimal("amount", &amount_raw)?,
        tax_amount: parse_decimal("tax_amount", &tax_raw)?,
        total_amount: parse_decimal("total_amount", &total_raw)?,
        round_up_transaction_ids,
        payment_intent_id: row.get("payment_intent_id"),
        failure_reason: row.get("failure_reason"),
        cycle_month: cycle_month as u32,
        cycle_year: cycle_year as i32,
        trigger: TriggerKind::parse(&trigger_raw)
            .ok_or_else(|| invalid_enum("trigger_kind", &trigger_raw))?,
        created_at: parse_timestamp("created_at", &created_at)?,
    })
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn insert_config(&self, config: &RoundUpConfig) -> Result<()> {
        let query = Query::insert()
            .into_table(RoundupConfigs::Table)
            .columns([
                RoundupConfigs::Id,
                RoundupConfigs::UserId,
                RoundupConfigs::OrganizationId,
                RoundupConfigs::CauseId,
                RoundupConfigs::BankConnectionId,
                RoundupConfigs::Threshold,
                RoundupConfigs::CurrentMonthTotal,
                RoundupConfigs::Status,
                RoundupConfigs::FailureReason,
                RoundupConfigs::LastMonthReset,
                RoundupConfigs::LastDonationAttempt,
                RoundupConfigs::IsActive,
                RoundupConfigs::Enabled,
                RoundupConfigs::CreatedAt,
            ])
            .values_panic([
                config.id.to_string().into(),
                config.user_id.to_string().into(),
                config.organization_id.to_string().into(),
                config.cause_id.to_string().into(),
                config.bank_connection_id.clone().into(),
                config.threshold.as_db_string().into(),
                config.current_month_total.to_string().into(),
                config.status.as_str().into(),
                config.failure_reason.clone().into(),
                config.last_month_reset.map(|t| t.to_rfc3339()).into(),
                config.last_donation_attempt.map(|t| t.to_rfc3339()).into(),
                (config.is_active as i32).into(),
                (config.enabled as i32).into(),
                config.created_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_config(&self, id: Uuid) -> Result<Option<RoundUpConfig>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(RoundupConfigs::Table)
            .and_where(Expr::col(RoundupConfigs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(config_from_row).transpose()
    }

    async fn due_configs(&self) -> Result<Vec<RoundUpConfig>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(RoundupConfigs::Table)
            .and_where(Expr::col(RoundupConfigs::IsActive).eq(1))
            .and_where(Expr::col(RoundupConfigs::Enabled).eq(1))
            .and_where(Expr::col(RoundupConfigs::Status).ne(ConfigStatus::Processing.as_str()))
            .and_where(Expr::col(RoundupConfigs::BankConnectionId).ne(""))
            .order_by(RoundupConfigs::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(config_from_row).collect()
    }

    async fn sweepable_configs(&self) -> Result<Vec<RoundUpConfig>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(RoundupConfigs::Table)
            .and_where(Expr::col(RoundupConfigs::IsActive).eq(1))
            .and_where(Expr::col(RoundupConfigs::Enabled).eq(1))
            .and_where(Expr::col(RoundupConfigs::Status).eq(ConfigStatus::Pending.as_str()))
            .order_by(RoundupConfigs::CreatedAt, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let configs = rows
            .iter()
            .map(config_from_row)
            .collect::<Result<Vec<_>>>()?;

        // Balances are stored as decimal text; the positivity filter happens
        // here rather than in SQL.
        Ok(configs
            .into_iter()
            .filter(|c| c.current_month_total > Decimal::ZERO)
            .collect())
    }

    async fn add_to_month_total(&self, id: Uuid, delta: Decimal) -> Result<Decimal> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let select = Query::select()
            .column(RoundupConfigs::CurrentMonthTotal)
            .from(RoundupConfigs::Table)
            .and_where(Expr::col(RoundupConfigs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&select)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "roundup_config",
                id,
            })?;

        let current_raw: String = row.get("current_month_total");
        let new_total = parse_decimal("current_month_total", &current_raw)? + delta;

        let update = Query::update()
            .table(RoundupConfigs::Table)
            .values([(
                RoundupConfigs::CurrentMonthTotal,
                new_total.to_string().into(),
            )])
            .and_where(Expr::col(RoundupConfigs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&update).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(new_total)
    }

    async fn set_config_status(&self, id: Uuid, status: ConfigStatus) -> Result<()> {
        let query = Query::update()
            .table(RoundupConfigs::Table)
            .values([(RoundupConfigs::Status, status.as_str().into())])
            .and_where(Expr::col(RoundupConfigs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_config_failed(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<()> {
        let query = Query::update()
            .table(RoundupConfigs::Table)
            .values([
                (RoundupConfigs::Status, ConfigStatus::Failed.as_str().into()),
                (RoundupConfigs::FailureReason, reason.into()),
                (RoundupConfigs::LastDonationAttempt, at.to_rfc3339().into()),
            ])
            .and_where(Expr::col(RoundupConfigs::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for SqliteStore {
    async fn insert_transaction(&self, tx: &RoundUpTransaction) -> Result<InsertOutcome> {
        let query = Query::insert()
            .into_table(RoundupTransactions::Table)
            .columns([
                RoundupTransactions::Id,
                RoundupTransactions::ConfigId,
                RoundupTransactions::UserId,
                RoundupTransactions::TransactionId,
                RoundupTransactions::OriginalAmount,
                RoundupTransactions::RoundUpAmount,
                RoundupTransactions::TransactionDate,
                RoundupTransactions::Name,
                RoundupTransactions::Categories,
                RoundupTransactions::Status,
                RoundupTransactions::DonationId,
                RoundupTransactions::PaymentIntentId,
                RoundupTransactions::CreatedAt,
            ])
            .values_panic([
                tx.id.to_string().into(),
                tx.config_id.to_string().into(),
                tx.user_id.to_string().into(),
                tx.transaction_id.clone().into(),
                tx.original_amount.to_string().into(),
                tx.round_up_amount.to_string().into(),
                tx.transaction_date.to_rfc3339().into(),
                tx.name.clone().into(),
                serde_json::to_string(&tx.categories)?.into(),
                tx.status.as_str().into(),
                tx.donation_id.map(|id| id.to_string()).into(),
                tx.payment_intent_id.clone().into(),
                tx.created_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        match sqlx::query(&query).execute(&self.pool).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_transaction(&self, id: Uuid) -> Result<Option<RoundUpTransaction>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(RoundupTransactions::Table)
            .and_where(Expr::col(RoundupTransactions::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn undonated_transactions(&self, config_id: Uuid) -> Result<Vec<RoundUpTransaction>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(RoundupTransactions::Table)
            .and_where(Expr::col(RoundupTransactions::ConfigId).eq(config_id.to_string()))
            .and_where(
                Expr::col(RoundupTransactions::Status).eq(TransactionStatus::Pending.as_str()),
            )
            .and_where(Expr::col(RoundupTransactions::PaymentIntentId).is_null())
            .order_by(RoundupTransactions::TransactionDate, Order::Asc)
            .to_string(SqliteQueryBuilder);

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(transaction_from_row).collect()
    }
}

#[async_trait]
impl DonationStore for SqliteStore {
    async fn insert_donation(&self, donation: &Donation) -> Result<()> {
        let batch: Vec<String> = donation
            .round_up_transaction_ids
            .iter()
            .map(|id| id.to_string())
            .collect();

        let query = Query::insert()
            .into_table(Donations::Table)
            .columns([
                Donations::Id,
                Donations::ConfigId,
                Donations::UserId,
                Donations::OrganizationId,
                Donations::CauseId,
                Donations::Status,
                Donations::Amount,
                Donations::TaxAmount,
                Donations::TotalAmount,
                Donations::RoundUpTransactionIds,
                Donations::PaymentIntentId,
                Donations::FailureReason,
                Donations::CycleMonth,
                Donations::CycleYear,
                Donations::TriggerKind,
                Donations::CreatedAt,
            ])
            .values_panic([
                donation.id.to_string().into(),
                donation.config_id.to_string().into(),
                donation.user_id.to_string().into(),
                donation.organization_id.to_string().into(),
                donation.cause_id.to_string().into(),
                donation.status.as_str().into(),
                donation.amount.to_string().into(),
                donation.tax_amount.to_string().into(),
                donation.total_amount.to_string().into(),
                serde_json::to_string(&batch)?.into(),
                donation.payment_intent_id.clone().into(),
                donation.failure_reason.clone().into(),
                donation.cycle_month.into(),
                donation.cycle_year.into(),
                donation.trigger.as_str().into(),
                donation.created_at.to_rfc3339().into(),
            ])
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }

    async fn get_donation(&self, id: Uuid) -> Result<Option<Donation>> {
        let query = Query::select()
            .column(sea_query::Asterisk)
            .from(Donations::Table)
            .and_where(Expr::col(Donations::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;
        row.as_ref().map(donation_from_row).transpose()
    }

    async fn mark_donation_failed(&self, id: Uuid, reason: &str) -> Result<()> {
        let query = Query::update()
            .table(Donations::Table)
            .values([
                (Donations::Status, DonationStatus::Failed.as_str().into()),
                (Donations::FailureReason, reason.into()),
            ])
            .and_where(Expr::col(Donations::Id).eq(id.to_string()))
            .to_string(SqliteQueryBuilder);

        sqlx::query(&query).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn settle_donation(&self, settlement: &Settlement) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let donation_update = Query::update()
            .table(Donations::Table)
            .values([
                (Donations::Status, DonationStatus::Processing.as_str().into()),
                (
                    Donations::PaymentIntentId,
                    settlement.payment_intent_id.clone().into(),
                ),
            ])
            .and_where(Expr::col(Donations::Id).eq(settlement.donation_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&donation_update).execute(&mut *tx).await?;

        let settled_at = settlement.settled_at.to_rfc3339();
        let config_update = Query::update()
            .table(RoundupConfigs::Table)
            .values([
                (
                    RoundupConfigs::Status,
                    ConfigStatus::Processing.as_str().into(),
                ),
                (
                    RoundupConfigs::CurrentMonthTotal,
                    Decimal::ZERO.to_string().into(),
                ),
                (RoundupConfigs::LastMonthReset, settled_at.clone().into()),
                (RoundupConfigs::LastDonationAttempt, settled_at.into()),
                (RoundupConfigs::FailureReason, Option::<String>::None.into()),
            ])
            .and_where(Expr::col(RoundupConfigs::Id).eq(settlement.config_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&config_update).execute(&mut *tx).await?;

        let batch: Vec<String> = settlement
            .transaction_ids
            .iter()
            .map(|id| id.to_string())
            .collect();
        let batch_update = Query::update()
            .table(RoundupTransactions::Table)
            .values([
                (
                    RoundupTransactions::Status,
                    TransactionStatus::Processed.as_str().into(),
                ),
                (
                    RoundupTransactions::DonationId,
                    settlement.donation_id.to_string().into(),
                ),
                (
                    RoundupTransactions::PaymentIntentId,
                    settlement.payment_intent_id.clone().into(),
                ),
            ])
            .and_where(Expr::col(RoundupTransactions::Id).is_in(batch))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&batch_update).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn complete_settlement(&self, donation_id: Uuid) -> Result<()> {
        let donation = self
            .get_donation(donation_id)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "donation",
                id: donation_id,
            })?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let donation_update = Query::update()
            .table(Donations::Table)
            .values([(
                Donations::Status,
                DonationStatus::Completed.as_str().into(),
            )])
            .and_where(Expr::col(Donations::Id).eq(donation_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&donation_update).execute(&mut *tx).await?;

        let config_update = Query::update()
            .table(RoundupConfigs::Table)
            .values([(
                RoundupConfigs::Status,
                ConfigStatus::Pending.as_str().into(),
            )])
            .and_where(Expr::col(RoundupConfigs::Id).eq(donation.config_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&config_update).execute(&mut *tx).await?;

        let batch_update = Query::update()
            .table(RoundupTransactions::Table)
            .values([(
                RoundupTransactions::Status,
                TransactionStatus::Donated.as_str().into(),
            )])
            .and_where(Expr::col(RoundupTransactions::DonationId).eq(donation_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&batch_update).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn fail_settlement(&self, donation_id: Uuid, reason: &str) -> Result<()> {
        let donation = self
            .get_donation(donation_id)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "donation",
                id: donation_id,
            })?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let donation_update = Query::update()
            .table(Donations::Table)
            .values([
                (Donations::Status, DonationStatus::Failed.as_str().into()),
                (Donations::FailureReason, reason.into()),
            ])
            .and_where(Expr::col(Donations::Id).eq(donation_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&donation_update).execute(&mut *tx).await?;

        // The settlement zeroed the cycle balance; restore the donation
        // amount on top of anything accumulated since.
        let select_total = Query::select()
            .column(RoundupConfigs::CurrentMonthTotal)
            .from(RoundupConfigs::Table)
            .and_where(Expr::col(RoundupConfigs::Id).eq(donation.config_id.to_string()))
            .to_string(SqliteQueryBuilder);
        let row = sqlx::query(&select_total)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "roundup_config",
                id: donation.config_id,
            })?;
        let current_raw: String = row.get("current_month_total");
        let restored = parse_decimal("current_month_total", &current_raw)? + donation.amount;

        let config_update = Query::update()
            .table(RoundupConfigs::Table)
            .values([
                (RoundupConfigs::Status, ConfigStatus::Failed.as_str().into()),
                (RoundupConfigs::FailureReason, reason.into()),
                (
                    RoundupConfigs::CurrentMonthTotal,
                    restored.to_string().into(),
                ),
            ])
            .and_where(Expr::col(RoundupConfigs::Id).eq(donation.config_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&config_update).execute(&mut *tx).await?;

        // Release the batch so a later trigger can re-settle it.
        let batch_update = Query::update()
            .table(RoundupTransactions::Table)
            .values([
                (
                    RoundupTransactions::Status,
                    TransactionStatus::Pending.as_str().into(),
                ),
                (RoundupTransactions::DonationId, Option::<String>::None.into()),
                (
                    RoundupTransactions::PaymentIntentId,
                    Option::<String>::None.into(),
                ),
            ])
            .and_where(Expr::col(RoundupTransactions::DonationId).eq(donation_id.to_string()))
            .to_string(SqliteQueryBuilder);
        sqlx::query(&batch_update).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }
}
