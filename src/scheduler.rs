//! Recurring job driver for bank sync and donation triggering.
//!
//! One scheduler instance owns the whole pipeline: it wakes on a fixed
//! interval (four hours by default), sweeps month-end residuals, then syncs
//! and evaluates every due config. At most one run executes at a time; an
//! overlapping tick is skipped and logged, never queued, and due work is
//! always recomputed from persisted state on the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::clients::BankSyncClient;
use crate::ledger::AccumulationLedger;
use crate::model::RoundUpConfig;
use crate::orchestrator::{DonationOrchestrator, TriggerError};
use crate::storage::{StorageError, Store};
use crate::threshold;

/// Job identity reported in execution metadata.
pub const JOB_NAME: &str = "roundup-sync";

/// Result type for scheduler runs.
pub type Result<T> = std::result::Result<T, JobError>;

/// Errors that abort a whole scheduler run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A previous run is still in flight; this tick was skipped.
    #[error("A run is already in flight")]
    AlreadyRunning,

    /// The persistence layer was unreachable at the run level.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Aggregate counters for one scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Configs attempted across both passes.
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Result of an administrative trigger.
#[derive(Debug, Clone)]
pub struct ManualTriggerOutcome {
    pub success: bool,
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

/// Last-run metadata for observability.
#[derive(Debug, Clone)]
pub struct ExecutionStatus {
    pub job_name: &'static str,
    pub schedule: String,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_summary: Option<ExecutionSummary>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Tracking {
    last_started_at: Option<DateTime<Utc>>,
    last_completed_at: Option<DateTime<Utc>>,
    last_summary: Option<ExecutionSummary>,
    last_error: Option<String>,
}

/// Release-on-drop run lock. Guarantees the in-flight flag clears on every
/// exit path, including early returns and panics.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Drives the sync/threshold/settlement pipeline.
pub struct JobScheduler {
    store: Arc<dyn Store>,
    bank_sync: Arc<dyn BankSyncClient>,
    ledger: AccumulationLedger,
    orchestrator: DonationOrchestrator,
    interval: Duration,
    in_flight: AtomicBool,
    tracking: RwLock<Tracking>,
}

impl JobScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        bank_sync: Arc<dyn BankSyncClient>,
        ledger: AccumulationLedger,
        orchestrator: DonationOrchestrator,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            bank_sync,
            ledger,
            orchestrator,
            interval,
            in_flight: AtomicBool::new(false),
            tracking: RwLock::new(Tracking::default()),
        }
    }

    /// Run the scheduler loop indefinitely at the configured interval.
    pub async fn run_loop(self: Arc<Self>) {
        info!(
            job = JOB_NAME,
            interval_secs = self.interval.as_secs(),
            "Starting scheduler loop"
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.run().await {
                Ok(summary) => info!(
                    job = JOB_NAME,
                    total = summary.total_processed,
                    succeeded = summary.success_count,
                    failed = summary.failure_count,
                    "Scheduler run complete"
                ),
                Err(JobError::AlreadyRunning) => {
                    warn!(job = JOB_NAME, "Previous run still in flight, tick skipped")
                }
                Err(e) => error!(job = JOB_NAME, error = %e, "Scheduler run aborted"),
            }
        }
    }

    /// Execute one full run as of the current instant.
    pub async fn run(&self) -> Result<ExecutionSummary> {
        self.run_at(Utc::now()).await
    }

    /// Execute one full run as of the provided instant.
    ///
    /// Pass order matters: the month-end sweep claims qualifying configs
    /// first (their status transition makes them ineligible for the sync
    /// pass), so a config that both reaches month-end and crosses its
    /// threshold in the same run settles exactly once.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<ExecutionSummary> {
        let _guard = match RunGuard::acquire(&self.in_flight) {
            Some(guard) => guard,
            None => return Err(JobError::AlreadyRunning),
        };

        self.tracking.write().await.last_started_at = Some(now);

        let result = self.execute(now).await;

        let mut tracking = self.tracking.write().await;
        tracking.last_completed_at = Some(Utc::now());
        match &result {
            Ok(summary) => {
                tracking.last_summary = Some(summary.clone());
                tracking.last_error = None;
            }
            Err(e) => tracking.last_error = Some(e.to_string()),
        }

        result
    }

    async fn execute(&self, now: DateTime<Utc>) -> Result<ExecutionSummary> {
        let mut summary = ExecutionSummary::default();

        if now.day() == 1 {
            let sweepable = self.store.sweepable_configs().await?;
            info!(count = sweepable.len(), "Running month-end sweep");
            for config in &sweepable {
                summary.total_processed += 1;
                match self
                    .orchestrator
                    .trigger(config, crate::model::TriggerKind::MonthEndSweep, now)
                    .await
                {
                    Ok(donation) => {
                        summary.success_count += 1;
                        info!(
                            config_id = %config.id,
                            donation_id = %donation.id,
                            amount = %donation.amount,
                            "Month-end sweep settled"
                        );
                    }
                    Err(e) => {
                        summary.failure_count += 1;
                        warn!(config_id = %config.id, error = %e, "Month-end sweep failed");
                    }
                }
            }
        }

        let due = self.store.due_configs().await?;
        for config in &due {
            summary.total_processed += 1;
            match self.process_config(config, now).await {
                Ok(()) => summary.success_count += 1,
                Err(e) => {
                    summary.failure_count += 1;
                    warn!(config_id = %config.id, error = %e, "Config processing failed");
                }
            }
        }

        Ok(summary)
    }

    /// Sync, accumulate and evaluate a single config. Errors here are
    /// isolated at the caller so one config never aborts its siblings.
    async fn process_config(
        &self,
        config: &RoundUpConfig,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), ProcessError> {
        let raw = self
            .bank_sync
            .sync_transactions(config.user_id, &config.bank_connection_id)
            .await?;

        let outcome = self.ledger.apply_transactions(config, &raw).await?;

        if let Some(kind) = threshold::evaluate(config, outcome.new_total, now) {
            let donation = self.orchestrator.trigger(config, kind, now).await?;
            info!(
                config_id = %config.id,
                donation_id = %donation.id,
                amount = %donation.amount,
                trigger = kind.as_str(),
                "Balance trigger settled"
            );
        }

        Ok(())
    }

    /// Administrative re-trigger with scheduled-tick semantics. A run
    /// already in flight reports zero items and does not alter any config.
    pub async fn manual_trigger(&self) -> ManualTriggerOutcome {
        match self.run().await {
            Ok(summary) => ManualTriggerOutcome {
                success: true,
                total_processed: summary.total_processed,
                success_count: summary.success_count,
                failure_count: summary.failure_count,
            },
            Err(e) => {
                warn!(job = JOB_NAME, error = %e, "Manual trigger did not run");
                ManualTriggerOutcome {
                    success: false,
                    total_processed: 0,
                    success_count: 0,
                    failure_count: 0,
                }
            }
        }
    }

    /// Snapshot of the last run's metadata.
    pub async fn execution_status(&self) -> ExecutionStatus {
        let tracking = self.tracking.read().await;
        ExecutionStatus {
            job_name: JOB_NAME,
            schedule: format!("every {}s", self.interval.as_secs()),
            last_started_at: tracking.last_started_at,
            last_completed_at: tracking.last_completed_at,
            last_summary: tracking.last_summary.clone(),
            last_error: tracking.last_error.clone(),
        }
    }
}

/// Per-config pipeline error, isolated at the run level.
#[derive(Debug, thiserror::Error)]
enum ProcessError {
    #[error("Bank sync failed: {0}")]
    BankSync(#[from] crate::clients::ClientError),

    #[error("Ledger update failed: {0}")]
    Ledger(#[from] StorageError),

    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::clients::{
        MockBankSyncClient, MockDonorDirectory, MockPaymentClient, MockTaxCalculator,
    };
    use crate::model::{
        ConfigStatus, DonationStatus, RawTransaction, Threshold, TransactionStatus,
    };
    use crate::storage::{ConfigStore, MockStore, TransactionStore};

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn config(threshold: Threshold, bank_connection_id: &str) -> RoundUpConfig {
        RoundUpConfig {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            cause_id: Uuid::new_v4(),
            bank_connection_id: bank_connection_id.to_string(),
            threshold,
            current_month_total: Decimal::ZERO,
            status: ConfigStatus::Pending,
            failure_reason: None,
            last_month_reset: None,
            last_donation_attempt: None,
            is_active: true,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn raw(id: &str, amount: &str) -> RawTransaction {
        RawTransaction {
            id: id.to_string(),
            amount: dec(amount),
            date: Utc::now(),
            name: "Coffee Shop".to_string(),
            categories: vec!["Food and Drink".to_string()],
        }
    }

    fn mid_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap()
    }

    fn first_of_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 2, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MockStore>,
        bank_sync: Arc<MockBankSyncClient>,
        payments: Arc<MockPaymentClient>,
        donors: Arc<MockDonorDirectory>,
        scheduler: Arc<JobScheduler>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MockStore::new());
        let bank_sync = Arc::new(MockBankSyncClient::new());
        let payments = Arc::new(MockPaymentClient::new());
        let donors = Arc::new(MockDonorDirectory::new());
        let tax = Arc::new(MockTaxCalculator::new());

        let ledger = AccumulationLedger::new(store.clone());
        let orchestrator = DonationOrchestrator::new(
            store.clone(),
            payments.clone(),
            donors.clone(),
            tax,
        );
        let scheduler = Arc::new(JobScheduler::new(
            store.clone(),
            bank_sync.clone(),
            ledger,
            orchestrator,
            Duration::from_secs(4 * 60 * 60),
        ));

        Fixture {
            store,
            bank_sync,
            payments,
            donors,
            scheduler,
        }
    }

    /// Seed a config whose stored balance is backed by matching pending
    /// ledger rows, the state an earlier sync pass would have left.
    async fn seed_accumulated(f: &Fixture, config: &RoundUpConfig, amounts: &[&str]) {
        f.store.insert_config(config).await.unwrap();
        f.donors.register(config.user_id, "donor_1").await;
        let mut total = Decimal::ZERO;
        for (i, amount) in amounts.iter().enumerate() {
            let raw = raw(&format!("{}-seed-{}", config.id, i), amount);
            let round_up = crate::calculator::round_up_amount(raw.amount);
            let row = crate::model::RoundUpTransaction::from_raw(config, &raw, round_up);
            f.store.insert_transaction(&row).await.unwrap();
            total += round_up;
        }
        if total > Decimal::ZERO {
            f.store.add_to_month_total(config.id, total).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_threshold_crossing_settles_once() {
        let f = fixture();
        // 4.80 accumulated from earlier batches: 0.40 * 12.
        let c = config(Threshold::Amount(dec("5.00")), "conn-1");
        seed_accumulated(&f, &c, &(0..12).map(|_| "-4.60").collect::<Vec<_>>()).await;

        // A new batch adds 0.30, pushing the total to 5.10.
        f.bank_sync
            .set_batch("conn-1", vec![raw("new-1", "-9.70")])
            .await;

        let summary = f.scheduler.run_at(mid_month()).await.unwrap();
        assert_eq!(summary.total_processed, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 0);

        let donations = f.store.donations().await;
        assert_eq!(donations.len(), 1);
        assert_eq!(donations[0].amount, dec("5.10"));
        assert_eq!(donations[0].status, DonationStatus::Processing);

        let stored = f.store.get_config(c.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfigStatus::Processing);
        assert_eq!(stored.current_month_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_below_threshold_keeps_accumulating() {
        let f = fixture();
        let c = config(Threshold::Amount(dec("5.00")), "conn-1");
        seed_accumulated(&f, &c, &[]).await;
        f.bank_sync
            .set_batch("conn-1", vec![raw("t1", "-4.60")])
            .await;

        let summary = f.scheduler.run_at(mid_month()).await.unwrap();
        assert_eq!(summary.success_count, 1);
        assert!(f.store.donations().await.is_empty());

        let stored = f.store.get_config(c.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConfigStatus::Pending);
        assert_eq!(stored.current_month_total, dec("0.40"));
    }

    #[tokio::test]
    async fn test_month_end_sweep_settles_unlimited_config() {
        let f = fixture();
        let c = config(Threshold::Unlimited, "conn-1");
        // 13 purchases of -4.05, each leaving 0.95: 12.35 accumulated.
        seed_accumulated(&f, &c, &(0..13).map(|_| "-4.05").collect::<Vec<_>>()).await;

        let summary = f.scheduler.run_at(first_of_month()).await.unwrap();
        // Claimed by the sweep pass; the sync pass then excludes it because
        // its status already moved to processing.
        assert_eq!(summary.total_processed, 1);
        assert_eq!(summary.success_count, 1);

        let donations = f.store.donations().await;
        assert_eq!(donations.len(), 1);
        assert_eq!(donations[0].amount, dec("12.35"));
        assert_eq!(
            donations[0].trigger,
            crate::model::TriggerKind::MonthEndSweep
        );

        let stored = f.store.get_config(c.id).await.unwrap().unwrap();
        assert_eq!(stored.current_month_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_same_run_settles_once_on_month_boundary() {
        let f = fixture();
        // Crosses its threshold AND hits month-end in the same run.
        let c = config(Threshold::Amount(dec("5.00")), "conn-1");
        seed_accumulated(&f, &c, &(0..12).map(|_| "-4.50").collect::<Vec<_>>()).await;

        let summary = f.scheduler.run_at(first_of_month()).await.unwrap();
        assert_eq!(summary.failure_count, 0);
        assert_eq!(f.store.donations().await.len(), 1);
        assert_eq!(f.payments.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_processing_config_is_skipped_entirely() {
        let f = fixture();
        let mut c = config(Threshold::Amount(dec("5.00")), "conn-1");
        c.status = ConfigStatus::Processing;
        c.current_month_total = dec("9.99");
        f.store.insert_config(&c).await.unwrap();

        let summary = f.scheduler.run_at(first_of_month()).await.unwrap();
        assert_eq!(summary.total_processed, 0);
        assert!(f.store.donations().await.is_empty());
    }

    #[tokio::test]
    async fn test_per_config_failure_is_isolated() {
        let f = fixture();

        // First config settles normally.
        let healthy = config(Threshold::Amount(dec("0.10")), "conn-1");
        seed_accumulated(&f, &healthy, &["-4.60"]).await;

        // Second config has no donor identity; its trigger fails.
        let orphaned = config(Threshold::Amount(dec("0.10")), "conn-2");
        f.store.insert_config(&orphaned).await.unwrap();
        f.bank_sync
            .set_batch("conn-2", vec![raw("t2", "-2.75")])
            .await;

        let summary = f.scheduler.run_at(mid_month()).await.unwrap();
        assert_eq!(summary.total_processed, 2);
        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.failure_count, 1);

        let healthy_after = f.store.get_config(healthy.id).await.unwrap().unwrap();
        assert_eq!(healthy_after.status, ConfigStatus::Processing);
        let orphaned_after = f.store.get_config(orphaned.id).await.unwrap().unwrap();
        assert_eq!(orphaned_after.status, ConfigStatus::Failed);
        // The orphaned config's money is preserved for retry.
        assert_eq!(orphaned_after.current_month_total, dec("0.25"));
    }

    #[tokio::test]
    async fn test_repeated_runs_do_not_double_apply() {
        let f = fixture();
        let c = config(Threshold::Amount(dec("50.00")), "conn-1");
        seed_accumulated(&f, &c, &[]).await;
        f.bank_sync
            .set_batch("conn-1", vec![raw("t1", "-4.60"), raw("t2", "-1.25")])
            .await;

        f.scheduler.run_at(mid_month()).await.unwrap();
        f.scheduler.run_at(mid_month()).await.unwrap();

        let stored = f.store.get_config(c.id).await.unwrap().unwrap();
        assert_eq!(stored.current_month_total, dec("1.15"));
        assert_eq!(f.store.transactions().await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_overlapping_tick_is_skipped() {
        let f = fixture();
        let c = config(Threshold::Amount(dec("50.00")), "conn-1");
        seed_accumulated(&f, &c, &[]).await;
        f.bank_sync
            .set_batch("conn-1", vec![raw("t1", "-4.60")])
            .await;
        f.bank_sync
            .set_delay(Duration::from_millis(300))
            .await;

        let scheduler = f.scheduler.clone();
        let first = tokio::spawn(async move { scheduler.run_at(mid_month()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outcome = f.scheduler.manual_trigger().await;
        assert!(!outcome.success);
        assert_eq!(outcome.total_processed, 0);

        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.total_processed, 1);

        // The skipped tick altered nothing; exactly one batch was applied.
        let stored = f.store.get_config(c.id).await.unwrap().unwrap();
        assert_eq!(stored.current_month_total, dec("0.40"));
    }

    #[tokio::test]
    async fn test_run_level_storage_failure_recorded() {
        let f = fixture();
        f.store.set_fail_on_due_configs(true).await;

        let err = f.scheduler.run_at(mid_month()).await.unwrap_err();
        assert!(matches!(err, JobError::Storage(_)));

        let status = f.scheduler.execution_status().await;
        assert_eq!(status.job_name, JOB_NAME);
        assert!(status.last_error.is_some());
        assert!(status.last_started_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_trigger_reports_counts() {
        let f = fixture();
        let c = config(Threshold::Amount(dec("50.00")), "conn-1");
        seed_accumulated(&f, &c, &[]).await;

        let outcome = f.scheduler.manual_trigger().await;
        assert!(outcome.success);
        assert_eq!(outcome.total_processed, 1);
        assert_eq!(outcome.success_count, 1);

        let status = f.scheduler.execution_status().await;
        assert_eq!(
            status.last_summary,
            Some(ExecutionSummary {
                total_processed: 1,
                success_count: 1,
                failure_count: 0,
            })
        );
    }
}
