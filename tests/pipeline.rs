//! End-to-end pipeline tests over the in-memory store and mock
//! collaborators: accumulate across ticks, settle on threshold, confirm the
//! payment, then accumulate a fresh cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use roundup_engine::clients::{
    MockBankSyncClient, MockDonorDirectory, MockPaymentClient, MockTaxCalculator,
};
use roundup_engine::ledger::AccumulationLedger;
use roundup_engine::model::{
    ConfigStatus, DonationStatus, RawTransaction, RoundUpConfig, Threshold, TransactionStatus,
};
use roundup_engine::orchestrator::DonationOrchestrator;
use roundup_engine::scheduler::JobScheduler;
use roundup_engine::storage::{ConfigStore, MockStore};

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn raw(id: &str, amount: &str, name: &str, category: &str) -> RawTransaction {
    RawTransaction {
        id: id.to_string(),
        amount: dec(amount),
        date: Utc::now(),
        name: name.to_string(),
        categories: vec![category.to_string()],
    }
}

struct Harness {
    store: Arc<MockStore>,
    bank_sync: Arc<MockBankSyncClient>,
    payments: Arc<MockPaymentClient>,
    donors: Arc<MockDonorDirectory>,
    scheduler: Arc<JobScheduler>,
    orchestrator: DonationOrchestrator,
}

fn harness() -> Harness {
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
        tax.clone(),
    );
    let scheduler = Arc::new(JobScheduler::new(
        store.clone(),
        bank_sync.clone(),
        ledger,
        DonationOrchestrator::new(store.clone(), payments.clone(), donors.clone(), tax),
        Duration::from_secs(4 * 60 * 60),
    ));

    Harness {
        store,
        bank_sync,
        payments,
        donors,
        scheduler,
        orchestrator,
    }
}

fn new_config(threshold: Threshold) -> RoundUpConfig {
    RoundUpConfig {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        organization_id: Uuid::new_v4(),
        cause_id: Uuid::new_v4(),
        bank_connection_id: "conn-1".to_string(),
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

#[tokio::test]
async fn full_cycle_accumulate_settle_confirm_and_restart() {
    let h = harness();
    let config = new_config(Threshold::Amount(dec("1.00")));
    h.store.insert_config(&config).await.unwrap();
    h.donors.register(config.user_id, "donor_42").await;

    let march_10 = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
    let march_14 = Utc.with_ymd_and_hms(2025, 3, 14, 6, 0, 0).unwrap();

    // Tick 1: one purchase, 0.40 accumulated, below the 1.00 threshold.
    h.bank_sync
        .set_batch("conn-1", vec![raw("t1", "-4.60", "Coffee", "Food and Drink")])
        .await;
    let summary = h.scheduler.run_at(march_10).await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert!(h.store.donations().await.is_empty());

    // Tick 2: the earlier transaction replays alongside a new one; dedup
    // keeps the balance honest and 0.75 more crosses the threshold.
    h.bank_sync
        .set_batch(
            "conn-1",
            vec![
                raw("t1", "-4.60", "Coffee", "Food and Drink"),
                raw("t2", "-9.25", "Books", "Shops"),
            ],
        )
        .await;
    let summary = h.scheduler.run_at(march_14).await.unwrap();
    assert_eq!(summary.success_count, 1);

    let donations = h.store.donations().await;
    assert_eq!(donations.len(), 1);
    let donation = &donations[0];
    assert_eq!(donation.amount, dec("1.15"));
    assert_eq!(donation.status, DonationStatus::Processing);
    assert_eq!(donation.round_up_transaction_ids.len(), 2);

    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ConfigStatus::Processing);
    assert_eq!(stored.current_month_total, Decimal::ZERO);

    // While processing, further ticks leave the config untouched.
    let summary = h.scheduler.run_at(march_14).await.unwrap();
    assert_eq!(summary.total_processed, 0);
    assert_eq!(h.payments.requests().await.len(), 1);

    // The payment subsystem confirms; the config resumes accumulating.
    h.orchestrator.confirm_settlement(donation.id).await.unwrap();
    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ConfigStatus::Pending);
    for tx in h.store.transactions().await {
        assert_eq!(tx.status, TransactionStatus::Donated);
    }

    // A fresh cycle accumulates from zero; settled rows are never re-batched.
    h.bank_sync
        .set_batch("conn-1", vec![raw("t3", "-2.80", "Lunch", "Food and Drink")])
        .await;
    h.scheduler.run_at(march_14).await.unwrap();
    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.current_month_total, dec("0.20"));
    assert_eq!(h.store.donations().await.len(), 1);
}

#[tokio::test]
async fn rejected_charge_returns_funds_for_resettlement() {
    let h = harness();
    let config = new_config(Threshold::Amount(dec("0.50")));
    h.store.insert_config(&config).await.unwrap();
    h.donors.register(config.user_id, "donor_42").await;

    let march_10 = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
    h.bank_sync
        .set_batch("conn-1", vec![raw("t1", "-4.40", "Coffee", "Food and Drink")])
        .await;

    // The intent is issued and settled, then the charge is rejected.
    h.scheduler.run_at(march_10).await.unwrap();
    let donation = h.store.donations().await.pop().unwrap();
    assert_eq!(donation.status, DonationStatus::Processing);

    h.orchestrator
        .reject_settlement(donation.id, "charge failed")
        .await
        .unwrap();

    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.current_month_total, dec("0.60"));

    // The next tick re-settles the same funds as a fresh donation.
    let summary = h.scheduler.run_at(march_10).await.unwrap();
    assert_eq!(summary.success_count, 1);

    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ConfigStatus::Processing);
    assert_eq!(stored.current_month_total, Decimal::ZERO);

    let donations = h.store.donations().await;
    assert_eq!(donations.len(), 2);
    let resettled: Vec<_> = donations
        .iter()
        .filter(|d| d.status == DonationStatus::Processing)
        .collect();
    assert_eq!(resettled.len(), 1);
    assert_eq!(resettled[0].amount, dec("0.60"));
}

#[tokio::test]
async fn payment_failure_preserves_funds_until_retry_succeeds() {
    let h = harness();
    let config = new_config(Threshold::Amount(dec("0.50")));
    h.store.insert_config(&config).await.unwrap();
    h.donors.register(config.user_id, "donor_42").await;

    let march_10 = Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
    h.bank_sync
        .set_batch("conn-1", vec![raw("t1", "-4.40", "Coffee", "Food and Drink")])
        .await;

    // First attempt: the processor declines; nothing is lost.
    h.payments.set_fail(true).await;
    let summary = h.scheduler.run_at(march_10).await.unwrap();
    assert_eq!(summary.failure_count, 1);

    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ConfigStatus::Failed);
    assert_eq!(stored.current_month_total, dec("0.60"));
    assert_eq!(h.store.donations().await.len(), 1);
    assert_eq!(
        h.store.donations().await[0].status,
        DonationStatus::Failed
    );

    // Next tick: the processor recovered; the preserved balance settles.
    h.payments.set_fail(false).await;
    let summary = h.scheduler.run_at(march_10).await.unwrap();
    assert_eq!(summary.success_count, 1);

    let stored = h.store.get_config(config.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ConfigStatus::Processing);
    assert_eq!(stored.current_month_total, Decimal::ZERO);

    let mut donations = h.store.donations().await;
    donations.sort_by_key(|d| d.created_at);
    let settled: Vec<_> = donations
        .iter()
        .filter(|d| d.status == DonationStatus::Processing)
        .collect();
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].amount, dec("0.60"));
}
