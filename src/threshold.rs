//! Trigger evaluation for the round-up state machine.
//!
//! Decides, after each ledger update or on a month boundary, whether a
//! config's accumulated balance should be settled. Pure over the config and
//! the evaluation instant, so both scheduler passes share one code path.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;

use crate::model::{ConfigStatus, RoundUpConfig, TriggerKind};

/// Evaluate whether a donation should fire for `config` at `now`, given the
/// current cycle balance.
///
/// Rules, in order:
/// - A `processing` config is mid-settlement and never triggers. `failed`
///   configs remain eligible: their preserved balance re-attempts on the
///   next qualifying pass.
/// - On the first calendar day of a month, any positive balance is swept
///   regardless of threshold (including unlimited configs).
/// - Otherwise, a numeric threshold fires on strict `total >= threshold`.
pub fn evaluate(config: &RoundUpConfig, total: Decimal, now: DateTime<Utc>) -> Option<TriggerKind> {
    if config.status == ConfigStatus::Processing {
        return None;
    }

    if now.day() == 1 && total > Decimal::ZERO {
        return Some(TriggerKind::MonthEndSweep);
    }

    if config.threshold.crossed_by(total) {
        return Some(TriggerKind::ThresholdCrossed);
    }

    None
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use crate::model::Threshold;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn config(threshold: Threshold, status: ConfigStatus) -> RoundUpConfig {
        RoundUpConfig {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            cause_id: Uuid::new_v4(),
            bank_connection_id: "conn-1".to_string(),
            threshold,
            current_month_total: Decimal::ZERO,
            status,
            failure_reason: None,
            last_month_reset: None,
            last_donation_attempt: None,
            is_active: true,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn mid_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 8, 0, 0).unwrap()
    }

    fn first_of_month() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_threshold_fires_on_strict_gte() {
        let c = config(Threshold::Amount(dec("5.00")), ConfigStatus::Pending);
        assert_eq!(evaluate(&c, dec("4.99"), mid_month()), None);
        assert_eq!(
            evaluate(&c, dec("5.00"), mid_month()),
            Some(TriggerKind::ThresholdCrossed)
        );
        assert_eq!(
            evaluate(&c, dec("5.10"), mid_month()),
            Some(TriggerKind::ThresholdCrossed)
        );
    }

    #[test]
    fn test_unlimited_config_never_fires_mid_cycle() {
        let c = config(Threshold::Unlimited, ConfigStatus::Pending);
        assert_eq!(evaluate(&c, dec("12.35"), mid_month()), None);
    }

    #[test]
    fn test_month_end_sweep_ignores_threshold() {
        let unlimited = config(Threshold::Unlimited, ConfigStatus::Pending);
        assert_eq!(
            evaluate(&unlimited, dec("12.35"), first_of_month()),
            Some(TriggerKind::MonthEndSweep)
        );

        let below_threshold = config(Threshold::Amount(dec("50.00")), ConfigStatus::Pending);
        assert_eq!(
            evaluate(&below_threshold, dec("0.40"), first_of_month()),
            Some(TriggerKind::MonthEndSweep)
        );
    }

    #[test]
    fn test_sweep_requires_positive_balance() {
        let c = config(Threshold::Unlimited, ConfigStatus::Pending);
        assert_eq!(evaluate(&c, Decimal::ZERO, first_of_month()), None);
    }

    #[test]
    fn test_processing_config_never_triggers() {
        let c = config(Threshold::Amount(dec("5.00")), ConfigStatus::Processing);
        assert_eq!(evaluate(&c, dec("100.00"), mid_month()), None);
        assert_eq!(evaluate(&c, dec("100.00"), first_of_month()), None);
    }

    #[test]
    fn test_failed_config_remains_eligible_for_retry() {
        let c = config(Threshold::Amount(dec("5.00")), ConfigStatus::Failed);
        assert_eq!(
            evaluate(&c, dec("6.00"), mid_month()),
            Some(TriggerKind::ThresholdCrossed)
        );
    }
}
