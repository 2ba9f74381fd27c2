//! Retry utilities: backoff builders for external collaborator calls.
//!
//! Uses `backon` for exponential backoff with jitter. Retries are reserved
//! for transient transport failures; business errors never retry.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for payment-intent submission.
///
/// - Min delay: 200ms
/// - Max delay: 5s
/// - Max attempts: 3
/// - Jitter enabled
///
/// Kept short: the scheduler re-attempts the whole cycle on its next tick,
/// so in-call retries only paper over brief transport blips.
pub fn payment_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(3)
        .with_jitter()
}
