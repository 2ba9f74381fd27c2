//! Round-up donation engine.
//!
//! Accumulates the spare change from a user's card purchases into a monthly
//! balance and settles that balance as a real donation when a configured
//! threshold is crossed or the monthly cycle ends. The engine owns the
//! accumulation ledger, the trigger state machine, and the single-flight
//! scheduled job that drives bank synchronization and settlement; bank data,
//! payment intents, donor identity and tax computation are consumed through
//! narrow client interfaces.

pub mod calculator;
pub mod clients;
pub mod config;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod scheduler;
pub mod storage;
pub mod threshold;
pub mod utils;
