//! Side channels out of the bridge: retry notices and upstream usage
//! accounting.

pub mod collector;
pub mod types;

pub use collector::UsageCollector;
pub use types::{UsageRecord, UsageTotals};

/// Observer for events the bridge surfaces while processing jobs.
/// Both hooks default to doing nothing.
pub trait BridgeEvents: Send + Sync {
    /// A transient failure is about to be retried
    fn on_retry(&self, _message: &str) {}

    /// A response body carried a `usage` object
    fn on_usage(&self, _usage: &UsageRecord) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl BridgeEvents for NoopEvents {}
