use std::sync::Mutex;

use super::types::{UsageRecord, UsageTotals};
use super::BridgeEvents;

/// Accumulates usage reports and retry notices for the lifetime of the
/// bridge and mirrors them into the log
pub struct UsageCollector {
    totals: Mutex<UsageTotals>,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self {
            totals: Mutex::new(UsageTotals::default()),
        }
    }

    pub fn snapshot(&self) -> UsageTotals {
        match self.totals.lock() {
            Ok(totals) => totals.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut UsageTotals)) -> UsageTotals {
        let mut totals = match self.totals.lock() {
            Ok(totals) => totals,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut totals);
        totals.clone()
    }
}

impl Default for UsageCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeEvents for UsageCollector {
    fn on_retry(&self, message: &str) {
        self.update(|totals| totals.retries += 1);
        tracing::warn!("{}", message.trim());
    }

    fn on_usage(&self, usage: &UsageRecord) {
        let totals = self.update(|totals| totals.add(usage));
        tracing::info!(
            cost_usd = usage.cost_usd,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            model = %usage.model,
            "Session: {}",
            totals.summary()
        );
    }
}
