use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token and cost accounting reported by an upstream API response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub cost_usd: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub model: String,
}

/// Running totals since the bridge started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTotals {
    pub started_at: DateTime<Utc>,
    pub usage_reports: u64,
    pub retries: u64,
    pub cost_usd: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub last_model: Option<String>,
}

impl Default for UsageTotals {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            usage_reports: 0,
            retries: 0,
            cost_usd: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            last_model: None,
        }
    }
}

impl UsageTotals {
    pub fn add(&mut self, usage: &UsageRecord) {
        self.usage_reports += 1;
        self.cost_usd += usage.cost_usd;
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        if !usage.model.is_empty() {
            self.last_model = Some(usage.model.clone());
        }
    }

    /// `$0.0123  1.2k in / 340 out  [model]`
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}  {} in / {} out",
            format_usd(self.cost_usd),
            format_tokens(self.prompt_tokens),
            format_tokens(self.completion_tokens)
        );
        if let Some(model) = &self.last_model {
            // provider prefixes like `vendor/model` are noise in a summary
            let short = model.rsplit('/').next().unwrap_or(model);
            line.push_str(&format!("  [{}]", short));
        }
        line
    }
}

pub fn format_usd(value: f64) -> String {
    if value < 0.01 {
        format!("${:.4}", value)
    } else {
        format!("${:.2}", value)
    }
}

pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
