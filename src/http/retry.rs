use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{FetchRequest, HttpTransport};
use crate::bridge::channel::GuestChannel;
use crate::bridge::job::{error_payload, HttpJob};
use crate::config::HttpConfig;
use crate::telemetry::{BridgeEvents, UsageRecord};

/// Performs guest HTTP jobs with a fixed backoff schedule.
///
/// The result is always a string for the guest: the upstream body when
/// an attempt lands, an `{"error":{...}}` payload otherwise.
pub struct HttpExecutor {
    transport: Arc<dyn HttpTransport>,
    channel: Arc<dyn GuestChannel>,
    delays: Vec<Duration>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl HttpExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        channel: Arc<dyn GuestChannel>,
        config: &HttpConfig,
    ) -> Self {
        Self {
            transport,
            channel,
            delays: config.retry_delays(),
            default_timeout: Duration::from_secs(config.request_timeout_secs),
            max_timeout: Duration::from_secs(config.max_job_timeout_secs),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }

    pub async fn execute(&self, job: &HttpJob, events: &dyn BridgeEvents) -> String {
        let request = FetchRequest {
            method: job.method.clone(),
            url: job.url.clone(),
            headers: job.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            body: self.request_body(job).await,
            timeout: self.timeout_for(job),
        };

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                debug!("fetch: {} {} (retry {})", request.method, request.url, attempt);
            } else {
                debug!("fetch: {} {}", request.method, request.url);
            }

            let (failure, notice) = match self.transport.fetch(&request).await {
                Ok(response) if !response.is_retryable() => {
                    if !response.is_success() {
                        warn!(
                            "{} {} returned {}; passing body through",
                            request.method, request.url, response.status
                        );
                    }
                    if let Some(usage) = extract_usage(&response.body) {
                        events.on_usage(&usage);
                    }
                    return response.body;
                }
                Ok(response) => (
                    format!("HTTP {}", response.status),
                    response.status.to_string(),
                ),
                Err(e) if e.is_retryable() => {
                    error!("fetch error (attempt {}): {}", attempt + 1, e);
                    (e.to_string(), "fetch failed".to_string())
                }
                Err(e) => {
                    error!("fetch error: {}", e);
                    return error_payload(format!("fetch failed: {}", e));
                }
            };

            let Some(wait) = self.delays.get(attempt) else {
                error!("fetch {} gave up after {} attempts", request.url, self.max_attempts());
                return error_payload(format!("fetch failed after retries: {}", failure));
            };
            events.on_retry(&format!("  [retry] {} — waiting {}s...", notice, wait.as_secs()));
            tokio::time::sleep(*wait).await;
            attempt += 1;
        }
    }

    /// Inline body, else the contents of `bodyFile`. An unreadable body
    /// file degrades to an empty body.
    async fn request_body(&self, job: &HttpJob) -> Option<String> {
        if let Some(body) = job.body.as_ref().filter(|b| !b.is_empty()) {
            return Some(body.clone());
        }
        let path = job.body_file.as_deref()?;
        match self.channel.read_file(path).await {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()).filter(|b| !b.is_empty()),
            Err(e) => {
                error!("failed to read body file {}: {}", path, e);
                None
            }
        }
    }

    fn timeout_for(&self, job: &HttpJob) -> Duration {
        match job.timeout {
            Some(secs) if secs.is_finite() && secs > 0.0 => {
                Duration::from_secs_f64(secs.min(self.max_timeout.as_secs_f64()))
            }
            _ => self.default_timeout,
        }
    }
}

/// Usage accounting from an OpenAI-style response body, if present
pub fn extract_usage(body: &str) -> Option<UsageRecord> {
    let json: Value = serde_json::from_str(body).ok()?;
    let usage = json.get("usage")?.as_object()?;

    let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
    Some(UsageRecord {
        cost_usd: usage.get("cost").and_then(Value::as_f64).unwrap_or(0.0),
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        model: json
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}
