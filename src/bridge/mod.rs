//! Guest↔host request bridge.
//!
//! The guest drops `requests/<id>.json` followed by `requests/<id>.ready`.
//! Each tick the loop picks up ready ids that are not already being
//! handled, runs them as independent tasks, and writes
//! `responses/<id>.json` followed by `responses/<id>.ready`.

pub mod channel;
pub mod in_flight;
pub mod job;
pub mod layout;
pub mod transfer;

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::chain::{render, ChainInterpreter};
use crate::config::Config;
use crate::http::{HttpExecutor, ReqwestTransport};
use crate::telemetry::BridgeEvents;

pub use channel::{ChannelError, ChannelResult, FsChannel, GuestChannel};
pub use in_flight::{InFlight, InFlightGuard};
pub use job::{error_payload, parse_job, CastJob, HttpJob, JobKind};
pub use layout::BridgeLayout;
pub use transfer::TransferEncoder;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("malformed request: {0}")]
    Descriptor(String),
}

/// Everything a job handler needs, shared by the loop and its tasks
pub struct BridgeContext {
    pub channel: Arc<dyn GuestChannel>,
    pub layout: BridgeLayout,
    pub transfer: TransferEncoder,
    pub http: HttpExecutor,
    pub chain: ChainInterpreter,
    pub events: Arc<dyn BridgeEvents>,
    pub in_flight: InFlight,
}

impl BridgeContext {
    /// Production wiring: reqwest for guest HTTP and chain RPC
    pub fn from_config(
        config: &Config,
        channel: Arc<dyn GuestChannel>,
        events: Arc<dyn BridgeEvents>,
    ) -> Result<Self> {
        let layout = BridgeLayout::new(config.bridge.bridge_dir.clone());
        let transport = ReqwestTransport::new(&config.http.user_agent)
            .context("failed to build HTTP client")?;
        let chain = ChainInterpreter::new(config.chain.clone())
            .context("failed to build chain RPC client")?;

        Ok(Self {
            transfer: TransferEncoder::new(channel.clone(), layout.clone(), config.bridge.chunk_size),
            http: HttpExecutor::new(Arc::new(transport), channel.clone(), &config.http),
            chain,
            channel,
            layout,
            events,
            in_flight: InFlight::new(),
        })
    }
}

pub struct Bridge {
    ctx: Arc<BridgeContext>,
    poll_interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    pub fn new(ctx: BridgeContext, poll_interval: Duration) -> Self {
        Self {
            ctx: Arc::new(ctx),
            poll_interval,
            task: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<BridgeContext> {
        &self.ctx
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(task) => task,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create the requests and responses directories if missing
    pub async fn ensure_dirs(&self) -> ChannelResult<()> {
        self.ctx.channel.ensure_dir(&self.ctx.layout.requests_dir()).await?;
        self.ctx.channel.ensure_dir(&self.ctx.layout.responses_dir()).await
    }

    /// Remove the guest-visible stop marker left by a previous session
    pub async fn clear_stop(&self) -> ChannelResult<()> {
        self.ctx.channel.remove_file(&self.ctx.layout.stop_marker()).await
    }

    /// Begin polling. Does nothing if the loop is already running.
    pub fn start(&self) {
        let mut task = self.task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let ctx = self.ctx.clone();
        let period = self.poll_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                poll(&ctx).await;
            }
        }));
        info!(
            "Bridge polling {} every {:?}",
            self.ctx.layout.requests_dir(),
            period
        );
    }

    /// Stop discovering new requests and signal the guest. Jobs already
    /// dispatched keep running to completion.
    pub async fn stop(&self) {
        let handle = self.task().take();
        if let Some(handle) = handle {
            handle.abort();
            info!("Bridge stopped ({} jobs still in flight)", self.ctx.in_flight.len());
        }
        if let Err(e) = write_stop_marker(self.ctx.channel.as_ref(), &self.ctx.layout).await {
            debug!("Could not write stop marker: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run one discovery tick; returns the ids dispatched
    pub async fn poll_once(&self) -> Vec<String> {
        poll(&self.ctx).await
    }
}

/// Tell a guest-side consumer to halt
pub async fn write_stop_marker(channel: &dyn GuestChannel, layout: &BridgeLayout) -> ChannelResult<()> {
    channel.touch(&layout.stop_marker()).await
}

async fn poll(ctx: &Arc<BridgeContext>) -> Vec<String> {
    let names = match ctx.channel.list_dir(&ctx.layout.requests_dir()).await {
        Ok(names) => names,
        Err(e) => {
            // Expected while the guest is still booting
            debug!("Request discovery failed: {}", e);
            return Vec::new();
        }
    };

    let mut started = Vec::new();
    for id in layout::ready_ids(&names) {
        let Some(guard) = ctx.in_flight.try_claim(&id) else {
            continue;
        };
        debug!("Dispatching request {}", id);
        tokio::spawn(handle_request(ctx.clone(), guard));
        started.push(id);
    }
    started
}

async fn handle_request(ctx: Arc<BridgeContext>, guard: InFlightGuard) {
    let id = guard.id();

    let payload = match load_job(&ctx, id).await {
        Ok(job) => run_job(&ctx, job).await,
        Err(e) => {
            warn!("Request {} rejected: {}", id, e);
            error_payload(e.to_string())
        }
    };

    if let Err(e) = ctx.transfer.deliver(id, &payload).await {
        error!("Failed to deliver response {}: {}", id, e);
    } else {
        debug!("Delivered response {} ({} bytes)", id, payload.len());
    }

    // Consumed even when delivery failed so the job is not replayed
    if let Err(e) = ctx.channel.remove_file(&ctx.layout.request_marker(id)).await {
        warn!("Could not consume request marker {}: {}", id, e);
    }
}

async fn load_job(ctx: &BridgeContext, id: &str) -> Result<JobKind, BridgeError> {
    let raw = ctx.channel.read_file(&ctx.layout.request_file(id)).await?;
    parse_job(&raw)
}

async fn run_job(ctx: &BridgeContext, job: JobKind) -> String {
    match job {
        JobKind::Http(job) => ctx.http.execute(&job, ctx.events.as_ref()).await,
        JobKind::Cast(job) => render(ctx.chain.execute(&job.args).await),
        JobKind::Unknown(kind) => error_payload(format!("unknown request type: {}", kind)),
    }
}
