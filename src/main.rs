use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sandbox_bridge::bridge::{write_stop_marker, Bridge, BridgeContext, BridgeLayout, FsChannel, GuestChannel};
use sandbox_bridge::config::{default_config_path, Config};
use sandbox_bridge::telemetry::UsageCollector;

#[derive(Parser)]
#[command(name = "sandbox-bridge")]
#[command(about = "Host-side network bridge for a sandboxed guest", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve guest requests until interrupted
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host directory where the guest filesystem is mounted
        #[arg(long, env = "SANDBOX_ROOT")]
        root: Option<PathBuf>,
    },

    /// Generate a default configuration file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Signal the guest-side consumer to halt
    Stop {
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, env = "SANDBOX_ROOT")]
        root: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sandbox_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, root } => {
            let config = load_config(config, root)?;
            serve(config).await?;
        }
        Commands::Init { output } => {
            let output = output
                .or_else(default_config_path)
                .unwrap_or_else(|| PathBuf::from("config.toml"));
            Config::default().save(&output)?;
            info!("Configuration file created at: {}", output.display());
        }
        Commands::Stop { config, root } => {
            let config = load_config(config, root)?;
            let channel = FsChannel::new(&config.bridge.root);
            let layout = BridgeLayout::new(config.bridge.bridge_dir.clone());
            write_stop_marker(&channel, &layout)
                .await
                .context("failed to write stop marker")?;
            info!("Stop marker written to {}", layout.stop_marker());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, root: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load_or_default(path.as_deref())?;
    if let Some(root) = root {
        config.bridge.root = root;
    }
    Ok(config)
}

async fn serve(config: Config) -> Result<()> {
    info!("Guest root: {}", config.bridge.root.display());
    info!("Bridge dir: {}", config.bridge.bridge_dir);

    let channel: Arc<dyn GuestChannel> = Arc::new(FsChannel::new(&config.bridge.root));
    let usage = Arc::new(UsageCollector::new());
    let ctx = BridgeContext::from_config(&config, channel, usage.clone())?;
    let bridge = Bridge::new(ctx, config.bridge.poll_interval());

    bridge
        .ensure_dirs()
        .await
        .context("failed to create bridge directories")?;
    bridge.clear_stop().await.context("failed to clear stop marker")?;
    bridge.start();

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    bridge.stop().await;

    let totals = usage.snapshot();
    info!(
        "Session: {} usage reports, {} retries, {}",
        totals.usage_reports,
        totals.retries,
        totals.summary()
    );

    Ok(())
}
