//! Standalone chain command adapter: `cast <subcommand> [args..]`.
//!
//! Output goes to stdout; logs go to stderr.

use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sandbox_bridge::chain::{render, CastOutcome, ChainInterpreter};
use sandbox_bridge::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sandbox_bridge=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match Config::load_or_default(None) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config: {:#}", e);
            Config::default()
        }
    };

    let interpreter = match ChainInterpreter::new(config.chain) {
        Ok(interpreter) => interpreter,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = interpreter.execute(&args).await;
    let failed = !matches!(result, Ok(CastOutcome::Output(_)));
    let text = render(result);

    if failed {
        eprintln!("{}", text);
        ExitCode::FAILURE
    } else {
        println!("{}", text);
        ExitCode::SUCCESS
    }
}
