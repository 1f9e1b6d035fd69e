// Library exports for sandbox_bridge

pub mod bridge;
pub mod chain;
pub mod config;
pub mod http;
pub mod telemetry;

// Re-export main types for convenience
pub use bridge::{Bridge, BridgeContext, BridgeLayout, FsChannel, GuestChannel};
pub use chain::{render, CastOutcome, ChainInterpreter};
pub use config::Config;
pub use telemetry::{BridgeEvents, UsageCollector};
