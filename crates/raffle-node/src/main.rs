//! Raffle randomness node entry point.
//!
//! Runs the monitor jobs only. Draws are submitted by whichever service
//! embeds [`raffle_node::RandomnessNode`].

use anyhow::{Context, Result};
use raffle_node::{NodeConfig, RandomnessNode};
use raffle_telemetry::{init_tracing, TelemetryConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    init_tracing(&telemetry).context("Failed to initialize tracing")?;

    let config = NodeConfig::from_env().context("Failed to load node configuration")?;

    info!("===========================================");
    info!("  Raffle Randomness Node v{}", raffle_randomness::VERSION);
    info!("  Settlement chain: {}", config.settlement_chain);
    info!("  Network: {}", telemetry.network);
    info!("===========================================");

    let node = RandomnessNode::build(&config).context("Failed to wire randomness node")?;
    node.start();

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;

    match raffle_telemetry::encode_metrics() {
        Ok(text) => info!("Final metrics snapshot:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }

    Ok(())
}
