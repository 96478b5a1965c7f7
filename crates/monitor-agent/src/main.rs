//! # Monitor Agent
//!
//! Loads the configuration (first argument, default `config/agent.toml`),
//! starts every configured endpoint and keeps their inventories up to date
//! until ctrl-c.

use anyhow::Result;
use discovery_framework::tracing::setup_tracing;
use monitor_agent::config::AgentConfig;
use monitor_agent::lifecycle::MonitorAgent;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/agent.toml".to_string());

    let config = AgentConfig::load(&config_path)?;
    info!(feed_id = %config.feed_id, config = %config_path, "monitor-agent starting");

    let agent = MonitorAgent::new(&config)?;

    // Endpoints may take a long time to become ready; ctrl-c must still work.
    let interrupted = tokio::select! {
        started = agent.start() => {
            started?;
            false
        }
        _ = signal::ctrl_c() => true,
    };

    if interrupted {
        warn!("Interrupted during start-up");
    } else {
        signal::ctrl_c().await?;
        info!("Shutting down gracefully");
    }

    agent.shutdown().await
}
