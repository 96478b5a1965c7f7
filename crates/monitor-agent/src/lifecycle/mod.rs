//! # Agent Lifecycle & Orchestration
//!
//! This module turns an [`AgentConfig`] into running endpoint services and
//! coordinates their start-up and shutdown.
//!
//! ## The Orchestration Pattern
//!
//! Each endpoint service is simple on its own. The work is in **wiring them
//! together**: every endpoint needs its own resource type graph (narrowed by
//! its type set selection), a session factory for its protocol, and the
//! agent-wide inventory listener. [`MonitorAgent`] does that wiring once.
//!
//! **Key Responsibilities:**
//! 1. **Type Graphs** - Build one [`ResourceTypeManager`] per endpoint from the shared type sets
//! 2. **Protocol Wiring** - Create session factories and register endpoints with their protocol
//! 3. **Listener Registration** - Attach the inventory listener before anything starts
//! 4. **Lifecycle Management** - Start endpoints, then schedule auto-discovery
//! 5. **Graceful Shutdown** - Cancel the schedule, let running scans finish, stop endpoints
//!
//! ## Start-up Order
//!
//! ```text
//! MonitorAgent::new ── register listener ── register endpoints (INITIAL)
//!        │
//!   start() ── every endpoint waits until ready (concurrently) ── RUNNING
//!        │
//!        └── auto-discovery: first full scan now, then every period
//! ```
//!
//! Listeners can only be attached while endpoints are not running, so the
//! listener goes on the protocol first and is replayed on each endpoint as it
//! registers.
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = AgentConfig::load("config/agent.toml")?;
//! let agent = MonitorAgent::new(&config)?;
//! agent.start().await?;
//!
//! // ... until ctrl-c ...
//!
//! agent.shutdown().await?;
//! ```

use crate::config::{AgentConfig, SNAPSHOT_PROTOCOL};
use crate::listener::LoggingInventoryListener;
use crate::snapshot::SnapshotSessionFactory;
use anyhow::{bail, Context};
use discovery_framework::endpoint::{EndpointService, MonitoredEndpoint};
use discovery_framework::event::InventoryListener;
use discovery_framework::model::ResourceTypeManager;
use discovery_framework::path::PathLocation;
use discovery_framework::protocol::{ProtocolHandle, ProtocolService, ProtocolServices};
use std::sync::Arc;
use tracing::info;

/// The runtime orchestrator of the monitoring agent.
pub struct MonitorAgent {
    /// Endpoints served by the snapshot protocol
    pub snapshot: Arc<ProtocolService<SnapshotSessionFactory>>,

    /// Receives every inventory event of every endpoint
    pub listener: Arc<LoggingInventoryListener>,

    services: ProtocolServices,
}

impl MonitorAgent {
    /// Builds every enabled endpoint from `config`. Nothing is started yet.
    ///
    /// # Errors
    ///
    /// Invalid type definitions, an endpoint selecting a protocol the agent
    /// does not speak, or invalid inline nodes.
    pub fn new(config: &AgentConfig) -> anyhow::Result<Self> {
        let type_sets = config.type_sets()?;
        let options = config.endpoint_options();

        let snapshot = Arc::new(ProtocolService::<SnapshotSessionFactory>::new(SNAPSHOT_PROTOCOL));
        let listener = Arc::new(LoggingInventoryListener::new());
        snapshot.add_inventory_listener(Arc::clone(&listener) as Arc<dyn InventoryListener<PathLocation>>)?;

        for entry in &config.endpoints {
            if !entry.config.enabled {
                info!(endpoint = %entry.name, "Endpoint is disabled; skipping");
                continue;
            }
            if entry.protocol != SNAPSHOT_PROTOCOL {
                bail!("endpoint [{}] uses unsupported protocol [{}]", entry.name, entry.protocol);
            }

            let types = ResourceTypeManager::new(type_sets.clone(), entry.config.resource_type_sets.as_deref())
                .with_context(|| format!("endpoint [{}]", entry.name))?;
            let factory = match &entry.snapshot {
                Some(path) => SnapshotSessionFactory::file(path),
                None => SnapshotSessionFactory::inline(&entry.nodes)
                    .with_context(|| format!("endpoint [{}]", entry.name))?,
            };
            let service = EndpointService::new(
                MonitoredEndpoint::new(&entry.name, entry.config.clone()),
                options.clone(),
                Arc::new(types),
                factory,
            );
            snapshot.register(service)?;
            info!(endpoint = %entry.name, protocol = SNAPSHOT_PROTOCOL, "Endpoint registered");
        }

        let services = ProtocolServices::new(config.auto_discovery_period())
            .with_protocol(Arc::clone(&snapshot) as Arc<dyn ProtocolHandle>);

        Ok(Self {
            snapshot,
            listener,
            services,
        })
    }

    /// Starts every endpoint and schedules auto-discovery. Returns once every
    /// endpoint is ready or failed to start.
    pub async fn start(&self) -> anyhow::Result<()> {
        info!(
            endpoints = self.snapshot.endpoint_services().len(),
            period_secs = self.services.auto_discovery_period().as_secs(),
            "Starting monitor agent"
        );
        self.services.start().await?;
        info!("Monitor agent started");
        Ok(())
    }

    /// Requests a full scan of every endpoint outside the schedule.
    pub fn discover_all(&self) {
        self.services.discover_all();
    }

    /// Cancels auto-discovery and stops every endpoint. Scans already
    /// running are allowed to finish.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        info!("Shutting down monitor agent...");
        self.services.stop().await?;
        info!(
            discovery_events = self.listener.discovery_events(),
            removed_events = self.listener.removed_events(),
            "Monitor agent shutdown complete"
        );
        Ok(())
    }
}
