//! # Protocol Services
//!
//! A [`ProtocolService`] groups the endpoint services that speak one
//! management protocol. [`ProtocolServices`] groups every protocol of the
//! agent and owns the auto-discovery schedule.
//!
//! Both layers are pure fan-out: each call is forwarded to the endpoint
//! services and failures of one endpoint are logged without affecting the
//! others.
//!
//! # Architecture Note
//! Endpoint services are generic over their session factory, so protocols
//! with different location types cannot share a collection directly. The
//! aggregator sees them through the object-safe [`ProtocolHandle`] trait,
//! which covers only the location-independent operations. Listener
//! registration stays on the typed [`ProtocolService`].

use crate::driver::SessionFactory;
use crate::endpoint::{EndpointService, ServiceStatus, Submission};
use crate::error::{Result, ServiceError};
use crate::event::{same_listener, InventoryListener};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DEFAULT_AUTO_DISCOVERY_SCAN_PERIOD: Duration = Duration::from_secs(600);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All endpoints of one protocol.
pub struct ProtocolService<F: SessionFactory> {
    name: String,
    endpoints: Mutex<BTreeMap<String, EndpointService<F>>>,
    listeners: Mutex<Vec<Arc<dyn InventoryListener<F::Location>>>>,
}

impl<F: SessionFactory> ProtocolService<F> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoints: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint_services(&self) -> Vec<EndpointService<F>> {
        lock(&self.endpoints).values().cloned().collect()
    }

    pub fn endpoint_service(&self, name: &str) -> Option<EndpointService<F>> {
        lock(&self.endpoints).get(name).cloned()
    }

    /// Registers an endpoint service without starting it. Used while
    /// assembling the agent, before [`start`](Self::start).
    pub fn register(&self, service: EndpointService<F>) -> Result<()> {
        let mut endpoints = lock(&self.endpoints);
        if endpoints.contains_key(service.name()) {
            return Err(ServiceError::IllegalArgument(format!(
                "endpoint [{}] is already registered with protocol [{}]",
                service.name(),
                self.name
            )));
        }
        for listener in lock(&self.listeners).iter() {
            service.add_inventory_listener(Arc::clone(listener))?;
        }
        endpoints.insert(service.name().to_string(), service);
        Ok(())
    }

    /// Adds an endpoint service at runtime: registers the known listeners on
    /// it, starts it and requests a first full discovery.
    pub async fn add(&self, service: EndpointService<F>) -> Result<()> {
        self.register(service.clone())?;
        info!(protocol = %self.name, endpoint = %service.name(), "Adding endpoint service");
        service.start().await?;
        if service.status() == ServiceStatus::Running {
            log_submission(&self.name, service.name(), service.discover_all());
        }
        Ok(())
    }

    /// Removes and stops an endpoint service.
    pub async fn remove(&self, name: &str) -> Result<Option<EndpointService<F>>> {
        let Some(service) = lock(&self.endpoints).remove(name) else {
            return Ok(None);
        };
        info!(protocol = %self.name, endpoint = name, "Removing endpoint service");
        if matches!(service.status(), ServiceStatus::Starting | ServiceStatus::Running) {
            service.stop().await?;
        }
        Ok(Some(service))
    }

    pub fn add_inventory_listener(&self, listener: Arc<dyn InventoryListener<F::Location>>) -> Result<()> {
        for service in self.endpoint_services() {
            service.add_inventory_listener(Arc::clone(&listener))?;
        }
        lock(&self.listeners).push(listener);
        Ok(())
    }

    pub fn remove_inventory_listener(&self, listener: &Arc<dyn InventoryListener<F::Location>>) -> Result<()> {
        for service in self.endpoint_services() {
            service.remove_inventory_listener(listener)?;
        }
        lock(&self.listeners).retain(|l| !same_listener(l, listener));
        Ok(())
    }

    /// Starts every endpoint concurrently; a slow endpoint does not hold up
    /// the others.
    pub async fn start(&self) -> Result<()> {
        let starts: Vec<(String, JoinHandle<Result<()>>)> = self
            .endpoint_services()
            .into_iter()
            .map(|service| {
                let name = service.name().to_string();
                (name, tokio::spawn(async move { service.start().await }))
            })
            .collect();

        for (endpoint, start) in starts {
            match start.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(protocol = %self.name, %endpoint, error = %e, "Endpoint failed to start"),
                Err(e) => error!(protocol = %self.name, %endpoint, error = %e, "Endpoint start task failed"),
            }
        }
        info!(protocol = %self.name, endpoints = lock(&self.endpoints).len(), "Protocol service started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        for service in self.endpoint_services() {
            if !matches!(service.status(), ServiceStatus::Starting | ServiceStatus::Running) {
                continue;
            }
            if let Err(e) = service.stop().await {
                error!(protocol = %self.name, endpoint = %service.name(), error = %e, "Endpoint failed to stop");
            }
        }
        info!(protocol = %self.name, "Protocol service stopped");
        Ok(())
    }

    /// Requests a full scan on every running endpoint.
    pub fn discover_all(&self) -> Result<()> {
        for service in self.endpoint_services() {
            if service.status() != ServiceStatus::Running {
                debug!(protocol = %self.name, endpoint = %service.name(), status = %service.status(), "Skipping discovery");
                continue;
            }
            log_submission(&self.name, service.name(), service.discover_all());
        }
        Ok(())
    }
}

fn log_submission<L>(protocol: &str, endpoint: &str, submission: Result<Submission<L>>) {
    match submission {
        Ok(Submission::Queued(_)) => debug!(protocol, endpoint, "Discovery scan requested"),
        Ok(Submission::Ignored) => debug!(protocol, endpoint, "Discovery scan already pending"),
        Err(e) => warn!(protocol, endpoint, error = %e, "Cannot request discovery scan"),
    }
}

/// Location-independent view of a protocol service.
#[async_trait]
pub trait ProtocolHandle: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn discover_all(&self) -> Result<()>;
}

#[async_trait]
impl<F: SessionFactory> ProtocolHandle for ProtocolService<F> {
    fn name(&self) -> &str {
        ProtocolService::name(self)
    }

    async fn start(&self) -> Result<()> {
        ProtocolService::start(self).await
    }

    async fn stop(&self) -> Result<()> {
        ProtocolService::stop(self).await
    }

    fn discover_all(&self) -> Result<()> {
        ProtocolService::discover_all(self)
    }
}

/// Every protocol of the agent plus the auto-discovery schedule.
pub struct ProtocolServices {
    protocols: Vec<Arc<dyn ProtocolHandle>>,
    auto_discovery_period: Duration,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ProtocolServices {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_DISCOVERY_SCAN_PERIOD)
    }
}

impl ProtocolServices {
    /// A zero period disables periodic scans; one scan still runs at start.
    pub fn new(auto_discovery_period: Duration) -> Self {
        Self {
            protocols: Vec::new(),
            auto_discovery_period,
            scheduler: Mutex::new(None),
        }
    }

    pub fn with_protocol(mut self, protocol: Arc<dyn ProtocolHandle>) -> Self {
        self.protocols.push(protocol);
        self
    }

    pub fn protocols(&self) -> &[Arc<dyn ProtocolHandle>] {
        &self.protocols
    }

    pub fn auto_discovery_period(&self) -> Duration {
        self.auto_discovery_period
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.scheduler)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts every protocol, then auto-discovery.
    pub async fn start(&self) -> Result<()> {
        for protocol in &self.protocols {
            if let Err(e) = protocol.start().await {
                error!(protocol = protocol.name(), error = %e, "Protocol service failed to start");
            }
        }
        self.start_auto_discovery();
        Ok(())
    }

    fn start_auto_discovery(&self) {
        if self.auto_discovery_period.is_zero() {
            info!("Auto-discovery is disabled; running a single discovery scan");
            self.discover_all();
            return;
        }

        info!(period_secs = self.auto_discovery_period.as_secs(), "Scheduling auto-discovery");
        let protocols = self.protocols.clone();
        let mut tick = interval(self.auto_discovery_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let handle = tokio::spawn(async move {
            loop {
                tick.tick().await;
                debug!("Auto-discovery triggered");
                discover_all(&protocols);
            }
        });
        if let Some(previous) = lock(&self.scheduler).replace(handle) {
            previous.abort();
        }
    }

    /// Requests a full scan on every endpoint of every protocol.
    pub fn discover_all(&self) {
        discover_all(&self.protocols);
    }

    /// Cancels auto-discovery immediately, then stops every protocol.
    pub async fn stop(&self) -> Result<()> {
        if let Some(scheduler) = lock(&self.scheduler).take() {
            scheduler.abort();
            debug!("Auto-discovery cancelled");
        }
        for protocol in &self.protocols {
            if let Err(e) = protocol.stop().await {
                error!(protocol = protocol.name(), error = %e, "Protocol service failed to stop");
            }
        }
        Ok(())
    }
}

fn discover_all(protocols: &[Arc<dyn ProtocolHandle>]) {
    for protocol in protocols {
        if let Err(e) = protocol.discover_all() {
            error!(protocol = protocol.name(), error = %e, "Auto-discovery failed");
        }
    }
}
