//! # Endpoint Service
//!
//! One [`EndpointService`] owns everything known about one monitored
//! endpoint: its resource tree, its listeners and its discovery worker.
//!
//! ## Lifecycle
//!
//! ```text
//! INITIAL ──start()──▶ STARTING ──ready──▶ RUNNING ──stop()──▶ STOPPING ──▶ STOPPED
//!                         │                                                   ▲
//!                         └────────────── stop() while waiting ───────────────┘
//! ```
//!
//! `start()` does not return until the endpoint is ready: every configured
//! wait-for location must match at least one node. Samplers must not start
//! against a server that is still booting.
//!
//! ## Scan Throttling
//!
//! Full scans go through a single worker fed by a channel of capacity one.
//! At most one scan runs and at most one more waits. A request arriving
//! while both slots are taken is dropped: the waiting scan will see the same
//! state anyway.
//!
//! # Architecture Note
//! The worker is a Tokio task that hands each scan to a blocking thread
//! (`spawn_blocking`) and waits for it before taking the next request.
//! Drivers are synchronous, so the scan itself runs on a real OS thread
//! while the queueing stays on the async runtime.
//!
//! Command-driven operations ([`EndpointService::discover_children`],
//! [`EndpointService::remove_resources`]) run synchronously on the caller's
//! thread and may overlap a scheduled scan. The [`ResourceManager`] makes
//! each of their steps atomic.

use crate::discovery::{Discovery, DiscoveryResults};
use crate::driver::{Driver, Session, SessionFactory};
use crate::error::{DiscoveryError, InventoryError, Result, ServiceError};
use crate::event::{InventoryEvent, InventoryListener, ListenerRegistry};
use crate::location::LocationResolver;
use crate::manager::ResourceManager;
use crate::model::{MeasurementInstance, Resource, ResourceTypeManager};
use crate::sampling::SamplingService;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceStatus {
    Initial,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Initial => "INITIAL",
            ServiceStatus::Starting => "STARTING",
            ServiceStatus::Running => "RUNNING",
            ServiceStatus::Stopping => "STOPPING",
            ServiceStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// A location that must resolve to at least one node before the endpoint
/// counts as ready.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WaitFor {
    pub resource: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub wait_for: Vec<WaitFor>,
    /// Labels added to every metric of this endpoint.
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    /// Restricts discovery to these resource type sets.
    #[serde(default)]
    pub resource_type_sets: Option<Vec<String>>,
}

fn default_enabled() -> bool {
    true
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wait_for: Vec::new(),
            metric_labels: BTreeMap::new(),
            resource_type_sets: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitoredEndpoint {
    pub name: String,
    pub config: EndpointConfig,
}

impl MonitoredEndpoint {
    pub fn new(name: impl Into<String>, config: EndpointConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EndpointServiceOptions {
    pub feed_id: String,
    pub ready_poll_interval: Duration,
}

impl Default for EndpointServiceOptions {
    fn default() -> Self {
        Self {
            feed_id: "local".to_string(),
            ready_poll_interval: DEFAULT_READY_POLL_INTERVAL,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub scans_completed: u64,
    pub scans_dropped: u64,
    pub last_scan_duration: Option<Duration>,
    pub last_scan_errors: usize,
    pub last_scan_resources: usize,
}

/// Outcome of one full scan.
#[derive(Debug)]
pub struct ScanSummary<L> {
    pub added: Vec<Arc<Resource<L>>>,
    pub modified: Vec<Arc<Resource<L>>>,
    pub unchanged: Vec<Arc<Resource<L>>>,
    pub removed: Vec<Arc<Resource<L>>>,
    pub errors: Vec<DiscoveryError>,
    /// `false` when errors suppressed the discovery event.
    pub event_fired: bool,
    pub duration: Duration,
}

/// Completion handle of a queued scan.
#[derive(Debug)]
pub struct ScanHandle<L> {
    done: oneshot::Receiver<ScanSummary<L>>,
}

impl<L> ScanHandle<L> {
    pub async fn wait(self) -> Result<ScanSummary<L>> {
        self.done
            .await
            .map_err(|_| ServiceError::Task("discovery scan was dropped".into()))
    }
}

/// What happened to a `discover_all` request.
#[derive(Debug)]
pub enum Submission<L> {
    Queued(ScanHandle<L>),
    /// Both scan slots were busy.
    Ignored,
}

impl<L> Submission<L> {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

struct ScanRequest<L> {
    done: oneshot::Sender<ScanSummary<L>>,
}

struct Worker<L> {
    requests: mpsc::Sender<ScanRequest<L>>,
    handle: JoinHandle<()>,
}

struct Inner<F: SessionFactory> {
    endpoint: MonitoredEndpoint,
    options: EndpointServiceOptions,
    factory: F,
    types: Arc<ResourceTypeManager<F::Location>>,
    resources: Arc<ResourceManager<F::Location>>,
    discovery: Discovery<F::Location>,
    listeners: ListenerRegistry<F::Location>,
    status: Mutex<ServiceStatus>,
    interrupt: watch::Sender<bool>,
    /// `false` while a `start()` call is in flight.
    start_settled: watch::Sender<bool>,
    worker: Mutex<Option<Worker<F::Location>>>,
    stats: Mutex<DiscoveryStats>,
}

/// Leaves the service STOPPED if `start()` ends, or is dropped, before
/// reaching RUNNING, and releases any `stop()` waiting on it.
struct SettleStart<'a, F: SessionFactory> {
    inner: &'a Inner<F>,
}

impl<F: SessionFactory> Drop for SettleStart<'_, F> {
    fn drop(&mut self) {
        {
            let mut status = lock(&self.inner.status);
            if *status == ServiceStatus::Starting {
                *status = ServiceStatus::Stopped;
            }
        }
        self.inner.start_settled.send_replace(true);
    }
}

enum Halt<L> {
    Interrupt(watch::Receiver<bool>),
    Drain(Option<Worker<L>>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Discovery and inventory for one endpoint. Clones share the same service.
pub struct EndpointService<F: SessionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: SessionFactory> Clone for EndpointService<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SessionFactory> EndpointService<F> {
    pub fn new(
        endpoint: MonitoredEndpoint,
        options: EndpointServiceOptions,
        types: Arc<ResourceTypeManager<F::Location>>,
        factory: F,
    ) -> Self {
        let resources = Arc::new(ResourceManager::new());
        let discovery = Discovery::new(
            options.feed_id.clone(),
            endpoint.name.clone(),
            Arc::clone(&types),
            Arc::clone(&resources),
        );
        let (interrupt, _) = watch::channel(false);
        let (start_settled, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                endpoint,
                options,
                factory,
                types,
                resources,
                discovery,
                listeners: ListenerRegistry::new(),
                status: Mutex::new(ServiceStatus::Initial),
                interrupt,
                start_settled,
                worker: Mutex::new(None),
                stats: Mutex::new(DiscoveryStats::default()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.endpoint.name
    }

    pub fn endpoint(&self) -> &MonitoredEndpoint {
        &self.inner.endpoint
    }

    pub fn status(&self) -> ServiceStatus {
        *lock(&self.inner.status)
    }

    pub fn resource_manager(&self) -> &Arc<ResourceManager<F::Location>> {
        &self.inner.resources
    }

    pub fn resource_type_manager(&self) -> &Arc<ResourceTypeManager<F::Location>> {
        &self.inner.types
    }

    pub fn session_factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn discovery_stats(&self) -> DiscoveryStats {
        lock(&self.inner.stats).clone()
    }

    /// Waits for the endpoint to become ready, then starts the discovery
    /// worker. Returns early, leaving the service STOPPED, if
    /// [`stop`](Self::stop) is called while waiting.
    pub async fn start(&self) -> Result<()> {
        let name = self.name().to_string();
        {
            let mut status = lock(&self.inner.status);
            if !matches!(*status, ServiceStatus::Initial | ServiceStatus::Stopped) {
                return Err(ServiceError::IllegalState {
                    operation: "start",
                    status: *status,
                });
            }
            *status = ServiceStatus::Starting;
            self.inner.interrupt.send_replace(false);
            self.inner.start_settled.send_replace(false);
        }
        let _settle = SettleStart { inner: &self.inner };
        info!(endpoint = %name, "Starting endpoint service");

        let mut interrupt = self.inner.interrupt.subscribe();
        let poll = self.inner.options.ready_poll_interval;
        loop {
            if *interrupt.borrow_and_update() {
                break;
            }
            let inner = Arc::clone(&self.inner);
            let ready = match tokio::task::spawn_blocking(move || inner.is_endpoint_ready()).await {
                Ok(ready) => ready,
                Err(e) => {
                    *lock(&self.inner.status) = ServiceStatus::Stopped;
                    return Err(ServiceError::Task(e.to_string()));
                }
            };
            if ready {
                break;
            }
            info!(endpoint = %name, retry_secs = poll.as_secs_f64(), "Endpoint is not ready yet");
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = interrupt.changed() => {}
            }
        }

        let mut status = lock(&self.inner.status);
        if *self.inner.interrupt.borrow() {
            *status = ServiceStatus::Stopped;
            info!(endpoint = %name, "Interrupted while waiting for endpoint; service stopped");
            return Ok(());
        }
        let (requests, receiver) = mpsc::channel(1);
        let handle = tokio::spawn(run_scans(Arc::clone(&self.inner), receiver));
        *lock(&self.inner.worker) = Some(Worker { requests, handle });
        *status = ServiceStatus::Running;
        info!(endpoint = %name, "Endpoint service started");
        Ok(())
    }

    /// Stops the service. A scan already running is allowed to finish.
    ///
    /// While STARTING, interrupts the readiness wait and returns once the
    /// pending `start()` has left the service STOPPED.
    pub async fn stop(&self) -> Result<()> {
        let halt = {
            let mut status = lock(&self.inner.status);
            match *status {
                ServiceStatus::Starting => {
                    self.inner.interrupt.send_replace(true);
                    Halt::Interrupt(self.inner.start_settled.subscribe())
                }
                ServiceStatus::Running => {
                    *status = ServiceStatus::Stopping;
                    Halt::Drain(lock(&self.inner.worker).take())
                }
                other => {
                    return Err(ServiceError::IllegalState {
                        operation: "stop",
                        status: other,
                    })
                }
            }
        };
        let worker = match halt {
            Halt::Drain(worker) => worker,
            Halt::Interrupt(mut settled) => {
                info!(endpoint = %self.name(), "Interrupting endpoint start");
                let _ = settled.wait_for(|settled| *settled).await;
                return Ok(());
            }
        };

        info!(endpoint = %self.name(), "Stopping endpoint service");
        if let Some(Worker { requests, handle }) = worker {
            drop(requests);
            if let Err(e) = handle.await {
                error!(endpoint = %self.name(), error = %e, "Discovery worker failed");
            }
        }
        *lock(&self.inner.status) = ServiceStatus::Stopped;
        info!(endpoint = %self.name(), "Endpoint service stopped");
        Ok(())
    }

    /// `true` once every wait-for location matches at least one node.
    /// Blocks on the driver.
    pub fn is_endpoint_ready(&self) -> bool {
        self.inner.is_endpoint_ready()
    }

    /// Requests a full discovery scan.
    ///
    /// Returns immediately. [`Submission::Ignored`] means a scan is running
    /// and another is already waiting.
    pub fn discover_all(&self) -> Result<Submission<F::Location>> {
        self.inner.assert_running("discover")?;
        let worker = lock(&self.inner.worker);
        let Some(worker) = worker.as_ref() else {
            return Err(ServiceError::IllegalState {
                operation: "discover",
                status: ServiceStatus::Stopping,
            });
        };

        let (done, handle) = oneshot::channel();
        match worker.requests.try_send(ScanRequest { done }) {
            Ok(()) => {
                debug!(endpoint = %self.name(), "Full discovery scan queued");
                Ok(Submission::Queued(ScanHandle { done: handle }))
            }
            Err(TrySendError::Full(_)) => {
                debug!(endpoint = %self.name(), "Redundant full discovery scan will be ignored");
                lock(&self.inner.stats).scans_dropped += 1;
                Ok(Submission::Ignored)
            }
            Err(TrySendError::Closed(_)) => Err(ServiceError::IllegalState {
                operation: "discover",
                status: ServiceStatus::Stopping,
            }),
        }
    }

    /// Discovers `type_name` resources below every resource at
    /// `parent_location` (or at the root), on the caller's thread.
    ///
    /// A supplied `session` stays open; otherwise one is opened and closed
    /// here. Fires a discovery event for new or modified resources when the
    /// walk had no errors.
    pub fn discover_children(
        &self,
        parent_location: &F::Location,
        type_name: &str,
        session: Option<&F::Session>,
    ) -> Result<DiscoveryResults<F::Location>> {
        self.inner.assert_running("discover children")?;
        let child_type = self
            .inner
            .types
            .get_resource_type(type_name)
            .cloned()
            .ok_or_else(|| InventoryError::UnknownResourceType(type_name.to_string()))?;

        let owned;
        let session = match session {
            Some(session) => session,
            None => {
                owned = self.inner.factory.open_session()?;
                &owned
            }
        };

        let resolver = session.location_resolver();
        let mut results = DiscoveryResults::new();
        if *parent_location == resolver.root_location() {
            self.inner
                .discovery
                .discover_children(None, &child_type, session, &mut results);
        } else {
            for parent in self.inner.resources.find_resources(parent_location, resolver) {
                self.inner
                    .discovery
                    .discover_children(Some(&parent), &child_type, session, &mut results);
            }
        }

        info!(
            endpoint = %self.name(),
            resource_type = type_name,
            parent = %parent_location,
            added = results.added.len(),
            modified = results.modified.len(),
            errors = results.errors.len(),
            "Child discovery finished"
        );
        let added_or_modified = results.added_or_modified();
        if results.is_success() && !added_or_modified.is_empty() {
            let event = InventoryEvent::discovery(
                self.inner.sampling(),
                &self.inner.resources,
                added_or_modified,
                Vec::new(),
            );
            self.inner.listeners.notify(&event);
        }
        Ok(results)
    }

    /// Removes every resource matching `location`, with descendants, and
    /// fires a removed event.
    pub fn remove_resources(&self, location: &F::Location) -> Result<Vec<Arc<Resource<F::Location>>>> {
        self.inner.assert_running("remove resources")?;
        let session = self.inner.factory.open_session()?;
        let removed = self
            .inner
            .resources
            .remove_resources(location, session.location_resolver());
        drop(session);

        info!(endpoint = %self.name(), %location, removed = removed.len(), "Removed resources");
        if !removed.is_empty() {
            let event = InventoryEvent::removed(self.inner.sampling(), &self.inner.resources, removed.clone());
            self.inner.listeners.notify(&event);
        }
        Ok(removed)
    }

    pub fn add_inventory_listener(&self, listener: Arc<dyn InventoryListener<F::Location>>) -> Result<()> {
        self.inner.assert_not_running("add inventory listener")?;
        self.inner.listeners.add(listener);
        Ok(())
    }

    pub fn remove_inventory_listener(&self, listener: &Arc<dyn InventoryListener<F::Location>>) -> Result<()> {
        self.inner.assert_not_running("remove inventory listener")?;
        self.inner.listeners.remove(listener);
        Ok(())
    }
}

impl<F: SessionFactory> Inner<F> {
    fn assert_running(&self, operation: &'static str) -> Result<()> {
        match *lock(&self.status) {
            ServiceStatus::Running => Ok(()),
            status => Err(ServiceError::IllegalState { operation, status }),
        }
    }

    fn assert_not_running(&self, operation: &'static str) -> Result<()> {
        match *lock(&self.status) {
            ServiceStatus::Initial | ServiceStatus::Stopped => Ok(()),
            status => Err(ServiceError::IllegalState { operation, status }),
        }
    }

    fn sampling(self: &Arc<Self>) -> Arc<dyn SamplingService<F::Location>> {
        Arc::clone(self) as Arc<dyn SamplingService<F::Location>>
    }

    fn is_endpoint_ready(&self) -> bool {
        let wait_for = &self.endpoint.config.wait_for;
        if wait_for.is_empty() {
            return true;
        }
        let session = match self.factory.open_session() {
            Ok(session) => session,
            Err(e) => {
                debug!(endpoint = %self.endpoint.name, error = %e, "Endpoint not reachable");
                return false;
            }
        };
        for wait in wait_for {
            let location = match session.location_resolver().build_location(&wait.resource) {
                Ok(location) => location,
                Err(e) => {
                    warn!(endpoint = %self.endpoint.name, resource = %wait.resource, error = %e, "Invalid wait-for location");
                    return false;
                }
            };
            match session.driver().fetch_nodes(&location) {
                Ok(nodes) if !nodes.is_empty() => {}
                Ok(_) => {
                    debug!(endpoint = %self.endpoint.name, resource = %wait.resource, "Waiting for resource");
                    return false;
                }
                Err(e) => {
                    debug!(endpoint = %self.endpoint.name, resource = %wait.resource, error = %e, "Waiting for resource");
                    return false;
                }
            }
        }
        true
    }

    /// One full scan. Runs on a blocking thread.
    fn run_full_discovery(self: &Arc<Self>) -> ScanSummary<F::Location> {
        let started = Instant::now();
        let endpoint = self.endpoint.name.as_str();
        info!(endpoint, "Full discovery scan started");

        let mut results = DiscoveryResults::new();
        match self.factory.open_session() {
            Ok(session) => self.discovery.discover_all(&session, &mut results),
            Err(source) => results.error(DiscoveryError::Session {
                endpoint: endpoint.to_string(),
                source,
            }),
        }

        let removed = self.resources.remove_all_except(results.discovered_ids());
        let event_fired = results.is_success();
        if event_fired {
            let event = InventoryEvent::discovery(
                self.sampling(),
                &self.resources,
                results.added_or_modified(),
                removed.clone(),
            );
            self.listeners.notify(&event);
        } else {
            warn!(
                endpoint,
                errors = results.errors.len(),
                "Discovery scan had errors; inventory event suppressed"
            );
        }

        let duration = started.elapsed();
        {
            let mut stats = lock(&self.stats);
            stats.scans_completed += 1;
            stats.last_scan_duration = Some(duration);
            stats.last_scan_errors = results.errors.len();
            stats.last_scan_resources = self.resources.len();
        }
        info!(
            endpoint,
            added = results.added.len(),
            modified = results.modified.len(),
            unchanged = results.unchanged.len(),
            removed = removed.len(),
            errors = results.errors.len(),
            duration_ms = duration.as_millis() as u64,
            "Full discovery scan finished"
        );
        self.resources.log_tree_graph(endpoint);

        ScanSummary {
            added: results.added,
            modified: results.modified,
            unchanged: results.unchanged,
            removed,
            errors: results.errors,
            event_fired,
            duration,
        }
    }

    fn expand_label(
        &self,
        template: &str,
        resource: &Resource<F::Location>,
        instance: &MeasurementInstance<F::Location>,
        location: &F::Location,
        resolver: &dyn LocationResolver<F::Location>,
    ) -> String {
        let mtype = &instance.measurement_type;
        let expanded = template
            .replace("%FeedId", &self.options.feed_id)
            .replace("%ManagedServerName", &self.endpoint.name)
            .replace("%ResourceName", &resource.name)
            .replace("%AttributeName", &instance.attribute.attribute)
            .replace("%MetricTypeName", &mtype.name)
            .replace("%MetricTypeUnits", mtype.units.as_deref().unwrap_or(""));
        resolver.apply_template(&expanded, location, &self.endpoint.name)
    }
}

impl<F: SessionFactory> SamplingService<F::Location> for Inner<F> {
    fn feed_id(&self) -> &str {
        &self.options.feed_id
    }

    fn endpoint_name(&self) -> &str {
        &self.endpoint.name
    }

    fn generate_metric_family(&self, instance: &MeasurementInstance<F::Location>) -> String {
        let mtype = &instance.measurement_type;
        mtype.family.clone().unwrap_or_else(|| mtype.name.clone())
    }

    /// Later tiers overwrite earlier ones: endpoint labels, then the metric
    /// type's labels, then the resource type labels of the owning resource
    /// and each ancestor up to the root. The root's labels win. Tokens are
    /// expanded in label names and values.
    fn generate_metric_labels(
        &self,
        resource: &Resource<F::Location>,
        instance: &MeasurementInstance<F::Location>,
    ) -> BTreeMap<String, String> {
        let resolver = self.factory.location_resolver();
        let resolver = resolver.as_ref();
        let metric_location = &instance.attribute.location;
        let mut labels = BTreeMap::new();

        let tiers = [
            &self.endpoint.config.metric_labels,
            &instance.measurement_type.labels,
        ];
        for tier in tiers {
            for (key, value) in tier {
                let key = self.expand_label(key, resource, instance, metric_location, resolver);
                let value = self.expand_label(value, resource, instance, metric_location, resolver);
                labels.insert(key, value);
            }
        }

        let mut apply_type_labels = |owner: &Resource<F::Location>| {
            for (key, value) in &owner.resource_type.metric_labels {
                let key = self.expand_label(key, resource, instance, &owner.location, resolver);
                let value = self.expand_label(value, resource, instance, &owner.location, resolver);
                labels.insert(key, value);
            }
        };
        apply_type_labels(resource);
        let mut ancestor = self.resources.get_parent(resource);
        let mut depth = 0;
        while let Some(current) = ancestor {
            apply_type_labels(&current);
            depth += 1;
            if depth > self.resources.len() {
                break;
            }
            ancestor = self.resources.get_parent(&current);
        }
        labels
    }
}

impl<F: SessionFactory> SamplingService<F::Location> for EndpointService<F> {
    fn feed_id(&self) -> &str {
        self.inner.feed_id()
    }

    fn endpoint_name(&self) -> &str {
        self.inner.endpoint_name()
    }

    fn generate_metric_family(&self, instance: &MeasurementInstance<F::Location>) -> String {
        self.inner.generate_metric_family(instance)
    }

    fn generate_metric_labels(
        &self,
        resource: &Resource<F::Location>,
        instance: &MeasurementInstance<F::Location>,
    ) -> BTreeMap<String, String> {
        self.inner.generate_metric_labels(resource, instance)
    }
}

async fn run_scans<F: SessionFactory>(inner: Arc<Inner<F>>, mut requests: mpsc::Receiver<ScanRequest<F::Location>>) {
    let endpoint = inner.endpoint.name.clone();
    debug!(%endpoint, "Discovery worker started");

    while let Some(request) = requests.recv().await {
        let scan = Arc::clone(&inner);
        match tokio::task::spawn_blocking(move || scan.run_full_discovery()).await {
            Ok(summary) => {
                let _ = request.done.send(summary);
            }
            Err(e) => error!(%endpoint, error = %e, "Discovery scan panicked"),
        }
    }

    debug!(%endpoint, "Discovery worker stopped");
}
