#![allow(dead_code)]

use discovery_framework::driver::AttributeValue;
use discovery_framework::endpoint::{
    EndpointConfig, EndpointService, EndpointServiceOptions, MonitoredEndpoint, ScanSummary, Submission,
};
use discovery_framework::event::{InventoryEvent, InventoryEventKind, InventoryListener};
use discovery_framework::location::AttributeLocation;
use discovery_framework::mock::{MockDriver, MockSessionFactory};
use discovery_framework::model::{MeasurementType, ResourceId, ResourceType, ResourceTypeManager};
use discovery_framework::path::PathLocation;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ENDPOINT: &str = "ep";

pub fn loc(s: &str) -> PathLocation {
    PathLocation::parse(s).unwrap()
}

pub fn text(s: &str) -> AttributeValue {
    AttributeValue::Text(s.to_string())
}

/// `A` at `/a=*` with child type `B` at `b=*`. `B` takes its name from the
/// `name` attribute and carries a `heap` metric.
pub fn server_types() -> Arc<ResourceTypeManager<PathLocation>> {
    let a = ResourceType::new("A", loc("/a=*"))
        .with_name_template("A [%-]")
        .with_metric_label("env", "root");
    let b = ResourceType::new("B", loc("/b=*"))
        .with_parent("A")
        .with_name_attribute("name")
        .with_metric_label("tier", "b-%-")
        .with_measurement(
            MeasurementType::metric("heap", AttributeLocation::new(PathLocation::root(), "heap"))
                .with_family("jvm_heap")
                .with_label("env", "metric"),
        );
    Arc::new(ResourceTypeManager::from_types(vec![a, b]).unwrap())
}

/// One `A` with two `B` children.
pub fn populated_mock() -> MockDriver {
    let mock = MockDriver::new();
    mock.add_node("/a=1", [("state", text("up"))]);
    mock.add_node("/a=1/b=x", [("name", text("Bx")), ("heap", AttributeValue::Int(10))]);
    mock.add_node("/a=1/b=y", [("name", text("By")), ("heap", AttributeValue::Int(20))]);
    mock
}

pub fn fast_options() -> EndpointServiceOptions {
    EndpointServiceOptions {
        feed_id: "feed".to_string(),
        ready_poll_interval: Duration::from_millis(20),
    }
}

pub fn service_with(mock: &MockDriver, config: EndpointConfig) -> EndpointService<MockSessionFactory> {
    service_with_types(mock, config, server_types())
}

pub fn service_with_types(
    mock: &MockDriver,
    config: EndpointConfig,
    types: Arc<ResourceTypeManager<PathLocation>>,
) -> EndpointService<MockSessionFactory> {
    EndpointService::new(
        MonitoredEndpoint::new(ENDPOINT, config),
        fast_options(),
        types,
        mock.session_factory(),
    )
}

pub fn service(mock: &MockDriver) -> EndpointService<MockSessionFactory> {
    service_with(mock, EndpointConfig::default())
}

pub fn rid(type_name: &str, location: &str) -> ResourceId {
    ResourceId::generate("feed", ENDPOINT, &format!("{type_name}~{location}"))
}

/// Requests a full scan and waits for its summary.
pub async fn scan(service: &EndpointService<MockSessionFactory>) -> ScanSummary<PathLocation> {
    match service.discover_all().unwrap() {
        Submission::Queued(handle) => handle.wait().await.unwrap(),
        Submission::Ignored => panic!("scan unexpectedly ignored"),
    }
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

pub fn ids<L>(resources: &[Arc<discovery_framework::model::Resource<L>>]) -> Vec<ResourceId> {
    let mut ids: Vec<ResourceId> = resources.iter().map(|r| r.id.clone()).collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub kind: InventoryEventKind,
    pub added_or_modified: Vec<ResourceId>,
    pub removed: Vec<ResourceId>,
    pub added_or_modified_roots: Vec<ResourceId>,
    pub removed_roots: Vec<ResourceId>,
}

/// Listener that keeps a copy of every event it receives.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl InventoryListener<PathLocation> for Recorder {
    fn received_event(&self, event: &InventoryEvent<PathLocation>) {
        self.events.lock().unwrap().push(RecordedEvent {
            kind: event.kind(),
            added_or_modified: ids(event.added_or_modified()),
            removed: ids(event.removed_resources()),
            added_or_modified_roots: ids(event.added_or_modified_root_resources()),
            removed_roots: ids(event.removed_root_resources()),
        });
    }
}
