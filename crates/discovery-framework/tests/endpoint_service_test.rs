mod common;

use common::*;
use discovery_framework::driver::{AttributeValue, SessionFactory};
use discovery_framework::endpoint::{EndpointConfig, ServiceStatus, Submission, WaitFor};
use discovery_framework::error::{DiscoveryError, ProtocolError, ServiceError};
use discovery_framework::event::{InventoryEventKind, InventoryListener};
use discovery_framework::location::AttributeLocation;
use discovery_framework::mock::MockDriver;
use discovery_framework::model::{MeasurementType, ResourceType, ResourceTypeManager};
use discovery_framework::path::PathLocation;
use discovery_framework::SamplingService;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn test_full_scan_builds_tree() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();
    assert_eq!(service.status(), ServiceStatus::Running);

    let summary = scan(&service).await;
    assert!(summary.errors.is_empty(), "{:?}", summary.errors);
    assert!(summary.event_fired);
    assert_eq!(summary.added.len(), 3);
    assert!(summary.modified.is_empty());
    assert!(summary.removed.is_empty());

    // Depth-first: the parent is stored before its children.
    assert_eq!(summary.added[0].id, rid("A", "/a=1"));
    assert_eq!(summary.added[0].name, "A [1]");

    let resources = service.resource_manager();
    let b = resources.get_resource(&rid("B", "/a=1/b=x")).unwrap();
    assert_eq!(b.name, "Bx");
    assert_eq!(b.parent_id, Some(rid("A", "/a=1")));
    assert_eq!(b.metrics.len(), 1);
    assert_eq!(resources.get_children(&rid("A", "/a=1")).len(), 2);

    // Sessions opened for the scan are released.
    assert_eq!(mock.sessions_opened(), mock.sessions_closed());

    service.stop().await.unwrap();
    assert_eq!(service.status(), ServiceStatus::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rescan_reports_unchanged_and_modified() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();
    scan(&service).await;

    let second = scan(&service).await;
    assert!(second.added.is_empty());
    assert!(second.modified.is_empty());
    assert!(second.removed.is_empty());
    assert_eq!(second.unchanged.len(), 3);

    mock.add_node("/a=1/b=y", [("name", text("Renamed")), ("heap", AttributeValue::Int(20))]);
    let third = scan(&service).await;
    assert_eq!(ids(&third.modified), vec![rid("B", "/a=1/b=y")]);
    assert_eq!(third.unchanged.len(), 2);
    assert_eq!(
        service.resource_manager().get_resource(&rid("B", "/a=1/b=y")).unwrap().name,
        "Renamed"
    );

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_vanished_node_is_removed_and_reported() {
    let mock = populated_mock();
    let service = service(&mock);
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();
    scan(&service).await;

    mock.remove_node("/a=1/b=y");
    let summary = scan(&service).await;
    assert_eq!(ids(&summary.removed), vec![rid("B", "/a=1/b=y")]);
    assert!(service.resource_manager().get_resource(&rid("B", "/a=1/b=y")).is_none());

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    let last = &events[1];
    assert_eq!(last.kind, InventoryEventKind::Discovery);
    assert!(last.added_or_modified.is_empty());
    assert_eq!(last.removed, vec![rid("B", "/a=1/b=y")]);
    // The surviving parent's root counts as modified.
    assert_eq!(last.added_or_modified_roots, vec![rid("A", "/a=1")]);
    assert!(last.removed_roots.is_empty());

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_removed_root_takes_descendants() {
    let mock = populated_mock();
    let service = service(&mock);
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();
    scan(&service).await;

    mock.remove_node("/a=1");
    mock.remove_node("/a=1/b=x");
    mock.remove_node("/a=1/b=y");
    let summary = scan(&service).await;
    assert_eq!(summary.removed.len(), 3);
    assert!(service.resource_manager().is_empty());

    let last = recorder.events().pop().unwrap();
    assert_eq!(last.removed_roots, vec![rid("A", "/a=1")]);
    assert!(last.added_or_modified_roots.is_empty());

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_errors_suppress_event() {
    let mock = populated_mock();
    mock.fail_fetch_nodes("/a=1/b=*", ProtocolError::Connection("refused".into()));
    let service = service(&mock);
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();

    let summary = scan(&service).await;
    assert!(!summary.event_fired);
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(summary.errors[0], DiscoveryError::FetchNodes { .. }));
    // The part of the tree that could be read is still stored.
    assert_eq!(ids(&summary.added), vec![rid("A", "/a=1")]);
    assert_eq!(recorder.count(), 0);
    assert_eq!(service.discovery_stats().last_scan_errors, 1);

    mock.clear_failures();
    let summary = scan(&service).await;
    assert!(summary.event_fired);
    assert_eq!(summary.added.len(), 2);
    assert_eq!(recorder.count(), 1);

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_session_failure_is_a_scan_error() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();

    mock.fail_open_session(Some(ProtocolError::Connection("down".into())));
    let summary = scan(&service).await;
    assert!(!summary.event_fired);
    assert!(matches!(summary.errors[0], DiscoveryError::Session { .. }));

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_node_does_not_stop_siblings() {
    let mock = populated_mock();
    mock.fail_attribute("/a=1/b=x", "name", ProtocolError::Other("boom".into()));
    let service = service(&mock);
    service.start().await.unwrap();

    let summary = scan(&service).await;
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(summary.errors[0], DiscoveryError::BuildResource { .. }));
    assert_eq!(ids(&summary.added), vec![rid("A", "/a=1"), rid("B", "/a=1/b=y")]);

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_requests_are_throttled() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();

    mock.hold_scans();
    let first = service.discover_all().unwrap();
    assert!(first.is_queued());
    eventually(|| mock.parked() > 0).await;

    let second = service.discover_all().unwrap();
    let third = service.discover_all().unwrap();
    assert!(second.is_queued());
    assert!(matches!(third, Submission::Ignored));

    mock.release_scans();
    for submission in [first, second] {
        if let Submission::Queued(handle) = submission {
            handle.wait().await.unwrap();
        }
    }

    let stats = service.discovery_stats();
    assert_eq!(stats.scans_completed, 2);
    assert_eq!(stats.scans_dropped, 1);
    assert_eq!(stats.last_scan_resources, 3);

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_lets_running_scan_finish() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();

    mock.hold_scans();
    let submission = service.discover_all().unwrap();
    eventually(|| mock.parked() > 0).await;

    let stopper = {
        let service = service.clone();
        tokio::spawn(async move { service.stop().await })
    };
    eventually(|| service.status() == ServiceStatus::Stopping).await;
    assert!(matches!(
        service.discover_all(),
        Err(ServiceError::IllegalState { status: ServiceStatus::Stopping, .. })
    ));

    mock.release_scans();
    stopper.await.unwrap().unwrap();
    assert_eq!(service.status(), ServiceStatus::Stopped);
    if let Submission::Queued(handle) = submission {
        assert_eq!(handle.wait().await.unwrap().added.len(), 3);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_waits_for_endpoint() {
    let mock = MockDriver::new();
    let config = EndpointConfig {
        wait_for: vec![WaitFor {
            resource: "/a=*".to_string(),
        }],
        ..EndpointConfig::default()
    };
    let service = service_with(&mock, config);
    assert!(!service.is_endpoint_ready());

    let starter = {
        let service = service.clone();
        tokio::spawn(async move { service.start().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.status(), ServiceStatus::Starting);
    assert!(!starter.is_finished());

    mock.add_node("/a=1", [("state", text("up"))]);
    tokio::time::timeout(Duration::from_secs(5), starter)
        .await
        .expect("start did not finish")
        .unwrap()
        .unwrap();
    assert_eq!(service.status(), ServiceStatus::Running);
    assert!(service.is_endpoint_ready());

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_interrupts_start() {
    let mock = MockDriver::new();
    let config = EndpointConfig {
        wait_for: vec![WaitFor {
            resource: "/never=*".to_string(),
        }],
        ..EndpointConfig::default()
    };
    let service = service_with(&mock, config);

    let starter = {
        let service = service.clone();
        tokio::spawn(async move { service.start().await })
    };
    eventually(|| service.status() == ServiceStatus::Starting).await;

    service.stop().await.unwrap();
    assert_eq!(service.status(), ServiceStatus::Stopped);
    tokio::time::timeout(Duration::from_secs(5), starter)
        .await
        .expect("start was not interrupted")
        .unwrap()
        .unwrap();
    assert_eq!(service.status(), ServiceStatus::Stopped);

    // A stopped service can be started again.
    mock.add_node("/never=1", [("state", text("up"))]);
    service.start().await.unwrap();
    assert_eq!(service.status(), ServiceStatus::Running);
    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lifecycle_guards() {
    let mock = populated_mock();
    let service = service(&mock);

    assert!(matches!(
        service.discover_all(),
        Err(ServiceError::IllegalState { status: ServiceStatus::Initial, .. })
    ));
    assert!(matches!(
        service.remove_resources(&loc("/a=1")),
        Err(ServiceError::IllegalState { .. })
    ));
    assert!(matches!(service.stop().await, Err(ServiceError::IllegalState { .. })));

    service.start().await.unwrap();
    assert!(matches!(service.start().await, Err(ServiceError::IllegalState { .. })));

    let recorder = Recorder::new() as Arc<dyn InventoryListener<PathLocation>>;
    assert!(matches!(
        service.add_inventory_listener(recorder.clone()),
        Err(ServiceError::IllegalState { status: ServiceStatus::Running, .. })
    ));
    assert!(service.remove_inventory_listener(&recorder).is_err());

    service.stop().await.unwrap();
    service.add_inventory_listener(recorder.clone()).unwrap();
    service.remove_inventory_listener(&recorder).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_resources_fires_removed_event() {
    let mock = populated_mock();
    let service = service(&mock);
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();
    scan(&service).await;

    let removed = service.remove_resources(&loc("/a=1/b=*")).unwrap();
    assert_eq!(ids(&removed), vec![rid("B", "/a=1/b=x"), rid("B", "/a=1/b=y")]);
    assert_eq!(service.resource_manager().len(), 1);

    let last = recorder.events().pop().unwrap();
    assert_eq!(last.kind, InventoryEventKind::Removed);
    assert_eq!(last.removed.len(), 2);

    // Nothing matched: no event.
    let before = recorder.count();
    assert!(service.remove_resources(&loc("/a=9")).unwrap().is_empty());
    assert_eq!(recorder.count(), before);

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discover_children_with_callers_session() {
    let mock = populated_mock();
    let service = service(&mock);
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();
    scan(&service).await;

    mock.add_node("/a=1/b=z", [("name", text("Bz"))]);
    let session = service.session_factory().open_session().unwrap();
    let closed_before = mock.sessions_closed();

    let results = service.discover_children(&loc("/a=1"), "B", Some(&session)).unwrap();
    assert_eq!(ids(&results.added), vec![rid("B", "/a=1/b=z")]);
    assert_eq!(results.unchanged.len(), 2);
    assert_eq!(mock.sessions_closed(), closed_before);
    drop(session);
    assert_eq!(mock.sessions_closed(), closed_before + 1);

    let last = recorder.events().pop().unwrap();
    assert_eq!(last.kind, InventoryEventKind::Discovery);
    assert_eq!(last.added_or_modified, vec![rid("B", "/a=1/b=z")]);

    // Nothing new: no event.
    let before = recorder.count();
    service.discover_children(&loc("/a=1"), "B", None).unwrap();
    assert_eq!(recorder.count(), before);

    assert!(matches!(
        service.discover_children(&loc("/a=1"), "Missing", None),
        Err(ServiceError::Inventory(_))
    ));

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discover_children_at_root() {
    let mock = populated_mock();
    let service = service(&mock);
    service.start().await.unwrap();

    let results = service.discover_children(&PathLocation::root(), "A", None).unwrap();
    assert!(results.is_success());
    assert_eq!(results.added.len(), 3);
    assert_eq!(mock.sessions_opened(), mock.sessions_closed());

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_metric_labels_and_family() {
    let mock = populated_mock();
    let mut config = EndpointConfig::default();
    config.metric_labels.insert("env".to_string(), "endpoint".to_string());
    config.metric_labels.insert("server".to_string(), "%ManagedServerName".to_string());
    config.metric_labels.insert("feed".to_string(), "%FeedId".to_string());
    let service = service_with(&mock, config);
    service.start().await.unwrap();
    scan(&service).await;

    let b = service.resource_manager().get_resource(&rid("B", "/a=1/b=x")).unwrap();
    let heap = &b.metrics[0];
    assert_eq!(service.generate_metric_family(heap), "jvm_heap");

    let labels = service.generate_metric_labels(&b, heap);
    // Endpoint, then metric, then the resource's own type, then ancestors.
    assert_eq!(labels["env"], "root");
    assert_eq!(labels["tier"], "b-x");
    assert_eq!(labels["server"], ENDPOINT);
    assert_eq!(labels["feed"], "feed");

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_abandoned_start_leaves_service_stopped() {
    let mock = MockDriver::new();
    let config = EndpointConfig {
        wait_for: vec![WaitFor {
            resource: "/never=*".to_string(),
        }],
        ..EndpointConfig::default()
    };
    let service = service_with(&mock, config);

    let abandoned = tokio::time::timeout(Duration::from_millis(100), service.start()).await;
    assert!(abandoned.is_err());
    assert_eq!(service.status(), ServiceStatus::Stopped);
    assert!(matches!(service.stop().await, Err(ServiceError::IllegalState { .. })));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_moved_resource_keeps_id_and_is_modified() {
    let mock = MockDriver::new();
    mock.add_node("/a=1", [("state", text("up"))]);
    mock.add_node("/a=1/b=x", [("name", text("Bx"))]);
    let types = ResourceTypeManager::from_types(vec![
        ResourceType::new("A", loc("/a=*")),
        ResourceType::new("B", loc("/b=*")).with_parent("A").with_id_template("%-"),
    ])
    .unwrap();
    let service = service_with_types(&mock, EndpointConfig::default(), Arc::new(types));
    let recorder = Recorder::new();
    service
        .add_inventory_listener(recorder.clone() as Arc<dyn InventoryListener<PathLocation>>)
        .unwrap();
    service.start().await.unwrap();

    let first = scan(&service).await;
    assert_eq!(first.added.len(), 2);
    let b_id = rid("B", "x");
    assert_eq!(first.added[1].id, b_id);

    mock.remove_node("/a=1/b=x").remove_node("/a=1");
    mock.add_node("/a=2", [("state", text("up"))]);
    mock.add_node("/a=2/b=x", [("name", text("Bx"))]);

    let second = scan(&service).await;
    assert!(second.errors.is_empty(), "{:?}", second.errors);
    assert_eq!(ids(&second.modified), vec![b_id.clone()]);
    assert_eq!(ids(&second.added), vec![rid("A", "/a=2")]);
    assert_eq!(ids(&second.removed), vec![rid("A", "/a=1")]);

    let resources = service.resource_manager();
    assert_eq!(resources.len(), 2);
    let moved = resources.get_resource(&b_id).unwrap();
    assert_eq!(moved.location, loc("/a=2/b=x"));
    assert_eq!(moved.parent_id, Some(rid("A", "/a=2")));

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(!events[1].removed.contains(&b_id));
    assert_eq!(events[1].removed_roots, vec![rid("A", "/a=1")]);

    service.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_grandparent_label_beats_nearer_ancestors() {
    let mock = MockDriver::new();
    mock.add_node("/a=1", [("state", text("up"))]);
    mock.add_node("/a=1/b=m", [("state", text("up"))]);
    mock.add_node("/a=1/b=m/c=z", [("load", AttributeValue::Int(7))]);
    let types = ResourceTypeManager::from_types(vec![
        ResourceType::new("A", loc("/a=*")).with_metric_label("env", "root"),
        ResourceType::new("B", loc("/b=*"))
            .with_parent("A")
            .with_metric_label("env", "mid"),
        ResourceType::new("C", loc("/c=*"))
            .with_parent("B")
            .with_metric_label("c_%-", "yes")
            .with_measurement(
                MeasurementType::metric("load", AttributeLocation::new(PathLocation::root(), "load"))
                    .with_label("env", "metric"),
            ),
    ])
    .unwrap();
    let mut config = EndpointConfig::default();
    config.metric_labels.insert("env".to_string(), "default".to_string());
    config.metric_labels.insert("%ManagedServerName_host".to_string(), "h".to_string());
    let service = service_with_types(&mock, config, Arc::new(types));
    service.start().await.unwrap();
    scan(&service).await;

    let c = service
        .resource_manager()
        .get_resource(&rid("C", "/a=1/b=m/c=z"))
        .unwrap();
    let labels = service.generate_metric_labels(&c, &c.metrics[0]);
    assert_eq!(labels["env"], "root");
    // Label names are expanded like values.
    assert_eq!(labels["c_z"], "yes");
    assert_eq!(labels[&format!("{ENDPOINT}_host")], "h");
    assert!(!labels.keys().any(|key| key.contains('%')));

    service.stop().await.unwrap();
}
