use discovery_framework::endpoint::ServiceStatus;
use discovery_framework::SamplingService;
use monitor_agent::config::AgentConfig;
use monitor_agent::lifecycle::MonitorAgent;
use std::path::PathBuf;
use std::time::Duration;

const TYPES: &str = r#"
[[type_sets]]
name = "server"

[[type_sets.types]]
name = "Server"
location = "/server=*"
name_template = "Server [%-]"

[[type_sets.types.avails]]
name = "state"
attribute = "state"

[[type_sets]]
name = "datasources"

[[type_sets.types]]
name = "Datasource"
location = "/datasource=*"
parents = ["Server"]

[[type_sets.types.metrics]]
name = "active"
attribute = "active-count"
family = "datasource_active"
labels = { ds = "%datasource%" }
"#;

fn config(endpoints: &str) -> AgentConfig {
    let text = format!("feed_id = \"test\"\nauto_discovery_scan_period_secs = 0\nready_poll_interval_secs = 1\n{TYPES}\n{endpoints}");
    AgentConfig::parse(&text).unwrap()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn temp_snapshot(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("monitor-agent-{}-{name}.toml", std::process::id()));
    std::fs::write(&path, content).unwrap();
    path
}

#[tokio::test(flavor = "multi_thread")]
async fn test_agent_discovers_inline_endpoint() {
    let agent = MonitorAgent::new(&config(
        r#"
[[endpoints]]
name = "inline"

[[endpoints.nodes]]
path = "/server=one"
attributes = { state = "running" }

[[endpoints.nodes]]
path = "/server=one/datasource=A"
attributes = { active-count = 3 }
"#,
    ))
    .unwrap();
    agent.start().await.unwrap();

    let endpoint = agent.snapshot.endpoint_service("inline").unwrap();
    assert_eq!(endpoint.status(), ServiceStatus::Running);
    eventually(|| agent.listener.discovery_events() == 1).await;
    assert_eq!(endpoint.resource_manager().len(), 2);

    let datasource = endpoint
        .resource_manager()
        .get_resources_breadth_first()
        .into_iter()
        .find(|r| r.resource_type.name == "Datasource")
        .unwrap();
    let active = &datasource.metrics[0];
    assert_eq!(endpoint.generate_metric_family(active), "datasource_active");
    assert_eq!(endpoint.generate_metric_labels(&datasource, active)["ds"], "A");

    agent.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_type_set_selection_and_disabled_endpoints() {
    let agent = MonitorAgent::new(&config(
        r#"
[[endpoints]]
name = "servers-only"
resource_type_sets = ["server"]

[[endpoints.nodes]]
path = "/server=one"

[[endpoints.nodes]]
path = "/server=one/datasource=A"

[[endpoints]]
name = "off"
enabled = false
"#,
    ))
    .unwrap();
    assert!(agent.snapshot.endpoint_service("off").is_none());

    agent.start().await.unwrap();
    let endpoint = agent.snapshot.endpoint_service("servers-only").unwrap();
    eventually(|| endpoint.discovery_stats().scans_completed == 1).await;
    assert_eq!(endpoint.resource_manager().len(), 1);
    assert!(endpoint.resource_type_manager().get_resource_type("Datasource").is_none());

    agent.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_snapshot_file_changes_are_reconciled() {
    let path = temp_snapshot(
        "reconcile",
        r#"
[[nodes]]
path = "/server=one"

[[nodes]]
path = "/server=one/datasource=A"

[[nodes]]
path = "/server=one/datasource=B"
"#,
    );
    let agent = MonitorAgent::new(&config(&format!(
        "[[endpoints]]\nname = \"file\"\nsnapshot = {:?}\n",
        path.display().to_string()
    )))
    .unwrap();
    agent.start().await.unwrap();

    let endpoint = agent.snapshot.endpoint_service("file").unwrap();
    eventually(|| endpoint.discovery_stats().scans_completed == 1).await;
    assert_eq!(endpoint.resource_manager().len(), 3);

    std::fs::write(
        &path,
        r#"
[[nodes]]
path = "/server=one"

[[nodes]]
path = "/server=one/datasource=A"
"#,
    )
    .unwrap();
    agent.discover_all();
    eventually(|| endpoint.discovery_stats().scans_completed == 2).await;
    assert_eq!(endpoint.resource_manager().len(), 2);
    assert_eq!(agent.listener.discovery_events(), 2);

    agent.shutdown().await.unwrap();
    std::fs::remove_file(path).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreadable_snapshot_suppresses_events() {
    let agent = MonitorAgent::new(&config(
        "[[endpoints]]\nname = \"missing\"\nsnapshot = \"/nonexistent/monitor-agent.toml\"\n",
    ))
    .unwrap();
    agent.start().await.unwrap();

    let endpoint = agent.snapshot.endpoint_service("missing").unwrap();
    eventually(|| endpoint.discovery_stats().scans_completed == 1).await;
    assert_eq!(endpoint.discovery_stats().last_scan_errors, 1);
    assert_eq!(agent.listener.discovery_events(), 0);

    agent.shutdown().await.unwrap();
}

#[test]
fn test_unsupported_protocol_is_rejected() {
    let result = MonitorAgent::new(&config("[[endpoints]]\nname = \"jmx\"\nprotocol = \"jmx\"\n"));
    assert!(result.is_err());
}

#[test]
fn test_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/agent.toml");
    let config = AgentConfig::load(path).unwrap();
    assert_eq!(config.endpoints.len(), 2);
    assert_eq!(config.type_sets().unwrap().len(), 3);
}
