//! Agent configuration, loaded from TOML.
//!
//! ```toml
//! feed_id = "host-1"
//! auto_discovery_scan_period_secs = 600
//!
//! [[type_sets]]
//! name = "server"
//!
//! [[type_sets.types]]
//! name = "Server"
//! location = "/server=*"
//! name_template = "Server [%-]"
//!
//! [[endpoints]]
//! name = "local"
//! snapshot = "config/local-snapshot.toml"
//! wait_for = [{ resource = "/server=*" }]
//! ```

use anyhow::{bail, Context};
use discovery_framework::endpoint::{EndpointConfig, EndpointServiceOptions, DEFAULT_READY_POLL_INTERVAL};
use discovery_framework::location::AttributeLocation;
use discovery_framework::model::{MeasurementKind, MeasurementType, Operation, ResourceType, TypeSet};
use discovery_framework::path::PathLocation;
use discovery_framework::protocol::DEFAULT_AUTO_DISCOVERY_SCAN_PERIOD;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const SNAPSHOT_PROTOCOL: &str = "snapshot";

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_feed_id")]
    pub feed_id: String,
    /// Zero disables periodic scans; one scan still runs at start-up.
    #[serde(default = "default_scan_period")]
    pub auto_discovery_scan_period_secs: u64,
    #[serde(default = "default_ready_poll_interval")]
    pub ready_poll_interval_secs: u64,
    #[serde(default)]
    pub type_sets: Vec<TypeSetConfig>,
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

fn default_feed_id() -> String {
    "local".to_string()
}

fn default_scan_period() -> u64 {
    DEFAULT_AUTO_DISCOVERY_SCAN_PERIOD.as_secs()
}

fn default_ready_poll_interval() -> u64 {
    DEFAULT_READY_POLL_INTERVAL.as_secs()
}

fn default_true() -> bool {
    true
}

fn default_protocol() -> String {
    SNAPSHOT_PROTOCOL.to_string()
}

fn default_path() -> String {
    "/".to_string()
}

#[derive(Debug, Deserialize)]
pub struct TypeSetConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub types: Vec<ResourceTypeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceTypeConfig {
    pub name: String,
    /// Relative to each parent resource.
    pub location: String,
    pub name_template: Option<String>,
    pub name_attribute: Option<String>,
    pub id_template: Option<String>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MeasurementConfig>,
    #[serde(default)]
    pub avails: Vec<MeasurementConfig>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
    #[serde(default)]
    pub config_properties: Vec<ConfigPropertyConfig>,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct MeasurementConfig {
    pub name: String,
    pub attribute: String,
    /// Node holding the attribute, relative to the resource.
    #[serde(default = "default_path")]
    pub path: String,
    pub units: Option<String>,
    pub family: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct OperationConfig {
    pub name: String,
    pub internal_name: Option<String>,
    #[serde(default)]
    pub modifies: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConfigPropertyConfig {
    pub name: String,
    pub attribute: String,
    #[serde(default = "default_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct EndpointEntry {
    pub name: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(flatten)]
    pub config: EndpointConfig,
    /// Snapshot file re-read at every session.
    pub snapshot: Option<String>,
    /// Inline nodes, used when no snapshot file is given.
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub path: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, toml::Value>,
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn auto_discovery_period(&self) -> Duration {
        Duration::from_secs(self.auto_discovery_scan_period_secs)
    }

    pub fn endpoint_options(&self) -> EndpointServiceOptions {
        EndpointServiceOptions {
            feed_id: self.feed_id.clone(),
            ready_poll_interval: Duration::from_secs(self.ready_poll_interval_secs),
        }
    }

    /// Every configured type set, disabled ones included.
    pub fn type_sets(&self) -> anyhow::Result<Vec<TypeSet<PathLocation>>> {
        self.type_sets.iter().map(TypeSetConfig::build).collect()
    }
}

impl TypeSetConfig {
    fn build(&self) -> anyhow::Result<TypeSet<PathLocation>> {
        let types = self
            .types
            .iter()
            .map(|t| t.build().with_context(|| format!("type set [{}], type [{}]", self.name, t.name)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let set = TypeSet::new(&self.name, types);
        Ok(if self.enabled { set } else { set.disabled() })
    }
}

impl ResourceTypeConfig {
    fn build(&self) -> anyhow::Result<ResourceType<PathLocation>> {
        if self.name.trim().is_empty() {
            bail!("resource type name must not be empty");
        }
        let mut rtype = ResourceType::new(&self.name, PathLocation::parse(&self.location)?);
        if let Some(template) = &self.name_template {
            rtype = rtype.with_name_template(template);
        }
        if let Some(attribute) = &self.name_attribute {
            rtype = rtype.with_name_attribute(attribute);
        }
        if let Some(template) = &self.id_template {
            rtype = rtype.with_id_template(template);
        }
        for parent in &self.parents {
            rtype = rtype.with_parent(parent);
        }
        for metric in &self.metrics {
            rtype = rtype.with_measurement(metric.build(MeasurementKind::Metric)?);
        }
        for avail in &self.avails {
            rtype = rtype.with_measurement(avail.build(MeasurementKind::Avail)?);
        }
        for operation in &self.operations {
            let mut op = Operation::new(&operation.name);
            if let Some(internal) = &operation.internal_name {
                op.internal_name = internal.clone();
            }
            op.modifies = operation.modifies;
            rtype = rtype.with_operation(op);
        }
        for property in &self.config_properties {
            let attribute = AttributeLocation::new(PathLocation::parse(&property.path)?, &property.attribute);
            rtype = rtype.with_config_property(&property.name, attribute);
        }
        for (key, value) in &self.metric_labels {
            rtype = rtype.with_metric_label(key, value);
        }
        Ok(rtype)
    }
}

impl MeasurementConfig {
    fn build(&self, kind: MeasurementKind) -> anyhow::Result<MeasurementType<PathLocation>> {
        let attribute = AttributeLocation::new(
            PathLocation::parse(&self.path).with_context(|| format!("measurement [{}]", self.name))?,
            &self.attribute,
        );
        let mut mtype = match kind {
            MeasurementKind::Metric => MeasurementType::metric(&self.name, attribute),
            MeasurementKind::Avail => MeasurementType::avail(&self.name, attribute),
        };
        if let Some(units) = &self.units {
            mtype = mtype.with_units(units);
        }
        if let Some(family) = &self.family {
            mtype = mtype.with_family(family);
        }
        for (key, value) in &self.labels {
            mtype = mtype.with_label(key, value);
        }
        Ok(mtype)
    }
}
