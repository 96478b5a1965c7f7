//! # Snapshot Protocol
//!
//! A read-only protocol over a tree of nodes described in TOML. Each node is
//! a [`PathLocation`] with a table of attributes:
//!
//! ```toml
//! [[nodes]]
//! path = "/server=one"
//! attributes = { state = "running", uptime = 120 }
//!
//! [[nodes]]
//! path = "/server=one/datasource=ExampleDS"
//! attributes = { jndi-name = "java:/ExampleDS" }
//! ```
//!
//! Nodes come either inline from the endpoint configuration or from a
//! snapshot file. A file is re-read every time a session opens, so editing
//! it between scans shows up as added, modified and removed resources.
//!
//! # Architecture Note
//! A session captures one immutable copy of the node tree. Every fetch of a
//! scan therefore sees the same state even if the file changes mid-scan.

use crate::config::NodeConfig;
use discovery_framework::driver::{AttributeValue, Driver, Session, SessionFactory};
use discovery_framework::error::ProtocolError;
use discovery_framework::location::{AttributeLocation, LocationResolver};
use discovery_framework::path::{PathLocation, PathResolver};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    nodes: Vec<NodeConfig>,
}

/// Converts a TOML value into an attribute value. Tables and datetimes are
/// kept as their TOML text.
pub fn attribute_value(value: &toml::Value) -> AttributeValue {
    match value {
        toml::Value::String(s) => AttributeValue::Text(s.clone()),
        toml::Value::Integer(i) => AttributeValue::Int(*i),
        toml::Value::Float(f) => AttributeValue::Float(*f),
        toml::Value::Boolean(b) => AttributeValue::Bool(*b),
        toml::Value::Array(items) => AttributeValue::List(items.iter().map(attribute_value).collect()),
        other => AttributeValue::Text(other.to_string()),
    }
}

fn build_tree(nodes: &[NodeConfig]) -> Result<BTreeMap<PathLocation, Attributes>, ProtocolError> {
    nodes
        .iter()
        .map(|node| {
            let location = PathLocation::parse(&node.path)?;
            let attributes = node
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), attribute_value(v)))
                .collect();
            Ok((location, attributes))
        })
        .collect()
}

#[derive(Clone, Debug)]
enum Source {
    Inline(Arc<BTreeMap<PathLocation, Attributes>>),
    File(PathBuf),
}

/// Driver over one captured node tree.
#[derive(Clone, Debug)]
pub struct SnapshotDriver {
    nodes: Arc<BTreeMap<PathLocation, Attributes>>,
}

impl SnapshotDriver {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, location: &PathLocation) -> Result<&Attributes, ProtocolError> {
        self.nodes
            .get(location)
            .ok_or_else(|| ProtocolError::NotFound(location.to_string()))
    }
}

impl Driver<PathLocation> for SnapshotDriver {
    type Node = Attributes;

    fn fetch_nodes(&self, query: &PathLocation) -> Result<BTreeMap<PathLocation, Attributes>, ProtocolError> {
        Ok(self
            .nodes
            .iter()
            .filter(|(location, _)| PathResolver.matches(query, location))
            .map(|(location, attributes)| (location.clone(), attributes.clone()))
            .collect())
    }

    fn fetch_attribute(&self, location: &AttributeLocation<PathLocation>) -> Result<Option<AttributeValue>, ProtocolError> {
        Ok(self.node(&location.location)?.get(&location.attribute).cloned())
    }

    fn fetch_attribute_as_map(
        &self,
        location: &AttributeLocation<PathLocation>,
    ) -> Result<BTreeMap<PathLocation, AttributeValue>, ProtocolError> {
        Ok(self
            .nodes
            .iter()
            .filter(|(l, _)| PathResolver.matches(&location.location, l))
            .filter_map(|(l, attributes)| attributes.get(&location.attribute).map(|v| (l.clone(), v.clone())))
            .collect())
    }

    fn attribute_exists(&self, location: &AttributeLocation<PathLocation>) -> Result<bool, ProtocolError> {
        Ok(self
            .nodes
            .get(&location.location)
            .is_some_and(|attributes| attributes.contains_key(&location.attribute)))
    }
}

pub struct SnapshotSession {
    driver: SnapshotDriver,
}

impl Session<PathLocation> for SnapshotSession {
    type Driver = SnapshotDriver;

    fn driver(&self) -> &SnapshotDriver {
        &self.driver
    }

    fn location_resolver(&self) -> &dyn LocationResolver<PathLocation> {
        &PathResolver
    }
}

#[derive(Clone, Debug)]
pub struct SnapshotSessionFactory {
    source: Source,
}

impl SnapshotSessionFactory {
    pub fn inline(nodes: &[NodeConfig]) -> Result<Self, ProtocolError> {
        Ok(Self {
            source: Source::Inline(Arc::new(build_tree(nodes)?)),
        })
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    fn load(&self) -> Result<Arc<BTreeMap<PathLocation, Attributes>>, ProtocolError> {
        match &self.source {
            Source::Inline(nodes) => Ok(Arc::clone(nodes)),
            Source::File(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ProtocolError::Connection(format!("{}: {e}", path.display())))?;
                let file: SnapshotFile = toml::from_str(&content).map_err(|e| ProtocolError::Malformed {
                    location: path.display().to_string(),
                    message: e.to_string(),
                })?;
                let nodes = build_tree(&file.nodes)?;
                debug!(file = %path.display(), nodes = nodes.len(), "Loaded snapshot");
                Ok(Arc::new(nodes))
            }
        }
    }
}

impl SessionFactory for SnapshotSessionFactory {
    type Location = PathLocation;
    type Session = SnapshotSession;

    fn open_session(&self) -> Result<SnapshotSession, ProtocolError> {
        Ok(SnapshotSession {
            driver: SnapshotDriver { nodes: self.load()? },
        })
    }

    fn location_resolver(&self) -> Arc<dyn LocationResolver<PathLocation>> {
        Arc::new(PathResolver)
    }
}
