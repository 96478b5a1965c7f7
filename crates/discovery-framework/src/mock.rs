//! # Mock Endpoint & Testing Guide
//!
//! [`MockDriver`] is an in-memory endpoint addressed with
//! [`PathLocation`]s. It implements [`Driver`] and hands out sessions
//! through [`MockSessionFactory`], so endpoint services can be exercised
//! end to end without a live server.
//!
//! ## When to use the Mock vs a Real Protocol
//!
//! | Feature | MockDriver | Real driver |
//! |---------|------------|-------------|
//! | **Speed** | Instant (in-memory) | Network round trips |
//! | **Determinism** | Nodes are exactly what the test added | Depends on server state |
//! | **Error Injection** | `fail_fetch_nodes`, `fail_attribute`, `fail_open_session` | Hard |
//! | **Concurrency Control** | [`MockDriver::hold_scans`] parks scans mid-flight | None |
//!
//! ## Example
//!
//! ```rust
//! use discovery_framework::driver::{AttributeValue, Driver, Session, SessionFactory};
//! use discovery_framework::mock::MockDriver;
//! use discovery_framework::path::PathLocation;
//!
//! let mock = MockDriver::new();
//! mock.add_node("/server=one", [("state", AttributeValue::Text("running".into()))]);
//!
//! let factory = mock.session_factory();
//! let session = factory.open_session().unwrap();
//! let nodes = session
//!     .driver()
//!     .fetch_nodes(&PathLocation::parse("/server=*").unwrap())
//!     .unwrap();
//! assert_eq!(nodes.len(), 1);
//!
//! drop(session);
//! assert_eq!(mock.sessions_closed(), 1);
//! ```

use crate::driver::{AttributeValue, Driver, Session, SessionFactory};
use crate::error::ProtocolError;
use crate::location::{AttributeLocation, LocationResolver};
use crate::path::{PathLocation, PathResolver};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// A node held by the mock endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MockNode {
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    opened: Condvar,
    waiting: AtomicUsize,
}

impl Gate {
    fn pass(&self) {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            while *closed {
                closed = self.opened.wait(closed).unwrap();
            }
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
struct MockState {
    nodes: Mutex<BTreeMap<PathLocation, MockNode>>,
    node_failures: Mutex<HashMap<PathLocation, ProtocolError>>,
    attribute_failures: Mutex<HashMap<(PathLocation, String), ProtocolError>>,
    session_failure: Mutex<Option<ProtocolError>>,
    fetches: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    gate: Gate,
}

/// In-memory endpoint. Clones share state.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

fn path(s: &str) -> PathLocation {
    PathLocation::parse(s).unwrap_or_else(|e| panic!("bad mock location {s}: {e}"))
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a node with the given attributes.
    pub fn add_node<'a>(
        &self,
        location: &str,
        attributes: impl IntoIterator<Item = (&'a str, AttributeValue)>,
    ) -> &Self {
        let node = MockNode {
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        self.state.nodes.lock().unwrap().insert(path(location), node);
        self
    }

    pub fn remove_node(&self, location: &str) -> &Self {
        self.state.nodes.lock().unwrap().remove(&path(location));
        self
    }

    /// Makes `fetch_nodes` fail for exactly this query.
    pub fn fail_fetch_nodes(&self, query: &str, error: ProtocolError) -> &Self {
        self.state.node_failures.lock().unwrap().insert(path(query), error);
        self
    }

    /// Makes reads and existence checks of one attribute fail.
    pub fn fail_attribute(&self, location: &str, attribute: &str, error: ProtocolError) -> &Self {
        self.state
            .attribute_failures
            .lock()
            .unwrap()
            .insert((path(location), attribute.to_string()), error);
        self
    }

    pub fn fail_open_session(&self, error: Option<ProtocolError>) -> &Self {
        *self.state.session_failure.lock().unwrap() = error;
        self
    }

    pub fn clear_failures(&self) -> &Self {
        self.state.node_failures.lock().unwrap().clear();
        self.state.attribute_failures.lock().unwrap().clear();
        *self.state.session_failure.lock().unwrap() = None;
        self
    }

    /// Parks every subsequent `fetch_nodes` call until [`release_scans`](Self::release_scans).
    pub fn hold_scans(&self) {
        *self.state.gate.closed.lock().unwrap() = true;
    }

    pub fn release_scans(&self) {
        *self.state.gate.closed.lock().unwrap() = false;
        self.state.gate.opened.notify_all();
    }

    /// Number of calls currently parked by [`hold_scans`](Self::hold_scans).
    pub fn parked(&self) -> usize {
        self.state.gate.waiting.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn session_factory(&self) -> MockSessionFactory {
        MockSessionFactory {
            driver: self.clone(),
        }
    }

    fn attribute_failure(&self, location: &AttributeLocation<PathLocation>) -> Option<ProtocolError> {
        self.state
            .attribute_failures
            .lock()
            .unwrap()
            .get(&(location.location.clone(), location.attribute.clone()))
            .cloned()
    }
}

impl Driver<PathLocation> for MockDriver {
    type Node = MockNode;

    fn fetch_nodes(&self, query: &PathLocation) -> Result<BTreeMap<PathLocation, MockNode>, ProtocolError> {
        self.state.gate.pass();
        self.state.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.state.node_failures.lock().unwrap().get(query) {
            return Err(error.clone());
        }
        Ok(self
            .state
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|(location, _)| PathResolver.matches(query, location))
            .map(|(location, node)| (location.clone(), node.clone()))
            .collect())
    }

    fn fetch_attribute(
        &self,
        location: &AttributeLocation<PathLocation>,
    ) -> Result<Option<AttributeValue>, ProtocolError> {
        if let Some(error) = self.attribute_failure(location) {
            return Err(error);
        }
        let nodes = self.state.nodes.lock().unwrap();
        let node = nodes
            .get(&location.location)
            .ok_or_else(|| ProtocolError::NotFound(location.location.to_string()))?;
        Ok(node.attributes.get(&location.attribute).cloned())
    }

    fn fetch_attribute_as_map(
        &self,
        location: &AttributeLocation<PathLocation>,
    ) -> Result<BTreeMap<PathLocation, AttributeValue>, ProtocolError> {
        if let Some(error) = self.attribute_failure(location) {
            return Err(error);
        }
        Ok(self
            .state
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| PathResolver.matches(&location.location, l))
            .filter_map(|(l, node)| {
                node.attributes
                    .get(&location.attribute)
                    .map(|v| (l.clone(), v.clone()))
            })
            .collect())
    }

    fn attribute_exists(&self, location: &AttributeLocation<PathLocation>) -> Result<bool, ProtocolError> {
        if let Some(error) = self.attribute_failure(location) {
            return Err(error);
        }
        Ok(self
            .state
            .nodes
            .lock()
            .unwrap()
            .get(&location.location)
            .is_some_and(|node| node.attributes.contains_key(&location.attribute)))
    }
}

pub struct MockSession {
    driver: MockDriver,
}

impl Session<PathLocation> for MockSession {
    type Driver = MockDriver;

    fn driver(&self) -> &MockDriver {
        &self.driver
    }

    fn location_resolver(&self) -> &dyn LocationResolver<PathLocation> {
        &PathResolver
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.driver.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct MockSessionFactory {
    driver: MockDriver,
}

impl SessionFactory for MockSessionFactory {
    type Location = PathLocation;
    type Session = MockSession;

    fn open_session(&self) -> Result<MockSession, ProtocolError> {
        if let Some(error) = self.driver.state.session_failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.driver.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            driver: self.driver.clone(),
        })
    }

    fn location_resolver(&self) -> Arc<dyn LocationResolver<PathLocation>> {
        Arc::new(PathResolver)
    }
}
