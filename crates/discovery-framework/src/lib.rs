//! # Discovery Framework
//!
//! Resource discovery and inventory reconciliation for a monitoring agent.
//! The framework connects to managed endpoints (application servers,
//! exporters, operating systems), walks a configured graph of resource
//! types, and keeps an in-memory resource tree per endpoint in step with
//! what the endpoint reports.
//!
//! ## Architecture Overview
//!
//! The framework separates concerns into four layers:
//!
//! 1. **Protocol Layer** ([`driver`], [`location`]) - Locations, resolvers,
//!    sessions and drivers. Everything protocol-specific lives here.
//! 2. **Model Layer** ([`model`], [`manager`]) - Resource types, resources
//!    and the per-endpoint [`ResourceManager`] that owns the tree.
//! 3. **Engine Layer** ([`discovery`]) - The walk that turns driver nodes
//!    into resources and records added, modified and unchanged outcomes.
//! 4. **Service Layer** ([`endpoint`], [`protocol`]) - Lifecycle, scan
//!    throttling, inventory events and the periodic scheduler.
//!
//! Protocol code implements the traits of the first layer once; the other
//! three layers are generic over the location type and never change.
//!
//! ## Core Abstractions
//!
//! | Type | Role |
//! |------|------|
//! | [`LocationResolver`] | Parses, matches and composes locations |
//! | [`Driver`] | Fetches nodes and attributes from a live endpoint |
//! | [`SessionFactory`] | Opens the sessions a scan runs in |
//! | [`ResourceTypeManager`] | The immutable type graph |
//! | [`ResourceManager`] | The resource tree of one endpoint |
//! | [`EndpointService`] | Owns one endpoint: lifecycle, scans, listeners |
//! | [`ProtocolServices`] | Every protocol plus the auto-discovery schedule |
//!
//! ## Example
//!
//! ```rust
//! use discovery_framework::driver::AttributeValue;
//! use discovery_framework::endpoint::{EndpointConfig, EndpointService, EndpointServiceOptions, MonitoredEndpoint};
//! use discovery_framework::mock::MockDriver;
//! use discovery_framework::model::{ResourceType, ResourceTypeManager};
//! use discovery_framework::path::PathLocation;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockDriver::new();
//!     mock.add_node("/server=one", [("state", AttributeValue::Text("running".into()))]);
//!
//!     let server = ResourceType::new("Server", PathLocation::parse("/server=*").unwrap())
//!         .with_name_template("Server [%-]");
//!     let types = Arc::new(ResourceTypeManager::from_types(vec![server]).unwrap());
//!
//!     let service = EndpointService::new(
//!         MonitoredEndpoint::new("local", EndpointConfig::default()),
//!         EndpointServiceOptions::default(),
//!         types,
//!         mock.session_factory(),
//!     );
//!     service.start().await.unwrap();
//!
//!     let summary = match service.discover_all().unwrap() {
//!         discovery_framework::endpoint::Submission::Queued(handle) => handle.wait().await.unwrap(),
//!         discovery_framework::endpoint::Submission::Ignored => unreachable!(),
//!     };
//!     assert_eq!(summary.added.len(), 1);
//!     assert_eq!(summary.added[0].name, "Server [one]");
//!
//!     service.stop().await.unwrap();
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each endpoint has one discovery worker (a Tokio task) fed by a channel
//!   of capacity one: at most one scan runs and one waits
//! - Scans call synchronous drivers on blocking threads
//! - The resource tree is guarded by a single `RwLock`; every public
//!   operation of [`ResourceManager`] is atomic
//! - Listeners are called synchronously on the thread that produced the event
//!
//! ## Testing
//!
//! The [`mock`] module provides an in-memory [`MockDriver`](mock::MockDriver)
//! addressed with [`PathLocation`](path::PathLocation)s, with error
//! injection and a gate that parks scans mid-flight for concurrency tests.

pub mod discovery;
pub mod driver;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod location;
pub mod manager;
pub mod mock;
pub mod model;
pub mod path;
pub mod protocol;
pub mod sampling;
pub mod tracing;

// Re-export core types for convenience
pub use discovery::{Discovery, DiscoveryResults};
pub use driver::{AttributeValue, Driver, Session, SessionFactory};
pub use endpoint::{EndpointService, ServiceStatus, Submission};
pub use error::{DiscoveryError, InventoryError, ProtocolError, ServiceError};
pub use event::{InventoryEvent, InventoryEventKind, InventoryListener};
pub use location::{AttributeLocation, Location, LocationResolver};
pub use manager::{AddResult, Effect, ResourceManager};
pub use model::{Resource, ResourceId, ResourceType, ResourceTypeManager};
pub use protocol::{ProtocolHandle, ProtocolService, ProtocolServices};
pub use sampling::SamplingService;
