//! # Framework Errors
//!
//! This module defines the error types used throughout the discovery framework.
//! Failures talking to an endpoint are [`ProtocolError`]s. Inconsistent
//! inventory input is an [`InventoryError`]. Calling a service the wrong way
//! (wrong lifecycle state, bad argument) is a [`ServiceError`].
//!
//! A single failed node during a scan is recorded as a [`DiscoveryError`] in
//! the scan results rather than returned, so that siblings keep going.

use crate::endpoint::ServiceStatus;

/// Failure while fetching data from a live endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Malformed response for {location}: {message}")]
    Malformed { location: String, message: String },
    #[error("Node not found: {0}")]
    NotFound(String),
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    #[error("{0}")]
    NoWildcard(String),
    #[error("{0}")]
    Other(String),
}

/// Inconsistent input to the resource or resource type managers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("Parent {parent} of resource {child} is not in inventory")]
    UnknownParent { parent: String, child: String },
    #[error("Resource type [{0}] is defined more than once")]
    DuplicateResourceType(String),
    #[error("Unknown resource type [{0}]")]
    UnknownResourceType(String),
    #[error("Cannot parse invalid resource ID: {0}")]
    InvalidResourceId(String),
}

/// Errors returned to callers of the endpoint and protocol services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Cannot {operation} while service is {status}")]
    IllegalState {
        operation: &'static str,
        status: ServiceStatus,
    },
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("Background task failed: {0}")]
    Task(String),
}

/// One failed branch or node of a discovery scan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Cannot open session to [{endpoint}]: {source}")]
    Session {
        endpoint: String,
        #[source]
        source: ProtocolError,
    },
    #[error("Failed to fetch [{type_name}] nodes for {query}: {source}")]
    FetchNodes {
        type_name: String,
        query: String,
        #[source]
        source: ProtocolError,
    },
    #[error("Failed to build [{type_name}] resource at {location}: {source}")]
    BuildResource {
        type_name: String,
        location: String,
        #[source]
        source: ProtocolError,
    },
    #[error("Failed to store [{type_name}] resource at {location}: {source}")]
    Store {
        type_name: String,
        location: String,
        #[source]
        source: InventoryError,
    },
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
