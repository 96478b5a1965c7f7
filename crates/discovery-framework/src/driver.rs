//! # Drivers & Sessions
//!
//! A [`Driver`] is the only place that talks to a live endpoint. It answers
//! four questions: which nodes match a location, what is the value of an
//! attribute, what are the values of an attribute across a wildcarded
//! location, and does an attribute exist.
//!
//! A [`Session`] bundles a live connection with its driver and location
//! resolver. Sessions are scoped: whoever opens one owns it, and the
//! connection is released when the session is dropped. A
//! [`SessionFactory`] is how an endpoint service opens them.
//!
//! # Architecture Note
//! Drivers are synchronous. A discovery scan walks the whole type hierarchy
//! with many small round trips; running it on a blocking worker thread keeps
//! the recursive walk simple and keeps blocking I/O off the async runtime.

use crate::error::ProtocolError;
use crate::location::{AttributeLocation, Location, LocationResolver};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A value read from an endpoint attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("null"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(v) => write!(f, "{v}"),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Protocol-specific fetch operations.
pub trait Driver<L: Location>: Send + Sync {
    /// The protocol's native representation of a node.
    type Node: Clone + fmt::Debug + Send + Sync;

    /// Lists every node matching `query`, keyed by concrete location.
    fn fetch_nodes(&self, query: &L) -> Result<BTreeMap<L, Self::Node>, ProtocolError>;

    /// Reads one attribute. `None` if the node has no such attribute.
    fn fetch_attribute(
        &self,
        location: &AttributeLocation<L>,
    ) -> Result<Option<AttributeValue>, ProtocolError>;

    /// Reads the attribute from every node matching a possibly wildcarded
    /// location.
    fn fetch_attribute_as_map(
        &self,
        location: &AttributeLocation<L>,
    ) -> Result<BTreeMap<L, AttributeValue>, ProtocolError>;

    fn attribute_exists(&self, location: &AttributeLocation<L>) -> Result<bool, ProtocolError>;
}

/// A live connection to one endpoint. Released on drop.
pub trait Session<L: Location>: Send {
    type Driver: Driver<L>;

    fn driver(&self) -> &Self::Driver;

    fn location_resolver(&self) -> &dyn LocationResolver<L>;
}

/// Opens sessions against one endpoint.
pub trait SessionFactory: Send + Sync + 'static {
    type Location: Location;
    type Session: Session<Self::Location>;

    fn open_session(&self) -> Result<Self::Session, ProtocolError>;

    /// Resolver usable without a live connection (label generation, command
    /// input parsing).
    fn location_resolver(&self) -> Arc<dyn LocationResolver<Self::Location>>;
}
