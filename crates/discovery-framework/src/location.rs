//! # Locations & Resolvers
//!
//! Every management protocol has its own way of addressing a node: a path of
//! `key=value` pairs, an object name with properties, a file-system path. The
//! discovery core never looks inside a location. It only asks a
//! [`LocationResolver`] questions about it.
//!
//! ## Architecture Note
//!
//! The location type is a generic parameter (`L`) threaded through the whole
//! framework instead of a trait object. The resolver, on the other hand, is
//! used as `&dyn LocationResolver<L>` so a [`Session`](crate::driver::Session)
//! can hand out the one that belongs to its connection without leaking its
//! concrete type into the discovery code.
//!
//! Locations may contain wildcards. A wildcarded location is a *query*; the
//! concrete locations returned by a driver are *matches* of that query.

use crate::error::ProtocolError;
use std::fmt;
use std::hash::Hash;

/// Marker for protocol-specific location types.
///
/// Implemented automatically for anything with the required value semantics.
/// `Ord` gives drivers a deterministic iteration order over fetched nodes.
pub trait Location:
    Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> Location for T where
    T: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// Protocol-specific questions about locations.
pub trait LocationResolver<L: Location>: Send + Sync {
    /// Parses the textual form used in configuration files.
    fn build_location(&self, path: &str) -> Result<L, ProtocolError>;

    /// The location used as the parent of root resource types.
    fn root_location(&self) -> L;

    /// `true` if the concrete `location` is selected by `query`.
    fn matches(&self, query: &L, location: &L) -> bool;

    /// Resolves `child` relative to `parent`. A missing or root parent leaves
    /// `child` as it is.
    fn absolutize(&self, parent: Option<&L>, child: &L) -> L;

    /// `true` if `parent` is a strict ancestor of `child`.
    fn is_parent(&self, parent: &L, child: &L) -> bool;

    /// `true` if the location contains a wildcard.
    fn is_multi_target(&self, location: &L) -> bool;

    /// Returns the value that the first wildcard of `multi_target` took in
    /// `single`.
    fn find_wildcard_match(&self, multi_target: &L, single: &L) -> Result<String, ProtocolError>;

    /// Expands location tokens in `template`.
    fn apply_template(&self, template: &str, location: &L, endpoint_name: &str) -> String;
}

/// Addresses one attribute of the node at `location`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeLocation<L> {
    pub location: L,
    pub attribute: String,
}

impl<L: Location> AttributeLocation<L> {
    pub fn new(location: L, attribute: impl Into<String>) -> Self {
        Self {
            location,
            attribute: attribute.into(),
        }
    }

    /// Re-anchors a type-relative attribute location onto a concrete
    /// resource location.
    pub fn rebase(&self, resolver: &dyn LocationResolver<L>, base: &L) -> Self {
        Self {
            location: resolver.absolutize(Some(base), &self.location),
            attribute: self.attribute.clone(),
        }
    }
}

impl<L: fmt::Display> fmt::Display for AttributeLocation<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.location, self.attribute)
    }
}
