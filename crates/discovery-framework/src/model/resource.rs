//! Discovered resource instances.
//!
//! A resource points at its parent by ID only. Children are found through the
//! [`ResourceManager`](crate::manager::ResourceManager) index, which keeps the
//! tree free of reference cycles and makes re-parenting a field update.

use crate::driver::AttributeValue;
use crate::location::{AttributeLocation, Location};
use crate::model::ids::ResourceId;
use crate::model::resource_type::{MeasurementType, Operation, ResourceType};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A metric or avail bound to one resource.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementInstance<L> {
    pub id: String,
    pub measurement_type: Arc<MeasurementType<L>>,
    /// Absolute attribute location on the owning resource.
    pub attribute: AttributeLocation<L>,
}

/// An operation bound to one resource.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationInstance<L> {
    pub operation: Arc<Operation>,
    pub location: L,
}

#[derive(Debug)]
pub struct Resource<L> {
    pub id: ResourceId,
    pub name: String,
    pub location: L,
    pub resource_type: Arc<ResourceType<L>>,
    pub parent_id: Option<ResourceId>,
    pub metrics: Vec<MeasurementInstance<L>>,
    pub avails: Vec<MeasurementInstance<L>>,
    pub operations: Vec<OperationInstance<L>>,
    pub config: BTreeMap<String, AttributeValue>,
    persisted: AtomicBool,
}

impl<L: Location> Resource<L> {
    pub fn new(id: ResourceId, name: impl Into<String>, location: L, resource_type: Arc<ResourceType<L>>) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            resource_type,
            parent_id: None,
            metrics: Vec::new(),
            avails: Vec::new(),
            operations: Vec::new(),
            config: BTreeMap::new(),
            persisted: AtomicBool::new(false),
        }
    }

    pub fn with_parent(mut self, parent_id: Option<ResourceId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted.load(Ordering::Acquire)
    }

    /// Set by the inventory storage once the resource has been synced.
    pub fn mark_persisted(&self, persisted: bool) {
        self.persisted.store(persisted, Ordering::Release);
    }
}

impl<L: Location> Clone for Resource<L> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            location: self.location.clone(),
            resource_type: Arc::clone(&self.resource_type),
            parent_id: self.parent_id.clone(),
            metrics: self.metrics.clone(),
            avails: self.avails.clone(),
            operations: self.operations.clone(),
            config: self.config.clone(),
            persisted: AtomicBool::new(self.is_persisted()),
        }
    }
}

/// Value equality; the persisted flag is bookkeeping and does not count.
impl<L: Location> PartialEq for Resource<L> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.location == other.location
            && (Arc::ptr_eq(&self.resource_type, &other.resource_type)
                || self.resource_type.id == other.resource_type.id)
            && self.parent_id == other.parent_id
            && self.metrics == other.metrics
            && self.avails == other.avails
            && self.operations == other.operations
            && self.config == other.config
    }
}
