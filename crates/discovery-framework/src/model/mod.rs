//! # Inventory Model
//!
//! Resource types form a graph built once from configuration. Resources are
//! the discovered instances of those types and form a tree per endpoint.

pub mod ids;
pub mod resource;
pub mod resource_type;
pub mod type_manager;

pub use ids::{measurement_instance_id, ResourceId, ResourceIdParts, ResourceTypeId};
pub use resource::{MeasurementInstance, OperationInstance, Resource};
pub use resource_type::{ConfigPropertyType, MeasurementKind, MeasurementType, Operation, ResourceType};
pub use type_manager::{ResourceTypeManager, TypeSet};
