//! Resource type definitions.
//!
//! Types are built once from configuration and shared (`Arc`) by every
//! resource discovered for them. They never change after start-up.

use crate::location::{AttributeLocation, Location};
use crate::model::ids::ResourceTypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Metric,
    Avail,
}

/// A metric or availability definition.
///
/// `attribute` is relative to the owning resource's location.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementType<L> {
    pub name: String,
    pub kind: MeasurementKind,
    pub attribute: AttributeLocation<L>,
    pub units: Option<String>,
    pub family: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl<L: Location> MeasurementType<L> {
    pub fn metric(name: impl Into<String>, attribute: AttributeLocation<L>) -> Self {
        Self {
            name: name.into(),
            kind: MeasurementKind::Metric,
            attribute,
            units: None,
            family: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn avail(name: impl Into<String>, attribute: AttributeLocation<L>) -> Self {
        Self {
            kind: MeasurementKind::Avail,
            ..Self::metric(name, attribute)
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub internal_name: String,
    pub modifies: bool,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            internal_name: name.clone(),
            name,
            modifies: false,
        }
    }
}

/// A resource configuration property read from an attribute at discovery.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigPropertyType<L> {
    pub name: String,
    pub attribute: AttributeLocation<L>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceType<L> {
    pub id: ResourceTypeId,
    pub name: String,
    /// Relative location template resolved against each parent resource.
    pub location: L,
    pub resource_name_template: String,
    /// Attribute holding the resource name. Takes priority over the template
    /// when the node has it.
    pub name_attribute: Option<String>,
    /// Template for the location-derived part of resource IDs. When absent
    /// the full location is used.
    pub id_template: Option<String>,
    /// Names of parent types.
    pub parents: Vec<String>,
    pub metrics: Vec<Arc<MeasurementType<L>>>,
    pub avails: Vec<Arc<MeasurementType<L>>>,
    pub operations: Vec<Arc<Operation>>,
    pub config_properties: Vec<ConfigPropertyType<L>>,
    pub metric_labels: BTreeMap<String, String>,
}

impl<L: Location> ResourceType<L> {
    pub fn new(name: impl Into<String>, location: L) -> Self {
        let name = name.into();
        Self {
            id: ResourceTypeId::new(name.clone()),
            resource_name_template: name.clone(),
            name,
            location,
            name_attribute: None,
            id_template: None,
            parents: Vec::new(),
            metrics: Vec::new(),
            avails: Vec::new(),
            operations: Vec::new(),
            config_properties: Vec::new(),
            metric_labels: BTreeMap::new(),
        }
    }

    pub fn with_name_template(mut self, template: impl Into<String>) -> Self {
        self.resource_name_template = template.into();
        self
    }

    pub fn with_name_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.name_attribute = Some(attribute.into());
        self
    }

    pub fn with_id_template(mut self, template: impl Into<String>) -> Self {
        self.id_template = Some(template.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_measurement(mut self, measurement: MeasurementType<L>) -> Self {
        match measurement.kind {
            MeasurementKind::Metric => self.metrics.push(Arc::new(measurement)),
            MeasurementKind::Avail => self.avails.push(Arc::new(measurement)),
        }
        self
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(Arc::new(operation));
        self
    }

    pub fn with_config_property(mut self, name: impl Into<String>, attribute: AttributeLocation<L>) -> Self {
        self.config_properties.push(ConfigPropertyType {
            name: name.into(),
            attribute,
        });
        self
    }

    pub fn with_metric_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric_labels.insert(key.into(), value.into());
        self
    }

    pub fn measurement(&self, name: &str) -> Option<&Arc<MeasurementType<L>>> {
        self.metrics
            .iter()
            .chain(self.avails.iter())
            .find(|m| m.name == name)
    }
}
