//! # Discovery Engine
//!
//! Walks the resource type graph top-down against a live endpoint and
//! reconciles what it finds with the [`ResourceManager`].
//!
//! For one `(parent, child type)` pair the engine:
//!
//! 1. Resolves the child type's location template against the parent's
//!    location (or the root when there is no parent).
//! 2. Asks the driver for every node matching that query.
//! 3. Builds a candidate [`Resource`] per node: ID, name, configuration
//!    properties, measurement and operation instances.
//! 4. Stores the whole batch under one lock and records each outcome
//!    (added / modified / unchanged) in a [`DiscoveryResults`].
//! 5. Recurses into every child type of the child type, depth-first.
//!
//! # Architecture Note
//! Failures are scoped as tightly as possible. A node that cannot be built
//! is recorded and skipped; its siblings are still stored. A query that
//! cannot be fetched abandons that branch only. Nothing here aborts a scan;
//! the caller decides what an error means by looking at the results.

use crate::driver::{Driver, Session};
use crate::error::DiscoveryError;
use crate::location::{AttributeLocation, Location, LocationResolver};
use crate::manager::{AddResult, Effect, ResourceManager};
use crate::model::{
    measurement_instance_id, MeasurementInstance, MeasurementType, OperationInstance, Resource, ResourceId,
    ResourceType, ResourceTypeManager,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Accumulated outcome of a discovery walk.
#[derive(Debug)]
pub struct DiscoveryResults<L> {
    pub added: Vec<Arc<Resource<L>>>,
    pub modified: Vec<Arc<Resource<L>>>,
    pub unchanged: Vec<Arc<Resource<L>>>,
    pub errors: Vec<DiscoveryError>,
    discovered: HashSet<ResourceId>,
}

impl<L: Location> Default for DiscoveryResults<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Location> DiscoveryResults<L> {
    pub fn new() -> Self {
        Self {
            added: Vec::new(),
            modified: Vec::new(),
            unchanged: Vec::new(),
            errors: Vec::new(),
            discovered: HashSet::new(),
        }
    }

    pub fn record(&mut self, result: &AddResult<L>) {
        self.discovered.insert(result.resource.id.clone());
        let bucket = match result.effect {
            Effect::Added => &mut self.added,
            Effect::Modified => &mut self.modified,
            Effect::Unchanged => &mut self.unchanged,
        };
        bucket.push(Arc::clone(&result.resource));
    }

    pub fn error(&mut self, error: DiscoveryError) {
        warn!(error = %error, "Discovery error");
        self.errors.push(error);
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// IDs of every resource touched by the walk.
    pub fn discovered_ids(&self) -> &HashSet<ResourceId> {
        &self.discovered
    }

    /// Added resources followed by modified ones.
    pub fn added_or_modified(&self) -> Vec<Arc<Resource<L>>> {
        self.added.iter().chain(self.modified.iter()).cloned().collect()
    }
}

/// The discovery engine for one endpoint.
pub struct Discovery<L> {
    feed_id: String,
    endpoint_name: String,
    types: Arc<ResourceTypeManager<L>>,
    resources: Arc<ResourceManager<L>>,
}

impl<L: Location> Discovery<L> {
    pub fn new(
        feed_id: impl Into<String>,
        endpoint_name: impl Into<String>,
        types: Arc<ResourceTypeManager<L>>,
        resources: Arc<ResourceManager<L>>,
    ) -> Self {
        Self {
            feed_id: feed_id.into(),
            endpoint_name: endpoint_name.into(),
            types,
            resources,
        }
    }

    /// Discovers every root type and everything below it.
    pub fn discover_all<S: Session<L>>(&self, session: &S, results: &mut DiscoveryResults<L>) {
        for root in self.types.root_types() {
            self.discover_children(None, root, session, results);
        }
    }

    /// Discovers `child_type` under `parent` (or at the root) and recurses
    /// into its child types.
    pub fn discover_children<S: Session<L>>(
        &self,
        parent: Option<&Arc<Resource<L>>>,
        child_type: &Arc<ResourceType<L>>,
        session: &S,
        results: &mut DiscoveryResults<L>,
    ) {
        let resolver = session.location_resolver();
        let driver = session.driver();
        let query = resolver.absolutize(parent.map(|p| &p.location), &child_type.location);

        let nodes = match driver.fetch_nodes(&query) {
            Ok(nodes) => nodes,
            Err(source) => {
                results.error(DiscoveryError::FetchNodes {
                    type_name: child_type.name.clone(),
                    query: query.to_string(),
                    source,
                });
                return;
            }
        };
        debug!(
            endpoint = %self.endpoint_name,
            resource_type = %child_type.name,
            %query,
            count = nodes.len(),
            "Fetched nodes"
        );

        let parent_id = parent.map(|p| p.id.clone());
        let mut candidates = Vec::with_capacity(nodes.len());
        for location in nodes.into_keys() {
            match self.build_resource(&location, child_type, parent_id.clone(), driver, resolver) {
                Ok(resource) => candidates.push(resource),
                Err(error) => results.error(error),
            }
        }

        let locations: Vec<String> = candidates.iter().map(|c| c.location.to_string()).collect();
        let stored = match self.resources.add_resources(parent_id.as_ref(), candidates) {
            Ok(stored) => stored,
            Err(source) => {
                results.error(DiscoveryError::Store {
                    type_name: child_type.name.clone(),
                    location: query.to_string(),
                    source,
                });
                return;
            }
        };

        let mut found = Vec::with_capacity(stored.len());
        for (outcome, location) in stored.into_iter().zip(locations) {
            match outcome {
                Ok(result) => {
                    debug!(
                        resource = %result.resource.id,
                        effect = ?result.effect,
                        "Discovered resource"
                    );
                    results.record(&result);
                    found.push(result.resource);
                }
                Err(source) => results.error(DiscoveryError::Store {
                    type_name: child_type.name.clone(),
                    location,
                    source,
                }),
            }
        }

        let grandchild_types = self.types.children(child_type);
        for resource in &found {
            for grandchild_type in &grandchild_types {
                self.discover_children(Some(resource), grandchild_type, session, results);
            }
        }
    }

    fn build_resource<D: Driver<L>>(
        &self,
        location: &L,
        rtype: &Arc<ResourceType<L>>,
        parent_id: Option<ResourceId>,
        driver: &D,
        resolver: &dyn LocationResolver<L>,
    ) -> Result<Resource<L>, DiscoveryError> {
        let name = match &rtype.name_attribute {
            Some(attribute) => driver
                .fetch_attribute(&AttributeLocation::new(location.clone(), attribute.clone()))
                .map_err(|source| DiscoveryError::BuildResource {
                    type_name: rtype.name.clone(),
                    location: location.to_string(),
                    source,
                })?
                .map(|value| value.to_string()),
            None => None,
        };
        let name = name.unwrap_or_else(|| {
            resolver.apply_template(&rtype.resource_name_template, location, &self.endpoint_name)
        });

        let id_part = match &rtype.id_template {
            Some(template) => resolver.apply_template(template, location, &self.endpoint_name),
            None => location.to_string(),
        };
        let id = ResourceId::generate(&self.feed_id, &self.endpoint_name, &format!("{}~{}", rtype.id, id_part));

        let mut resource = Resource::new(id, name, location.clone(), Arc::clone(rtype)).with_parent(parent_id);

        for property in &rtype.config_properties {
            let attribute = property.attribute.rebase(resolver, location);
            match driver.fetch_attribute(&attribute) {
                Ok(Some(value)) => {
                    resource.config.insert(property.name.clone(), value);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    resource = %resource.id,
                    property = %property.name,
                    error = %e,
                    "Failed to read resource configuration property"
                ),
            }
        }

        resource.metrics = self.measurement_instances(&resource, &rtype.metrics, driver, resolver);
        resource.avails = self.measurement_instances(&resource, &rtype.avails, driver, resolver);
        resource.operations = rtype
            .operations
            .iter()
            .map(|operation| OperationInstance {
                operation: Arc::clone(operation),
                location: location.clone(),
            })
            .collect();

        Ok(resource)
    }

    fn measurement_instances<D: Driver<L>>(
        &self,
        resource: &Resource<L>,
        types: &[Arc<MeasurementType<L>>],
        driver: &D,
        resolver: &dyn LocationResolver<L>,
    ) -> Vec<MeasurementInstance<L>> {
        let mut instances = Vec::new();
        for mtype in types {
            let attribute = mtype.attribute.rebase(resolver, &resource.location);
            match driver.attribute_exists(&attribute) {
                Ok(true) => instances.push(MeasurementInstance {
                    id: measurement_instance_id(&self.feed_id, &resource.id, &mtype.name),
                    measurement_type: Arc::clone(mtype),
                    attribute,
                }),
                Ok(false) => debug!(resource = %resource.id, measurement = %mtype.name, "Attribute not present"),
                Err(e) => warn!(
                    resource = %resource.id,
                    measurement = %mtype.name,
                    error = %e,
                    "Failed to check measurement attribute"
                ),
            }
        }
        instances
    }
}
