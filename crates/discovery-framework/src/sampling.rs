//! Contract offered to the metric collection side.

use crate::location::Location;
use crate::model::{MeasurementInstance, Resource};
use std::collections::BTreeMap;

/// What a metric collector needs to know about an endpoint's measurements.
pub trait SamplingService<L: Location>: Send + Sync {
    fn feed_id(&self) -> &str;

    fn endpoint_name(&self) -> &str;

    /// Family (metric name) under which samples of `instance` are reported.
    fn generate_metric_family(&self, instance: &MeasurementInstance<L>) -> String;

    /// Labels attached to every sample of `instance` on `resource`.
    fn generate_metric_labels(
        &self,
        resource: &Resource<L>,
        instance: &MeasurementInstance<L>,
    ) -> BTreeMap<String, String>;
}
