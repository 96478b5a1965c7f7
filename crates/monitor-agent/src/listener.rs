use discovery_framework::event::{InventoryEvent, InventoryEventKind, InventoryListener};
use discovery_framework::location::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Logs every inventory event. Stands in for the inventory storage client.
#[derive(Debug, Default)]
pub struct LoggingInventoryListener {
    discovery_events: AtomicU64,
    removed_events: AtomicU64,
}

impl LoggingInventoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovery_events(&self) -> u64 {
        self.discovery_events.load(Ordering::Relaxed)
    }

    pub fn removed_events(&self) -> u64 {
        self.removed_events.load(Ordering::Relaxed)
    }
}

impl<L: Location> InventoryListener<L> for LoggingInventoryListener {
    fn received_event(&self, event: &InventoryEvent<L>) {
        let sampling = event.sampling_service();
        let counter = match event.kind() {
            InventoryEventKind::Discovery => &self.discovery_events,
            InventoryEventKind::Removed => &self.removed_events,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let roots: Vec<&str> = event
            .added_or_modified_root_resources()
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        let removed_roots: Vec<&str> = event.removed_root_resources().iter().map(|r| r.id.as_str()).collect();
        info!(
            feed = sampling.feed_id(),
            endpoint = sampling.endpoint_name(),
            kind = ?event.kind(),
            added_or_modified = event.added_or_modified().len(),
            removed = event.removed_resources().len(),
            ?roots,
            ?removed_roots,
            "Inventory changed"
        );

        for resource in event.added_or_modified() {
            for metric in resource.metrics.iter().chain(resource.avails.iter()) {
                debug!(
                    resource = %resource.id,
                    measurement = %metric.id,
                    family = %sampling.generate_metric_family(metric),
                    labels = ?sampling.generate_metric_labels(resource, metric),
                    "Measurement ready for sampling"
                );
            }
        }
    }
}
