//! # Inventory Events
//!
//! Endpoint services tell the outside world about inventory changes through
//! [`InventoryEvent`]s delivered to registered [`InventoryListener`]s.
//!
//! | Kind | Fired by | Contents |
//! |------|----------|----------|
//! | [`InventoryEventKind::Discovery`] | a full scan without errors, or a command-driven discovery | added/modified and removed resources |
//! | [`InventoryEventKind::Removed`] | an explicit removal | removed resources |
//!
//! Every event is built from one consistent snapshot: the added, modified and
//! removed lists of a single scan are delivered together.

use crate::location::Location;
use crate::manager::ResourceManager;
use crate::model::{Resource, ResourceId};
use crate::sampling::SamplingService;
use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InventoryEventKind {
    Removed,
    Discovery,
}

pub struct InventoryEvent<L: Location> {
    kind: InventoryEventKind,
    sampling: Arc<dyn SamplingService<L>>,
    added_or_modified: Vec<Arc<Resource<L>>>,
    removed: Vec<Arc<Resource<L>>>,
    added_or_modified_roots: Vec<Arc<Resource<L>>>,
    removed_roots: Vec<Arc<Resource<L>>>,
}

impl<L: Location> InventoryEvent<L> {
    pub fn removed(
        sampling: Arc<dyn SamplingService<L>>,
        resources: &ResourceManager<L>,
        removed: Vec<Arc<Resource<L>>>,
    ) -> Self {
        Self::new(InventoryEventKind::Removed, sampling, resources, Vec::new(), removed)
    }

    pub fn discovery(
        sampling: Arc<dyn SamplingService<L>>,
        resources: &ResourceManager<L>,
        added_or_modified: Vec<Arc<Resource<L>>>,
        removed: Vec<Arc<Resource<L>>>,
    ) -> Self {
        Self::new(InventoryEventKind::Discovery, sampling, resources, added_or_modified, removed)
    }

    /// Roots are resolved against `resources` as it is right now, so a removed
    /// resource whose parent still exists marks that parent's root as
    /// modified. A removed resource whose ancestors are gone too is covered by
    /// the removed root.
    fn new(
        kind: InventoryEventKind,
        sampling: Arc<dyn SamplingService<L>>,
        resources: &ResourceManager<L>,
        added_or_modified: Vec<Arc<Resource<L>>>,
        removed: Vec<Arc<Resource<L>>>,
    ) -> Self {
        let mut seen: HashSet<ResourceId> = HashSet::new();
        let mut added_or_modified_roots = Vec::new();
        let mut removed_roots = Vec::new();

        for resource in &added_or_modified {
            let root = resources
                .get_root(resource)
                .unwrap_or_else(|| Arc::clone(resource));
            if seen.insert(root.id.clone()) {
                added_or_modified_roots.push(root);
            }
        }
        for resource in &removed {
            if resource.is_root() {
                removed_roots.push(Arc::clone(resource));
            } else if let Some(root) = resources.get_root(resource) {
                if seen.insert(root.id.clone()) {
                    added_or_modified_roots.push(root);
                }
            }
        }

        Self {
            kind,
            sampling,
            added_or_modified,
            removed,
            added_or_modified_roots,
            removed_roots,
        }
    }

    pub fn kind(&self) -> InventoryEventKind {
        self.kind
    }

    pub fn sampling_service(&self) -> &Arc<dyn SamplingService<L>> {
        &self.sampling
    }

    pub fn added_or_modified(&self) -> &[Arc<Resource<L>>] {
        &self.added_or_modified
    }

    pub fn removed_resources(&self) -> &[Arc<Resource<L>>] {
        &self.removed
    }

    /// Roots of every added or modified resource, plus the roots of removed
    /// non-root resources.
    pub fn added_or_modified_root_resources(&self) -> &[Arc<Resource<L>>] {
        &self.added_or_modified_roots
    }

    pub fn removed_root_resources(&self) -> &[Arc<Resource<L>>] {
        &self.removed_roots
    }
}

/// Receives inventory change notifications.
pub trait InventoryListener<L: Location>: Send + Sync {
    fn received_event(&self, event: &InventoryEvent<L>);
}

/// The listeners of one service, guarded by their own lock.
pub struct ListenerRegistry<L: Location> {
    listeners: RwLock<Vec<Arc<dyn InventoryListener<L>>>>,
}

impl<L: Location> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity comparison on the listener object, ignoring vtables.
pub(crate) fn same_listener<L: Location>(a: &Arc<dyn InventoryListener<L>>, b: &Arc<dyn InventoryListener<L>>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<L: Location> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<dyn InventoryListener<L>>) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// `true` if the listener was registered.
    pub fn remove(&self, listener: &Arc<dyn InventoryListener<L>>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn InventoryListener<L>>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener. A panicking listener is logged and
    /// does not stop delivery to the others.
    pub fn notify(&self, event: &InventoryEvent<L>) {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        debug!(
            kind = ?event.kind(),
            listeners = listeners.len(),
            added_or_modified = event.added_or_modified().len(),
            removed = event.removed_resources().len(),
            "Firing inventory event"
        );
        for listener in listeners.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener.received_event(event))).is_err() {
                error!(kind = ?event.kind(), "Inventory listener panicked");
            }
        }
    }
}
