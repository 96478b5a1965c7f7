//! # Resource Manager
//!
//! The authoritative resource tree of one endpoint.
//!
//! # Architecture Note
//! Resources live in a flat arena keyed by [`ResourceId`]. Each resource
//! knows its parent ID; a secondary index maps every parent (or `None` for
//! roots) to its children in insertion order. Nothing in the tree holds a
//! pointer to its children, so there are no cycles to manage and moving a
//! resource is an index update.
//!
//! All state sits behind one `RwLock`. Every public operation takes the lock
//! once, so "check the parent, then add the children" and "find the matches,
//! then remove them with their descendants" are each a single atomic step
//! even when a scheduled scan and a command-driven discovery run at the same
//! time.
//!
//! ## Change Detection
//!
//! [`ResourceManager::add_resource`] compares the candidate with the stored
//! resource of the same ID by value:
//!
//! | Stored | Candidate | Effect |
//! |--------|-----------|--------|
//! | none | any | [`Effect::Added`] |
//! | equal | equal | [`Effect::Unchanged`], stored instance kept |
//! | differs (location, name, parent, ...) | | [`Effect::Modified`], replaced in place |

use crate::error::InventoryError;
use crate::location::{Location, LocationResolver};
use crate::model::{Resource, ResourceId};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Effect {
    Added,
    Modified,
    Unchanged,
}

#[derive(Clone, Debug)]
pub struct AddResult<L> {
    pub effect: Effect,
    /// The instance now stored in the manager.
    pub resource: Arc<Resource<L>>,
}

struct Entry<L> {
    seq: u64,
    resource: Arc<Resource<L>>,
}

struct Tree<L> {
    next_seq: u64,
    by_id: HashMap<ResourceId, Entry<L>>,
    order: BTreeMap<u64, ResourceId>,
    children: HashMap<Option<ResourceId>, BTreeMap<u64, ResourceId>>,
}

impl<L: Location> Tree<L> {
    fn new() -> Self {
        Self {
            next_seq: 0,
            by_id: HashMap::new(),
            order: BTreeMap::new(),
            children: HashMap::new(),
        }
    }

    fn check_parent(&self, resource: &Resource<L>) -> Result<(), InventoryError> {
        match &resource.parent_id {
            Some(parent) if !self.by_id.contains_key(parent) => Err(InventoryError::UnknownParent {
                parent: parent.to_string(),
                child: resource.id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn add(&mut self, resource: Resource<L>) -> Result<AddResult<L>, InventoryError> {
        self.check_parent(&resource)?;

        let Some(entry) = self.by_id.get_mut(&resource.id) else {
            let seq = self.next_seq;
            self.next_seq += 1;
            let resource = Arc::new(resource);
            self.order.insert(seq, resource.id.clone());
            self.children
                .entry(resource.parent_id.clone())
                .or_default()
                .insert(seq, resource.id.clone());
            self.by_id.insert(
                resource.id.clone(),
                Entry {
                    seq,
                    resource: Arc::clone(&resource),
                },
            );
            return Ok(AddResult {
                effect: Effect::Added,
                resource,
            });
        };

        if *entry.resource == resource {
            return Ok(AddResult {
                effect: Effect::Unchanged,
                resource: Arc::clone(&entry.resource),
            });
        }

        let seq = entry.seq;
        let old_parent = entry.resource.parent_id.clone();
        let resource = Arc::new(resource);
        entry.resource = Arc::clone(&resource);

        if old_parent != resource.parent_id {
            if let Some(siblings) = self.children.get_mut(&old_parent) {
                siblings.remove(&seq);
            }
            self.children
                .entry(resource.parent_id.clone())
                .or_default()
                .insert(seq, resource.id.clone());
        }

        Ok(AddResult {
            effect: Effect::Modified,
            resource,
        })
    }

    fn in_order(&self) -> impl Iterator<Item = &Arc<Resource<L>>> {
        self.order
            .values()
            .filter_map(|id| self.by_id.get(id).map(|e| &e.resource))
    }

    fn children_of(&self, parent: &Option<ResourceId>) -> Vec<Arc<Resource<L>>> {
        self.children
            .get(parent)
            .into_iter()
            .flat_map(|c| c.values())
            .filter_map(|id| self.by_id.get(id).map(|e| Arc::clone(&e.resource)))
            .collect()
    }

    /// Removes `id` and everything below it. The result starts with `id`
    /// and continues breadth-first.
    fn remove_subtree(&mut self, id: &ResourceId) -> Vec<Arc<Resource<L>>> {
        let mut removed = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(next) = queue.pop_front() {
            if !visited.insert(next.clone()) {
                continue;
            }
            let Some(entry) = self.by_id.remove(&next) else {
                continue;
            };
            self.order.remove(&entry.seq);
            if let Some(siblings) = self.children.get_mut(&entry.resource.parent_id) {
                siblings.remove(&entry.seq);
            }
            if let Some(children) = self.children.remove(&Some(next)) {
                queue.extend(children.into_values());
            }
            removed.push(entry.resource);
        }
        removed
    }
}

/// Thread-safe store of one endpoint's resource tree.
pub struct ResourceManager<L> {
    tree: RwLock<Tree<L>>,
}

impl<L: Location> Default for ResourceManager<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Location> ResourceManager<L> {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tree<L>> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tree<L>> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or updates one resource. Its parent must already be stored.
    pub fn add_resource(&self, resource: Resource<L>) -> Result<AddResult<L>, InventoryError> {
        self.write().add(resource)
    }

    /// Adds a batch of children of `parent` under one lock.
    ///
    /// Fails as a whole if the parent is gone. Otherwise returns one result
    /// per candidate, in order.
    pub fn add_resources(
        &self,
        parent: Option<&ResourceId>,
        candidates: Vec<Resource<L>>,
    ) -> Result<Vec<Result<AddResult<L>, InventoryError>>, InventoryError> {
        let mut tree = self.write();
        if let Some(parent) = parent {
            if !tree.by_id.contains_key(parent) {
                return Err(InventoryError::UnknownParent {
                    parent: parent.to_string(),
                    child: candidates
                        .first()
                        .map(|c| c.id.to_string())
                        .unwrap_or_default(),
                });
            }
        }
        Ok(candidates.into_iter().map(|c| tree.add(c)).collect())
    }

    pub fn get_resource(&self, id: &ResourceId) -> Option<Arc<Resource<L>>> {
        self.read().by_id.get(id).map(|e| Arc::clone(&e.resource))
    }

    /// Resources whose location matches `query`, in insertion order.
    pub fn find_resources(&self, query: &L, resolver: &dyn LocationResolver<L>) -> Vec<Arc<Resource<L>>> {
        self.read()
            .in_order()
            .filter(|r| resolver.matches(query, &r.location))
            .cloned()
            .collect()
    }

    /// Every resource whose ID is not in `exclude`, in insertion order.
    pub fn get_all_resources(&self, exclude: &HashSet<ResourceId>) -> Vec<Arc<Resource<L>>> {
        self.read()
            .in_order()
            .filter(|r| !exclude.contains(&r.id))
            .cloned()
            .collect()
    }

    pub fn get_root_resources(&self) -> Vec<Arc<Resource<L>>> {
        self.read().children_of(&None)
    }

    pub fn get_children(&self, id: &ResourceId) -> Vec<Arc<Resource<L>>> {
        self.read().children_of(&Some(id.clone()))
    }

    pub fn get_parent(&self, resource: &Resource<L>) -> Option<Arc<Resource<L>>> {
        let parent = resource.parent_id.as_ref()?;
        self.get_resource(parent)
    }

    /// Walks parent links up to the root. `None` if a link is missing.
    pub fn get_root(&self, resource: &Arc<Resource<L>>) -> Option<Arc<Resource<L>>> {
        let tree = self.read();
        let mut current = Arc::clone(resource);
        let mut steps = 0;
        while let Some(parent) = &current.parent_id {
            current = Arc::clone(&tree.by_id.get(parent)?.resource);
            steps += 1;
            if steps > tree.by_id.len() {
                return None;
            }
        }
        Some(current)
    }

    /// Roots first, then each level in insertion order.
    pub fn get_resources_breadth_first(&self) -> Vec<Arc<Resource<L>>> {
        let tree = self.read();
        let mut out = Vec::with_capacity(tree.by_id.len());
        let mut queue: VecDeque<Arc<Resource<L>>> = tree.children_of(&None).into();
        while let Some(next) = queue.pop_front() {
            queue.extend(tree.children_of(&Some(next.id.clone())));
            out.push(next);
        }
        out
    }

    /// Removes one resource and all of its descendants.
    pub fn remove_resource(&self, id: &ResourceId) -> Vec<Arc<Resource<L>>> {
        self.write().remove_subtree(id)
    }

    /// Removes every resource matching `query` together with its descendants.
    pub fn remove_resources(&self, query: &L, resolver: &dyn LocationResolver<L>) -> Vec<Arc<Resource<L>>> {
        let mut tree = self.write();
        let matches: Vec<ResourceId> = tree
            .in_order()
            .filter(|r| resolver.matches(query, &r.location))
            .map(|r| r.id.clone())
            .collect();
        matches
            .iter()
            .flat_map(|id| tree.remove_subtree(id))
            .collect()
    }

    /// Removes every resource not in `keep`, with descendants.
    pub fn remove_all_except(&self, keep: &HashSet<ResourceId>) -> Vec<Arc<Resource<L>>> {
        let mut tree = self.write();
        let stale: Vec<ResourceId> = tree
            .in_order()
            .filter(|r| !keep.contains(&r.id))
            .map(|r| r.id.clone())
            .collect();
        stale.iter().flat_map(|id| tree.remove_subtree(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_id.is_empty()
    }

    /// Dumps the tree at debug level.
    pub fn log_tree_graph(&self, endpoint: &str) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        let tree = self.read();
        let mut out = String::new();
        let mut stack: Vec<(usize, Arc<Resource<L>>)> =
            tree.children_of(&None).into_iter().rev().map(|r| (0, r)).collect();
        while let Some((depth, next)) = stack.pop() {
            let _ = writeln!(out, "{:indent$}{} [{}]", "", next.name, next.location, indent = depth * 2);
            for child in tree.children_of(&Some(next.id.clone())).into_iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        debug!(endpoint, size = tree.by_id.len(), "Resource tree:\n{out}");
    }
}
