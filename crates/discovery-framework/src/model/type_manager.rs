//! The resource type graph.
//!
//! Types declare their parents by name. The manager links them into a DAG,
//! drops disabled type sets together with everything below them, and answers
//! "where does discovery start" ([`ResourceTypeManager::root_types`]) and
//! "what comes next" ([`ResourceTypeManager::children`]).

use crate::error::InventoryError;
use crate::location::Location;
use crate::model::resource_type::ResourceType;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info};

/// A named group of resource types that can be switched on or off together.
#[derive(Clone, Debug)]
pub struct TypeSet<L> {
    pub name: String,
    pub enabled: bool,
    pub types: Vec<ResourceType<L>>,
}

impl<L: Location> TypeSet<L> {
    pub fn new(name: impl Into<String>, types: Vec<ResourceType<L>>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            types,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug)]
pub struct ResourceTypeManager<L> {
    /// Surviving types in declaration order.
    types: Vec<Arc<ResourceType<L>>>,
    by_name: HashMap<String, usize>,
    children: HashMap<String, Vec<String>>,
    parents: HashMap<String, Vec<String>>,
    roots: Vec<Arc<ResourceType<L>>>,
}

impl<L: Location> ResourceTypeManager<L> {
    /// Builds the graph from every type in one enabled set.
    pub fn from_types(types: Vec<ResourceType<L>>) -> Result<Self, InventoryError> {
        Self::new(vec![TypeSet::new("all", types)], None)
    }

    /// Builds the graph from `sets`. When `sets_to_use` is given, other sets
    /// are ignored.
    pub fn new(sets: Vec<TypeSet<L>>, sets_to_use: Option<&[String]>) -> Result<Self, InventoryError> {
        let sets: Vec<TypeSet<L>> = match sets_to_use {
            None => sets,
            Some(wanted) => sets
                .into_iter()
                .filter(|s| wanted.iter().any(|w| w == &s.name))
                .collect(),
        };

        let mut all: Vec<Arc<ResourceType<L>>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut disabled: Vec<String> = Vec::new();
        for set in sets {
            for rtype in set.types {
                if index.contains_key(&rtype.name) {
                    return Err(InventoryError::DuplicateResourceType(rtype.name));
                }
                if !set.enabled {
                    disabled.push(rtype.name.clone());
                }
                index.insert(rtype.name.clone(), all.len());
                all.push(Arc::new(rtype));
            }
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        for rtype in &all {
            for parent in &rtype.parents {
                if index.contains_key(parent) {
                    children.entry(parent.clone()).or_default().push(rtype.name.clone());
                    parents.entry(rtype.name.clone()).or_default().push(parent.clone());
                } else {
                    debug!(resource_type = %rtype.name, %parent, "Ignoring unknown parent");
                }
            }
        }

        let mut stripped: HashSet<String> = HashSet::new();
        for name in &disabled {
            let before = stripped.len();
            let mut queue = VecDeque::from([name.clone()]);
            while let Some(next) = queue.pop_front() {
                if stripped.insert(next.clone()) {
                    queue.extend(children.get(&next).into_iter().flatten().cloned());
                }
            }
            info!(resource_type = %name, count = stripped.len() - before, "Disabling resource types");
        }

        let types: Vec<Arc<ResourceType<L>>> = all
            .into_iter()
            .filter(|t| !stripped.contains(&t.name))
            .collect();
        let by_name = types
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        for edges in children.values_mut().chain(parents.values_mut()) {
            edges.retain(|n| !stripped.contains(n));
        }
        children.retain(|k, _| !stripped.contains(k));
        parents.retain(|k, _| !stripped.contains(k));

        let mut roots = Vec::new();
        for rtype in &types {
            let has_known_parent = parents.get(&rtype.name).is_some_and(|p| !p.is_empty());
            if has_known_parent {
                continue;
            }
            if rtype.parents.is_empty() {
                roots.push(Arc::clone(rtype));
            } else {
                error!(resource_type = %rtype.name, parents = ?rtype.parents, "Invalid root resource type");
            }
        }

        Ok(Self {
            types,
            by_name,
            children,
            parents,
            roots,
        })
    }

    pub fn root_types(&self) -> &[Arc<ResourceType<L>>] {
        &self.roots
    }

    pub fn get_resource_type(&self, name: &str) -> Option<&Arc<ResourceType<L>>> {
        self.by_name.get(name).map(|&i| &self.types[i])
    }

    pub fn children(&self, rtype: &ResourceType<L>) -> Vec<Arc<ResourceType<L>>> {
        self.lookup_all(self.children.get(&rtype.name))
    }

    pub fn parents(&self, rtype: &ResourceType<L>) -> Vec<Arc<ResourceType<L>>> {
        self.lookup_all(self.parents.get(&rtype.name))
    }

    /// Every type, roots first, each visited once.
    pub fn types_breadth_first(&self) -> Vec<Arc<ResourceType<L>>> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(self.types.len());
        let mut queue: VecDeque<Arc<ResourceType<L>>> = self.roots.iter().cloned().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.name.clone()) {
                queue.extend(self.children(&next));
                out.push(next);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn lookup_all(&self, names: Option<&Vec<String>>) -> Vec<Arc<ResourceType<L>>> {
        names
            .into_iter()
            .flatten()
            .filter_map(|n| self.get_resource_type(n).cloned())
            .collect()
    }
}
