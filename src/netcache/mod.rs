//! The class net-cache tree.
//!
//! Every replicated class declares, in the replay's net-cache table, which
//! on-wire property ids it adds and which object-table entry each id names.
//! Classes inherit from a parent cache entry, so the ids valid for a class
//! are the union of its own and all of its ancestors' mappings.
//!
//! [`NetCacheTree`] stores the entries in an arena indexed by file
//! position; each node records its parent and children by index.
//! [`NetCacheTree::resolve`] walks from the root to a class and merges the
//! mappings along that path, deeper classes overriding shallower ones.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use rl_replay_parser::netcache::{NetCacheEntry, NetCacheTree};
//!
//! let entries = vec![
//!     NetCacheEntry::new("Engine.Actor", 1, 0, [(1, 10), (2, 20)]),
//!     NetCacheEntry::new("TAGame.Ball_TA", 2, 1, [(2, 21), (3, 30)]),
//! ];
//! let tree = NetCacheTree::build(entries).unwrap();
//! let resolved = tree.resolve("TAGame.Ball_TA").unwrap();
//! assert_eq!(resolved, BTreeMap::from([(1, 10), (2, 21), (3, 30)]));
//! ```

pub mod mapper;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{ParserError, Result};

pub use mapper::{archetype_to_class, ArchetypeNaming, PropertyMapper};

/// Wire property id to object-table index, merged over a class's ancestry.
pub type ResolvedPropertyMap = BTreeMap<u32, u32>;

/// One class's declared property mapping, as stored in the replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetCacheEntry {
    /// Class name from the class-index table.
    pub class_name: String,
    /// This entry's cache id.
    pub cache_id: u32,
    /// Cache id of the parent entry.
    pub parent_cache_id: u32,
    /// On-wire property id to object-table index.
    pub property_map: BTreeMap<u32, u32>,
}

impl NetCacheEntry {
    /// Creates an entry from `(wire_id, object_index)` pairs.
    pub fn new(
        class_name: impl Into<String>,
        cache_id: u32,
        parent_cache_id: u32,
        properties: impl IntoIterator<Item = (u32, u32)>,
    ) -> Self {
        NetCacheEntry {
            class_name: class_name.into(),
            cache_id,
            parent_cache_id,
            property_map: properties.into_iter().collect(),
        }
    }
}

/// A tree node owning its entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetCacheNode {
    /// The decoded entry.
    pub entry: NetCacheEntry,
    /// Index of the parent node; `None` for the root.
    pub parent: Option<usize>,
    /// Indices of child nodes, in attachment order.
    pub children: Vec<usize>,
}

/// Arena of net-cache nodes rooted at the first entry of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetCacheTree {
    nodes: Vec<NetCacheNode>,
}

impl NetCacheTree {
    /// Builds the tree from entries in file order.
    ///
    /// The first entry is the root. Every later entry is attached to the
    /// nearest earlier entry whose `cache_id` equals its `parent_cache_id`;
    /// entries are attached starting from the end of the file.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnresolvedNetCacheParent` if no earlier entry
    /// carries the declared parent cache id.
    pub fn build(entries: Vec<NetCacheEntry>) -> Result<Self> {
        let mut nodes: Vec<NetCacheNode> = entries
            .into_iter()
            .map(|entry| NetCacheNode {
                entry,
                parent: None,
                children: Vec::new(),
            })
            .collect();

        for child in (1..nodes.len()).rev() {
            let wanted = nodes[child].entry.parent_cache_id;
            let parent = (0..child)
                .rev()
                .find(|&candidate| nodes[candidate].entry.cache_id == wanted)
                .ok_or_else(|| ParserError::UnresolvedNetCacheParent {
                    class_name: nodes[child].entry.class_name.clone(),
                    parent_cache_id: wanted,
                })?;
            nodes[child].parent = Some(parent);
            nodes[parent].children.push(child);
        }

        debug!(nodes = nodes.len(), "built net-cache tree");
        Ok(NetCacheTree { nodes })
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the root node, if any.
    #[must_use]
    pub fn root(&self) -> Option<&NetCacheNode> {
        self.nodes.first()
    }

    /// Returns the node at `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&NetCacheNode> {
        self.nodes.get(index)
    }

    /// Finds the first node, in depth-first pre-order from the root, whose
    /// class matches `class_name`.
    ///
    /// A query starting with `.` matches any class name ending with it;
    /// any other query must match exactly.
    #[must_use]
    pub fn find(&self, class_name: &str) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if class_matches(&node.entry.class_name, class_name) {
                return Some(index);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Node indices from the root down to `index`, inclusive.
    #[must_use]
    pub fn path_to(&self, index: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            path.push(i);
            current = self.nodes.get(i).and_then(|node| node.parent);
        }
        path.reverse();
        path
    }

    /// Merges the property maps from the root down to `class_name`.
    ///
    /// # Errors
    ///
    /// Returns `ParserError::UnknownClass` if no node matches `class_name`.
    pub fn resolve(&self, class_name: &str) -> Result<ResolvedPropertyMap> {
        let target = self
            .find(class_name)
            .ok_or_else(|| ParserError::UnknownClass {
                class_name: class_name.to_string(),
            })?;

        let mut merged = ResolvedPropertyMap::new();
        for index in self.path_to(target) {
            merged.extend(
                self.nodes[index]
                    .entry
                    .property_map
                    .iter()
                    .map(|(&k, &v)| (k, v)),
            );
        }
        Ok(merged)
    }
}

fn class_matches(candidate: &str, query: &str) -> bool {
    if query.starts_with('.') {
        candidate.ends_with(query)
    } else {
        candidate == query
    }
}
