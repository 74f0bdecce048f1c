use generational_arena::{Arena, Index};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::NodeChain;
use crate::domain::root::{pixel_size_for, Root, RootKey};

/// Handle of a root inside its [`RootForest`].
pub type RootIndex = Index;

/// Document-level metadata carried alongside the roots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestMetadata {
    pub unit: String,
    pub resolution: f64,
    pub file_key: String,
    pub software: String,
    pub version: Option<String>,
    pub user: Option<String>,
    pub last_modified: Option<String>,
    pub image: Option<String>,
}

/// What happens to the children of a removed root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    /// Children are detached and become primary roots
    Detach,
    /// The whole subtree is removed
    Cascade,
}

/// Arena-based forest of roots for one image.
///
/// Roots are kept in insertion order; parent/child relations are arena indices.
/// One dpi value is shared by every root.
#[derive(Debug, Clone)]
pub struct RootForest {
    /// Arena storage for all roots
    arena: Arena<Root>,
    /// Insertion order
    order: Vec<RootIndex>,
    keys: HashMap<RootKey, RootIndex>,
    dpi: f64,
    pixel_size: f64,
    next_auto_key: u32,
    pub metadata: ForestMetadata,
}

impl Default for RootForest {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl RootForest {
    pub fn new(dpi: f64) -> Self {
        Self {
            arena: Arena::new(),
            order: Vec::new(),
            keys: HashMap::new(),
            dpi,
            pixel_size: pixel_size_for(dpi),
            next_auto_key: 0,
            metadata: ForestMetadata::default(),
        }
    }

    /// Adds a primary root. Without an explicit key the next free key is used.
    #[instrument(level = "trace", skip(self, chain))]
    pub fn create_root(
        &mut self,
        id: &str,
        chain: NodeChain,
        key: Option<RootKey>,
    ) -> DomainResult<RootIndex> {
        let key = match key {
            Some(k) if self.keys.contains_key(&k) => return Err(DomainError::DuplicateKey(k)),
            Some(k) => {
                self.next_auto_key = self.next_auto_key.max(k.0.saturating_add(1));
                k
            }
            None => {
                while self.keys.contains_key(&RootKey(self.next_auto_key)) {
                    // key space exhausted
                    if self.next_auto_key == u32::MAX {
                        return Err(DomainError::DuplicateKey(RootKey(u32::MAX)));
                    }
                    self.next_auto_key += 1;
                }
                let k = RootKey(self.next_auto_key);
                self.next_auto_key = self.next_auto_key.saturating_add(1);
                k
            }
        };

        let id = if id.is_empty() { key.to_string() } else { id.to_string() };
        let mut root = Root::new(key, id, chain);
        root.set_dpi(self.dpi);

        let idx = self.arena.insert(root);
        self.order.push(idx);
        self.keys.insert(key, idx);
        Ok(idx)
    }

    /// Removes a root, detaching or cascading over its children.
    ///
    /// Returns the removed roots in removal order.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_root(&mut self, idx: RootIndex, policy: RemovalPolicy) -> DomainResult<Vec<Root>> {
        self.require(idx)?;
        let mut removed = Vec::new();

        self.detach(idx)?;
        match policy {
            RemovalPolicy::Detach => {
                for child in self.arena[idx].children.clone() {
                    self.detach(child)?;
                }
            }
            RemovalPolicy::Cascade => {
                // descendants first, so each removal sees an intact parent
                let subtree: Vec<RootIndex> = self.iter_postorder(idx).map(|(i, _)| i).collect();
                for i in subtree.into_iter().filter(|i| *i != idx) {
                    removed.extend(self.take(i));
                }
            }
        }
        removed.extend(self.take(idx));
        debug!("removed {} root(s)", removed.len());
        Ok(removed)
    }

    fn take(&mut self, idx: RootIndex) -> Option<Root> {
        let root = self.arena.remove(idx)?;
        self.order.retain(|i| *i != idx);
        self.keys.remove(&root.key());
        Some(root)
    }

    pub(crate) fn require(&self, idx: RootIndex) -> DomainResult<&Root> {
        self.arena
            .get(idx)
            .ok_or_else(|| DomainError::UnknownRoot(format!("{:?}", idx)))
    }

    pub fn get(&self, idx: RootIndex) -> Option<&Root> {
        self.arena.get(idx)
    }

    /// Mutable root access for chain edits and marks; topology stays with the forest.
    pub fn get_mut(&mut self, idx: RootIndex) -> Option<&mut Root> {
        self.arena.get_mut(idx)
    }

    pub(crate) fn root_mut(&mut self, idx: RootIndex) -> &mut Root {
        &mut self.arena[idx]
    }

    pub fn index_of(&self, key: RootKey) -> Option<RootIndex> {
        self.keys.get(&key).copied()
    }

    pub fn by_key(&self, key: RootKey) -> Option<&Root> {
        self.index_of(key).and_then(|i| self.arena.get(i))
    }

    /// Root at a position in insertion order.
    pub fn nth(&self, i: usize) -> Option<&Root> {
        self.order.get(i).and_then(|idx| self.arena.get(*idx))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drops every root and resets the key counter.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.order.clear();
        self.keys.clear();
        self.next_auto_key = 0;
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Sets the shared resolution and propagates it to every root.
    pub fn set_dpi(&mut self, dpi: f64) {
        self.dpi = dpi;
        self.pixel_size = pixel_size_for(dpi);
        for (_, root) in self.arena.iter_mut() {
            root.set_dpi(dpi);
        }
    }

    /// Rebuilds stale geometry on every chain.
    pub fn refresh(&mut self) {
        for (_, root) in self.arena.iter_mut() {
            root.refresh();
        }
    }

    /// Roots in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RootIndex, &Root)> + '_ {
        self.order.iter().filter_map(|i| self.arena.get(*i).map(|r| (*i, r)))
    }

    /// Roots without a parent, in insertion order.
    pub fn primaries(&self) -> impl Iterator<Item = (RootIndex, &Root)> + '_ {
        self.iter().filter(|(_, r)| r.parent.is_none())
    }

    /// Pre-order walk of the subtree rooted at `start`.
    pub fn iter_subtree(&self, start: RootIndex) -> SubtreeIterator<'_> {
        SubtreeIterator::new(self, start)
    }

    /// Post-order walk of the subtree rooted at `start`.
    pub fn iter_postorder(&self, start: RootIndex) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, start)
    }

    /// Root whose centerline passes closest to the first node of `idx`.
    ///
    /// Every node of every other root is compared, not only chain endpoints.
    /// Returns `None` for a single-root forest or a root without nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn closest_root(&self, idx: RootIndex) -> Option<RootIndex> {
        if self.len() <= 1 {
            return None;
        }
        let origin = self.get(idx)?.chain().first_node()?.point();

        let mut best: Option<(RootIndex, f64)> = None;
        for (other_idx, other) in self.iter() {
            if other_idx == idx {
                continue;
            }
            for node in other.chain().iter() {
                let d = node.point().distance_to(&origin);
                if best.map_or(true, |(_, min)| d < min) {
                    best = Some((other_idx, d));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Depth of the deepest branching path, 0 for an empty forest.
    pub fn depth(&self) -> usize {
        self.primaries()
            .map(|(i, _)| self.calculate_depth(i))
            .max()
            .unwrap_or(0)
    }

    fn calculate_depth(&self, idx: RootIndex) -> usize {
        if let Some(root) = self.get(idx) {
            1 + root
                .children
                .iter()
                .map(|&child| self.calculate_depth(child))
                .max()
                .unwrap_or(0)
        } else {
            0
        }
    }
}

pub struct SubtreeIterator<'a> {
    forest: &'a RootForest,
    stack: Vec<RootIndex>,
}

impl<'a> SubtreeIterator<'a> {
    fn new(forest: &'a RootForest, start: RootIndex) -> Self {
        Self {
            forest,
            stack: vec![start],
        }
    }
}

impl<'a> Iterator for SubtreeIterator<'a> {
    type Item = (RootIndex, &'a Root);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(root) = self.forest.get(current) {
                // Push children in reverse order for base-to-tip traversal
                for &child in root.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, root));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    forest: &'a RootForest,
    stack: Vec<(RootIndex, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(forest: &'a RootForest, start: RootIndex) -> Self {
        Self {
            forest,
            stack: vec![(start, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (RootIndex, &'a Root);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if let Some(root) = self.forest.get(current) {
                if !visited {
                    self.stack.push((current, true));
                    for &child in root.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current, root));
                }
            }
        }
        None
    }
}
