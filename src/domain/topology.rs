//! Parent/child branching operations on a [`RootForest`].
//!
//! Every attachment walks the ancestors of the prospective parent first, so the
//! forest stays acyclic no matter which entry point performs the mutation.

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::forest::{RootForest, RootIndex};
use crate::domain::geometry::angle_between;
use crate::domain::root::{Insertion, Root};

impl RootForest {
    /// Makes `child` a branch of `parent`.
    ///
    /// Without an explicit `insertion` it is derived from the geometry of both
    /// chains (see [`RootForest::derive_insertion`]). A child that already has a
    /// parent is re-parented. The child order of the child's subtree is raised
    /// where needed so that every child ranks above its parent.
    ///
    /// # Errors
    /// * [`DomainError::SelfAttachment`] when `child == parent`
    /// * [`DomainError::Cycle`] when `child` is an ancestor of `parent`
    /// * [`DomainError::UnknownRoot`] when either index is stale
    ///
    /// The forest is unchanged on error.
    #[instrument(level = "debug", skip(self))]
    pub fn attach_child(
        &mut self,
        parent: RootIndex,
        child: RootIndex,
        insertion: Option<Insertion>,
    ) -> DomainResult<()> {
        let parent_key = self.require(parent)?.key();
        let child_key = self.require(child)?.key();

        if parent == child {
            return Err(DomainError::SelfAttachment(child_key));
        }
        if self.is_ancestor(child, parent) {
            return Err(DomainError::Cycle {
                parent: parent_key,
                child: child_key,
            });
        }

        let insertion = match insertion {
            Some(i) => i,
            None => self.derive_insertion(parent, child)?,
        };

        let old_parent = self.require(child)?.parent;
        if let Some(old_parent) = old_parent {
            self.root_mut(old_parent).children.retain(|c| *c != child);
        }

        self.root_mut(parent).children.push(child);
        let c = self.root_mut(child);
        c.parent = Some(parent);
        c.insertion = Some(insertion);
        self.propagate_order(child);

        debug!(
            "attached {} to {} at {:.2}px",
            child_key, parent_key, insertion.distance_from_base
        );
        Ok(())
    }

    /// Same as [`RootForest::attach_child`] with arguments from the child's side.
    pub fn attach_parent(
        &mut self,
        child: RootIndex,
        parent: RootIndex,
        insertion: Option<Insertion>,
    ) -> DomainResult<()> {
        self.attach_child(parent, child, insertion)
    }

    /// Cuts `child` loose from its parent; it becomes a primary root.
    pub fn detach(&mut self, child: RootIndex) -> DomainResult<()> {
        let Some(parent) = self.require(child)?.parent else {
            return Ok(());
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        let c = self.root_mut(child);
        c.parent = None;
        c.insertion = None;
        c.set_child_order(0);
        Ok(())
    }

    /// True when `ancestor` is `idx` itself or lies on its parent path.
    pub fn is_ancestor(&self, ancestor: RootIndex, idx: RootIndex) -> bool {
        self.ancestors(idx).any(|a| a == ancestor) || ancestor == idx
    }

    /// Parent path of `idx`, nearest first.
    pub fn ancestors(&self, idx: RootIndex) -> impl Iterator<Item = RootIndex> + '_ {
        let mut cursor = self.get(idx).and_then(|r| r.parent);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.get(current).and_then(|r| r.parent);
            Some(current)
        })
    }

    /// Stored branching order of a root.
    pub fn child_order(&self, idx: RootIndex) -> Option<u32> {
        self.get(idx).map(Root::child_order)
    }

    /// Insertion of `child` on `parent` from geometry.
    ///
    /// The child's first node is projected onto the nearest parent segment; the
    /// arc length is interpolated along that segment and the angle is measured
    /// between the segment direction and the child's initial direction.
    pub fn derive_insertion(&self, parent: RootIndex, child: RootIndex) -> DomainResult<Insertion> {
        let p = self.require(parent)?;
        let c = self.require(child)?;

        let projected = c.chain().first_node().and_then(|base| {
            let (idx, t) = p.chain().project(&base.point())?;
            let node = p.chain().get(idx)?;
            Some((node.c_length + t * node.length, node.theta, base.theta))
        });
        let Some((distance_from_base, parent_theta, child_theta)) = projected else {
            return Ok(Insertion {
                distance_from_base: 0.0,
                angle: 0.0,
            });
        };

        Ok(Insertion {
            distance_from_base,
            angle: angle_between(parent_theta, child_theta),
        })
    }

    /// Insertion for a known arc length on the parent, angle from geometry.
    pub fn insertion_at(&self, parent: RootIndex, child: RootIndex, distance_from_base: f64) -> DomainResult<Insertion> {
        let p = self.require(parent)?;
        let c = self.require(child)?;
        let parent_theta = p
            .chain()
            .node_at_length(distance_from_base)
            .and_then(|i| p.chain().get(i))
            .map(|n| n.theta)
            .unwrap_or(0.0);
        let child_theta = c.chain().first_node().map(|n| n.theta).unwrap_or(0.0);
        Ok(Insertion {
            distance_from_base,
            angle: angle_between(parent_theta, child_theta),
        })
    }

    fn propagate_order(&mut self, start: RootIndex) {
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            let Some(parent_order) = self
                .get(idx)
                .and_then(|r| r.parent)
                .and_then(|p| self.get(p))
                .map(Root::child_order)
            else {
                continue;
            };
            let root = self.root_mut(idx);
            if root.child_order() <= parent_order {
                root.set_child_order(parent_order + 1);
            }
            stack.extend(root.children.iter().copied());
        }
    }

    /// Child with the smallest insertion position.
    pub fn first_child(&self, idx: RootIndex) -> Option<RootIndex> {
        self.children_by_position(idx).into_iter().next()
    }

    /// Child with the largest insertion position.
    pub fn last_child(&self, idx: RootIndex) -> Option<RootIndex> {
        self.children_by_position(idx).into_iter().last()
    }

    fn children_by_position(&self, idx: RootIndex) -> Vec<RootIndex> {
        let Some(root) = self.get(idx) else {
            return Vec::new();
        };
        root.children()
            .iter()
            .filter_map(|c| self.get(*c).map(|r| (*c, r.distance_from_base())))
            .sorted_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(c, _)| c)
            .collect()
    }

    /// Children per centimetre over the branched zone of the root.
    ///
    /// The branched zone runs from the first to the last insertion; fewer than two
    /// children or a zero-length zone give 0.
    pub fn child_density(&self, idx: RootIndex) -> f64 {
        let Some(root) = self.get(idx) else {
            return 0.0;
        };
        let span = self.branched_zone(idx);
        let span_cm = root.l_pos_pixels_to_cm(span);
        if root.child_count() < 2 || span_cm <= 0.0 {
            return 0.0;
        }
        root.child_count() as f64 / span_cm
    }

    /// Mean spacing between consecutive insertions along the root, pixel units.
    ///
    /// 0 when the root has fewer than two children.
    pub fn inter_branch(&self, idx: RootIndex) -> f64 {
        let Some(root) = self.get(idx) else {
            return 0.0;
        };
        if root.child_count() < 2 {
            return 0.0;
        }
        self.branched_zone(idx) / (root.child_count() - 1) as f64
    }

    fn branched_zone(&self, idx: RootIndex) -> f64 {
        match (self.first_child(idx), self.last_child(idx)) {
            (Some(f), Some(l)) => {
                let first = self.get(f).map(Root::distance_from_base).unwrap_or(0.0);
                let last = self.get(l).map(Root::distance_from_base).unwrap_or(0.0);
                last - first
            }
            _ => 0.0,
        }
    }
}
