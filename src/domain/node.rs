use generational_arena::{Arena, Index};
use std::fmt;
use tracing::instrument;

use crate::domain::geometry::{norm, vect_to_theta, Point};

/// Handle of a node inside its owning [`NodeChain`].
pub type NodeIndex = Index;

/// Smallest diameter a node may carry once its geometry is built.
pub const MIN_DIAMETER: f64 = 1.0;

/// Border-crossing flags maintained by downstream border detection.
///
/// The model never interprets these; they are carried through copies unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorderCrossing {
    pub b_cross_01: bool,
    pub b_cross_23: bool,
    pub p_cross_01: bool,
    pub p_cross_23: bool,
}

/// Sample point on a root centerline.
#[derive(Debug, Clone)]
pub struct Node {
    /// Position in pixel units
    pub x: f64,
    pub y: f64,
    /// Diameter in pixel units
    pub diameter: f64,
    /// Direction toward the next node, radians in `[0, 2π)`
    pub theta: f64,
    /// Length of the segment toward the next node
    pub length: f64,
    /// Cumulative arc length from the base of the root
    pub c_length: f64,
    /// Derived fields are stale
    pub needs_refresh: bool,
    pub crossing: BorderCrossing,
    prev: Option<NodeIndex>,
    next: Option<NodeIndex>,
}

impl Node {
    fn new(x: f64, y: f64, diameter: f64) -> Self {
        Self {
            x,
            y,
            diameter,
            theta: 0.0,
            length: 0.0,
            c_length: 0.0,
            needs_refresh: true,
            crossing: BorderCrossing::default(),
            prev: None,
            next: None,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn prev(&self) -> Option<NodeIndex> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeIndex> {
        self.next
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}) d={:.2}", self.x, self.y, self.diameter)
    }
}

/// Doubly linked, position-ordered sequence of nodes describing one centerline.
///
/// Nodes live in a generational arena; links are explicit indices so a chain can
/// be spliced without shared ownership. Stale indices simply resolve to `None`.
#[derive(Debug, Clone, Default)]
pub struct NodeChain {
    arena: Arena<Node>,
    first: Option<NodeIndex>,
    last: Option<NodeIndex>,
}

impl NodeChain {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            first: None,
            last: None,
        }
    }

    /// Builds a chain from `(x, y, diameter)` samples, base first, with geometry.
    pub fn from_samples(samples: impl IntoIterator<Item = (f64, f64, f64)>) -> Self {
        let mut chain = Self::new();
        for (x, y, d) in samples {
            chain.push_back(x, y, Some(d));
        }
        chain.refresh();
        chain
    }

    /// Creates a node and links it next to `neighbor`.
    ///
    /// With `insert_after` the node becomes the next of `neighbor`, otherwise its
    /// previous; the neighbour's former link on that side is spliced behind the new
    /// node. Without a neighbour (or a stale one) the node is linked at the tip of
    /// the chain. The diameter defaults to 0 and is only clamped by
    /// [`NodeChain::build_geometry`].
    #[instrument(level = "trace", skip(self))]
    pub fn create_node(
        &mut self,
        x: f64,
        y: f64,
        diameter: Option<f64>,
        neighbor: Option<NodeIndex>,
        insert_after: bool,
    ) -> NodeIndex {
        let idx = self.arena.insert(Node::new(x, y, diameter.unwrap_or(0.0)));

        let neighbor = neighbor.filter(|n| self.arena.contains(*n));
        match neighbor {
            Some(n) if insert_after => {
                let old_next = self.arena[n].next;
                self.arena[n].next = Some(idx);
                self.arena[n].needs_refresh = true;
                self.arena[idx].prev = Some(n);
                self.arena[idx].next = old_next;
                match old_next {
                    Some(o) => {
                        self.arena[o].prev = Some(idx);
                        self.arena[o].needs_refresh = true;
                    }
                    None => self.last = Some(idx),
                }
            }
            Some(n) => {
                let old_prev = self.arena[n].prev;
                self.arena[n].prev = Some(idx);
                self.arena[n].needs_refresh = true;
                self.arena[idx].next = Some(n);
                self.arena[idx].prev = old_prev;
                match old_prev {
                    Some(o) => {
                        self.arena[o].next = Some(idx);
                        self.arena[o].needs_refresh = true;
                    }
                    None => self.first = Some(idx),
                }
            }
            None => match self.last {
                Some(tail) => {
                    self.arena[tail].next = Some(idx);
                    self.arena[tail].needs_refresh = true;
                    self.arena[idx].prev = Some(tail);
                    self.last = Some(idx);
                }
                None => {
                    self.first = Some(idx);
                    self.last = Some(idx);
                }
            },
        }
        idx
    }

    /// Appends a node at the tip.
    pub fn push_back(&mut self, x: f64, y: f64, diameter: Option<f64>) -> NodeIndex {
        let tail = self.last;
        self.create_node(x, y, diameter, tail, true)
    }

    /// Splices a node out of the chain, relinking its neighbours.
    #[instrument(level = "trace", skip(self))]
    pub fn remove(&mut self, idx: NodeIndex) -> Option<Node> {
        let node = self.arena.remove(idx)?;
        match node.prev {
            Some(p) => {
                self.arena[p].next = node.next;
                self.arena[p].needs_refresh = true;
            }
            None => {
                // the new base carries the chain's start value
                self.first = node.next;
                if let Some(n) = node.next {
                    self.arena[n].c_length = node.c_length;
                }
            }
        }
        match node.next {
            Some(n) => {
                self.arena[n].prev = node.prev;
                self.arena[n].needs_refresh = true;
            }
            None => self.last = node.prev,
        }
        Some(node)
    }

    /// Recomputes direction and segment length on `idx`'s previous neighbour and
    /// on `idx` itself, clamping the diameter to [`MIN_DIAMETER`].
    #[instrument(level = "trace", skip(self))]
    pub fn build_geometry(&mut self, idx: NodeIndex) {
        let Some(node) = self.arena.get(idx) else {
            return;
        };
        let (x, y, prev, next) = (node.x, node.y, node.prev, node.next);

        if let Some(p) = prev {
            let parent = &mut self.arena[p];
            let (dx, dy) = (x - parent.x, y - parent.y);
            parent.theta = vect_to_theta(dx, dy);
            parent.length = norm(dx, dy);
        }

        let (theta, length) = match next {
            Some(n) => {
                let child = &self.arena[n];
                let (dx, dy) = (child.x - x, child.y - y);
                (vect_to_theta(dx, dy), norm(dx, dy))
            }
            None => (0.0, 0.0),
        };

        let node = &mut self.arena[idx];
        if node.diameter < MIN_DIAMETER {
            node.diameter = MIN_DIAMETER;
        }
        node.theta = theta;
        node.length = length;
        node.needs_refresh = false;
    }

    /// Sets every node's cumulative length to the running sum of the preceding
    /// segment lengths, starting at `start_value` on the first node.
    #[instrument(level = "trace", skip(self))]
    pub fn accumulate_length(&mut self, start_value: f64) {
        let mut running = start_value;
        let mut cursor = self.first;
        while let Some(idx) = cursor {
            let node = &mut self.arena[idx];
            node.c_length = running;
            running += node.length;
            cursor = node.next;
        }
    }

    /// Rebuilds every stale node, then re-accumulates arc lengths from the current
    /// start value of the first node.
    #[instrument(level = "trace", skip(self))]
    pub fn refresh(&mut self) {
        let stale: Vec<NodeIndex> = self.indices().filter(|i| self.arena[*i].needs_refresh).collect();
        for idx in stale {
            self.build_geometry(idx);
        }
        let start = self.first.map(|f| self.arena[f].c_length).unwrap_or(0.0);
        self.accumulate_length(start);
    }

    /// Arc length walking from `a` toward the tip until `b`.
    ///
    /// Returns 0 when `b` cannot be reached from `a` in that direction.
    pub fn distance_between(&self, a: NodeIndex, b: NodeIndex) -> f64 {
        let mut d = 0.0;
        let mut cursor = Some(a);
        while let Some(idx) = cursor {
            if idx == b {
                return d;
            }
            let Some(node) = self.arena.get(idx) else {
                return 0.0;
            };
            let Some(next) = node.next.and_then(|n| self.arena.get(n)) else {
                return 0.0;
            };
            d += norm(next.x - node.x, next.y - node.y);
            cursor = node.next;
        }
        0.0
    }

    /// Shifts a node and flags it and both neighbours for recompute.
    pub fn translate(&mut self, idx: NodeIndex, dx: f64, dy: f64) {
        let Some(node) = self.arena.get_mut(idx) else {
            return;
        };
        node.x += dx;
        node.y += dy;
        node.needs_refresh = true;
        let (prev, next) = (node.prev, node.next);
        self.mark_dirty(prev);
        self.mark_dirty(next);
    }

    /// Overwrites the geometric fields of `target` with those of `source`.
    pub fn copy_into(&mut self, target: NodeIndex, source: &Node) {
        let Some(node) = self.arena.get_mut(target) else {
            return;
        };
        node.x = source.x;
        node.y = source.y;
        node.theta = source.theta;
        node.length = source.length;
        node.c_length = source.c_length;
        node.diameter = source.diameter;
        node.needs_refresh = true;
        let (prev, next) = (node.prev, node.next);
        self.mark_dirty(prev);
        self.mark_dirty(next);
    }

    fn mark_dirty(&mut self, idx: Option<NodeIndex>) {
        if let Some(node) = idx.and_then(|i| self.arena.get_mut(i)) {
            node.needs_refresh = true;
        }
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: NodeIndex) -> Option<&mut Node> {
        self.arena.get_mut(idx)
    }

    pub fn first(&self) -> Option<NodeIndex> {
        self.first
    }

    pub fn last(&self) -> Option<NodeIndex> {
        self.last
    }

    pub fn first_node(&self) -> Option<&Node> {
        self.first.and_then(|i| self.arena.get(i))
    }

    pub fn last_node(&self) -> Option<&Node> {
        self.last.and_then(|i| self.arena.get(i))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// True when no node carries stale geometry.
    pub fn is_consistent(&self) -> bool {
        self.arena.iter().all(|(_, n)| !n.needs_refresh)
    }

    /// Sum of all segment lengths.
    pub fn total_length(&self) -> f64 {
        self.iter().map(|n| n.length).sum()
    }

    /// Nodes base → tip.
    pub fn iter(&self) -> ChainIterator<'_> {
        ChainIterator {
            chain: self,
            cursor: self.first,
        }
    }

    /// Node indices base → tip.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        let mut cursor = self.first;
        std::iter::from_fn(move || {
            let idx = cursor?;
            cursor = self.arena.get(idx).and_then(|n| n.next);
            Some(idx)
        })
    }

    pub fn points(&self) -> Vec<Point> {
        self.iter().map(Node::point).collect()
    }

    /// Node closest to `p` and its distance, scanning the whole chain.
    pub fn nearest_to(&self, p: &Point) -> Option<(NodeIndex, f64)> {
        self.indices()
            .map(|i| (i, self.arena[i].point().distance_to(p)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Closest point to `p` on any segment of the chain.
    ///
    /// Returns the segment's start node and the clamped fraction along it. A
    /// chain of one node projects onto that node.
    pub fn project(&self, p: &Point) -> Option<(NodeIndex, f64)> {
        let first = self.first?;
        let mut best = (first, 0.0, self.arena[first].point().distance_to(p));
        for idx in self.indices() {
            let node = &self.arena[idx];
            let Some(next) = node.next.map(|n| &self.arena[n]) else {
                continue;
            };
            let (dx, dy) = (next.x - node.x, next.y - node.y);
            let len2 = dx * dx + dy * dy;
            let t = if len2 > 0.0 {
                (((p.x - node.x) * dx + (p.y - node.y) * dy) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let d = Point::new(node.x + t * dx, node.y + t * dy).distance_to(p);
            if d < best.2 {
                best = (idx, t, d);
            }
        }
        Some((best.0, best.1))
    }

    /// Last node whose cumulative length does not exceed `arc_length`.
    pub fn node_at_length(&self, arc_length: f64) -> Option<NodeIndex> {
        let mut found = self.first;
        for idx in self.indices() {
            if self.arena[idx].c_length <= arc_length {
                found = Some(idx);
            } else {
                break;
            }
        }
        found
    }
}

pub struct ChainIterator<'a> {
    chain: &'a NodeChain,
    cursor: Option<NodeIndex>,
}

impl<'a> Iterator for ChainIterator<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.chain.arena.get(self.cursor?)?;
        self.cursor = node.next;
        Some(node)
    }
}
