//! Read-only measurements over a [`RootForest`].
//!
//! Roots that fail [`Root::validate`] are skipped everywhere. Lengths and
//! diameters are reported in centimetres, angles in degrees.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::domain::geometry::polygon_area;
use crate::domain::{BoundingBox, HullProvider, Point, Root, RootForest, RootIndex, RootKey};

/// One row per valid root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootStats {
    pub key: RootKey,
    pub id: String,
    pub label: Option<String>,
    pub parent_key: Option<RootKey>,
    pub parent_id: Option<String>,
    pub length: f64,
    pub surface: f64,
    pub volume: f64,
    pub convex_hull_area: f64,
    pub diameter: f64,
    pub child_order: u32,
    pub po_accession: String,
    pub insertion_position: f64,
    pub insertion_angle: f64,
    pub child_count: usize,
    pub child_density: f64,
    pub first_child: Option<RootKey>,
    pub first_child_position: Option<f64>,
    pub last_child: Option<RootKey>,
    pub last_child_position: Option<f64>,
    pub node_count: usize,
}

/// One row per node of every valid root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub root_key: RootKey,
    pub root_id: String,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub diameter: f64,
    pub distance_from_base: f64,
    pub distance_from_apex: f64,
    pub child_order: u32,
    pub po_accession: String,
}

/// Kind of row in the marks export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkRow {
    /// Base of the root
    Origin,
    Mark,
    /// Tip of the root, position is the root length
    Length,
}

/// One row of the marks export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkRecord {
    pub row: MarkRow,
    /// Image the row refers to; foreign marks name their own image
    pub source: Option<String>,
    pub root_key: RootKey,
    pub root_id: String,
    pub mark_type: String,
    pub position_from_base: f64,
    pub diameter: f64,
    pub angle: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub child_order: u32,
    pub po_accession: String,
    /// Mark value, or the interval length in cm for twin-position marks
    pub value: String,
}

/// Whole-image summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestStats {
    pub root_count: usize,
    pub total_length: f64,
    pub convex_hull_area: f64,
    pub primary_count: usize,
    pub primary_total_length: f64,
    pub primary_mean_length: f64,
    pub primary_mean_diameter: f64,
    pub lateral_mean_density: f64,
    pub lateral_count: usize,
    pub lateral_total_length: f64,
    pub lateral_mean_length: f64,
    pub lateral_mean_diameter: f64,
    pub lateral_mean_insertion_angle: f64,
    pub mean_inter_branch: f64,
    pub primary_node_count: usize,
    pub lateral_node_count: usize,
    pub extent: Option<BoundingBox>,
    pub center: Option<Point>,
    /// Hull polygon in pixel units
    pub hull: Vec<Point>,
}

/// Ordered samples of one root for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSamples {
    pub key: RootKey,
    pub child_order: u32,
    /// `(x, y, diameter)` in pixel units, base first
    pub samples: Vec<(f64, f64, f64)>,
}

/// Computes report rows; the convex hull is delegated to `hull`.
pub struct StatisticsEngine<'a> {
    forest: &'a RootForest,
    hull: &'a dyn HullProvider,
}

impl<'a> StatisticsEngine<'a> {
    pub fn new(forest: &'a RootForest, hull: &'a dyn HullProvider) -> Self {
        Self { forest, hull }
    }

    fn valid_roots(&self) -> impl Iterator<Item = (RootIndex, &'a Root)> + 'a {
        self.forest.iter().filter(|(_, r)| r.validate())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn root_stats(&self) -> Vec<RootStats> {
        self.valid_roots().map(|(idx, r)| self.stats_for(idx, r)).collect()
    }

    fn stats_for(&self, idx: RootIndex, r: &Root) -> RootStats {
        let parent = r.parent().and_then(|p| self.forest.get(p));
        let first = self.forest.first_child(idx).and_then(|c| self.forest.get(c));
        let last = self.forest.last_child(idx).and_then(|c| self.forest.get(c));

        RootStats {
            key: r.key(),
            id: r.id().to_string(),
            label: r.label.clone(),
            parent_key: parent.map(Root::key),
            parent_id: parent.map(|p| p.id().to_string()),
            length: r.l_pos_pixels_to_cm(r.root_length()),
            surface: r.surface(),
            volume: r.volume(),
            convex_hull_area: self.subtree_hull_area(idx),
            diameter: r.l_pos_pixels_to_cm(r.avg_diameter()),
            child_order: r.child_order(),
            po_accession: r.po_accession.clone(),
            insertion_position: r.l_pos_pixels_to_cm(r.distance_from_base()),
            insertion_angle: r.insertion().map(|i| i.angle_degrees()).unwrap_or(0.0),
            child_count: r.child_count(),
            child_density: self.forest.child_density(idx),
            first_child: first.map(Root::key),
            first_child_position: first.map(|c| r.l_pos_pixels_to_cm(c.distance_from_base())),
            last_child: last.map(Root::key),
            last_child_position: last.map(|c| r.l_pos_pixels_to_cm(c.distance_from_base())),
            node_count: r.chain().len(),
        }
    }

    /// Hull area of a root together with its descendants, cm².
    pub fn subtree_hull_area(&self, idx: RootIndex) -> f64 {
        let points: Vec<Point> = self
            .forest
            .iter_subtree(idx)
            .filter(|(_, r)| r.validate())
            .flat_map(|(_, r)| r.chain().points())
            .collect();
        self.hull_area(&points)
    }

    fn hull_area(&self, points: &[Point]) -> f64 {
        if points.len() < 3 {
            return 0.0;
        }
        let ps = self.forest.pixel_size();
        polygon_area(&self.hull.convex_hull(points)) * ps * ps
    }

    #[instrument(level = "debug", skip(self))]
    pub fn node_records(&self) -> Vec<NodeRecord> {
        let ps = self.forest.pixel_size();
        self.valid_roots()
            .flat_map(|(_, r)| {
                let total = r.root_length();
                r.chain().iter().map(move |n| NodeRecord {
                    root_key: r.key(),
                    root_id: r.id().to_string(),
                    x: n.x * ps,
                    y: n.y * ps,
                    theta: n.theta,
                    diameter: n.diameter * ps,
                    distance_from_base: n.c_length * ps,
                    distance_from_apex: (total - n.c_length) * ps,
                    child_order: r.child_order(),
                    po_accession: r.po_accession.clone(),
                })
            })
            .collect()
    }

    /// Origin row, one row per mark, then a Length row, for every valid root.
    #[instrument(level = "debug", skip(self))]
    pub fn mark_records(&self) -> Vec<MarkRecord> {
        let ps = self.forest.pixel_size();
        let image = self.forest.metadata.image.clone();
        let mut rows = Vec::new();

        for (_, r) in self.valid_roots() {
            let row = |kind: MarkRow, mark_type: &str, position: f64, at: Option<Point>| MarkRecord {
                row: kind,
                source: image.clone(),
                root_key: r.key(),
                root_id: r.id().to_string(),
                mark_type: mark_type.to_string(),
                position_from_base: position,
                diameter: 0.0,
                angle: 0.0,
                x: at.map(|p| p.x * ps),
                y: at.map(|p| p.y * ps),
                child_order: r.child_order(),
                po_accession: r.po_accession.clone(),
                value: String::new(),
            };

            rows.push(row(MarkRow::Origin, "Origin", 0.0, r.chain().first_node().map(|n| n.point())));

            for m in r.marks() {
                let mut record = row(
                    MarkRow::Mark,
                    m.kind.name(),
                    r.l_pos_pixels_to_cm(m.position),
                    point_at_length(r, m.position),
                );
                if m.is_foreign() {
                    record.source = m.foreign_image.clone();
                }
                record.diameter = m.diameter * ps;
                record.angle = m.angle;
                record.value = match (m.kind.needs_twin_position(), m.twin_position) {
                    (true, Some(twin)) => ((twin - m.position) * ps).to_string(),
                    _ => m.value.clone(),
                };
                rows.push(record);
            }

            rows.push(row(
                MarkRow::Length,
                "Length",
                r.l_pos_pixels_to_cm(r.root_length()),
                r.chain().last_node().map(|n| n.point()),
            ));
        }
        rows
    }

    #[instrument(level = "debug", skip(self))]
    pub fn forest_stats(&self) -> ForestStats {
        let ps = self.forest.pixel_size();
        let roots: Vec<(RootIndex, &Root)> = self.valid_roots().collect();
        let (primaries, laterals): (Vec<_>, Vec<_>) = roots.iter().partition(|(_, r)| r.is_primary());

        let length_cm = |r: &Root| r.root_length() * ps;

        let primary_total_length: f64 = primaries.iter().map(|(_, r)| length_cm(r)).sum();
        let lateral_total_length: f64 = laterals.iter().map(|(_, r)| length_cm(r)).sum();

        let points: Vec<Point> = roots.iter().flat_map(|(_, r)| r.chain().points()).collect();
        let hull = if points.len() >= 3 {
            self.hull.convex_hull(&points)
        } else {
            Vec::new()
        };
        let extent = BoundingBox::from_points(&points);

        ForestStats {
            root_count: roots.len(),
            total_length: primary_total_length + lateral_total_length,
            convex_hull_area: polygon_area(&hull) * ps * ps,
            primary_count: primaries.len(),
            primary_total_length,
            primary_mean_length: mean("primary length", primaries.iter().map(|(_, r)| length_cm(r))),
            primary_mean_diameter: mean(
                "primary diameter",
                primaries.iter().flat_map(|(_, r)| r.chain().iter().map(move |n| n.diameter * ps)),
            ),
            lateral_mean_density: mean(
                "lateral density",
                roots
                    .iter()
                    .map(|(i, _)| self.forest.child_density(*i))
                    .filter(|d| *d != 0.0),
            ),
            lateral_count: laterals.len(),
            lateral_total_length,
            lateral_mean_length: mean("lateral length", laterals.iter().map(|(_, r)| length_cm(r))),
            lateral_mean_diameter: mean(
                "lateral diameter",
                laterals.iter().flat_map(|(_, r)| r.chain().iter().map(move |n| n.diameter * ps)),
            ),
            lateral_mean_insertion_angle: mean(
                "lateral insertion angle",
                laterals
                    .iter()
                    .filter_map(|(_, r)| r.insertion().map(|i| i.angle_degrees())),
            ),
            mean_inter_branch: mean(
                "inter-branch distance",
                roots
                    .iter()
                    .filter(|(_, r)| r.child_count() >= 2)
                    .map(|(i, _)| self.forest.inter_branch(*i) * ps),
            ),
            primary_node_count: primaries.iter().map(|(_, r)| r.chain().len()).sum(),
            lateral_node_count: laterals.iter().map(|(_, r)| r.chain().len()).sum(),
            center: extent.as_ref().map(BoundingBox::center),
            extent,
            hull,
        }
    }

    /// Samples of every valid root in forest order.
    pub fn render_samples(&self) -> Vec<RenderSamples> {
        self.valid_roots()
            .map(|(_, r)| RenderSamples {
                key: r.key(),
                child_order: r.child_order(),
                samples: r.chain().iter().map(|n| (n.x, n.y, n.diameter)).collect(),
            })
            .collect()
    }
}

/// Mean of `values`, 0 for an empty set.
fn mean(what: &str, values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        debug!("no values for mean {}, using 0", what);
        return 0.0;
    }
    sum / n as f64
}

/// Position on the centerline at arc length `l`, interpolated between nodes.
fn point_at_length(root: &Root, l: f64) -> Option<Point> {
    let chain = root.chain();
    if l > root.root_length() + chain.first_node()?.c_length {
        return None;
    }
    let node = chain.get(chain.node_at_length(l)?)?;
    let Some(next) = node.next().and_then(|n| chain.get(n)) else {
        return Some(node.point());
    };
    if node.length <= 0.0 {
        return Some(node.point());
    }
    let t = ((l - node.c_length) / node.length).clamp(0.0, 1.0);
    Some(Point::new(
        node.x + (next.x - node.x) * t,
        node.y + (next.y - node.y) * t,
    ))
}
