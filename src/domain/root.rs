//! Roots: one centerline plus identity, annotations and branching metadata.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::forest::RootIndex;
use crate::domain::node::{NodeChain, NodeIndex};

/// Stable integer key of a root within its forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RootKey(pub u32);

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plant Ontology root terms, accession and display name.
pub const ONTOLOGY: [(&str, &str); 6] = [
    ("PO:0009005", "Root"),
    ("PO:0020127", "Primary root"),
    ("PO:0020121", "Lateral root"),
    ("PO:0025002", "Basal root"),
    ("PO:0003005", "Nodal root"),
    ("PO:0000043", "Crown root"),
];

pub const PRIMARY_ROOT_ACCESSION: &str = "PO:0020127";
pub const LATERAL_ROOT_ACCESSION: &str = "PO:0020121";

/// Default accession for a branching order.
pub fn default_accession(child_order: u32) -> &'static str {
    if child_order == 0 {
        PRIMARY_ROOT_ACCESSION
    } else {
        LATERAL_ROOT_ACCESSION
    }
}

/// Display name of an accession; unknown terms fall back to the generic "Root".
pub fn ontology_label(accession: &str) -> &'static str {
    ONTOLOGY
        .iter()
        .find(|(po, _)| *po == accession)
        .map(|(_, name)| *name)
        .unwrap_or(ONTOLOGY[0].1)
}

/// Kind of point annotation placed on a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarkType {
    Anchor,
    Number,
    Interval,
    FreeText,
    Length,
    Diameter,
    Measure,
    Other(String),
}

impl MarkType {
    /// Marks spanning two positions along the root.
    pub fn needs_twin_position(&self) -> bool {
        matches!(self, MarkType::Interval | MarkType::Length | MarkType::Measure)
    }

    pub fn name(&self) -> &str {
        match self {
            MarkType::Anchor => "Anchor",
            MarkType::Number => "Number",
            MarkType::Interval => "Interval",
            MarkType::FreeText => "Free Text",
            MarkType::Length => "Length",
            MarkType::Diameter => "Diameter",
            MarkType::Measure => "Measure",
            MarkType::Other(s) => s,
        }
    }
}

impl FromStr for MarkType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        Ok(match normalized.as_str() {
            "anchor" => MarkType::Anchor,
            "number" => MarkType::Number,
            "interval" => MarkType::Interval,
            "freetext" | "text" => MarkType::FreeText,
            "length" => MarkType::Length,
            "diameter" => MarkType::Diameter,
            "measure" => MarkType::Measure,
            _ => MarkType::Other(s.trim().to_string()),
        })
    }
}

/// Point annotation at an arc length along a root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mark {
    pub kind: MarkType,
    /// Arc length from the base, pixel units
    pub position: f64,
    pub value: String,
    /// Local diameter, pixel units
    pub diameter: f64,
    pub angle: f64,
    /// Second position of interval-like marks
    pub twin_position: Option<f64>,
    /// Image the mark was placed on, when not the root's own image
    pub foreign_image: Option<String>,
}

impl Mark {
    pub fn new(kind: MarkType, position: f64, value: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            value: value.into(),
            diameter: 0.0,
            angle: 0.0,
            twin_position: None,
            foreign_image: None,
        }
    }

    pub fn is_foreign(&self) -> bool {
        self.foreign_image.is_some()
    }
}

/// Where a child root attaches to its parent's centerline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Insertion {
    /// Arc length along the parent, pixel units
    pub distance_from_base: f64,
    /// Angle between parent and child directions, radians in `[0, π]`
    pub angle: f64,
}

impl Insertion {
    pub fn angle_degrees(&self) -> f64 {
        self.angle * (180.0 / PI)
    }
}

/// One root: a node chain plus identity, marks and branching metadata.
///
/// Parent and child links are indices into the owning forest and are only
/// changed through the forest's topology operations.
#[derive(Debug, Clone)]
pub struct Root {
    key: RootKey,
    id: String,
    pub label: Option<String>,
    child_order: u32,
    pub po_accession: String,
    pub origin: String,
    chain: NodeChain,
    marks: Vec<Mark>,
    dpi: f64,
    pixel_size: f64,
    pub(crate) parent: Option<RootIndex>,
    pub(crate) children: Vec<RootIndex>,
    pub(crate) insertion: Option<Insertion>,
}

impl Root {
    pub(crate) fn new(key: RootKey, id: impl Into<String>, chain: NodeChain) -> Self {
        Self {
            key,
            id: id.into(),
            label: None,
            child_order: 0,
            po_accession: default_accession(0).to_string(),
            origin: String::new(),
            chain,
            marks: Vec::new(),
            dpi: 0.0,
            pixel_size: 0.0,
            parent: None,
            children: Vec::new(),
            insertion: None,
        }
    }

    pub fn key(&self) -> RootKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Branching order: 0 for primary roots, parent order + 1 or more otherwise.
    pub fn child_order(&self) -> u32 {
        self.child_order
    }

    pub(crate) fn set_child_order(&mut self, order: u32) {
        if self.po_accession == default_accession(self.child_order) {
            self.po_accession = default_accession(order).to_string();
        }
        self.child_order = order;
    }

    pub fn is_primary(&self) -> bool {
        self.child_order == 0
    }

    pub fn ontology_label(&self) -> &'static str {
        ontology_label(&self.po_accession)
    }

    pub fn chain(&self) -> &NodeChain {
        &self.chain
    }

    /// Mutable access to the chain; callers must [`Root::refresh`] before reading
    /// derived geometry again.
    pub fn chain_mut(&mut self) -> &mut NodeChain {
        &mut self.chain
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn add_mark(&mut self, mark: Mark) {
        self.marks.push(mark);
    }

    pub fn parent(&self) -> Option<RootIndex> {
        self.parent
    }

    pub fn children(&self) -> &[RootIndex] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn insertion(&self) -> Option<Insertion> {
        self.insertion
    }

    /// Arc length of the insertion point on the parent, 0 for primary roots.
    pub fn distance_from_base(&self) -> f64 {
        self.insertion.map(|i| i.distance_from_base).unwrap_or(0.0)
    }

    /// Insertion angle in radians, 0 for primary roots.
    pub fn insertion_angle(&self) -> f64 {
        self.insertion.map(|i| i.angle).unwrap_or(0.0)
    }

    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    pub fn pixel_size(&self) -> f64 {
        self.pixel_size
    }

    /// Sets the resolution; an unresolved (zero) dpi yields a zero pixel size.
    pub fn set_dpi(&mut self, dpi: f64) {
        self.dpi = dpi;
        self.pixel_size = pixel_size_for(dpi);
    }

    /// Converts an arc length in pixels to centimetres.
    pub fn l_pos_pixels_to_cm(&self, l: f64) -> f64 {
        l * self.pixel_size
    }

    /// Rebuilds stale chain geometry.
    pub fn refresh(&mut self) {
        self.chain.refresh();
    }

    /// Moves a node and recomputes the chain.
    pub fn translate_node(&mut self, idx: NodeIndex, dx: f64, dy: f64) {
        self.chain.translate(idx, dx, dy);
        self.chain.refresh();
    }

    /// Appends a node at the tip and recomputes the chain.
    pub fn append_node(&mut self, x: f64, y: f64, diameter: Option<f64>) -> NodeIndex {
        let idx = self.chain.push_back(x, y, diameter);
        self.chain.refresh();
        idx
    }

    /// Removes a node and recomputes the chain.
    pub fn remove_node(&mut self, idx: NodeIndex) -> bool {
        let removed = self.chain.remove(idx).is_some();
        self.chain.refresh();
        removed
    }

    /// Total centerline length, pixel units.
    pub fn root_length(&self) -> f64 {
        self.chain.total_length()
    }

    /// Mean node diameter, pixel units; 0 for an empty chain.
    pub fn avg_diameter(&self) -> f64 {
        let n = self.chain.len();
        if n == 0 {
            return 0.0;
        }
        self.chain.iter().map(|n| n.diameter).sum::<f64>() / n as f64
    }

    /// Lateral surface in cm², integrating the diameter profile along the chain.
    pub fn surface(&self) -> f64 {
        self.chain
            .iter()
            .map(|n| PI * (n.diameter * self.pixel_size) * (n.length * self.pixel_size))
            .sum()
    }

    /// Volume in cm³, treating every segment as a cylinder.
    pub fn volume(&self) -> f64 {
        self.chain
            .iter()
            .map(|n| {
                let r = n.diameter * self.pixel_size / 2.0;
                PI * r * r * (n.length * self.pixel_size)
            })
            .sum()
    }

    /// A root is usable for aggregation when it has an identity and a non-empty
    /// chain with up-to-date geometry.
    pub fn validate(&self) -> bool {
        !self.id.is_empty() && !self.chain.is_empty() && self.chain.is_consistent()
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.key)
    }
}

/// Pixel → cm factor for a dpi, 0 when the dpi is unresolved.
pub fn pixel_size_for(dpi: f64) -> f64 {
    if dpi > 0.0 {
        2.54 / dpi
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("anchor", MarkType::Anchor)]
    #[case("Free Text", MarkType::FreeText)]
    #[case("free_text", MarkType::FreeText)]
    #[case("LENGTH", MarkType::Length)]
    #[case("lesion", MarkType::Other("lesion".to_string()))]
    fn given_mark_name_when_parsing_then_maps_to_type(#[case] raw: &str, #[case] expected: MarkType) {
        assert_eq!(raw.parse::<MarkType>().unwrap(), expected);
    }

    #[test]
    fn given_unknown_accession_when_looking_up_then_returns_generic_root() {
        assert_eq!(ontology_label("PO:0020121"), "Lateral root");
        assert_eq!(ontology_label("PO:9999999"), "Root");
    }

    #[test]
    fn given_default_accession_when_order_changes_then_accession_follows() {
        let mut root = Root::new(RootKey(0), "r", NodeChain::new());
        assert_eq!(root.po_accession, PRIMARY_ROOT_ACCESSION);
        root.set_child_order(2);
        assert_eq!(root.po_accession, LATERAL_ROOT_ACCESSION);

        root.po_accession = "PO:0003005".to_string();
        root.set_child_order(0);
        assert_eq!(root.po_accession, "PO:0003005");
    }

    #[test]
    fn given_zero_dpi_when_setting_then_pixel_size_is_zero() {
        let mut root = Root::new(RootKey(0), "r", NodeChain::new());
        root.set_dpi(0.0);
        assert_eq!(root.pixel_size(), 0.0);
        root.set_dpi(2.54);
        assert!((root.pixel_size() - 1.0).abs() < 1e-12);
    }
}
