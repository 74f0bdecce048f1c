//! RSML reader.
//!
//! The document is parsed into a fresh [`RootForest`]; the caller's forest is
//! only replaced once the whole document has been read, so a failure never
//! leaves a partially filled forest behind.

use std::fmt;
use std::path::Path;

use roxmltree::{Document, Node as XmlNode};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ParserSettings;
use crate::domain::{ForestMetadata, Mark, MarkType, NodeChain, Point, RootForest, RootIndex};
use crate::parser::error::{ParseError, ParseResult};
use crate::parser::units::{coordinate_scale, resolve_dpi};

/// Degenerate input that was accepted with a documented default.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// Unit not recognised; dpi set to 0 and coordinates left unscaled
    UnresolvedUnit(String),
    EmptyRoot { id: String },
    SingleNodeRoot { id: String },
    DiameterCountMismatch {
        id: String,
        points: usize,
        diameters: usize,
    },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedUnit(unit) => write!(f, "unit {unit:?} not recognised, dpi set to 0"),
            Self::EmptyRoot { id } => write!(f, "root {id} has no points"),
            Self::SingleNodeRoot { id } => write!(f, "root {id} has a single point"),
            Self::DiameterCountMismatch {
                id,
                points,
                diameters,
            } => write!(f, "root {id}: {diameters} diameter(s) for {points} point(s)"),
        }
    }
}

/// Outcome of a successful read.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    pub roots_created: usize,
    pub warnings: Vec<ParseWarning>,
    pub metadata: ForestMetadata,
}

/// Where a nested root joins its parent, as written in the document.
#[derive(Debug, Clone, Copy)]
enum InsertionHint {
    /// Arc length on the parent, pixel units
    Position(f64),
    /// Ordinal of the parent node
    Node(usize),
}

struct PendingAttachment {
    parent: RootIndex,
    child: RootIndex,
    hint: Option<InsertionHint>,
}

struct PendingAnnotation {
    root: RootIndex,
    mark: Mark,
    at: Point,
}

/// Mutable state of one read.
struct ParseContext<'s> {
    settings: &'s ParserSettings,
    scale: f64,
    forest: RootForest,
    warnings: Vec<ParseWarning>,
    attachments: Vec<PendingAttachment>,
    annotations: Vec<PendingAnnotation>,
}

/// Reads RSML documents into a [`RootForest`].
#[derive(Debug, Clone, Default)]
pub struct RsmlParser {
    settings: ParserSettings,
}

impl RsmlParser {
    pub fn new(settings: ParserSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    /// Reads `text` into `forest`, replacing its content.
    ///
    /// On error the forest is emptied and the diagnostic logged and returned.
    #[instrument(level = "debug", skip(self, forest, text))]
    pub fn read_into(&self, forest: &mut RootForest, text: &str) -> ParseResult<ParseReport> {
        match self.parse_str(text) {
            Ok((parsed, report)) => {
                *forest = parsed;
                Ok(report)
            }
            Err(e) => {
                forest.clear();
                forest.metadata = ForestMetadata::default();
                error!("Error reading the datafile: {}", e);
                Err(e)
            }
        }
    }

    /// Reads a file from disk.
    #[instrument(level = "debug", skip(self))]
    pub fn parse_file(&self, path: &Path) -> ParseResult<(RootForest, ParseReport)> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&text)
    }

    /// Parses a complete document into a new forest.
    pub fn parse_str(&self, text: &str) -> ParseResult<(RootForest, ParseReport)> {
        let doc = Document::parse(text)?;
        let document = doc.root_element();
        let found = document.tag_name().name();
        if found != self.settings.document_element {
            return Err(ParseError::UnexpectedRootElement {
                expected: self.settings.document_element.clone(),
                found: found.to_string(),
            });
        }

        let mut warnings = Vec::new();
        let metadata = self.read_metadata(child(document, "metadata"))?;
        let dpi = match resolve_dpi(&metadata.unit, metadata.resolution) {
            Some(dpi) => dpi,
            None => {
                warn!("unit {:?} not recognised, dpi set to 0", metadata.unit);
                warnings.push(ParseWarning::UnresolvedUnit(metadata.unit.clone()));
                0.0
            }
        };
        debug!("unit={} resolution={} dpi={}", metadata.unit, metadata.resolution, dpi);

        let mut ctx = ParseContext {
            settings: &self.settings,
            scale: coordinate_scale(dpi),
            forest: RootForest::new(dpi),
            warnings,
            attachments: Vec::new(),
            annotations: Vec::new(),
        };

        for scene in children(document, "scene") {
            for plant in children(scene, "plant") {
                for root in children(plant, "root") {
                    ctx.read_root(root, None, &metadata.software)?;
                }
            }
        }

        ctx.finish(dpi, metadata)
    }

    fn read_metadata(&self, node: Option<XmlNode>) -> ParseResult<ForestMetadata> {
        let s = &self.settings;
        let mut meta = ForestMetadata {
            unit: s.default_unit.clone(),
            resolution: s.default_resolution,
            file_key: s.default_file_key.clone(),
            software: s.default_software.clone(),
            ..Default::default()
        };
        let Some(node) = node else {
            return Ok(meta);
        };

        if let Some(unit) = child_text(node, "unit") {
            meta.unit = unit.to_string();
        }
        if let Some(res) = child_text(node, "resolution") {
            meta.resolution = parse_number("resolution", res)?;
        }
        if let Some(key) = child_text(node, "file-key") {
            meta.file_key = key.to_string();
        }
        if let Some(software) = child_text(node, "software") {
            meta.software = software.to_string();
        }
        meta.version = child_text(node, "version").map(str::to_string);
        meta.user = child_text(node, "user").map(str::to_string);
        meta.last_modified = child_text(node, "last-modified").map(str::to_string);
        meta.image = child(node, "image")
            .and_then(|img| child_text(img, "name").or_else(|| text(img)))
            .map(str::to_string);
        Ok(meta)
    }
}

impl<'s> ParseContext<'s> {
    /// Reads one `root` element and, depth-first, its nested roots.
    fn read_root(&mut self, node: XmlNode, parent: Option<RootIndex>, origin: &str) -> ParseResult<()> {
        let id = node.attribute("id").or_else(|| node.attribute("ID")).unwrap_or("");

        let points = self.read_points(node)?;
        let diameters = self.read_diameters(node)?;
        if !diameters.is_empty() && diameters.len() != points.len() {
            self.warn(ParseWarning::DiameterCountMismatch {
                id: id.to_string(),
                points: points.len(),
                diameters: diameters.len(),
            });
        }
        match points.len() {
            0 => self.warn(ParseWarning::EmptyRoot { id: id.to_string() }),
            1 => self.warn(ParseWarning::SingleNodeRoot { id: id.to_string() }),
            _ => {}
        }

        let default_diameter = self.settings.default_diameter * self.scale;
        let mut chain = NodeChain::new();
        for (i, p) in points.iter().enumerate() {
            let d = diameters.get(i).copied().unwrap_or(default_diameter);
            chain.push_back(p.x, p.y, Some(d));
        }

        let idx = self.forest.create_root(id, chain, None)?;
        if let Some(root) = self.forest.get_mut(idx) {
            root.label = node.attribute("label").map(str::to_string);
            if let Some(acc) = node.attribute("poaccession").or_else(|| node.attribute("po:accession")) {
                root.po_accession = acc.to_string();
            }
            root.origin = origin.to_string();
        }

        for mark in self.read_marks(node)? {
            if let Some(root) = self.forest.get_mut(idx) {
                root.add_mark(mark);
            }
        }
        self.read_annotations(node, idx)?;

        if let Some(parent) = parent {
            let hint = self.read_insertion_hint(node)?;
            self.attachments.push(PendingAttachment {
                parent,
                child: idx,
                hint,
            });
        }

        for nested in children(node, "root") {
            self.read_root(nested, Some(idx), origin)?;
        }
        Ok(())
    }

    fn read_points(&self, node: XmlNode) -> ParseResult<Vec<Point>> {
        let Some(geometry) = child(node, "geometry") else {
            return Ok(Vec::new());
        };
        let container = child(geometry, "polyline").unwrap_or(geometry);
        children(container, "point")
            .map(|p| self.read_point(p))
            .collect()
    }

    fn read_point(&self, node: XmlNode) -> ParseResult<Point> {
        let x = value_of(node, "x").ok_or_else(|| ParseError::missing("point", "x"))?;
        let y = value_of(node, "y").ok_or_else(|| ParseError::missing("point", "y"))?;
        Ok(Point::new(
            parse_number("point x", x)? * self.scale,
            parse_number("point y", y)? * self.scale,
        ))
    }

    fn read_diameters(&self, node: XmlNode) -> ParseResult<Vec<f64>> {
        let direct: Vec<XmlNode> = children(node, "diameter").collect();
        let samples: Vec<XmlNode> = if !direct.is_empty() {
            direct
        } else {
            children(node, "functions")
                .flat_map(|f| children(f, "function"))
                .find(|f| f.attribute("name") == Some("diameter"))
                .map(|f| children(f, "sample").collect())
                .unwrap_or_default()
        };

        samples
            .into_iter()
            .map(|s| -> ParseResult<f64> {
                let raw = s
                    .attribute("value")
                    .or_else(|| text(s))
                    .ok_or_else(|| ParseError::missing(s.tag_name().name(), "value"))?;
                Ok(parse_number("diameter", raw)? * self.scale)
            })
            .collect()
    }

    fn read_marks(&self, node: XmlNode) -> ParseResult<Vec<Mark>> {
        let direct = children(node, "mark");
        let grouped = children(node, "marks").flat_map(|m| children(m, "mark"));

        direct
            .chain(grouped)
            .map(|m| -> ParseResult<Mark> {
                let kind = m
                    .attribute("type")
                    .map(|t| t.parse::<MarkType>().unwrap_or_else(|never| match never {}))
                    .unwrap_or(MarkType::Anchor);
                let position = value_of(m, "position").ok_or_else(|| ParseError::missing("mark", "position"))?;
                let mut mark = Mark::new(
                    kind,
                    parse_number("mark position", position)? * self.scale,
                    value_of(m, "value").unwrap_or(""),
                );
                if let Some(d) = value_of(m, "diameter") {
                    mark.diameter = parse_number("mark diameter", d)? * self.scale;
                }
                if let Some(a) = value_of(m, "angle") {
                    mark.angle = parse_number("mark angle", a)?;
                }
                if let Some(t) = value_of(m, "twin-position") {
                    mark.twin_position = Some(parse_number("mark twin-position", t)? * self.scale);
                }
                mark.foreign_image = m.attribute("image").map(str::to_string);
                Ok(mark)
            })
            .collect()
    }

    /// Single-point annotations become marks once chain geometry is known.
    fn read_annotations(&mut self, node: XmlNode, root: RootIndex) -> ParseResult<()> {
        for annotation in children(node, "annotations").flat_map(|a| children(a, "annotation")) {
            let points: Vec<XmlNode> = children(annotation, "point").collect();
            if points.len() != 1 {
                debug!("skipping annotation with {} point(s)", points.len());
                continue;
            }
            let at = self.read_point(points[0])?;
            let name = annotation.attribute("name").unwrap_or("default");
            let kind = name.parse::<MarkType>().unwrap_or_else(|never| match never {});
            let value = child_text(annotation, "value").unwrap_or("");
            self.annotations.push(PendingAnnotation {
                root,
                mark: Mark::new(kind, 0.0, value),
                at,
            });
        }
        Ok(())
    }

    fn read_insertion_hint(&self, node: XmlNode) -> ParseResult<Option<InsertionHint>> {
        let Some(props) = child(node, "properties") else {
            return Ok(None);
        };
        if let Some(raw) = child(props, "parent-position").and_then(|p| p.attribute("value").or_else(|| text(p))) {
            return Ok(Some(InsertionHint::Position(
                parse_number("parent-position", raw)? * self.scale,
            )));
        }
        if let Some(raw) = child(props, "parent-node").and_then(|p| p.attribute("value").or_else(|| text(p))) {
            let ordinal = parse_number("parent-node", raw)?;
            return Ok(Some(InsertionHint::Node(ordinal.max(0.0) as usize)));
        }
        Ok(None)
    }

    fn warn(&mut self, warning: ParseWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Geometry, then topology, then resolution.
    fn finish(mut self, dpi: f64, metadata: ForestMetadata) -> ParseResult<(RootForest, ParseReport)> {
        self.forest.refresh();

        for PendingAttachment { parent, child, hint } in std::mem::take(&mut self.attachments) {
            let insertion = match hint {
                Some(InsertionHint::Position(d)) => Some(self.forest.insertion_at(parent, child, d)?),
                Some(InsertionHint::Node(n)) => {
                    let d = self
                        .forest
                        .get(parent)
                        .and_then(|p| p.chain().iter().nth(n).map(|node| node.c_length))
                        .unwrap_or(0.0);
                    Some(self.forest.insertion_at(parent, child, d)?)
                }
                None => None,
            };
            self.forest.attach_child(parent, child, insertion)?;
        }

        for PendingAnnotation { root, mut mark, at } in std::mem::take(&mut self.annotations) {
            if let Some(r) = self.forest.get_mut(root) {
                if let Some(node) = r.chain().nearest_to(&at).and_then(|(i, _)| r.chain().get(i)) {
                    mark.position = node.c_length;
                    mark.diameter = node.diameter;
                }
                r.add_mark(mark);
            }
        }

        self.forest.set_dpi(dpi);
        self.forest.metadata = metadata.clone();

        let roots_created = self.forest.len();
        info!("{} root(s) were created", roots_created);
        Ok((
            self.forest,
            ParseReport {
                roots_created,
                warnings: self.warnings,
                metadata,
            },
        ))
    }
}

fn children<'a, 'input: 'a>(
    node: XmlNode<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = XmlNode<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'input: 'a>(node: XmlNode<'a, 'input>, name: &'static str) -> Option<XmlNode<'a, 'input>> {
    children(node, name).next()
}

/// Trimmed, non-empty text content.
fn text<'a, 'input: 'a>(node: XmlNode<'a, 'input>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}

fn child_text<'a, 'input: 'a>(node: XmlNode<'a, 'input>, name: &'static str) -> Option<&'a str> {
    child(node, name).and_then(text)
}

/// Attribute value, falling back to a child element of the same name.
fn value_of<'a, 'input: 'a>(node: XmlNode<'a, 'input>, name: &'static str) -> Option<&'a str> {
    node.attribute(name).or_else(|| child_text(node, name))
}

fn parse_number(what: &str, raw: &str) -> ParseResult<f64> {
    raw.trim().parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        what: what.to_string(),
        value: raw.to_string(),
    })
}
