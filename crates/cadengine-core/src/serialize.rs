//! Conversion between scene nodes and plain JSON values.
//!
//! Each node becomes one record tagged with its type. Group members are
//! written inline under `children`, so only top-level nodes appear in the
//! document's `nodes` list. Decoding resolves the tag through a
//! [`ShapeRegistry`]; a record that fails to decode is skipped and reported
//! without aborting the rest of the batch.

use crate::geometry::{GeometryError, from_matrix, to_matrix};
use crate::scene::Scene;
use crate::shapes::{
    BoxGeometry, DashPattern, FillStyle, FontSpec, Geometry, GroupGeometry, ImageCodecError,
    ImageGeometry, LineGeometry, MetaValue, Metadata, NodeFlags, NodeId, NodeTree,
    RegularGeometry, Rgba, ShapeKind, ShapeNode, StrokeStyle, TextGeometry,
};
use kurbo::{Point, Rect};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Current document schema version.
pub const SCHEMA_VERSION: u64 = 1;

// Document keys
const KEY_VERSION: &str = "version";
const KEY_NODES: &str = "nodes";

// Common record keys
const KEY_TYPE: &str = "type";
const KEY_ID: &str = "id";
const KEY_POS: &str = "pos";
const KEY_GEOMETRY: &str = "geometry";
const KEY_STROKE: &str = "stroke";
const KEY_FILL: &str = "fill";
const KEY_Z_ORDER: &str = "z_order";
const KEY_VISIBLE: &str = "visible";
const KEY_SCALE: &str = "scale";
const KEY_ROTATION: &str = "rotation";
const KEY_TRANSFORM: &str = "transform";
const KEY_METADATA: &str = "metadata";
const KEY_FLAGS: &str = "flags";
const KEY_CHILDREN: &str = "children";

// Style keys
const KEY_COLOR: &str = "color";
const KEY_WIDTH: &str = "width";
const KEY_STYLE: &str = "style";

// Geometry keys
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_W: &str = "w";
const KEY_H: &str = "h";
const KEY_X1: &str = "x1";
const KEY_Y1: &str = "y1";
const KEY_X2: &str = "x2";
const KEY_Y2: &str = "y2";
const KEY_CONSTRAINED: &str = "constrained";
const KEY_TEXT: &str = "text";
const KEY_FONT: &str = "font";
const KEY_PIXMAP: &str = "pixmap";
const KEY_OFFSET: &str = "offset";
const KEY_HEIGHT: &str = "height";

type Object = Map<String, Value>;

/// Errors decoding a single record.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Record is not an object")]
    NotAnObject,
    #[error("Unknown shape type '{0}'")]
    UnknownType(String),
    #[error("Missing field '{0}'")]
    MissingField(&'static str),
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    #[error("Invalid transform: {0}")]
    Geometry(#[from] GeometryError),
    #[error("Invalid image data: {0}")]
    Image(#[from] ImageCodecError),
    #[error("Duplicate node id {0}")]
    DuplicateId(NodeId),
}

/// Result type for record decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors affecting a whole document.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u64, supported: u64 },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cannot encode node {id}: {source}")]
    Encode {
        id: NodeId,
        #[source]
        source: ImageCodecError,
    },
}

fn invalid(field: &str, reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidField {
        field: field.to_string(),
        reason: reason.into(),
    }
}

// Helper functions to extract values from a JSON object

fn get_value<'a>(obj: &'a Object, key: &'static str) -> DecodeResult<&'a Value> {
    obj.get(key).ok_or(DecodeError::MissingField(key))
}

fn get_f64(obj: &Object, key: &'static str) -> DecodeResult<f64> {
    match get_value(obj, key)?.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(invalid(key, "expected a finite number")),
    }
}

fn get_f64_or(obj: &Object, key: &'static str, default: f64) -> DecodeResult<f64> {
    if obj.contains_key(key) {
        get_f64(obj, key)
    } else {
        Ok(default)
    }
}

fn get_bool_or(obj: &Object, key: &'static str, default: bool) -> DecodeResult<bool> {
    match obj.get(key) {
        None => Ok(default),
        Some(v) => v.as_bool().ok_or_else(|| invalid(key, "expected a boolean")),
    }
}

fn get_str<'a>(obj: &'a Object, key: &'static str) -> DecodeResult<&'a str> {
    get_value(obj, key)?
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string"))
}

fn get_object<'a>(obj: &'a Object, key: &'static str) -> DecodeResult<&'a Object> {
    get_value(obj, key)?
        .as_object()
        .ok_or_else(|| invalid(key, "expected an object"))
}

fn get_point(obj: &Object, key: &'static str) -> DecodeResult<Point> {
    let p = get_object(obj, key)?;
    Ok(Point::new(get_f64(p, KEY_X)?, get_f64(p, KEY_Y)?))
}

fn get_rect(obj: &Object) -> DecodeResult<Rect> {
    let origin = Point::new(get_f64(obj, KEY_X)?, get_f64(obj, KEY_Y)?);
    let size = (get_f64(obj, KEY_W)?, get_f64(obj, KEY_H)?);
    Ok(Rect::from_origin_size(origin, size).abs())
}

fn point_value(p: Point) -> Value {
    json!({ KEY_X: p.x, KEY_Y: p.y })
}

fn rect_value(rect: Rect) -> Value {
    json!({ KEY_X: rect.x0, KEY_Y: rect.y0, KEY_W: rect.width(), KEY_H: rect.height() })
}

/// Parse a colour written as a hex string or an `{r, g, b, a}` map.
fn parse_color(value: &Value, field: &str) -> DecodeResult<Rgba> {
    match value {
        Value::String(s) => Rgba::from_hex(s).ok_or_else(|| invalid(field, format!("bad colour '{s}'"))),
        Value::Object(_) => serde_json::from_value(value.clone()).map_err(|e| invalid(field, e.to_string())),
        _ => Err(invalid(field, "expected a colour")),
    }
}

fn stroke_value(stroke: &StrokeStyle) -> Value {
    json!({
        KEY_COLOR: stroke.color.to_hex(),
        KEY_WIDTH: stroke.width,
        KEY_STYLE: stroke.dash.as_str(),
    })
}

fn parse_stroke(value: &Value) -> DecodeResult<StrokeStyle> {
    let obj = value.as_object().ok_or_else(|| invalid(KEY_STROKE, "expected an object"))?;
    let defaults = StrokeStyle::default();
    let color = match obj.get(KEY_COLOR) {
        Some(c) => parse_color(c, KEY_STROKE)?,
        None => defaults.color,
    };
    let width = match obj.get(KEY_WIDTH) {
        Some(w) => w
            .as_u64()
            .and_then(|w| u32::try_from(w).ok())
            .ok_or_else(|| invalid(KEY_STROKE, "width must be a non-negative integer"))?,
        None => defaults.width,
    };
    let dash = match obj.get(KEY_STYLE) {
        Some(s) => s
            .as_str()
            .and_then(DashPattern::from_name)
            .ok_or_else(|| invalid(KEY_STROKE, format!("unknown pen style {s}")))?,
        None => defaults.dash,
    };
    Ok(StrokeStyle { color, width, dash })
}

fn parse_fill(value: &Value) -> DecodeResult<FillStyle> {
    let obj = value.as_object().ok_or_else(|| invalid(KEY_FILL, "expected an object"))?;
    let color = parse_color(get_value(obj, KEY_COLOR)?, KEY_FILL)?;
    Ok(FillStyle { color })
}

/// Decodes the `geometry` object of one record type.
pub type GeometryDecoder = fn(&Object) -> DecodeResult<Geometry>;

fn decode_line(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Line(LineGeometry {
        start: Point::new(get_f64(obj, KEY_X1)?, get_f64(obj, KEY_Y1)?),
        end: Point::new(get_f64(obj, KEY_X2)?, get_f64(obj, KEY_Y2)?),
        constrained: get_bool_or(obj, KEY_CONSTRAINED, false)?,
    }))
}

fn decode_rectangle(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Rectangle(BoxGeometry::new(get_rect(obj)?)))
}

fn decode_ellipse(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Ellipse(BoxGeometry::new(get_rect(obj)?)))
}

fn regular(obj: &Object) -> DecodeResult<RegularGeometry> {
    let rect = get_rect(obj)?;
    Ok(RegularGeometry::new(rect.origin(), rect.width().max(rect.height())))
}

fn decode_circle(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Circle(regular(obj)?))
}

fn decode_square(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Square(regular(obj)?))
}

fn decode_text(obj: &Object) -> DecodeResult<Geometry> {
    let content = get_str(obj, KEY_TEXT)?;
    let width = get_f64(obj, KEY_WIDTH)?;
    let mut text = TextGeometry::new(content, width);
    if let Some(font) = obj.get(KEY_FONT) {
        text.font = serde_json::from_value::<FontSpec>(font.clone())
            .map_err(|e| invalid(KEY_FONT, e.to_string()))?;
    }
    if let Some(color) = obj.get(KEY_COLOR) {
        text.color = parse_color(color, KEY_COLOR)?;
    }
    Ok(Geometry::Text(text))
}

fn decode_image(obj: &Object) -> DecodeResult<Geometry> {
    let data = get_str(obj, KEY_PIXMAP)?;
    let offset = get_point(obj, KEY_OFFSET)?;
    let size = (get_f64(obj, KEY_WIDTH)?, get_f64(obj, KEY_HEIGHT)?);
    let rect = Rect::from_origin_size(offset, size).abs();
    Ok(Geometry::Image(ImageGeometry::from_png_base64(data, rect)?))
}

fn decode_group(obj: &Object) -> DecodeResult<Geometry> {
    Ok(Geometry::Group(GroupGeometry::new(get_rect(obj)?)))
}

/// Encode the `geometry` object of a node.
pub fn encode_geometry(geometry: &Geometry) -> Result<Value, ImageCodecError> {
    Ok(match geometry {
        Geometry::Line(line) => json!({
            KEY_X1: line.start.x,
            KEY_Y1: line.start.y,
            KEY_X2: line.end.x,
            KEY_Y2: line.end.y,
            KEY_CONSTRAINED: line.constrained,
        }),
        Geometry::Rectangle(g) | Geometry::Ellipse(g) => rect_value(g.rect),
        Geometry::Circle(g) | Geometry::Square(g) => rect_value(g.rect),
        Geometry::Group(g) => rect_value(g.rect),
        Geometry::Text(text) => json!({
            KEY_TEXT: text.content,
            KEY_WIDTH: text.wrap_width,
            KEY_FONT: text.font,
            KEY_COLOR: text.color.to_hex(),
        }),
        Geometry::Image(image) => json!({
            KEY_PIXMAP: image.to_png_base64()?,
            KEY_OFFSET: point_value(image.offset()),
            KEY_WIDTH: image.rect().width(),
            KEY_HEIGHT: image.rect().height(),
        }),
    })
}

/// Maps type tags to geometry decoders.
#[derive(Debug, Clone)]
pub struct ShapeRegistry {
    decoders: HashMap<String, GeometryDecoder>,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ShapeRegistry {
    /// A registry with no tags.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// A registry resolving every built-in shape tag.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for kind in ShapeKind::ALL {
            let decoder: GeometryDecoder = match kind {
                ShapeKind::Line => decode_line,
                ShapeKind::Rectangle => decode_rectangle,
                ShapeKind::Ellipse => decode_ellipse,
                ShapeKind::Circle => decode_circle,
                ShapeKind::Square => decode_square,
                ShapeKind::Text => decode_text,
                ShapeKind::Image => decode_image,
                ShapeKind::Group => decode_group,
            };
            registry.register(kind.tag(), decoder);
        }
        registry
    }

    /// Register (or replace) the decoder for `tag`.
    pub fn register(&mut self, tag: impl Into<String>, decoder: GeometryDecoder) {
        self.decoders.insert(tag.into(), decoder);
    }

    pub fn resolve(&self, tag: &str) -> Option<GeometryDecoder> {
        self.decoders.get(tag).copied()
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

/// A record that was skipped while loading.
#[derive(Debug)]
pub struct SkippedRecord {
    /// Location of the record, e.g. `nodes[3].children[1]`.
    pub path: String,
    pub tag: Option<String>,
    pub error: DecodeError,
}

/// Outcome of a load: how many nodes came back and what was skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub version: u64,
    pub loaded: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn skip(&mut self, path: String, value: &Value, error: DecodeError) {
        let tag = value
            .get(KEY_TYPE)
            .and_then(Value::as_str)
            .map(str::to_string);
        log::warn!("Skipping record {path}: {error}");
        self.skipped.push(SkippedRecord { path, tag, error });
    }
}

impl std::fmt::Display for LoadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "loaded {} nodes", self.loaded)?;
        for skipped in &self.skipped {
            write!(f, "; skipped {}: {}", skipped.path, skipped.error)?;
        }
        Ok(())
    }
}

/// Encode one node with its fields and the given child records.
fn encode_record(node: &ShapeNode, children: Vec<Value>) -> Result<Value, SceneError> {
    let geometry = encode_geometry(&node.geometry).map_err(|source| SceneError::Encode {
        id: node.id(),
        source,
    })?;
    let metadata: Object = node
        .metadata
        .iter()
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect();

    let mut record = Object::new();
    record.insert(KEY_TYPE.into(), json!(node.kind().tag()));
    record.insert(KEY_ID.into(), json!(node.id().to_string()));
    record.insert(KEY_POS.into(), point_value(node.position));
    record.insert(KEY_GEOMETRY.into(), geometry);
    if let Some(stroke) = &node.stroke {
        record.insert(KEY_STROKE.into(), stroke_value(stroke));
    }
    if let Some(fill) = &node.fill {
        record.insert(KEY_FILL.into(), json!({ KEY_COLOR: fill.color.to_hex() }));
    }
    record.insert(KEY_Z_ORDER.into(), json!(node.z_order));
    record.insert(KEY_VISIBLE.into(), json!(node.visible));
    record.insert(KEY_SCALE.into(), json!(node.scale));
    record.insert(KEY_ROTATION.into(), json!(node.rotation));
    record.insert(KEY_TRANSFORM.into(), json!(to_matrix(node.transform)));
    record.insert(KEY_METADATA.into(), Value::Object(metadata));
    record.insert(KEY_FLAGS.into(), json!(node.flags.names()));
    if node.is_group() {
        record.insert(KEY_CHILDREN.into(), Value::Array(children));
    }
    Ok(Value::Object(record))
}

/// Encode an attached node and its members.
pub fn serialize_node(scene: &Scene, id: NodeId) -> Result<Value, SceneError> {
    let node = scene
        .get(id)
        .ok_or_else(|| SceneError::InvalidDocument(format!("node {id} is not in the scene")))?;
    let children = node
        .children()
        .iter()
        .map(|&child| serialize_node(scene, child))
        .collect::<Result<Vec<_>, _>>()?;
    encode_record(node, children)
}

/// Encode a detached subtree.
pub fn serialize_tree(tree: &NodeTree) -> Result<Value, SceneError> {
    let children = tree
        .children
        .iter()
        .map(serialize_tree)
        .collect::<Result<Vec<_>, _>>()?;
    encode_record(&tree.node, children)
}

/// Encode every top-level node into a versioned document.
pub fn serialize_scene(scene: &Scene) -> Result<Value, SceneError> {
    let nodes = scene
        .roots()
        .iter()
        .map(|&id| serialize_node(scene, id))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ KEY_VERSION: SCHEMA_VERSION, KEY_NODES: nodes }))
}

struct Decoder<'a> {
    registry: &'a ShapeRegistry,
    seen: HashSet<NodeId>,
    report: LoadReport,
}

impl Decoder<'_> {
    fn node(&mut self, value: &Value, path: &str) -> DecodeResult<NodeTree> {
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;
        let tag = get_str(obj, KEY_TYPE)?;
        let decode = self
            .registry
            .resolve(tag)
            .ok_or_else(|| DecodeError::UnknownType(tag.to_string()))?;
        let geometry = decode(get_object(obj, KEY_GEOMETRY)?)?;

        let id = match obj.get(KEY_ID) {
            Some(Value::String(s)) => {
                Uuid::parse_str(s).map_err(|e| invalid(KEY_ID, e.to_string()))?
            }
            Some(_) => return Err(invalid(KEY_ID, "expected a string")),
            None => Uuid::new_v4(),
        };
        if self.seen.contains(&id) {
            return Err(DecodeError::DuplicateId(id));
        }

        let mut node = ShapeNode::with_id(id, geometry);
        if obj.contains_key(KEY_POS) {
            node.position = get_point(obj, KEY_POS)?;
        }
        node.stroke = obj.get(KEY_STROKE).map(parse_stroke).transpose()?;
        node.fill = obj.get(KEY_FILL).map(parse_fill).transpose()?;
        node.z_order = get_f64_or(obj, KEY_Z_ORDER, 0.0)?;
        node.visible = get_bool_or(obj, KEY_VISIBLE, true)?;
        node.scale = get_f64_or(obj, KEY_SCALE, 1.0)?;
        node.rotation = get_f64_or(obj, KEY_ROTATION, 0.0)?;
        if let Some(transform) = obj.get(KEY_TRANSFORM) {
            let values: Vec<f64> = serde_json::from_value(transform.clone())
                .map_err(|e| invalid(KEY_TRANSFORM, e.to_string()))?;
            node.transform = from_matrix(&values)?;
        }
        if let Some(metadata) = obj.get(KEY_METADATA) {
            node.metadata = parse_metadata(metadata)?;
        }
        if let Some(flags) = obj.get(KEY_FLAGS) {
            let names: Vec<String> = serde_json::from_value(flags.clone())
                .map_err(|e| invalid(KEY_FLAGS, e.to_string()))?;
            node.flags = NodeFlags::from_names(names.iter().map(String::as_str));
        }
        node.refresh_handles();

        // Claim ids only once the record itself is valid.
        self.seen.insert(id);
        let mut children = Vec::new();
        match obj.get(KEY_CHILDREN) {
            Some(Value::Array(records)) if node.is_group() => {
                for (i, record) in records.iter().enumerate() {
                    let child_path = format!("{path}.{KEY_CHILDREN}[{i}]");
                    match self.node(record, &child_path) {
                        Ok(child) => children.push(child),
                        Err(error) => self.report.skip(child_path, record, error),
                    }
                }
            }
            Some(Value::Array(records)) if !records.is_empty() => {
                log::warn!("Ignoring children of {tag} record {path}");
            }
            Some(Value::Array(_)) | None => {}
            Some(_) => {
                self.seen.remove(&id);
                return Err(invalid(KEY_CHILDREN, "expected an array"));
            }
        }
        self.report.loaded += 1;
        Ok(NodeTree { node, children })
    }
}

fn parse_metadata(value: &Value) -> DecodeResult<Metadata> {
    let obj = value
        .as_object()
        .ok_or_else(|| invalid(KEY_METADATA, "expected an object"))?;
    obj.iter()
        .map(|(key, value)| {
            let key: u32 = key
                .parse()
                .map_err(|_| invalid(KEY_METADATA, format!("key '{key}' is not an integer")))?;
            let value: MetaValue = serde_json::from_value(value.clone())
                .map_err(|_| invalid(KEY_METADATA, format!("value for key {key} is not a scalar")))?;
            Ok((key, value))
        })
        .collect()
}

/// Decode a single record (and its members).
pub fn deserialize_node(
    value: &Value,
    registry: &ShapeRegistry,
) -> Result<(NodeTree, LoadReport), DecodeError> {
    let mut decoder = Decoder {
        registry,
        seen: HashSet::new(),
        report: LoadReport::default(),
    };
    let mut tree = decoder.node(value, "node")?;
    release_member_flags(&mut tree.node);
    decoder.report.version = SCHEMA_VERSION;
    Ok((tree, decoder.report))
}

/// Decode a document into top-level subtrees.
///
/// Accepts `{ "version": N, "nodes": [...] }` and, as version 0, a bare
/// array of records. Records that fail to decode are skipped and listed in
/// the report.
pub fn deserialize_scene(
    document: &Value,
    registry: &ShapeRegistry,
) -> Result<(Vec<NodeTree>, LoadReport), SceneError> {
    let (version, records) = match document {
        Value::Array(records) => (0, records),
        Value::Object(obj) => {
            let version = obj
                .get(KEY_VERSION)
                .and_then(Value::as_u64)
                .ok_or_else(|| SceneError::InvalidDocument("missing schema version".into()))?;
            if version > SCHEMA_VERSION {
                return Err(SceneError::UnsupportedVersion {
                    found: version,
                    supported: SCHEMA_VERSION,
                });
            }
            let records = obj
                .get(KEY_NODES)
                .and_then(Value::as_array)
                .ok_or_else(|| SceneError::InvalidDocument("missing node list".into()))?;
            (version, records)
        }
        _ => {
            return Err(SceneError::InvalidDocument(
                "expected an object or an array".into(),
            ));
        }
    };

    let mut decoder = Decoder {
        registry,
        seen: HashSet::new(),
        report: LoadReport {
            version,
            ..LoadReport::default()
        },
    };
    let mut trees = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let path = format!("{KEY_NODES}[{i}]");
        match decoder.node(record, &path) {
            Ok(mut tree) => {
                release_member_flags(&mut tree.node);
                trees.push(tree);
            }
            Err(error) => decoder.report.skip(path, record, error),
        }
    }
    Ok((trees, decoder.report))
}

/// A record saved from inside a group carries the member flags. At the top
/// level it gets the flags an ungroup would give it.
fn release_member_flags(node: &mut ShapeNode) {
    if node.flags == NodeFlags::grouped() {
        node.flags = NodeFlags::default();
    }
}

/// Parse document text.
pub fn parse_scene(
    text: &str,
    registry: &ShapeRegistry,
) -> Result<(Vec<NodeTree>, LoadReport), SceneError> {
    let document: Value = serde_json::from_str(text)?;
    deserialize_scene(&document, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{nearly_equal, rects_nearly_equal};
    use crate::shapes::ShapeGeometry;
    use image::RgbaImage;
    use kurbo::Affine;

    fn styled(geometry: Geometry) -> ShapeNode {
        let mut node = ShapeNode::new(geometry);
        node.position = Point::new(12.5, -3.0);
        node.z_order = 7.0;
        node.visible = false;
        node.scale = 1.5;
        node.rotation = 30.0;
        node.transform = Affine::new([1.0, 0.2, 0.0, 1.0, 4.0, 5.0]);
        node.metadata.insert(0, MetaValue::Text(node.id().to_string()));
        node.metadata.insert(3, MetaValue::Int(42));
        node.metadata.insert(7, MetaValue::Float(0.25));
        if node.stroke.is_some() {
            node.stroke = Some(StrokeStyle {
                color: Rgba::new(10, 20, 30, 200),
                width: 3,
                dash: DashPattern::DashDot,
            });
        }
        if node.fill.is_some() {
            node.fill = Some(FillStyle {
                color: Rgba::new(1, 2, 3, 4),
            });
        }
        node
    }

    fn all_kinds() -> Vec<ShapeNode> {
        let pixels = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8 * 80, y as u8 * 100, 7, 255]));
        vec![
            styled(Geometry::Line(LineGeometry::constrained(
                Point::new(1.0, 2.0),
                Point::new(30.0, 4.0),
            ))),
            styled(Geometry::Rectangle(BoxGeometry::from_corners(
                Point::new(50.0, 100.0),
                Point::new(100.0, 150.0),
            ))),
            styled(Geometry::Ellipse(BoxGeometry::from_corners(
                Point::new(0.0, 0.0),
                Point::new(-20.0, 10.0),
            ))),
            styled(Geometry::Circle(RegularGeometry::new(Point::new(3.0, 3.0), 9.0))),
            styled(Geometry::Square(RegularGeometry::new(Point::new(-3.0, 3.0), 4.0))),
            styled(Geometry::Text(
                TextGeometry::new("hello\nworld", 120.0)
                    .with_font(FontSpec {
                        family: "Serif".to_string(),
                        point_size: 18,
                        bold: true,
                        italic: false,
                        underline: true,
                    })
                    .with_color(Rgba::new(255, 0, 0, 255)),
            )),
            styled(Geometry::Image(ImageGeometry::with_rect(
                pixels,
                Rect::new(5.0, 5.0, 11.0, 9.0),
            ))),
        ]
    }

    #[test]
    fn test_every_kind_round_trips() {
        let registry = ShapeRegistry::builtin();
        for node in all_kinds() {
            let value = serialize_tree(&NodeTree::leaf(node.clone())).unwrap();
            let (tree, report) = deserialize_node(&value, &registry).unwrap();
            assert!(report.is_clean());
            let back = tree.node;
            assert_eq!(back.kind(), node.kind());
            assert_eq!(back.id(), node.id());
            assert_eq!(back.geometry.capture(), node.geometry.capture());
            assert!(rects_nearly_equal(back.bounds(), node.bounds()));
            assert_eq!(back.stroke, node.stroke);
            assert_eq!(back.fill, node.fill);
            assert_eq!(back.metadata, node.metadata);
            assert_eq!(back.z_order, node.z_order);
            assert_eq!(back.visible, node.visible);
            assert!(nearly_equal(back.scale, node.scale));
            assert!(nearly_equal(back.rotation, node.rotation));
            assert_eq!(back.transform.as_coeffs(), node.transform.as_coeffs());
            assert_eq!(back.position, node.position);
            assert_eq!(back.flags, node.flags);
            assert_eq!(back.geometry, node.geometry);
        }
    }

    #[test]
    fn test_group_children_inline_only() {
        let mut scene = Scene::new();
        let kinds = all_kinds();
        let member_ids: Vec<NodeId> = kinds.iter().map(ShapeNode::id).collect();
        let group = NodeTree {
            node: ShapeNode::new(Geometry::Group(GroupGeometry::new(Rect::new(
                0.0, 0.0, 50.0, 50.0,
            )))),
            children: kinds.into_iter().map(NodeTree::leaf).collect(),
        };
        let group_id = scene.add_node(group);

        let document = serialize_scene(&scene).unwrap();
        assert_eq!(document[KEY_VERSION], json!(1));
        let nodes = document[KEY_NODES].as_array().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0][KEY_CHILDREN].as_array().unwrap().len(), member_ids.len());

        let (trees, report) = deserialize_scene(&document, &ShapeRegistry::builtin()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.loaded, member_ids.len() + 1);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].id(), group_id);
        let ids: Vec<NodeId> = trees[0].children.iter().map(NodeTree::id).collect();
        assert_eq!(ids, member_ids);
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let good = serialize_tree(&NodeTree::leaf(all_kinds().remove(1))).unwrap();
        let mut bad_matrix = good.clone();
        bad_matrix[KEY_TRANSFORM] = json!([1, 0, 0]);
        bad_matrix[KEY_ID] = json!(Uuid::new_v4().to_string());
        let mut bad_rect = good.clone();
        bad_rect[KEY_GEOMETRY][KEY_W] = json!("wide");
        bad_rect[KEY_ID] = json!(Uuid::new_v4().to_string());
        let document = json!([
            good,
            { "type": "polygon", "geometry": {} },
            bad_matrix,
            42,
            bad_rect,
            good,
        ]);
        let (trees, report) = deserialize_scene(&document, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(report.version, 0);
        assert_eq!(trees.len(), 1);
        assert_eq!(report.skipped.len(), 5);
        assert!(matches!(report.skipped[0].error, DecodeError::UnknownType(ref t) if t == "polygon"));
        assert_eq!(report.skipped[0].tag.as_deref(), Some("polygon"));
        assert!(matches!(report.skipped[1].error, DecodeError::Geometry(_)));
        assert!(matches!(report.skipped[2].error, DecodeError::NotAnObject));
        assert!(matches!(report.skipped[3].error, DecodeError::InvalidField { .. }));
        assert!(matches!(report.skipped[4].error, DecodeError::DuplicateId(_)));
        assert_eq!(report.skipped[4].path, "nodes[5]");
    }

    #[test]
    fn test_bad_group_child_is_skipped() {
        let child = serialize_tree(&NodeTree::leaf(all_kinds().remove(0))).unwrap();
        let document = json!({
            "version": 1,
            "nodes": [{
                "type": "group",
                "geometry": { "x": 0, "y": 0, "w": 10, "h": 10 },
                "children": [child, { "type": "blob", "geometry": {} }],
            }],
        });
        let (trees, report) = deserialize_scene(&document, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(trees[0].children.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, "nodes[0].children[1]");
    }

    #[test]
    fn test_oversized_image_record_is_skipped() {
        let image = all_kinds().remove(6);
        let mut huge = serialize_tree(&NodeTree::leaf(image)).unwrap();
        huge[KEY_GEOMETRY][KEY_WIDTH] = json!(1e7);
        huge[KEY_GEOMETRY][KEY_HEIGHT] = json!(1e7);
        let good = serialize_tree(&NodeTree::leaf(all_kinds().remove(1))).unwrap();
        let document = json!({ "version": 1, "nodes": [huge, good] });
        let (trees, report) = deserialize_scene(&document, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0].error,
            DecodeError::Image(ImageCodecError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_detached_member_record_is_selectable() {
        let mut scene = Scene::new();
        let group = NodeTree {
            node: ShapeNode::new(Geometry::Group(GroupGeometry::new(Rect::new(
                0.0, 0.0, 50.0, 50.0,
            )))),
            children: vec![NodeTree::leaf(all_kinds().remove(1))],
        };
        let group_id = scene.add_node(group);
        let member = scene.children_of(group_id)[0];
        scene.get_mut(member).unwrap().flags = NodeFlags::grouped();

        let record = serialize_node(&scene, member).unwrap();
        assert_eq!(record[KEY_FLAGS], json!([]));
        let (trees, _) = deserialize_scene(&json!([record.clone()]), &ShapeRegistry::builtin()).unwrap();
        assert_eq!(trees[0].node.flags, NodeFlags::default());
        let (tree, _) = deserialize_node(&record, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(tree.node.flags, NodeFlags::default());

        // Members inside a group record keep theirs.
        let document = serialize_scene(&scene).unwrap();
        let (trees, _) = deserialize_scene(&document, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(trees[0].children[0].node.flags, NodeFlags::grouped());
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let document = json!({ "version": SCHEMA_VERSION + 1, "nodes": [] });
        assert!(matches!(
            deserialize_scene(&document, &ShapeRegistry::builtin()),
            Err(SceneError::UnsupportedVersion { found: 2, supported: 1 })
        ));
        assert!(matches!(
            deserialize_scene(&json!({ "nodes": [] }), &ShapeRegistry::builtin()),
            Err(SceneError::InvalidDocument(_))
        ));
        assert!(parse_scene("not json", &ShapeRegistry::builtin()).is_err());
    }

    #[test]
    fn test_registry_aliases_and_unknown_tags() {
        let mut registry = ShapeRegistry::empty();
        assert!(registry.resolve("rectangle").is_none());
        registry.register("rect", decode_rectangle);
        let record = json!({ "type": "rect", "geometry": { "x": 1, "y": 2, "w": 3, "h": 4 } });
        let (tree, _) = deserialize_node(&record, &registry).unwrap();
        assert_eq!(tree.node.bounds(), Rect::new(1.0, 2.0, 4.0, 6.0));
        assert_eq!(tree.node.flags, NodeFlags::default());
        assert!(ShapeRegistry::builtin().tags().contains(&"group"));
    }

    #[test]
    fn test_colours_accept_maps() {
        let record = json!({
            "type": "ellipse",
            "geometry": { "x": 0, "y": 0, "w": -4, "h": 4 },
            "fill": { "color": { "r": 1, "g": 2, "b": 3, "a": 4 } },
            "stroke": { "color": "#fff", "width": 2 },
        });
        let (tree, _) = deserialize_node(&record, &ShapeRegistry::builtin()).unwrap();
        assert_eq!(tree.node.fill.unwrap().color, Rgba::new(1, 2, 3, 4));
        let stroke = tree.node.stroke.unwrap();
        assert_eq!(stroke.color, Rgba::white());
        assert_eq!(stroke.dash, DashPattern::Solid);
        assert_eq!(tree.node.bounds(), Rect::new(-4.0, 0.0, 0.0, 4.0));
    }
}
