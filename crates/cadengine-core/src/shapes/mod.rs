//! Shape definitions for the scene graph.

mod group;
mod image;
mod line;
mod node;
mod rectangle;
mod style;
mod text;

pub use group::{CornerScale, GroupGeometry};
pub use image::{ImageCodecError, ImageGeometry, MAX_IMAGE_PIXELS, check_image_size};
pub use line::LineGeometry;
pub use node::{MetaValue, Metadata, NodeFlags, NodeId, NodeTree, ShapeNode};
pub use rectangle::{BoxGeometry, RegularGeometry};
pub use style::{DashPattern, FillStyle, FontSpec, Rgba, StrokeStyle};
pub use text::TextGeometry;

use crate::handles::HandleRole;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// The kinds of shape a node can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Line,
    Rectangle,
    Ellipse,
    Circle,
    Square,
    Text,
    Image,
    Group,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 8] = [
        ShapeKind::Line,
        ShapeKind::Rectangle,
        ShapeKind::Ellipse,
        ShapeKind::Circle,
        ShapeKind::Square,
        ShapeKind::Text,
        ShapeKind::Image,
        ShapeKind::Group,
    ];

    /// Stable type tag used by the persisted format.
    pub fn tag(&self) -> &'static str {
        match self {
            ShapeKind::Line => "line",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Circle => "circle",
            ShapeKind::Square => "square",
            ShapeKind::Text => "text",
            ShapeKind::Image => "image",
            ShapeKind::Group => "group",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether nodes of this kind carry an outline style.
    pub fn uses_stroke(&self) -> bool {
        !matches!(self, ShapeKind::Text | ShapeKind::Image)
    }

    /// Whether nodes of this kind carry an interior style.
    pub fn uses_fill(&self) -> bool {
        !matches!(self, ShapeKind::Line | ShapeKind::Text | ShapeKind::Image)
    }
}

/// Canonical geometry tuple: the minimal fields needed to restore one
/// kind's geometry. Position lives on the node and is captured separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryTuple {
    Line { start: Point, end: Point },
    Rect(Rect),
    Text { wrap_width: f64 },
}

impl std::fmt::Display for GeometryTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryTuple::Line { start, end } => {
                write!(f, "({}, {}, {}, {})", start.x, start.y, end.x, end.y)
            }
            GeometryTuple::Rect(r) => {
                write!(f, "({}, {}, {}, {})", r.x0, r.y0, r.width(), r.height())
            }
            GeometryTuple::Text { wrap_width } => write!(f, "(width {wrap_width})"),
        }
    }
}

/// Per-kind geometry behavior: bounds, handles and resize rules.
pub trait ShapeGeometry {
    /// Bounding box in the node's local frame.
    fn bounds(&self) -> Rect;

    /// Roles of the handles this geometry exposes.
    fn handle_roles(&self) -> &'static [HandleRole];

    /// Local position of a handle, if this geometry has it.
    fn handle_position(&self, role: HandleRole) -> Option<Point>;

    /// Move a handle to `to` (local frame) and update the geometry.
    ///
    /// Returns a translation, in the node's local frame, that the caller
    /// must apply to the node position (zero for most kinds).
    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2;

    /// Scale the geometry about the local origin.
    fn scale_about_origin(&mut self, sx: f64, sy: f64);

    /// Capture the canonical geometry tuple.
    fn capture(&self) -> GeometryTuple;

    /// Restore from a canonical tuple. Returns false if the tuple does not
    /// belong to this kind.
    fn restore(&mut self, tuple: &GeometryTuple) -> bool;
}

/// Kind-specific geometry of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Line(LineGeometry),
    Rectangle(BoxGeometry),
    Ellipse(BoxGeometry),
    Circle(RegularGeometry),
    Square(RegularGeometry),
    Text(TextGeometry),
    Image(ImageGeometry),
    Group(GroupGeometry),
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Line(_) => ShapeKind::Line,
            Geometry::Rectangle(_) => ShapeKind::Rectangle,
            Geometry::Ellipse(_) => ShapeKind::Ellipse,
            Geometry::Circle(_) => ShapeKind::Circle,
            Geometry::Square(_) => ShapeKind::Square,
            Geometry::Text(_) => ShapeKind::Text,
            Geometry::Image(_) => ShapeKind::Image,
            Geometry::Group(_) => ShapeKind::Group,
        }
    }

    fn as_dyn(&self) -> &dyn ShapeGeometry {
        match self {
            Geometry::Line(g) => g,
            Geometry::Rectangle(g) | Geometry::Ellipse(g) => g,
            Geometry::Circle(g) | Geometry::Square(g) => g,
            Geometry::Text(g) => g,
            Geometry::Image(g) => g,
            Geometry::Group(g) => g,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn ShapeGeometry {
        match self {
            Geometry::Line(g) => g,
            Geometry::Rectangle(g) | Geometry::Ellipse(g) => g,
            Geometry::Circle(g) | Geometry::Square(g) => g,
            Geometry::Text(g) => g,
            Geometry::Image(g) => g,
            Geometry::Group(g) => g,
        }
    }

    /// The rectangle of box-like kinds (rect-likes, image, group).
    pub fn rect(&self) -> Option<Rect> {
        match self {
            Geometry::Rectangle(g) | Geometry::Ellipse(g) => Some(g.rect),
            Geometry::Circle(g) | Geometry::Square(g) => Some(g.rect),
            Geometry::Image(g) => Some(g.rect()),
            Geometry::Group(g) => Some(g.rect),
            Geometry::Line(_) | Geometry::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextGeometry> {
        match self {
            Geometry::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut TextGeometry> {
        match self {
            Geometry::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageGeometry> {
        match self {
            Geometry::Image(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineGeometry> {
        match self {
            Geometry::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut GroupGeometry> {
        match self {
            Geometry::Group(g) => Some(g),
            _ => None,
        }
    }
}

impl ShapeGeometry for Geometry {
    fn bounds(&self) -> Rect {
        self.as_dyn().bounds()
    }

    fn handle_roles(&self) -> &'static [HandleRole] {
        self.as_dyn().handle_roles()
    }

    fn handle_position(&self, role: HandleRole) -> Option<Point> {
        self.as_dyn().handle_position(role)
    }

    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2 {
        self.as_dyn_mut().resize_from_handle(role, to)
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        self.as_dyn_mut().scale_about_origin(sx, sy)
    }

    fn capture(&self) -> GeometryTuple {
        self.as_dyn().capture()
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        self.as_dyn_mut().restore(tuple)
    }
}
