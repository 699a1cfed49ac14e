//! Box-like shapes: rectangle, ellipse, circle and square.

use super::{GeometryTuple, ShapeGeometry};
use crate::geometry::{rect_from_corners, scale_rect};
use crate::handles::{BOX_HANDLES, HandleRole, rect_handle_position};
use kurbo::{Point, Rect, Vec2};

/// Free-form box used by rectangles and ellipses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub rect: Rect,
}

impl BoxGeometry {
    pub fn new(rect: Rect) -> Self {
        Self { rect: rect.abs() }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            rect: rect_from_corners(a, b),
        }
    }

    /// Box centred on `center` with `edge` on one of its corners.
    pub fn from_center(center: Point, edge: Point) -> Self {
        let half = edge - center;
        Self::new(Rect::from_center_size(
            center,
            (2.0 * half.x.abs(), 2.0 * half.y.abs()),
        ))
    }
}

impl ShapeGeometry for BoxGeometry {
    fn bounds(&self) -> Rect {
        self.rect
    }

    fn handle_roles(&self) -> &'static [HandleRole] {
        &BOX_HANDLES
    }

    fn handle_position(&self, role: HandleRole) -> Option<Point> {
        rect_handle_position(self.rect, role)
    }

    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2 {
        self.rect = resize_free(self.rect, role, to);
        Vec2::ZERO
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        self.rect = scale_rect(self.rect, sx, sy);
    }

    fn capture(&self) -> GeometryTuple {
        GeometryTuple::Rect(self.rect)
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        match *tuple {
            GeometryTuple::Rect(rect) => {
                self.rect = rect.abs();
                true
            }
            _ => false,
        }
    }
}

/// Box whose width and height are always equal, used by circles and squares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularGeometry {
    pub rect: Rect,
}

impl RegularGeometry {
    /// Square box of side `side` with its top-left corner at `origin`.
    pub fn new(origin: Point, side: f64) -> Self {
        let side = side.abs();
        Self {
            rect: Rect::from_origin_size(origin, (side, side)),
        }
    }

    /// Regular box anchored at `a`, extended towards `b` by the larger delta.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            rect: regular_rect(a, b),
        }
    }

    /// Regular box centred on `center`, half as wide as the larger delta
    /// to `edge`.
    pub fn from_center(center: Point, edge: Point) -> Self {
        let half = edge - center;
        let side = 2.0 * half.x.abs().max(half.y.abs());
        Self {
            rect: Rect::from_center_size(center, (side, side)),
        }
    }

    pub fn side(&self) -> f64 {
        self.rect.width()
    }
}

impl ShapeGeometry for RegularGeometry {
    fn bounds(&self) -> Rect {
        self.rect
    }

    fn handle_roles(&self) -> &'static [HandleRole] {
        &BOX_HANDLES
    }

    fn handle_position(&self, role: HandleRole) -> Option<Point> {
        rect_handle_position(self.rect, role)
    }

    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2 {
        self.rect = resize_regular(self.rect, role, to);
        Vec2::ZERO
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        let s = sx.abs().max(sy.abs());
        let origin = Point::new(self.rect.x0 * sx, self.rect.y0 * sy);
        let side = self.side() * s;
        // Keep the corner that lands top-left after mirroring.
        let x0 = if sx < 0.0 { origin.x - side } else { origin.x };
        let y0 = if sy < 0.0 { origin.y - side } else { origin.y };
        self.rect = Rect::from_origin_size((x0, y0), (side, side));
    }

    fn capture(&self) -> GeometryTuple {
        GeometryTuple::Rect(self.rect)
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        match *tuple {
            GeometryTuple::Rect(rect) => {
                self.rect = rect.abs();
                true
            }
            _ => false,
        }
    }
}

/// Free resize: corners move against the opposite corner, edges move one side.
pub(crate) fn resize_free(rect: Rect, role: HandleRole, to: Point) -> Rect {
    if let Some(fixed) = role.opposite_corner(rect) {
        return rect_from_corners(fixed, to);
    }
    match role {
        HandleRole::Top => Rect::new(rect.x0, to.y, rect.x1, rect.y1).abs(),
        HandleRole::Bottom => Rect::new(rect.x0, rect.y0, rect.x1, to.y).abs(),
        HandleRole::Left => Rect::new(to.x, rect.y0, rect.x1, rect.y1).abs(),
        HandleRole::Right => Rect::new(rect.x0, rect.y0, to.x, rect.y1).abs(),
        _ => rect,
    }
}

/// Regular resize: corners clamp to `|dx| = |dy|` against the opposite
/// corner, edges keep the centre fixed.
pub(crate) fn resize_regular(rect: Rect, role: HandleRole, to: Point) -> Rect {
    if let Some(fixed) = role.opposite_corner(rect) {
        return regular_rect(fixed, to);
    }
    if role.is_edge() {
        let center = rect.center();
        let half = (to.x - center.x).abs().max((to.y - center.y).abs());
        return Rect::new(
            center.x - half,
            center.y - half,
            center.x + half,
            center.y + half,
        );
    }
    rect
}

fn regular_rect(fixed: Point, to: Point) -> Rect {
    let dx = to.x - fixed.x;
    let dy = to.y - fixed.y;
    let size = dx.abs().max(dy.abs());
    let corner = Point::new(
        fixed.x + if dx >= 0.0 { size } else { -size },
        fixed.y + if dy >= 0.0 { size } else { -size },
    );
    rect_from_corners(fixed, corner)
}
