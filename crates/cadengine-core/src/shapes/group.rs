//! Group container geometry.

use super::{GeometryTuple, ShapeGeometry};
use crate::geometry::{GEOMETRY_TOLERANCE, rect_from_corners, scale_point_about};
use crate::handles::{BOX_HANDLES, HandleRole, rect_handle_position};
use kurbo::{Point, Rect, Vec2};

/// Bounding box of a group, in the group's local frame.
///
/// Members are child nodes in the scene; the rectangle is derived from them
/// when the group is composed and rescaled along with them on handle drags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupGeometry {
    pub rect: Rect,
}

/// Per-axis scale about a fixed point, produced by a group handle drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerScale {
    pub fixed: Point,
    pub sx: f64,
    pub sy: f64,
}

impl CornerScale {
    pub fn apply(&self, point: Point) -> Point {
        scale_point_about(point, self.fixed, self.sx, self.sy)
    }

    pub fn is_identity(&self) -> bool {
        (self.sx - 1.0).abs() < GEOMETRY_TOLERANCE && (self.sy - 1.0).abs() < GEOMETRY_TOLERANCE
    }
}

impl GroupGeometry {
    pub fn new(rect: Rect) -> Self {
        Self { rect: rect.abs() }
    }

    /// Square placeholder centred on the local origin.
    pub fn placeholder(size: f64) -> Self {
        let half = size.abs() / 2.0;
        Self::new(Rect::new(-half, -half, half, half))
    }

    /// Scale implied by dragging `role` to `to`.
    ///
    /// The fixed point is the opposite corner (or opposite side for edge
    /// handles). Factors are signed so a drag past the fixed point mirrors;
    /// an axis whose old extent is zero keeps a factor of 1.
    pub fn corner_scale(&self, role: HandleRole, to: Point) -> Option<CornerScale> {
        let moving = rect_handle_position(self.rect, role)?;
        let fixed = match role.opposite_corner(self.rect) {
            Some(corner) => corner,
            None => match role {
                HandleRole::Top => Point::new(moving.x, self.rect.y1),
                HandleRole::Bottom => Point::new(moving.x, self.rect.y0),
                HandleRole::Left => Point::new(self.rect.x1, moving.y),
                HandleRole::Right => Point::new(self.rect.x0, moving.y),
                _ => return None,
            },
        };
        let factor = |moving: f64, fixed: f64, to: f64| {
            let extent = moving - fixed;
            if extent.abs() < GEOMETRY_TOLERANCE {
                1.0
            } else {
                (to - fixed) / extent
            }
        };
        let sx = if role.moves_x() {
            factor(moving.x, fixed.x, to.x)
        } else {
            1.0
        };
        let sy = if role.moves_y() {
            factor(moving.y, fixed.y, to.y)
        } else {
            1.0
        };
        Some(CornerScale { fixed, sx, sy })
    }

    fn apply_scale(&mut self, scale: &CornerScale) {
        let a = scale.apply(Point::new(self.rect.x0, self.rect.y0));
        let b = scale.apply(Point::new(self.rect.x1, self.rect.y1));
        self.rect = rect_from_corners(a, b);
    }
}

impl ShapeGeometry for GroupGeometry {
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
        if let Some(scale) = self.corner_scale(role, to) {
            self.apply_scale(&scale);
        }
        Vec2::ZERO
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        self.apply_scale(&CornerScale {
            fixed: Point::ZERO,
            sx,
            sy,
        });
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_scale_against_opposite_corner() {
        let group = GroupGeometry::new(Rect::new(0.0, 0.0, 100.0, 50.0));
        let scale = group
            .corner_scale(HandleRole::BottomRight, Point::new(200.0, 25.0))
            .unwrap();
        assert_eq!(scale.fixed, Point::new(0.0, 0.0));
        assert_eq!(scale.sx, 2.0);
        assert_eq!(scale.sy, 0.5);

        let scale = group
            .corner_scale(HandleRole::TopLeft, Point::new(50.0, 0.0))
            .unwrap();
        assert_eq!(scale.fixed, Point::new(100.0, 50.0));
        assert_eq!(scale.sx, 0.5);
        assert_eq!(scale.sy, 1.0);
    }

    #[test]
    fn test_edge_scale_touches_one_axis() {
        let group = GroupGeometry::new(Rect::new(0.0, 0.0, 100.0, 50.0));
        let scale = group
            .corner_scale(HandleRole::Right, Point::new(150.0, 999.0))
            .unwrap();
        assert_eq!(scale.sx, 1.5);
        assert_eq!(scale.sy, 1.0);
    }

    #[test]
    fn test_zero_extent_does_not_divide() {
        let group = GroupGeometry::new(Rect::new(0.0, 0.0, 0.0, 10.0));
        let scale = group
            .corner_scale(HandleRole::BottomRight, Point::new(20.0, 20.0))
            .unwrap();
        assert_eq!(scale.sx, 1.0);
        assert_eq!(scale.sy, 2.0);
    }

    #[test]
    fn test_resize_updates_rect() {
        let mut group = GroupGeometry::placeholder(10.0);
        assert_eq!(group.rect, Rect::new(-5.0, -5.0, 5.0, 5.0));
        group.resize_from_handle(HandleRole::BottomRight, Point::new(15.0, 5.0));
        assert_eq!(group.rect, Rect::new(-5.0, -5.0, 15.0, 5.0));
    }
}
