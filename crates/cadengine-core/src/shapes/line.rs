//! Line segment.

use super::{GeometryTuple, ShapeGeometry};
use crate::geometry::scale_point_about;
use crate::handles::HandleRole;
use kurbo::{Point, Rect, Vec2};

/// A straight segment between two endpoints.
///
/// A constrained line keeps the dragged endpoint on the horizontal or
/// vertical through the fixed endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineGeometry {
    pub start: Point,
    pub end: Point,
    pub constrained: bool,
}

impl LineGeometry {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            constrained: false,
        }
    }

    pub fn constrained(start: Point, end: Point) -> Self {
        let mut line = Self::new(start, start);
        line.constrained = true;
        line.end = line.snap(end, start);
        line
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).hypot()
    }

    /// Snap `to` onto the dominant axis through `fixed`.
    fn snap(&self, to: Point, fixed: Point) -> Point {
        if !self.constrained {
            return to;
        }
        let dx = to.x - fixed.x;
        let dy = to.y - fixed.y;
        if dx.abs() > dy.abs() {
            Point::new(to.x, fixed.y)
        } else {
            Point::new(fixed.x, to.y)
        }
    }
}

impl ShapeGeometry for LineGeometry {
    fn bounds(&self) -> Rect {
        Rect::from_points(self.start, self.end)
    }

    fn handle_roles(&self) -> &'static [HandleRole] {
        &[HandleRole::Start, HandleRole::End]
    }

    fn handle_position(&self, role: HandleRole) -> Option<Point> {
        match role {
            HandleRole::Start => Some(self.start),
            HandleRole::End => Some(self.end),
            _ => None,
        }
    }

    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2 {
        match role {
            HandleRole::Start => self.start = self.snap(to, self.end),
            HandleRole::End => self.end = self.snap(to, self.start),
            _ => {}
        }
        Vec2::ZERO
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        self.start = scale_point_about(self.start, Point::ZERO, sx, sy);
        self.end = scale_point_about(self.end, Point::ZERO, sx, sy);
    }

    fn capture(&self) -> GeometryTuple {
        GeometryTuple::Line {
            start: self.start,
            end: self.end,
        }
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        match *tuple {
            GeometryTuple::Line { start, end } => {
                self.start = start;
                self.end = end;
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
    fn test_free_endpoints_move_independently() {
        let mut line = LineGeometry::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        line.resize_from_handle(HandleRole::End, Point::new(33.0, -4.0));
        assert_eq!(line.end, Point::new(33.0, -4.0));
        assert_eq!(line.start, Point::ZERO);
        line.resize_from_handle(HandleRole::Start, Point::new(5.0, 7.0));
        assert_eq!(line.start, Point::new(5.0, 7.0));
    }

    #[test]
    fn test_constrained_line_snaps_to_dominant_axis() {
        let mut line = LineGeometry::constrained(Point::new(0.0, 0.0), Point::new(50.0, 0.0));
        line.resize_from_handle(HandleRole::End, Point::new(40.0, 12.0));
        assert_eq!(line.end, Point::new(40.0, 0.0));

        line.resize_from_handle(HandleRole::End, Point::new(3.0, -30.0));
        assert_eq!(line.end, Point::new(0.0, -30.0));

        // Equal deltas fall to vertical.
        line.resize_from_handle(HandleRole::Start, Point::new(-30.0, 0.0));
        assert_eq!(line.start, Point::new(0.0, 0.0));
    }

    #[test]
    fn test_constrained_constructor_snaps_end() {
        let line = LineGeometry::constrained(Point::new(1.0, 1.0), Point::new(9.0, 3.0));
        assert_eq!(line.end, Point::new(9.0, 1.0));
        assert_eq!(line.length(), 8.0);
    }
}
