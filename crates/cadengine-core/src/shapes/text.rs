//! Text block with a wrap width.

use super::{FontSpec, GeometryTuple, Rgba, ShapeGeometry};
use crate::handles::{HandleRole, TEXT_HANDLES, rect_handle_position};
use kurbo::{Point, Rect, Vec2};

/// Minimum wrap width a handle drag can produce.
pub const MIN_WRAP_WIDTH: f64 = 1.0;

// Layout estimates relative to the point size. Real shaping belongs to the
// renderer; these only give the block a plausible height for handles.
const CHAR_WIDTH_FACTOR: f64 = 0.6;
const LINE_HEIGHT_FACTOR: f64 = 1.5;

/// A wrapped text block anchored at the node position.
#[derive(Debug, Clone, PartialEq)]
pub struct TextGeometry {
    pub content: String,
    pub wrap_width: f64,
    pub font: FontSpec,
    pub color: Rgba,
}

impl TextGeometry {
    pub fn new(content: impl Into<String>, wrap_width: f64) -> Self {
        Self {
            content: content.into(),
            wrap_width: wrap_width.max(MIN_WRAP_WIDTH),
            font: FontSpec::default(),
            color: Rgba::black(),
        }
    }

    pub fn with_font(mut self, font: FontSpec) -> Self {
        self.font = font;
        self
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    /// Estimated number of wrapped lines.
    pub fn line_count(&self) -> usize {
        let char_width = f64::from(self.font.point_size) * CHAR_WIDTH_FACTOR;
        let per_line = (self.wrap_width / char_width.max(f64::EPSILON)).floor().max(1.0);
        self.content
            .split('\n')
            .map(|paragraph| {
                let chars = paragraph.chars().count() as f64;
                ((chars / per_line).ceil() as usize).max(1)
            })
            .sum()
    }

    /// Estimated block height.
    pub fn height(&self) -> f64 {
        self.line_count() as f64 * f64::from(self.font.point_size) * LINE_HEIGHT_FACTOR
    }
}

impl ShapeGeometry for TextGeometry {
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.wrap_width, self.height())
    }

    fn handle_roles(&self) -> &'static [HandleRole] {
        &TEXT_HANDLES
    }

    fn handle_position(&self, role: HandleRole) -> Option<Point> {
        if !TEXT_HANDLES.contains(&role) {
            return None;
        }
        rect_handle_position(self.bounds(), role)
    }

    fn resize_from_handle(&mut self, role: HandleRole, to: Point) -> Vec2 {
        let bounds = self.bounds();
        if role.is_right_side() {
            self.wrap_width = (to.x - bounds.x0).max(MIN_WRAP_WIDTH);
            Vec2::ZERO
        } else if role.is_left_side() {
            let original = bounds.width();
            let diff = to.x - bounds.x0;
            self.wrap_width = (original - diff).max(MIN_WRAP_WIDTH);
            // Shift so the right edge stays put.
            Vec2::new(original - self.wrap_width, 0.0)
        } else {
            Vec2::ZERO
        }
    }

    fn scale_about_origin(&mut self, sx: f64, _sy: f64) {
        self.wrap_width = (self.wrap_width * sx.abs()).max(MIN_WRAP_WIDTH);
    }

    fn capture(&self) -> GeometryTuple {
        GeometryTuple::Text {
            wrap_width: self.wrap_width,
        }
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        match *tuple {
            GeometryTuple::Text { wrap_width } => {
                self.wrap_width = wrap_width;
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
    fn test_right_handle_sets_width() {
        let mut text = TextGeometry::new("hello", 100.0);
        let shift = text.resize_from_handle(HandleRole::Right, Point::new(140.0, 3.0));
        assert_eq!(text.wrap_width, 140.0);
        assert_eq!(shift, Vec2::ZERO);

        text.resize_from_handle(HandleRole::BottomRight, Point::new(-20.0, 0.0));
        assert_eq!(text.wrap_width, MIN_WRAP_WIDTH);
    }

    #[test]
    fn test_left_handle_shifts_position() {
        let mut text = TextGeometry::new("hello", 100.0);
        let shift = text.resize_from_handle(HandleRole::Left, Point::new(30.0, 0.0));
        assert_eq!(text.wrap_width, 70.0);
        assert_eq!(shift, Vec2::new(30.0, 0.0));

        let shift = text.resize_from_handle(HandleRole::TopLeft, Point::new(-10.0, 0.0));
        assert_eq!(text.wrap_width, 80.0);
        assert_eq!(shift, Vec2::new(-10.0, 0.0));
    }

    #[test]
    fn test_left_handle_clamp_keeps_right_edge() {
        let mut text = TextGeometry::new("hello", 100.0);
        let shift = text.resize_from_handle(HandleRole::Left, Point::new(250.0, 0.0));
        assert_eq!(text.wrap_width, MIN_WRAP_WIDTH);
        assert_eq!(shift.x + text.wrap_width, 100.0);
    }

    #[test]
    fn test_vertical_handles_are_ignored() {
        let mut text = TextGeometry::new("hello", 100.0);
        text.resize_from_handle(HandleRole::Top, Point::new(10.0, 10.0));
        assert_eq!(text.wrap_width, 100.0);
        assert!(text.handle_position(HandleRole::Top).is_none());
    }

    #[test]
    fn test_wrapping_grows_height() {
        let narrow = TextGeometry::new("a fairly long sentence for wrapping", 40.0);
        let wide = TextGeometry::new("a fairly long sentence for wrapping", 400.0);
        assert!(narrow.height() > wide.height());
        assert_eq!(wide.line_count(), 1);
    }
}
