//! Geometry helpers layered over kurbo.
//!
//! Points, rectangles and affine transforms are kurbo's value types. This
//! module adds the pieces the scene graph needs on top of them: corner
//! normalisation, checked inversion, and the nine-float matrix layout used
//! by the persisted format.

use kurbo::{Affine, Point, Rect, Vec2};
use thiserror::Error;

/// Determinants smaller than this are treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Tolerance used when comparing geometry for equality.
pub const GEOMETRY_TOLERANCE: f64 = 1e-6;

/// Geometry errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Transform is not invertible (determinant {determinant})")]
    NonInvertible { determinant: f64 },
    #[error("Invalid matrix: {0}")]
    InvalidMatrix(String),
}

/// How an inversion was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inversion {
    /// The transform was inverted exactly.
    Exact,
    /// The transform was singular and identity was used instead.
    Fallback,
}

impl Inversion {
    pub fn is_fallback(self) -> bool {
        self == Inversion::Fallback
    }

    /// Combine two outcomes; any fallback wins.
    pub fn merge(self, other: Inversion) -> Inversion {
        if self.is_fallback() || other.is_fallback() {
            Inversion::Fallback
        } else {
            Inversion::Exact
        }
    }
}

/// Build a normalized rectangle from two arbitrary corners.
pub fn rect_from_corners(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b)
}

/// Scale a rectangle about the origin and normalize the result.
pub fn scale_rect(rect: Rect, sx: f64, sy: f64) -> Rect {
    Rect::new(rect.x0 * sx, rect.y0 * sy, rect.x1 * sx, rect.y1 * sy).abs()
}

/// Scale a point about `origin`.
pub fn scale_point_about(point: Point, origin: Point, sx: f64, sy: f64) -> Point {
    Point::new(
        origin.x + (point.x - origin.x) * sx,
        origin.y + (point.y - origin.y) * sy,
    )
}

/// Invert a transform, rejecting singular matrices.
pub fn try_invert(affine: Affine) -> Result<Affine, GeometryError> {
    let determinant = affine.determinant();
    if !determinant.is_finite() || determinant.abs() < SINGULAR_EPSILON {
        return Err(GeometryError::NonInvertible { determinant });
    }
    Ok(affine.inverse())
}

/// Invert a transform, falling back to identity when it is singular.
pub fn invert_or_identity(affine: Affine) -> (Affine, Inversion) {
    match try_invert(affine) {
        Ok(inverse) => (inverse, Inversion::Exact),
        Err(e) => {
            log::warn!("{e}; using identity instead");
            (Affine::IDENTITY, Inversion::Fallback)
        }
    }
}

/// The linear (non-translating) part of a transform.
pub fn linear_part(affine: Affine) -> Affine {
    let [a, b, c, d, _, _] = affine.as_coeffs();
    Affine::new([a, b, c, d, 0.0, 0.0])
}

/// Apply only the linear part of a transform to a vector.
pub fn map_vector(affine: Affine, v: Vec2) -> Vec2 {
    (linear_part(affine) * v.to_point()).to_vec2()
}

/// Check whether a transform is a pure translation.
pub fn is_translation(affine: Affine) -> bool {
    let [a, b, c, d, _, _] = affine.as_coeffs();
    (a - 1.0).abs() < GEOMETRY_TOLERANCE
        && b.abs() < GEOMETRY_TOLERANCE
        && c.abs() < GEOMETRY_TOLERANCE
        && (d - 1.0).abs() < GEOMETRY_TOLERANCE
}

/// Encode a transform as a row-major 3x3 matrix in row-vector convention:
/// `[m11, m12, m13, m21, m22, m23, m31, m32, m33]` where `(m31, m32)` is the
/// translation.
pub fn to_matrix(affine: Affine) -> [f64; 9] {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    [a, b, 0.0, c, d, 0.0, e, f, 1.0]
}

/// Decode a nine-float matrix written by [`to_matrix`].
///
/// Projective matrices are rejected since the scene only supports affine
/// transforms.
pub fn from_matrix(values: &[f64]) -> Result<Affine, GeometryError> {
    if values.len() != 9 {
        return Err(GeometryError::InvalidMatrix(format!(
            "expected 9 values, got {}",
            values.len()
        )));
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(GeometryError::InvalidMatrix(format!("non-finite value {bad}")));
    }
    let m = values;
    if m[2].abs() > GEOMETRY_TOLERANCE
        || m[5].abs() > GEOMETRY_TOLERANCE
        || (m[8] - 1.0).abs() > GEOMETRY_TOLERANCE
    {
        return Err(GeometryError::InvalidMatrix(
            "projective matrices are not supported".to_string(),
        ));
    }
    Ok(Affine::new([m[0], m[1], m[3], m[4], m[6], m[7]]))
}

/// Approximate float equality with [`GEOMETRY_TOLERANCE`].
pub fn nearly_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < GEOMETRY_TOLERANCE
}

pub fn points_nearly_equal(a: Point, b: Point) -> bool {
    nearly_equal(a.x, b.x) && nearly_equal(a.y, b.y)
}

pub fn rects_nearly_equal(a: Rect, b: Rect) -> bool {
    nearly_equal(a.x0, b.x0)
        && nearly_equal(a.y0, b.y0)
        && nearly_equal(a.x1, b.x1)
        && nearly_equal(a.y1, b.y1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_from_any_corners_is_normalized() {
        let corners = [
            (Point::new(10.0, 10.0), Point::new(-5.0, 30.0)),
            (Point::new(0.0, 0.0), Point::new(20.0, -20.0)),
            (Point::new(-3.0, -4.0), Point::new(-10.0, -40.0)),
        ];
        for (a, b) in corners {
            let rect = rect_from_corners(a, b);
            assert!(rect.width() >= 0.0);
            assert!(rect.height() >= 0.0);
        }
    }

    #[test]
    fn test_matrix_layout() {
        let affine = Affine::translate((30.0, -7.0)) * Affine::scale_non_uniform(2.0, 3.0);
        let m = to_matrix(affine);
        assert_eq!(m, [2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 30.0, -7.0, 1.0]);
        let back = from_matrix(&m).unwrap();
        assert_eq!(back.as_coeffs(), affine.as_coeffs());
    }

    #[test]
    fn test_malformed_matrix_rejected() {
        assert!(from_matrix(&[1.0, 0.0, 0.0]).is_err());
        assert!(from_matrix(&[1.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).is_err());
        assert!(from_matrix(&[f64::NAN, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn test_singular_inversion_falls_back() {
        let singular = Affine::scale(0.0);
        assert!(matches!(
            try_invert(singular),
            Err(GeometryError::NonInvertible { .. })
        ));
        let (inverse, how) = invert_or_identity(singular);
        assert_eq!(how, Inversion::Fallback);
        assert_eq!(inverse.as_coeffs(), Affine::IDENTITY.as_coeffs());

        let (inverse, how) = invert_or_identity(Affine::translate((5.0, 5.0)));
        assert_eq!(how, Inversion::Exact);
        assert!(points_nearly_equal(inverse * Point::new(5.0, 5.0), Point::ZERO));
    }

    #[test]
    fn test_scale_point_about() {
        let p = scale_point_about(Point::new(10.0, 10.0), Point::new(0.0, 10.0), 2.0, 0.5);
        assert!(points_nearly_equal(p, Point::new(20.0, 10.0)));
    }
}
