//! Raster image shape.

use super::rectangle::resize_free;
use super::{GeometryTuple, ShapeGeometry};
use crate::geometry::scale_rect;
use crate::handles::{BOX_HANDLES, HandleRole, rect_handle_position};
use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageFormat, ImageReader, RgbaImage, imageops};
use kurbo::{Point, Rect, Vec2};
use std::io::Cursor;
use thiserror::Error;

/// Errors encoding or decoding embedded pixel data.
#[derive(Debug, Error)]
pub enum ImageCodecError {
    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("Image has no pixels")]
    Empty,
    #[error("Image of {width}x{height} is too large")]
    TooLarge { width: f64, height: f64 },
}

/// Largest pixel buffer an image shape will decode or resample into.
pub const MAX_IMAGE_PIXELS: u64 = 8192 * 8192;

fn pixel_count(width: f64, height: f64) -> f64 {
    width.round().max(1.0) * height.round().max(1.0)
}

/// Reject sizes whose pixel buffer would exceed [`MAX_IMAGE_PIXELS`].
pub fn check_image_size(width: f64, height: f64) -> Result<(), ImageCodecError> {
    let count = pixel_count(width, height);
    if count.is_finite() && count <= MAX_IMAGE_PIXELS as f64 {
        Ok(())
    } else {
        Err(ImageCodecError::TooLarge { width, height })
    }
}

/// An image drawn into a rectangle.
///
/// `source` keeps the pixels as loaded; `pixels` is the source resampled to
/// the current rectangle size.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry {
    source: RgbaImage,
    pixels: RgbaImage,
    rect: Rect,
}

impl ImageGeometry {
    /// Image at its natural size with its top-left corner at `offset`.
    pub fn new(offset: Point, source: RgbaImage) -> Self {
        let rect = Rect::from_origin_size(
            offset,
            (f64::from(source.width()), f64::from(source.height())),
        );
        Self {
            pixels: source.clone(),
            source,
            rect,
        }
    }

    /// Image stretched to `rect`.
    pub fn with_rect(source: RgbaImage, rect: Rect) -> Self {
        let mut image = Self {
            pixels: source.clone(),
            source,
            rect: rect.abs(),
        };
        image.resample();
        image
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn offset(&self) -> Point {
        self.rect.origin()
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    /// Pixels at the current size.
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    fn set_rect(&mut self, rect: Rect) {
        self.rect = rect.abs();
        self.resample();
    }

    fn resample(&mut self) {
        let (mut w, mut h) = (self.rect.width(), self.rect.height());
        if check_image_size(w, h).is_err() {
            // Keep the rect; cap the buffer at the same aspect.
            let shrink = (MAX_IMAGE_PIXELS as f64 / pixel_count(w, h)).sqrt();
            log::warn!("Capping {w}x{h} image buffer to {MAX_IMAGE_PIXELS} pixels");
            w = (w * shrink).floor();
            h = (h * shrink).floor();
        }
        let width = (w.round() as u32).max(1);
        let height = (h.round() as u32).max(1);
        if self.pixels.dimensions() == (width, height) {
            return;
        }
        if self.source.dimensions() == (width, height) {
            self.pixels = self.source.clone();
        } else {
            self.pixels = imageops::resize(&self.source, width, height, imageops::FilterType::Triangle);
        }
    }

    /// Encode the source pixels as base64 PNG.
    pub fn to_png_base64(&self) -> Result<String, ImageCodecError> {
        if self.source.width() == 0 || self.source.height() == 0 {
            return Err(ImageCodecError::Empty);
        }
        let mut bytes = Vec::new();
        self.source
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(STANDARD.encode(bytes))
    }

    /// Decode base64 PNG data and stretch it to `rect`.
    ///
    /// Both the encoded image and `rect` must fit in [`MAX_IMAGE_PIXELS`].
    pub fn from_png_base64(data: &str, rect: Rect) -> Result<Self, ImageCodecError> {
        let rect = rect.abs();
        check_image_size(rect.width(), rect.height())?;
        let bytes = STANDARD.decode(data.trim())?;
        let (width, height) =
            ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Png).into_dimensions()?;
        if width == 0 || height == 0 {
            return Err(ImageCodecError::Empty);
        }
        check_image_size(f64::from(width), f64::from(height))?;
        let source = image::load_from_memory_with_format(&bytes, ImageFormat::Png)?.to_rgba8();
        Ok(Self::with_rect(source, rect))
    }
}

impl ShapeGeometry for ImageGeometry {
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
        self.set_rect(resize_free(self.rect, role, to));
        Vec2::ZERO
    }

    fn scale_about_origin(&mut self, sx: f64, sy: f64) {
        self.set_rect(scale_rect(self.rect, sx, sy));
    }

    fn capture(&self) -> GeometryTuple {
        GeometryTuple::Rect(self.rect)
    }

    fn restore(&mut self, tuple: &GeometryTuple) -> bool {
        match *tuple {
            GeometryTuple::Rect(rect) => {
                self.set_rect(rect);
                true
            }
            _ => false,
        }
    }
}
