//! Rendering back-end interface.
//!
//! The language core never touches pixels: the `draw` and `save` built-ins
//! talk to an injected [`RenderBackend`]. The raster implementation lives in
//! its own crate; [`NullBackend`] is used by tests and by runs that never
//! draw.

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure while writing the output image.
#[derive(Debug)]
pub struct RenderError {
    /// Human-readable description.
    pub message: String,
}

impl RenderError {
    /// Create a new error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RenderError {}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// A 2-D point in drawing coordinates.
pub type Point = (f64, f64);

/// An RGBA color, one byte per channel.
pub type Rgba = [u8; 4];

/// The drawing surface the interpreter renders into.
pub trait RenderBackend {
    /// Allocate the pixel buffer and fill it with `background`.
    fn create_canvas(&mut self, width: u32, height: u32, background: Rgba);

    /// Map a point from drawing coordinates to canvas coordinates:
    /// scale, then rotate by `rot` radians, then translate by `origin`.
    fn transform(&self, point: Point, origin: Point, rot: f64, scale: Point) -> Point;

    /// Stamp a filled dot of radius `width` at `point` (canvas
    /// coordinates). Points outside the canvas are clipped.
    fn put_point(&mut self, point: Point, width: i32, color: Rgba);

    /// Encode the canvas into the file at `path`; the format follows the
    /// path suffix.
    fn flush(&mut self, path: &str) -> Result<(), RenderError>;
}

/// A back-end that swallows everything. `flush` succeeds without writing.
#[derive(Debug, Default)]
pub struct NullBackend {
    /// Number of points received, for tests.
    pub points: usize,
}

impl RenderBackend for NullBackend {
    fn create_canvas(&mut self, _width: u32, _height: u32, _background: Rgba) {}

    fn transform(&self, point: Point, origin: Point, rot: f64, scale: Point) -> Point {
        let x = point.0 * scale.0;
        let y = point.1 * scale.1;
        let (sin, cos) = rot.sin_cos();
        (
            x.mul_add(cos, y * sin) + origin.0,
            y.mul_add(cos, -(x * sin)) + origin.1,
        )
    }

    fn put_point(&mut self, _point: Point, _width: i32, _color: Rgba) {
        self.points += 1;
    }

    fn flush(&mut self, _path: &str) -> Result<(), RenderError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_backend_counts_points() {
        let mut backend = NullBackend::default();
        backend.put_point((1.0, 2.0), 1, [0, 0, 0, 255]);
        backend.put_point((3.0, 4.0), 1, [0, 0, 0, 255]);
        assert_eq!(backend.points, 2);
    }

    #[test]
    fn transform_identity() {
        let backend = NullBackend::default();
        let p = backend.transform((3.0, 4.0), (0.0, 0.0), 0.0, (1.0, 1.0));
        assert!((p.0 - 3.0).abs() < 1e-12);
        assert!((p.1 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn transform_applies_scale_then_origin() {
        let backend = NullBackend::default();
        let p = backend.transform((1.0, 2.0), (10.0, 20.0), 0.0, (2.0, 3.0));
        assert!((p.0 - 12.0).abs() < 1e-12);
        assert!((p.1 - 26.0).abs() < 1e-12);
    }
}
