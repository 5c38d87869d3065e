//! Raster rendering back-end for the `sketch` drawing language.
//!
//! Implements [`RenderBackend`] over an RGBA pixel buffer. Points arrive in
//! drawing coordinates, pass through the scale → rotate → translate
//! transform, and are stamped as filled discs. On [`flush`] the buffer is
//! flipped vertically (the language's y axis points up, image rows grow
//! down) and encoded by the `image` crate, which picks the format from the
//! path suffix.
//!
//! [`flush`]: RenderBackend::flush

use image::{imageops, Rgba, RgbaImage};

use sketch_core::render::{Point, RenderBackend, RenderError, Rgba as Color};

/// A pixel canvas. Allocated lazily by the first `create_canvas` call.
#[derive(Debug, Default)]
pub struct Canvas {
    image: Option<RgbaImage>,
}

impl Canvas {
    /// An empty canvas.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Canvas dimensions, if allocated.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }

    /// Pixel at `(x, y)`, if allocated and in bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let image = self.image.as_ref()?;
        if x < image.width() && y < image.height() {
            Some(image.get_pixel(x, y).0)
        } else {
            None
        }
    }
}

impl RenderBackend for Canvas {
    fn create_canvas(&mut self, width: u32, height: u32, background: Color) {
        self.image = Some(RgbaImage::from_pixel(
            width.max(1),
            height.max(1),
            Rgba(background),
        ));
    }

    fn transform(&self, point: Point, origin: Point, rot: f64, scale: Point) -> Point {
        let x = point.0 * scale.0;
        let y = point.1 * scale.1;
        let (sin, cos) = rot.sin_cos();
        (
            x.mul_add(cos, y * sin) + origin.0,
            y.mul_add(cos, -(x * sin)) + origin.1,
        )
    }

    fn put_point(&mut self, point: Point, width: i32, color: Color) {
        let Some(image) = &mut self.image else {
            return;
        };
        if !point.0.is_finite() || !point.1.is_finite() {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let (cx, cy) = (point.0.round() as i64, point.1.round() as i64);
        let radius = i64::from(width.max(0));
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let (px, py) = (cx + dx, cy + dy);
                if px < 0 || py < 0 {
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (px, py) = (px as u32, py as u32);
                if px < image.width() && py < image.height() {
                    image.put_pixel(px, py, Rgba(color));
                }
            }
        }
    }

    fn flush(&mut self, path: &str) -> Result<(), RenderError> {
        let Some(image) = &self.image else {
            return Err(RenderError::new("no canvas to save"));
        };
        let flipped = imageops::flip_vertical(image);
        flipped
            .save(path)
            .map_err(|err| RenderError::new(err.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const WHITE: Color = [255, 255, 255, 255];
    const BLACK: Color = [0, 0, 0, 255];

    fn temp_file(name: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        std::env::temp_dir().join(format!("sketch_raster_{name}_{}_{ts}", std::process::id()))
    }

    #[test]
    fn create_fills_background() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(4, 3, WHITE);
        assert_eq!(canvas.size(), Some((4, 3)));
        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
        assert_eq!(canvas.pixel(3, 2), Some(WHITE));
    }

    #[test]
    fn put_point_stamps_a_disc() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(5, 5, WHITE);
        canvas.put_point((2.0, 2.0), 1, BLACK);
        // centre and the four direct neighbours
        assert_eq!(canvas.pixel(2, 2), Some(BLACK));
        assert_eq!(canvas.pixel(1, 2), Some(BLACK));
        assert_eq!(canvas.pixel(3, 2), Some(BLACK));
        assert_eq!(canvas.pixel(2, 1), Some(BLACK));
        assert_eq!(canvas.pixel(2, 3), Some(BLACK));
        // corners stay background
        assert_eq!(canvas.pixel(0, 0), Some(WHITE));
        assert_eq!(canvas.pixel(1, 1), Some(WHITE));
    }

    #[test]
    fn points_outside_the_canvas_are_clipped() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(4, 4, WHITE);
        canvas.put_point((-10.0, 2.0), 1, BLACK);
        canvas.put_point((2.0, 100.0), 2, BLACK);
        canvas.put_point((f64::NAN, 0.0), 1, BLACK);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(canvas.pixel(x, y), Some(WHITE), "pixel {x},{y}");
            }
        }
    }

    #[test]
    fn edge_points_are_partially_drawn() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(4, 4, WHITE);
        canvas.put_point((0.0, 0.0), 1, BLACK);
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
        assert_eq!(canvas.pixel(1, 0), Some(BLACK));
        assert_eq!(canvas.pixel(0, 1), Some(BLACK));
    }

    #[test]
    fn draw_before_create_is_a_no_op() {
        let mut canvas = Canvas::new();
        canvas.put_point((1.0, 1.0), 1, BLACK);
        assert_eq!(canvas.size(), None);
    }

    // -- transform --

    #[test]
    fn transform_identity() {
        let canvas = Canvas::new();
        let p = canvas.transform((3.0, -4.0), (0.0, 0.0), 0.0, (1.0, 1.0));
        assert!((p.0 - 3.0).abs() < 1e-12);
        assert!((p.1 + 4.0).abs() < 1e-12);
    }

    #[test]
    fn transform_order_is_scale_rotate_translate() {
        let canvas = Canvas::new();
        // quarter turn: (x, y) -> (y, -x)
        let p = canvas.transform((1.0, 0.0), (0.0, 0.0), std::f64::consts::FRAC_PI_2, (1.0, 1.0));
        assert!(p.0.abs() < 1e-12);
        assert!((p.1 + 1.0).abs() < 1e-12);

        let p = canvas.transform((1.0, 2.0), (10.0, 20.0), 0.0, (3.0, 4.0));
        assert!((p.0 - 13.0).abs() < 1e-12);
        assert!((p.1 - 28.0).abs() < 1e-12);
    }

    // -- flush --

    #[test]
    fn flush_writes_a_vertically_flipped_png() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(2, 2, WHITE);
        // bottom-left in drawing coordinates
        canvas.put_point((0.0, 0.0), 0, BLACK);

        let path = temp_file("flip").with_extension("png");
        canvas.flush(path.to_str().expect("utf-8 path")).expect("save");

        let reloaded = image::open(&path).expect("reload").to_rgba8();
        assert_eq!(reloaded.dimensions(), (2, 2));
        // after the flip the point sits at the bottom of the file
        assert_eq!(reloaded.get_pixel(0, 1).0, BLACK);
        assert_eq!(reloaded.get_pixel(0, 0).0, WHITE);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn flush_without_canvas_fails() {
        let mut canvas = Canvas::new();
        let path = temp_file("empty").with_extension("png");
        assert!(canvas.flush(path.to_str().expect("utf-8 path")).is_err());
    }

    #[test]
    fn flush_to_unknown_extension_fails() {
        let mut canvas = Canvas::new();
        canvas.create_canvas(2, 2, WHITE);
        let path = temp_file("bad").with_extension("not_an_image");
        assert!(canvas.flush(path.to_str().expect("utf-8 path")).is_err());
    }
}
