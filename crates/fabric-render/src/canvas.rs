use fabric_core::{Dim, Raster, Rect, Rgba};

/// A drawing surface that accepts world-space coordinates.
pub trait Canvas {
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn fill_triangle(&mut self, points: [(i32, i32); 3], color: Rgba);

    /// Draws `text` with its baseline starting at `(x, y)`. Rotated text runs upward.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: f32, rotated: bool, color: Rgba);
}

/// Maps a world rectangle onto a pixel grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub world: Rect,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Transform {
    pub fn new(world: Rect, screen: Dim) -> Self {
        Self {
            world,
            scale_x: screen.width as f64 / world.width.max(1) as f64,
            scale_y: screen.height as f64 / world.height.max(1) as f64,
        }
    }

    #[inline]
    pub fn px(&self, x: i32) -> f64 {
        (x as f64 - self.world.x as f64) * self.scale_x
    }

    #[inline]
    pub fn py(&self, y: i32) -> f64 {
        (y as f64 - self.world.y as f64) * self.scale_y
    }

    /// Pixel column containing world X coordinate `x`.
    #[inline]
    pub fn pixel_x(&self, x: i32) -> i64 {
        self.px(x).floor() as i64
    }

    /// Pixel row containing world Y coordinate `y`.
    #[inline]
    pub fn pixel_y(&self, y: i32) -> i64 {
        self.py(y).floor() as i64
    }
}

/// Width of one character cell relative to the font size. Matches [`ApproxFontMetrics`](crate::ApproxFontMetrics).
pub(crate) const GLYPH_ADVANCE: f32 = 0.6;

/// Rasterizes onto a [`Raster`] with source-over blending. Everything is clipped to the raster bounds.
///
/// Text is "greeked": each visible character becomes a solid cell, which is what labels look like at tile resolution anyway.
pub struct RasterCanvas<'a> {
    raster: &'a mut Raster,
    transform: Transform,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(raster: &'a mut Raster, world: Rect) -> Self {
        let transform = Transform::new(world, raster.dim());
        Self { raster, transform }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    fn clamp_x(&self, px: i64) -> i32 {
        px.clamp(-1, self.raster.width() as i64) as i32
    }

    fn clamp_y(&self, py: i64) -> i32 {
        py.clamp(-1, self.raster.height() as i64) as i32
    }

    /// Fills pixel columns `[x0, x1]` and rows `[y0, y1]` (inclusive, already clamped).
    fn fill_pixels(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
        for y in y0.max(0)..=y1.min(self.raster.height() as i32 - 1) {
            for x in x0.max(0)..=x1.min(self.raster.width() as i32 - 1) {
                self.raster.blend(x, y, color);
            }
        }
    }
}

impl<'a> Canvas for RasterCanvas<'a> {
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba) {
        let t = self.transform;
        if y0 == y1 || x0 == x1 {
            // Axis-aligned lines cover every pixel they pass through, and are never thinner than one pixel.
            let (px0, px1) = (t.pixel_x(x0.min(x1)), t.pixel_x(x0.max(x1)));
            let (py0, py1) = (t.pixel_y(y0.min(y1)), t.pixel_y(y0.max(y1)));
            let (px0, px1) = (self.clamp_x(px0), self.clamp_x(px1));
            let (py0, py1) = (self.clamp_y(py0), self.clamp_y(py1));
            self.fill_pixels(px0, py0, px1, py1, color);
            return;
        }

        // DDA for everything else.
        let (fx0, fy0, fx1, fy1) = (t.px(x0), t.py(y0), t.px(x1), t.py(y1));
        let steps = (fx1 - fx0).abs().max((fy1 - fy0).abs()).ceil().min(1e6) as i64;
        let steps = steps.max(1);
        let (dx, dy) = ((fx1 - fx0) / steps as f64, (fy1 - fy0) / steps as f64);
        for i in 0..=steps {
            let x = (fx0 + dx * i as f64).floor();
            let y = (fy0 + dy * i as f64).floor();
            if x >= i32::MIN as f64 && x <= i32::MAX as f64 && y >= i32::MIN as f64 && y <= i32::MAX as f64 {
                self.raster.blend(x as i32, y as i32, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        if rect.is_empty() {
            return;
        }
        let t = self.transform;
        let px0 = self.clamp_x(t.pixel_x(rect.x));
        let py0 = self.clamp_y(t.pixel_y(rect.y));
        // The maximum edges are exclusive, but the rectangle still covers at least one pixel.
        let px1 = self.clamp_x((t.px(rect.max_x()).ceil() as i64 - 1).max(px0 as i64));
        let py1 = self.clamp_y((t.py(rect.max_y()).ceil() as i64 - 1).max(py0 as i64));
        self.fill_pixels(px0, py0, px1, py1, color);
    }

    fn fill_triangle(&mut self, points: [(i32, i32); 3], color: Rgba) {
        let t = self.transform;
        let p = points.map(|(x, y)| (t.px(x), t.py(y)));
        let min_x = p.iter().map(|q| q.0).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_x = p.iter().map(|q| q.0).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
        let min_y = p.iter().map(|q| q.1).fold(f64::INFINITY, f64::min).floor() as i64;
        let max_y = p.iter().map(|q| q.1).fold(f64::NEG_INFINITY, f64::max).ceil() as i64;
        let (x0, x1) = (self.clamp_x(min_x).max(0), self.clamp_x(max_x));
        let (y0, y1) = (self.clamp_y(min_y).max(0), self.clamp_y(max_y));

        let edge = |a: (f64, f64), b: (f64, f64), c: (f64, f64)| (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
        let area = edge(p[0], p[1], p[2]);
        if area == 0.0 {
            self.draw_line(points[0].0, points[0].1, points[1].0, points[1].1, color);
            return;
        }
        let mut drew = false;
        for y in y0..=y1.min(self.raster.height() as i32 - 1) {
            for x in x0..=x1.min(self.raster.width() as i32 - 1) {
                let c = (x as f64 + 0.5, y as f64 + 0.5);
                let w0 = edge(p[1], p[2], c) / area;
                let w1 = edge(p[2], p[0], c) / area;
                let w2 = edge(p[0], p[1], c) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.raster.blend(x, y, color);
                    drew = true;
                }
            }
        }
        if !drew {
            // Sub-pixel triangles still leave a mark.
            let (cx, cy) = ((p[0].0 + p[1].0 + p[2].0) / 3.0, (p[0].1 + p[1].1 + p[2].1) / 3.0);
            self.raster.blend(cx.floor() as i32, cy.floor() as i32, color);
        }
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, size: f32, rotated: bool, color: Rgba) {
        let advance = (size * GLYPH_ADVANCE).max(1.0) as i32;
        let cell_height = (size * 0.7).max(1.0) as i32;
        let ink = (advance * 4 / 5).max(1);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let offset = i as i32 * advance;
            let cell = if rotated {
                // Baseline runs up the screen; glyph cells sit to the left of it.
                Rect::new(x - cell_height, y - offset - ink, cell_height, ink)
            } else {
                Rect::new(x + offset, y - cell_height, ink, cell_height)
            };
            self.fill_rect(cell, color);
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;
    use fabric_core::PixelFormat;

    fn white(dim: Dim) -> Raster {
        Raster::filled(dim, PixelFormat::Argb, Rgba::WHITE)
    }

    #[test]
    fn horizontal_line_covers_its_span() {
        let mut raster = white(Dim::new(20, 10));
        let mut canvas = RasterCanvas::new(&mut raster, Rect::new(0, 0, 20, 10));
        canvas.draw_line(2, 5, 11, 5, Rgba::BLACK);
        assert_eq!(raster.count_pixels_not(Rgba::WHITE), 10);
        assert_eq!(raster.get(2, 5), Some(Rgba::BLACK));
        assert_eq!(raster.get(11, 5), Some(Rgba::BLACK));
        assert_eq!(raster.get(12, 5), Some(Rgba::WHITE));
    }

    #[test]
    fn huge_coordinates_are_clamped() {
        let mut raster = white(Dim::new(8, 8));
        let mut canvas = RasterCanvas::new(&mut raster, Rect::new(0, 0, 8, 8));
        canvas.draw_line(3, -1_000_000_000, 3, 1_000_000_000, Rgba::BLACK);
        assert_eq!(raster.count_pixels_not(Rgba::WHITE), 8);
    }

    #[test]
    fn zoomed_out_rect_still_covers_a_pixel() {
        let mut raster = white(Dim::new(10, 10));
        let mut canvas = RasterCanvas::new(&mut raster, Rect::new(0, 0, 1000, 1000));
        canvas.fill_rect(Rect::new(500, 500, 10, 10), Rgba::BLACK);
        assert_eq!(raster.count_pixels_not(Rgba::WHITE), 1);
        assert_eq!(raster.get(5, 5), Some(Rgba::BLACK));
    }

    #[test]
    fn triangle_is_filled() {
        let mut raster = white(Dim::new(10, 10));
        let mut canvas = RasterCanvas::new(&mut raster, Rect::new(0, 0, 10, 10));
        canvas.fill_triangle([(0, 0), (10, 0), (0, 10)], Rgba::BLACK);
        let inked = raster.count_pixels_not(Rgba::WHITE);
        assert!(inked > 40 && inked < 60, "{}", inked);
        assert_eq!(raster.get(1, 1), Some(Rgba::BLACK));
        assert_eq!(raster.get(9, 9), Some(Rgba::WHITE));
    }
}
