//! Small, reusable paint commands. Each one knows its own bounds so it can be culled against a clip rectangle before drawing.

use crate::canvas::Canvas;

use fabric_core::{Rect, Rgba, GRID_SIZE};

/// Shapes longer than this are truncated to just past the clip before being handed to the canvas.
pub const HUGE_SHAPE: i32 = 100_000;

/// How far past the clip edge a truncated shape still extends.
const TRUNCATE_MARGIN: i32 = 2 * GRID_SIZE;

fn truncate_span(lo: i32, hi: i32, clip_lo: i32, clip_hi: i32) -> (i32, i32) {
    if hi - lo <= HUGE_SHAPE {
        return (lo, hi);
    }
    (lo.max(clip_lo - TRUNCATE_MARGIN), hi.min(clip_hi + TRUNCATE_MARGIN))
}

/// A single grid line: horizontal for a node, vertical for a link.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePath {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub color: Rgba,
}

impl LinePath {
    pub fn horizontal(y: i32, x0: i32, x1: i32, color: Rgba) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y,
            x1: x0.max(x1),
            y1: y,
            color,
        }
    }

    pub fn vertical(x: i32, y0: i32, y1: i32, color: Rgba) -> Self {
        Self {
            x0: x,
            y0: y0.min(y1),
            x1: x,
            y1: y0.max(y1),
            color,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_min_and_lub(
            self.x0.min(self.x1),
            self.y0.min(self.y1),
            self.x0.max(self.x1),
            self.y0.max(self.y1),
        )
    }

    /// Returns the number of lines drawn (0 or 1).
    pub fn paint(&self, canvas: &mut dyn Canvas, clip: Option<&Rect>) -> usize {
        let (mut x0, mut y0, mut x1, mut y1) = (self.x0, self.y0, self.x1, self.y1);
        if let Some(clip) = clip {
            if !self.bounds().touches(clip) {
                return 0;
            }
            if y0 == y1 {
                let (lo, hi) = truncate_span(x0.min(x1), x0.max(x1), clip.x, clip.max_x());
                x0 = lo;
                x1 = hi;
            } else if x0 == x1 {
                let (lo, hi) = truncate_span(y0.min(y1), y0.max(y1), clip.y, clip.max_y());
                y0 = lo;
                y1 = hi;
            }
        }
        canvas.draw_line(x0, y0, x1, y1, self.color);
        1
    }
}

/// The end markers of a link: a square at the source row, and an arrowhead (directed) or square at the target row.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphPath {
    pub x: i32,
    pub source_y: i32,
    pub target_y: i32,
    pub half_size: i32,
    pub directed: bool,
    pub color: Rgba,
}

impl GlyphPath {
    fn source_bounds(&self) -> Rect {
        let h = self.half_size;
        Rect::new(self.x - h, self.source_y - h, 2 * h, 2 * h)
    }

    fn target_bounds(&self) -> Rect {
        let h = self.half_size;
        Rect::new(self.x - h, self.target_y - h, 2 * h, 2 * h)
    }

    pub fn bounds(&self) -> Rect {
        self.source_bounds().union(&self.target_bounds())
    }

    /// Returns how many of the two markers were drawn.
    pub fn paint(&self, canvas: &mut dyn Canvas, clip: Option<&Rect>) -> usize {
        let visible = |r: &Rect| clip.map_or(true, |c| r.touches(c));
        let mut drawn = 0;

        let source = self.source_bounds();
        if visible(&source) {
            canvas.fill_rect(source, self.color);
            drawn += 1;
        }

        let target = self.target_bounds();
        if visible(&target) {
            if self.directed {
                let h = self.half_size;
                // Arrowhead points away from the source.
                let dir = if self.target_y >= self.source_y { 1 } else { -1 };
                let tip = (self.x, self.target_y + dir * h);
                let left = (self.x - h, self.target_y - dir * h);
                let right = (self.x + h, self.target_y - dir * h);
                canvas.fill_triangle([tip, left, right], self.color);
            } else {
                canvas.fill_rect(target, self.color);
            }
            drawn += 1;
        }
        drawn
    }
}

/// A shaded rectangle: annotations and drain zone backgrounds.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxPath {
    pub rect: Rect,
    pub color: Rgba,
}

impl BoxPath {
    pub fn new(rect: Rect, color: Rgba) -> Self {
        Self { rect, color }
    }

    pub fn paint(&self, canvas: &mut dyn Canvas, clip: Option<&Rect>) -> usize {
        let mut rect = self.rect;
        if let Some(clip) = clip {
            if !rect.touches(clip) {
                return 0;
            }
            let (x0, x1) = truncate_span(rect.x, rect.max_x(), clip.x, clip.max_x());
            let (y0, y1) = truncate_span(rect.y, rect.max_y(), clip.y, clip.max_y());
            rect = Rect::from_min_and_lub(x0, y0, x1, y1);
        }
        canvas.fill_rect(rect, self.color);
        1
    }
}

/// A text label, already sized and positioned.
#[derive(Clone, Debug, PartialEq)]
pub struct TextPath {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub size: f32,
    pub rotated: bool,
    pub color: Rgba,
    pub bounds: Rect,
}

impl TextPath {
    pub fn paint(&self, canvas: &mut dyn Canvas, clip: Option<&Rect>) -> usize {
        if let Some(clip) = clip {
            if !self.bounds.touches(clip) {
                return 0;
            }
        }
        canvas.draw_text(&self.text, self.x, self.y, self.size, self.rotated, self.color);
        1
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
