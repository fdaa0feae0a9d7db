use serde::{Deserialize, Serialize};

/// World units per grid step (row or column).
pub const GRID_SIZE: i32 = 10;

/// An axis-aligned rectangle in integer world (or pixel) coordinates. The maximum edges are exclusive.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_min_and_lub(min_x: i32, min_y: i32, lub_x: i32, lub_y: i32) -> Self {
        Self::new(min_x, min_y, lub_x - min_x, lub_y - min_y)
    }

    /// The exclusive maximum X coordinate.
    #[inline]
    pub fn max_x(&self) -> i32 {
        self.x + self.width
    }

    /// The exclusive maximum Y coordinate.
    #[inline]
    pub fn max_y(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.max_x()
            && other.x < self.max_x()
            && self.y < other.max_y()
            && other.y < self.max_y()
    }

    /// Like [`Rect::intersects`], but treats zero-width or zero-height rectangles (lines) as having their edge inside.
    pub fn touches(&self, other: &Rect) -> bool {
        self.x <= other.max_x() && other.x <= self.max_x() && self.y <= other.max_y() && other.y <= self.max_y()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min_x = self.x.max(other.x);
        let min_y = self.y.max(other.y);
        let lub_x = self.max_x().min(other.max_x());
        let lub_y = self.max_y().min(other.max_y());
        let r = Rect::from_min_and_lub(min_x, min_y, lub_x, lub_y);
        (!r.is_empty()).then(|| r)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_min_and_lub(
            self.x.min(other.x),
            self.y.min(other.y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.max_x() <= self.max_x() && other.max_y() <= self.max_y()
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on the top and bottom.
    pub fn padded(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.width + 2 * dx, self.height + 2 * dy)
    }

    /// Splits into four quadrants, ordered `[top-left, top-right, bottom-left, bottom-right]`.
    ///
    /// Odd extents put the extra unit in the right/bottom halves, so the quadrants always tile `self` exactly.
    pub fn quadrants(&self) -> [Rect; 4] {
        let left_w = self.width / 2;
        let top_h = self.height / 2;
        let right_w = self.width - left_w;
        let bottom_h = self.height - top_h;
        let mid_x = self.x + left_w;
        let mid_y = self.y + top_h;
        [
            Rect::new(self.x, self.y, left_w, top_h),
            Rect::new(mid_x, self.y, right_w, top_h),
            Rect::new(self.x, mid_y, left_w, bottom_h),
            Rect::new(mid_x, mid_y, right_w, bottom_h),
        ]
    }
}

/// Pixel dimensions of a raster.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Dim {
    pub width: u32,
    pub height: u32,
}

impl Dim {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }
}

/// An inclusive integer range, used for row and column spans.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct MinMax {
    pub min: i32,
    pub max: i32,
}

impl MinMax {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub const fn point(v: i32) -> Self {
        Self { min: v, max: v }
    }

    /// Number of grid steps covered, counting both ends.
    #[inline]
    pub fn count(&self) -> i32 {
        self.max - self.min + 1
    }

    #[inline]
    pub fn contains(&self, v: i32) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn include(&mut self, v: i32) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    pub fn overlaps(&self, other: &MinMax) -> bool {
        self.min <= other.max && other.min <= self.max
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

    #[test]
    fn quadrants_tile_parent_exactly() {
        for parent in [
            Rect::new(0, 0, 100, 60),
            Rect::new(-7, 3, 33, 17),
            Rect::new(5, 5, 1, 1),
            Rect::new(0, 0, 1001, 999),
        ] {
            let quads = parent.quadrants();
            let total: i64 = quads.iter().map(Rect::area).sum();
            assert_eq!(total, parent.area());

            let union = quads.iter().fold(Rect::default(), |acc, q| acc.union(q));
            assert_eq!(union, parent);

            for (i, a) in quads.iter().enumerate() {
                assert!(parent.contains_rect(a));
                for b in quads.iter().skip(i + 1) {
                    assert!(!a.intersects(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    #[test]
    fn intersection_of_disjoint_rects_is_none() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersection(&b), None);
        assert!(!a.intersects(&b));
        assert!(a.touches(&b));
        assert_eq!(a.intersection(&Rect::new(5, 5, 10, 10)), Some(Rect::new(5, 5, 5, 5)));
    }

    #[test]
    fn min_max_count_is_inclusive() {
        let mut mm = MinMax::point(3);
        assert_eq!(mm.count(), 1);
        mm.include(7);
        mm.include(1);
        assert_eq!(mm, MinMax::new(1, 7));
        assert_eq!(mm.count(), 7);
    }
}
