use crate::canvas::GLYPH_ADVANCE;

use float_ord::FloatOrd;
use std::cmp::Reverse;

/// Measures label strings, in world units at the given font size.
pub trait FontMetrics: Send + Sync {
    fn string_width(&self, text: &str, size: f32) -> f64;
}

/// Fixed-advance metrics: every character is `advance * size` wide.
#[derive(Clone, Copy, Debug)]
pub struct ApproxFontMetrics {
    pub advance: f32,
}

impl Default for ApproxFontMetrics {
    fn default() -> Self {
        Self {
            advance: GLYPH_ADVANCE,
        }
    }
}

impl FontMetrics for ApproxFontMetrics {
    fn string_width(&self, text: &str, size: f32) -> f64 {
        text.chars().count() as f64 * (self.advance * size) as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelFont {
    pub size: f32,
    /// The label is turned 90 degrees because even the smallest size did not fit.
    pub rotated: bool,
}

/// An ordered set of font sizes, largest first.
#[derive(Clone, Debug)]
pub struct FontLadder {
    sizes: Vec<f32>,
}

impl FontLadder {
    pub fn new(mut sizes: Vec<f32>) -> Self {
        assert!(!sizes.is_empty(), "font ladder needs at least one size");
        sizes.sort_by_key(|s| Reverse(FloatOrd(*s)));
        sizes.dedup();
        Self { sizes }
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn smallest(&self) -> f32 {
        self.sizes[self.sizes.len() - 1]
    }

    /// Picks the largest size at which `text` is no wider than `available`. If none fits, the smallest size is used rotated.
    pub fn fit(&self, metrics: &dyn FontMetrics, text: &str, available: f64) -> LabelFont {
        self.sizes
            .iter()
            .find(|&&size| metrics.string_width(text, size) <= available)
            .map(|&size| LabelFont { size, rotated: false })
            .unwrap_or(LabelFont {
                size: self.smallest(),
                rotated: true,
            })
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
    use fabric_core::GRID_SIZE;

    #[test]
    fn largest_fitting_size_wins() {
        let ladder = FontLadder::new(vec![8.0, 20.0, 12.0]);
        assert_eq!(ladder.sizes(), &[20.0, 12.0, 8.0]);
        let metrics = ApproxFontMetrics { advance: 0.5 };

        // "abcd" is 2 * size wide.
        let span_cols = 3;
        let available = (span_cols * GRID_SIZE) as f64;
        assert_eq!(
            ladder.fit(&metrics, "abcd", available),
            LabelFont {
                size: 12.0,
                rotated: false
            }
        );
        assert_eq!(ladder.fit(&metrics, "abcd", 40.0).size, 20.0);
    }

    #[test]
    fn nothing_fits_rotates_smallest() {
        let ladder = FontLadder::new(vec![20.0, 12.0, 8.0]);
        let choice = ladder.fit(&ApproxFontMetrics::default(), "a much longer label", 10.0);
        assert_eq!(
            choice,
            LabelFont {
                size: 8.0,
                rotated: true
            }
        );
    }
}
