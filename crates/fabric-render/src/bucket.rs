//! The statistical rendering path, used when a view is too dense to draw link by link.
//!
//! Instead of stroking every line, each node row and link column adds one hit per pixel it crosses to an accumulation
//! buffer. Hit counts are normalized by the expected links per pixel and mapped through a fixed color ramp, so the cost
//! depends on the screen size and the amount of visible geometry rather than the number of primitives.

use crate::canvas::Transform;
use crate::model::{DisplayOptions, FabricModel};

use fabric_core::{BufferPool, Dim, MinMax, PoolError, Raster, Rect, Rgba, GRID_SIZE};

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BucketConfig {
    /// Extra pixel rows above and below each node line.
    pub height_pad: i32,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self { height_pad: 0 }
    }
}

/// Any pixel with at least one hit is at least this opaque, so sparse areas never vanish.
const MIN_ALPHA: f32 = 40.0;

/// `(normalized density, color)` stops, ascending.
const NODE_RAMP: [(f32, Rgba); 3] = [
    (0.0, Rgba::new(180, 200, 230, 255)),
    (0.5, Rgba::new(90, 120, 190, 255)),
    (1.0, Rgba::new(20, 40, 120, 255)),
];

const LINK_RAMP: [(f32, Rgba); 4] = [
    (0.0, Rgba::new(200, 200, 200, 255)),
    (0.25, Rgba::new(150, 150, 150, 255)),
    (0.6, Rgba::new(80, 80, 80, 255)),
    (1.0, Rgba::new(0, 0, 0, 255)),
];

fn ramp_color(ramp: &[(f32, Rgba)], t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8, f: f32| (a as f32 + (b as f32 - a as f32) * f).round() as u8;
    let (lo, hi) = ramp
        .iter()
        .tuple_windows()
        .find(|(_, hi)| t <= hi.0)
        .unwrap_or((&ramp[ramp.len() - 1], &ramp[ramp.len() - 1]));
    let span = hi.0 - lo.0;
    let f = if span > 0.0 { (t - lo.0) / span } else { 0.0 };
    let alpha = MIN_ALPHA + (255.0 - MIN_ALPHA) * t;
    Rgba::new(
        lerp(lo.1.r, hi.1.r, f),
        lerp(lo.1.g, hi.1.g, f),
        lerp(lo.1.b, hi.1.b, f),
        alpha.round() as u8,
    )
}

struct BucketNode {
    row: i32,
    segments: SmallVec<[MinMax; 1]>,
}

struct BucketLink {
    column: i32,
    top_row: i32,
    bottom_row: i32,
}

pub struct BucketRenderer {
    nodes: Vec<BucketNode>,
    links: Vec<BucketLink>,
    pool: Arc<BufferPool>,
    config: BucketConfig,
}

impl BucketRenderer {
    pub fn new(model: &FabricModel, options: &DisplayOptions, config: BucketConfig, pool: Arc<BufferPool>) -> Self {
        let shadows = options.show_shadows;
        let nodes = model
            .nodes
            .iter()
            .map(|n| BucketNode {
                row: n.row,
                segments: n.segments(shadows).iter().copied().collect(),
            })
            .collect();
        let links = model
            .links
            .iter()
            .filter_map(|l| {
                Some(BucketLink {
                    column: l.column(shadows)?,
                    top_row: l.top_row(),
                    bottom_row: l.bottom_row(),
                })
            })
            .collect();
        Self {
            nodes,
            links,
            pool,
            config,
        }
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Accumulates the geometry inside `clip` into density buffers and composites them onto `raster`, which shows `world`
    /// at `screen` resolution. Returns whether any pixel was hit.
    pub fn draw_for_buffer(
        &self,
        raster: &mut Raster,
        clip: &Rect,
        screen: Dim,
        world: Rect,
        height_pad: i32,
        links_per_pixel: f64,
    ) -> Result<bool, PoolError> {
        let t = Transform::new(world, screen);
        let width = screen.width.min(raster.width()) as i64;
        let height = screen.height.min(raster.height()) as i64;
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let clip = match clip.intersection(&world) {
            Some(c) => c,
            None => return Ok(false),
        };

        // Pixel window covered by the clip, inclusive, already inside the image.
        let win_x = MinMax::new(
            t.pixel_x(clip.x).clamp(0, width - 1) as i32,
            t.pixel_x(clip.max_x() - 1).clamp(0, width - 1) as i32,
        );
        let win_y = MinMax::new(
            t.pixel_y(clip.y).clamp(0, height - 1) as i32,
            t.pixel_y(clip.max_y() - 1).clamp(0, height - 1) as i32,
        );
        let stride = screen.width as usize;
        let len = stride * screen.height as usize;
        let mut node_hits = self.pool.fetch_buf(len);
        let mut link_hits = self.pool.fetch_buf(len);

        for node in self.nodes.iter() {
            let y = node.row * GRID_SIZE;
            if y < clip.y || y >= clip.max_y() {
                continue;
            }
            let py = t.pixel_y(y);
            let rows = (py - height_pad as i64).max(win_y.min as i64)..=(py + height_pad as i64).min(win_y.max as i64);
            for seg in node.segments.iter() {
                let x0 = (seg.min * GRID_SIZE).max(clip.x);
                let x1 = (seg.max * GRID_SIZE).min(clip.max_x() - 1);
                if x1 < x0 {
                    continue;
                }
                let px0 = t.pixel_x(x0).max(win_x.min as i64);
                let px1 = t.pixel_x(x1).min(win_x.max as i64);
                for py in rows.clone() {
                    let base = py as usize * stride;
                    for px in px0..=px1 {
                        node_hits[base + px as usize] += 1;
                    }
                }
            }
        }

        for link in self.links.iter() {
            let x = link.column * GRID_SIZE;
            if x < clip.x || x >= clip.max_x() {
                continue;
            }
            let y0 = (link.top_row * GRID_SIZE).max(clip.y);
            let y1 = (link.bottom_row * GRID_SIZE).min(clip.max_y() - 1);
            if y1 < y0 {
                continue;
            }
            let px = t.pixel_x(x);
            if px < win_x.min as i64 || px > win_x.max as i64 {
                continue;
            }
            let py0 = t.pixel_y(y0).max(win_y.min as i64);
            let py1 = t.pixel_y(y1).min(win_y.max as i64);
            for py in py0..=py1 {
                link_hits[py as usize * stride + px as usize] += 1;
            }
        }

        let norm = links_per_pixel.max(1.0) as f32;
        let mut drew = false;
        for py in win_y.min..=win_y.max {
            for px in win_x.min..=win_x.max {
                let i = py as usize * stride + px as usize;
                let (n, l) = (node_hits[i], link_hits[i]);
                if n > 0 {
                    raster.blend(px, py, ramp_color(&NODE_RAMP, n as f32 / norm));
                    drew = true;
                }
                if l > 0 {
                    raster.blend(px, py, ramp_color(&LINK_RAMP, l as f32 / norm));
                    drew = true;
                }
            }
        }

        self.pool.return_buf(node_hits)?;
        self.pool.return_buf(link_hits)?;
        Ok(drew)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
