use crate::bucket::BucketRenderer;
use crate::canvas::RasterCanvas;
use crate::scene::SceneCache;

use fabric_core::{Dim, PoolError, Raster, Rect, Rgba};

use std::sync::Arc;

/// Renders one world rectangle into a tile raster.
pub trait TileDrawer: Send + Sync {
    /// Draws `world` scaled to fill `raster`, on top of whatever the raster already holds. Returns `false` if nothing in
    /// `world` was drawn, which marks the tile blank.
    fn draw_tile(&self, raster: &mut Raster, world: Rect, links_per_pixel: f64) -> Result<bool, PoolError>;
}

/// Estimates how crowded a view is.
pub trait LinkDensity: Send + Sync {
    fn links_per_pixel(&self, world: Rect, screen: Dim) -> f64;
}

impl TileDrawer for SceneCache {
    fn draw_tile(&self, raster: &mut Raster, world: Rect, _links_per_pixel: f64) -> Result<bool, PoolError> {
        let mut canvas = RasterCanvas::new(raster, world);
        let stats = self.paint(&mut canvas, Some(&world), None);
        Ok(stats.total() > 0)
    }
}

impl LinkDensity for SceneCache {
    fn links_per_pixel(&self, world: Rect, screen: Dim) -> f64 {
        SceneCache::links_per_pixel(self, world, screen)
    }
}

impl TileDrawer for BucketRenderer {
    fn draw_tile(&self, raster: &mut Raster, world: Rect, links_per_pixel: f64) -> Result<bool, PoolError> {
        let screen = raster.dim();
        let height_pad = self.config().height_pad;
        self.draw_for_buffer(raster, &world, screen, world, height_pad, links_per_pixel)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RendererKind {
    /// Every line drawn individually.
    Vector,
    /// Density accumulation.
    Bucket,
}

/// Views denser than `threshold` links per pixel go to the bucket renderer.
pub fn select_renderer(links_per_pixel: f64, threshold: f64) -> RendererKind {
    if links_per_pixel > threshold {
        RendererKind::Bucket
    } else {
        RendererKind::Vector
    }
}

/// The two renderers plus the density estimate that picks between them.
#[derive(Clone)]
pub struct DrawerSet {
    pub vector: Arc<dyn TileDrawer>,
    pub bucket: Arc<dyn TileDrawer>,
    pub density: Arc<dyn LinkDensity>,
    pub threshold: f64,
    pub background: Rgba,
}

impl DrawerSet {
    pub fn from_scene(scene: Arc<SceneCache>, bucket: Arc<BucketRenderer>, threshold: f64) -> Self {
        Self {
            background: scene.background(),
            vector: scene.clone(),
            bucket,
            density: scene,
            threshold,
        }
    }

    pub fn select(&self, world: Rect, screen: Dim) -> (RendererKind, f64) {
        let lpp = self.density.links_per_pixel(world, screen);
        (select_renderer(lpp, self.threshold), lpp)
    }

    /// Clears `raster` to the background and draws `world` with whichever renderer fits its density.
    pub fn draw(&self, raster: &mut Raster, world: Rect) -> Result<(RendererKind, bool), PoolError> {
        let (kind, lpp) = self.select(world, raster.dim());
        raster.fill(self.background);
        let drawer = match kind {
            RendererKind::Vector => &self.vector,
            RendererKind::Bucket => &self.bucket,
        };
        let drew = drawer.draw_tile(raster, world, lpp)?;
        log::trace!("Drew {:?} with {:?} at {:.2} links/pixel", world, kind, lpp);
        Ok((kind, drew))
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
