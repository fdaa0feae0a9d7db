//! Tiled raster rendering of BioFabric networks.
//!
//! [`FabricRenderer`] wires the pieces together: a [`SceneCache`] and a [`BucketRenderer`] built from one model, a
//! [`RasterCache`] that spills compressed tiles to disk, and a [`BufferBuilder`] that keeps a quad-tree of tiles rendered in
//! the background.

mod config;

pub use config::{Config, ConfigError};

pub use fabric_core;
pub use fabric_render;
pub use fabric_tiles;

use fabric_core::{BufferPool, Dim, Raster, Rect};
use fabric_render::{
    AnnotationSet, ApproxFontMetrics, BucketRenderer, ColorGenerator, DrawerSet, FabricModel, ProgressMonitor, Reduction,
    SceneCache, SceneInputs,
};
use fabric_tiles::{BufferBuilder, BufferBuilderClient, BuildError, RasterCache, TileState};

use std::sync::Arc;

/// One model, ready to hand out tiles.
pub struct FabricRenderer {
    world: Rect,
    scene: Arc<SceneCache>,
    builder: BufferBuilder,
}

impl FabricRenderer {
    /// Builds the scene and lays out the tile tree over the model's whole extent. Returns `Ok(None)` if `progress` cancels
    /// the scene build.
    pub fn new(
        config: &Config,
        model: &FabricModel,
        colors: &dyn ColorGenerator,
        annotations: &AnnotationSet,
        progress: &mut dyn ProgressMonitor,
    ) -> Result<Option<Self>, BuildError> {
        let world = model.world_extent(config.display.show_shadows);
        let metrics = ApproxFontMetrics::default();
        let inputs = SceneInputs {
            model,
            options: &config.display,
            colors,
            annotations,
            metrics: &metrics,
            extents: world,
        };
        let scene = match SceneCache::build(&inputs, &config.scene, progress) {
            Some(scene) => Arc::new(scene),
            None => {
                log::info!("Scene build cancelled");
                return Ok(None);
            }
        };

        let pool = Arc::new(BufferPool::new(config.pool));
        let bucket = Arc::new(BucketRenderer::new(model, &config.display, config.bucket, pool.clone()));
        let drawers = DrawerSet::from_scene(scene.clone(), bucket, config.tiles.links_per_pixel_threshold);
        let cache = RasterCache::with_file_spill(&config.cache, pool);
        let builder = BufferBuilder::new(config.tiles, drawers, cache)?;
        builder.build_bufs(world)?;

        Ok(Some(Self { world, scene, builder }))
    }

    pub fn world(&self) -> Rect {
        self.world
    }

    pub fn scene(&self) -> &SceneCache {
        &self.scene
    }

    pub fn builder(&self) -> &BufferBuilder {
        &self.builder
    }

    pub fn top_image(&self) -> Result<Option<Raster>, BuildError> {
        self.builder.get_top_image()
    }

    pub fn tile(&self, depth: u8, rect: Rect) -> Result<Option<Raster>, BuildError> {
        self.builder.get_image_for_piece(depth, rect)
    }

    pub fn tile_state(&self, depth: u8, rect: Rect) -> Option<TileState> {
        self.builder.tile_state(depth, rect)
    }

    /// The whole model in one uncached image, e.g. for a navigation thumbnail.
    pub fn overview(&self, screen: Dim) -> Result<Raster, BuildError> {
        self.builder.build_one_buf(self.world, screen)
    }

    /// The highlighted subset of `world` on a transparent image, for drawing over the tiles.
    pub fn selection(&self, reduction: &Reduction, world: Rect, screen: Dim) -> Raster {
        self.scene.paint_selection(reduction, world, screen)
    }

    pub fn dispatch_ready(&self, client: &mut dyn BufferBuilderClient) -> usize {
        self.builder.dispatch_ready(client)
    }

    pub fn release(&self) {
        self.builder.release();
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
    use fabric_core::{MinMax, Rgba};
    use fabric_render::{ColorPalette, LinkInfo, NoProgress, NodeInfo};
    use fabric_tiles::{RasterCacheConfig, TileConfig};

    fn chain_model(n: i32) -> FabricModel {
        let nodes = (0..n)
            .map(|r| NodeInfo::new(format!("N{}", r), r, "node", MinMax::new((r - 1).max(0), r.min(n - 2))))
            .collect();
        let links = (0..n - 1).map(|c| LinkInfo::new(c, c, c + 1, "link")).collect();
        FabricModel::new(nodes, links)
    }

    fn config(dir: &std::path::Path) -> Config {
        Config {
            cache: RasterCacheConfig {
                max_resident_bytes: 1 << 20,
                cache_dir: Some(dir.to_path_buf()),
            },
            tiles: TileConfig {
                tile_width: 64,
                tile_height: 32,
                max_depth: 3,
                precompute_depth: 1,
                links_per_pixel_threshold: 20.0,
            },
            ..Config::default()
        }
    }

    struct Cancel;

    impl ProgressMonitor for Cancel {
        fn update(&mut self, _done: usize, _total: usize) -> bool {
            false
        }
    }

    #[test]
    fn renders_a_small_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = chain_model(12);
        let renderer = FabricRenderer::new(
            &config(dir.path()),
            &model,
            &ColorPalette::default(),
            &AnnotationSet::default(),
            &mut NoProgress,
        )
        .unwrap()
        .unwrap();

        assert_eq!(renderer.world(), model.world_extent(true));
        let top = renderer.top_image().unwrap().unwrap();
        assert_eq!(top.dim(), Dim::new(64, 32));
        assert!(top.count_pixels_not(Rgba::WHITE) > 0);
        assert!(matches!(renderer.tile_state(0, renderer.world()), Some(TileState::HiRes(_))));

        let overview = renderer.overview(Dim::new(16, 16)).unwrap();
        assert!(overview.count_pixels_not(Rgba::WHITE) > 0);
        renderer.release();
    }

    #[test]
    fn cancelled_build_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let built = FabricRenderer::new(
            &config(dir.path()),
            &chain_model(4),
            &ColorPalette::default(),
            &AnnotationSet::default(),
            &mut Cancel,
        )
        .unwrap();
        assert!(built.is_none());
    }
}
