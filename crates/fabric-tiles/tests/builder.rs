use fabric_core::{BufferPool, Dim, PoolError, Raster, Rect, Rgba};
use fabric_render::{Canvas, DrawerSet, LinkDensity, RasterCanvas, TileDrawer};
use fabric_tiles::{
    BufferBuilder, BufferBuilderClient, BuildError, MemorySpill, RasterCache, RasterCacheConfig, TileConfig, TileKey,
    TileState,
};

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WORLD: Rect = Rect::new(0, 0, 1600, 800);
const TIMEOUT: Duration = Duration::from_secs(10);

/// Blocks renders until opened.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn set(&self, open: bool) {
        *self.open.lock() = open;
        self.changed.notify_all();
    }

    fn pass(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.changed.wait(&mut open);
        }
    }
}

/// Paints `content` black. Tiles below depth 1 wait for the gate. Fails on tiles smaller than `fail_below` wide, if set.
struct ContentDrawer {
    content: Rect,
    gate: Arc<Gate>,
    draws: AtomicUsize,
    fail_below: Option<i32>,
}

impl ContentDrawer {
    fn new(content: Rect, gate: Arc<Gate>, fail_below: Option<i32>) -> Self {
        Self {
            content,
            gate,
            draws: AtomicUsize::new(0),
            fail_below,
        }
    }
}

impl TileDrawer for ContentDrawer {
    fn draw_tile(&self, raster: &mut Raster, world: Rect, _links_per_pixel: f64) -> Result<bool, PoolError> {
        if world.width < WORLD.width / 2 {
            self.gate.pass();
        }
        self.draws.fetch_add(1, Ordering::SeqCst);
        if self.fail_below.map_or(false, |w| world.width < w) {
            return Err(PoolError::EmptyReturn);
        }
        match self.content.intersection(&world) {
            Some(visible) => {
                RasterCanvas::new(raster, world).fill_rect(visible, Rgba::BLACK);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct Sparse;

impl LinkDensity for Sparse {
    fn links_per_pixel(&self, _world: Rect, _screen: Dim) -> f64 {
        0.0
    }
}

/// Tiles of depth 0 and 1 are over the threshold, deeper ones are not.
struct DenseWhenWide;

impl LinkDensity for DenseWhenWide {
    fn links_per_pixel(&self, world: Rect, _screen: Dim) -> f64 {
        if world.width >= WORLD.width / 2 {
            100.0
        } else {
            1.0
        }
    }
}

#[derive(Default)]
struct RecordingClient {
    ready: Vec<TileKey>,
}

impl BufferBuilderClient for RecordingClient {
    fn your_order_is_ready(&mut self, key: TileKey) {
        self.ready.push(key);
    }
}

struct Fixture {
    builder: BufferBuilder<MemorySpill>,
    drawer: Arc<ContentDrawer>,
    gate: Arc<Gate>,
}

fn new_builder(drawers: DrawerSet, precompute_depth: u8) -> BufferBuilder<MemorySpill> {
    let pool = Arc::new(BufferPool::default());
    let cache = RasterCache::new(&RasterCacheConfig::default(), MemorySpill::default(), pool);
    let config = TileConfig {
        tile_width: 32,
        tile_height: 16,
        max_depth: 4,
        precompute_depth,
        links_per_pixel_threshold: 20.0,
    };
    BufferBuilder::new(config, drawers, cache).unwrap()
}

/// A builder whose tree is not laid out yet. Both renderers are the same drawer.
fn unbuilt(content: Rect, fail_below: Option<i32>, precompute_depth: u8) -> Fixture {
    let gate = Arc::new(Gate::default());
    gate.set(true);
    let drawer = Arc::new(ContentDrawer::new(content, gate.clone(), fail_below));
    let drawers = DrawerSet {
        vector: drawer.clone(),
        bucket: drawer.clone(),
        density: Arc::new(Sparse),
        threshold: 20.0,
        background: Rgba::WHITE,
    };
    let builder = new_builder(drawers, precompute_depth);
    Fixture { builder, drawer, gate }
}

/// Only the eagerly built levels, so the worker stays idle until asked.
fn fixture(content: Rect, fail_below: Option<i32>) -> Fixture {
    let f = unbuilt(content, fail_below, 1);
    f.builder.build_bufs(WORLD).unwrap();
    f
}

fn quadrant(rect: Rect, path: &[usize]) -> Rect {
    path.iter().fold(rect, |r, &i| r.quadrants()[i])
}

fn wait_for(builder: &BufferBuilder<MemorySpill>, key: TileKey) {
    loop {
        let ready = builder.ready_channel().recv_timeout(TIMEOUT).expect("tile never finished");
        if ready == key {
            return;
        }
    }
}

#[test]
fn eager_levels_are_ready_after_build() {
    let f = fixture(WORLD, None);
    assert_eq!(f.drawer.draws.load(Ordering::SeqCst), 5);
    let top = f.builder.get_top_image().unwrap().unwrap();
    assert_eq!(top.dim(), Dim::new(32, 16));
    assert_eq!(top.count_pixels_not(Rgba::BLACK), 0);
    for q in WORLD.quadrants() {
        assert!(matches!(f.builder.tile_state(1, q), Some(TileState::HiRes(_))));
    }
    assert_eq!(f.builder.pending_jobs(), 0);
}

#[test]
fn tile_without_cached_ancestor_is_none_but_queued() {
    let f = fixture(WORLD, None);
    f.gate.set(false);

    // Forget every cached pixel, so no ancestor can stand in.
    let mut handles = vec![f.builder.offering(0, WORLD).unwrap().handle().unwrap()];
    for q in WORLD.quadrants() {
        handles.push(f.builder.offering(1, q).unwrap().handle().unwrap());
    }
    for h in handles {
        assert!(f.builder.cache().drop_an_image(h));
    }

    let rect = quadrant(WORLD, &[3, 0]);
    assert!(f.builder.get_image_for_piece(2, rect).unwrap().is_none());
    assert_eq!(f.builder.tile_state(2, rect), Some(TileState::Pending));

    f.gate.set(true);
    wait_for(&f.builder, TileKey::new(2, rect));
    assert!(matches!(f.builder.tile_state(2, rect), Some(TileState::HiRes(_))));
    let image = f.builder.get_image_for_piece(2, rect).unwrap().unwrap();
    assert_eq!(image.count_pixels_not(Rgba::BLACK), 0);
}

#[test]
fn placeholder_is_served_then_upgraded() {
    // Content covers the left half of the top-left depth-2 tile only.
    let target = quadrant(WORLD, &[0, 0]);
    let content = Rect::new(target.x, target.y, target.width / 2, target.height);
    let f = fixture(content, None);
    f.gate.set(false);

    let placeholder = f.builder.get_image_for_piece(2, target).unwrap().unwrap();
    assert_eq!(placeholder.dim(), Dim::new(32, 16));
    assert!(matches!(f.builder.tile_state(2, target), Some(TileState::LoRes(_))));
    // Asking again serves the same placeholder.
    assert!(f.builder.get_image_for_piece(2, target).unwrap().is_some());

    f.gate.set(true);
    wait_for(&f.builder, TileKey::new(2, target));
    let mut client = RecordingClient::default();
    assert_eq!(f.builder.dispatch_ready(&mut client), 0);

    let hi_res = f.builder.get_image_for_piece(2, target).unwrap().unwrap();
    assert!(matches!(f.builder.tile_state(2, target), Some(TileState::HiRes(_))));
    // Left half black, right half white.
    assert_eq!(hi_res.count_pixels_not(Rgba::WHITE), 16 * 16);
    // Only the hi-res pixels are still cached; the placeholder was dropped.
    assert_eq!(f.builder.cache().len(), 3);
}

#[test]
fn notifications_are_delivered_on_dispatch() {
    let f = fixture(WORLD, None);
    f.gate.set(false);
    let a = quadrant(WORLD, &[1, 2]);
    let b = quadrant(WORLD, &[2, 1]);
    f.builder.get_image_for_piece(2, a).unwrap().unwrap();
    f.builder.get_image_for_piece(2, b).unwrap().unwrap();
    f.gate.set(true);

    let mut client = RecordingClient::default();
    while client.ready.len() < 2 {
        std::thread::sleep(Duration::from_millis(5));
        f.builder.dispatch_ready(&mut client);
    }
    // Completion order depends on when the worker picked up the first request.
    client.ready.sort_by_key(|k| (k.rect.x, k.rect.y));
    let mut expected = vec![TileKey::new(2, a), TileKey::new(2, b)];
    expected.sort_by_key(|k| (k.rect.x, k.rect.y));
    assert_eq!(client.ready, expected);
}

#[test]
fn blank_ancestor_resolves_descendants_without_rendering() {
    let content = quadrant(WORLD, &[0]);
    let f = fixture(content, None);
    assert!(matches!(f.builder.tile_state(1, quadrant(WORLD, &[3])), Some(TileState::Blank)));
    let draws = f.drawer.draws.load(Ordering::SeqCst);

    let rect = quadrant(WORLD, &[3, 2, 1]);
    let image = f.builder.get_image_for_piece(3, rect).unwrap().unwrap();
    assert_eq!(image.count_pixels_not(Rgba::WHITE), 0);
    assert_eq!(f.builder.tile_state(3, rect), Some(TileState::Blank));
    assert_eq!(f.drawer.draws.load(Ordering::SeqCst), draws);
    assert_eq!(f.builder.pending_jobs(), 0);
}

#[test]
fn bucket_blank_ancestor_does_not_hide_vector_content() {
    // The bucket renderer sees nothing where the vector renderer draws, e.g. an annotation band.
    let content = quadrant(WORLD, &[2, 1]);
    let gate = Arc::new(Gate::default());
    gate.set(true);
    let vector = Arc::new(ContentDrawer::new(content, gate.clone(), None));
    let bucket = Arc::new(ContentDrawer::new(Rect::default(), gate, None));
    let drawers = DrawerSet {
        vector: vector.clone(),
        bucket: bucket.clone(),
        density: Arc::new(DenseWhenWide),
        threshold: 20.0,
        background: Rgba::WHITE,
    };
    let builder = new_builder(drawers, 1);
    builder.build_bufs(WORLD).unwrap();
    assert_eq!(bucket.draws.load(Ordering::SeqCst), 5);
    assert_eq!(vector.draws.load(Ordering::SeqCst), 0);
    assert_eq!(builder.tile_state(1, quadrant(WORLD, &[2])), Some(TileState::Blank));

    // No ancestor has pixels to stand in, so the first request only queues the tile.
    assert!(builder.get_image_for_piece(2, content).unwrap().is_none());
    wait_for(&builder, TileKey::new(2, content));
    assert!(matches!(builder.tile_state(2, content), Some(TileState::HiRes(_))));
    let image = builder.get_image_for_piece(2, content).unwrap().unwrap();
    assert_eq!(image.count_pixels_not(Rgba::BLACK), 0);
    assert_eq!(vector.draws.load(Ordering::SeqCst), 1);
}

#[test]
fn requested_tile_jumps_the_precompute_queue() {
    let f = unbuilt(WORLD, None, 2);
    f.gate.set(false);
    f.builder.build_bufs(WORLD).unwrap();
    // Sixteen depth-2 tiles, one of which the worker may already have taken.
    assert!(f.builder.pending_jobs() >= 15);

    // Not precomputed, so without the bump it would wait behind all sixteen depth-2 tiles.
    let rect = quadrant(WORLD, &[3, 3, 3]);
    assert!(f.builder.get_image_for_piece(3, rect).unwrap().is_some());
    f.gate.set(true);

    // The worker may already hold one depth-2 tile; the requested tile comes right after it.
    let first = f.builder.ready_channel().recv_timeout(TIMEOUT).unwrap();
    let second = f.builder.ready_channel().recv_timeout(TIMEOUT).unwrap();
    let wanted = TileKey::new(3, rect);
    assert!(first == wanted || second == wanted, "{} then {}", first, second);
}

#[test]
fn precompute_queues_every_level_down_to_max_depth() {
    let f = unbuilt(WORLD, None, 4);
    f.gate.set(false);
    f.builder.build_bufs(WORLD).unwrap();
    // Depths 2, 3 and 4, less the tile the worker may be holding.
    assert!(f.builder.pending_jobs() >= 16 + 64 + 256 - 1);
    assert_eq!(f.builder.num_tiles(), 1 + 4 + 16 + 64 + 256);
    f.gate.set(true);
}

#[test]
fn non_tile_rectangles_are_refused() {
    let f = fixture(WORLD, None);
    let off_grid = Rect::new(1, 0, 800, 400);
    assert!(f.builder.get_image_for_piece(1, off_grid).unwrap().is_none());
    assert!(f.builder.get_image_for_piece(9, WORLD).unwrap().is_none());
    assert_eq!(f.builder.pending_jobs(), 0);
}

#[test]
fn worker_failure_is_stored_and_placeholder_remains() {
    // Anything smaller than a depth-1 tile fails to draw.
    let f = fixture(WORLD, Some(WORLD.width / 2));
    let rect = quadrant(WORLD, &[1, 1]);
    assert!(f.builder.get_image_for_piece(2, rect).unwrap().is_some());

    let deadline = std::time::Instant::now() + TIMEOUT;
    while f.builder.worker_error().is_none() {
        assert!(std::time::Instant::now() < deadline, "worker never failed");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(matches!(*f.builder.worker_error().unwrap(), BuildError::Pool(PoolError::EmptyReturn)));
    assert!(matches!(f.builder.tile_state(2, rect), Some(TileState::LoRes(_))));
    // The UI side keeps serving the placeholder.
    assert!(f.builder.get_image_for_piece(2, rect).unwrap().is_some());
}

#[test]
fn dropped_hi_res_pixels_are_rebuilt() {
    let f = fixture(WORLD, None);
    let rect = quadrant(WORLD, &[2]);
    let handle = f.builder.offering(1, rect).unwrap().handle().unwrap();
    f.builder.cache().drop_an_image(handle);

    // Falls back to upscaling the root while the tile is rebuilt.
    assert!(f.builder.get_image_for_piece(1, rect).unwrap().is_some());
    wait_for(&f.builder, TileKey::new(1, rect));
    assert!(matches!(f.builder.tile_state(1, rect), Some(TileState::HiRes(_))));
}

#[test]
fn overview_bypasses_the_cache() {
    let f = fixture(quadrant(WORLD, &[0]), None);
    let cached = f.builder.cache().len();
    let overview = f.builder.build_one_buf(WORLD, Dim::new(8, 8)).unwrap();
    assert_eq!(overview.count_pixels_not(Rgba::WHITE), 16);
    assert_eq!(f.builder.cache().len(), cached);
}

#[test]
fn released_builder_refuses_requests() {
    let f = fixture(WORLD, None);
    f.builder.release();
    f.builder.release();
    assert!(matches!(f.builder.get_top_image(), Err(BuildError::Released)));
    assert!(matches!(f.builder.build_bufs(WORLD), Err(BuildError::Released)));
}

#[test]
fn rebuilding_discards_old_tiles() {
    let f = fixture(WORLD, None);
    assert_eq!(f.builder.cache().len(), 5);
    let smaller = Rect::new(0, 0, 800, 400);
    f.builder.build_bufs(smaller).unwrap();
    assert_eq!(f.builder.cache().len(), 5);
    assert!(f.builder.tile_state(0, WORLD).is_none());
    assert!(matches!(f.builder.tile_state(0, smaller), Some(TileState::HiRes(_))));
}
