//! The tile orchestrator.
//!
//! A [`BufferBuilder`] owns a [`TileTree`] over the world and a single background worker thread that renders tiles into the
//! [`RasterCache`]. The UI thread asks for tiles with [`BufferBuilder::get_image_for_piece`], which never waits for the
//! worker: it returns the finished tile if there is one, otherwise an upscaled piece of the nearest cached ancestor (and
//! moves the tile to the front of the work queue), otherwise nothing. Finished tiles are announced on a channel that the UI
//! thread drains with [`BufferBuilder::dispatch_ready`].
//!
//! All tree and queue state sits behind one lock. The cache and pool have their own locks and never call back in here, so
//! they may be used while it is held.

use crate::cache::{Handle, RasterCache};
use crate::config::TileConfig;
use crate::error::BuildError;
use crate::offering::{TileState, WorldPieceOffering};
use crate::spill::{FileSpill, SpillStore};
use crate::tile_tree::{TileKey, TileTree};
use crate::upscale::upscale_from_ancestor;

use fabric_core::{BufferPool, Dim, NodeId, PixelFormat, Raster, Rect, WorkTimer};
use fabric_render::{DrawerSet, RendererKind};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Tiles are opaque.
const TILE_FORMAT: PixelFormat = PixelFormat::Rgb;

/// Told when a queued tile has been rendered, so the view can repaint.
pub trait BufferBuilderClient {
    fn your_order_is_ready(&mut self, key: TileKey);
}

struct BuilderState {
    tree: Option<TileTree>,
    /// Incremented every time the tree is rebuilt, so late results for an old tree are recognized.
    generation: u64,
    queue: VecDeque<NodeId>,
    exit: bool,
    error: Option<Arc<BuildError>>,
    timer: WorkTimer,
}

impl BuilderState {
    fn enqueue_back(&mut self, id: NodeId) {
        if let Some(node) = self.tree.as_mut().and_then(|t| t.get_mut(id)) {
            if !node.offering.is_queued() && !node.offering.is_drawn() {
                node.offering.set_queued(true);
                self.queue.push_back(id);
            }
        }
    }

    /// Moves `id` to the front of the queue, adding it if needed.
    fn bump(&mut self, id: NodeId) {
        let node = match self.tree.as_mut().and_then(|t| t.get_mut(id)) {
            Some(n) => n,
            None => return,
        };
        if node.offering.is_drawn() {
            return;
        }
        if node.offering.is_queued() {
            if let Some(pos) = self.queue.iter().position(|&q| q == id) {
                self.queue.remove(pos);
            }
        }
        node.offering.set_queued(true);
        self.queue.push_front(id);
        log::trace!("Bumped {} to the front of the queue", node.key());
    }
}

/// A cached ancestor to build a placeholder from.
struct PlaceholderSource {
    id: NodeId,
    handle: Handle,
    world: Rect,
}

enum Lookup {
    /// Nothing more to do: the tile's own pixels, a blank tile, or nothing at all.
    Ready(Option<Raster>),
    Upscale {
        generation: u64,
        id: NodeId,
        source: PlaceholderSource,
    },
}

struct Job {
    generation: u64,
    id: NodeId,
    key: TileKey,
    world: Rect,
    screen: Dim,
}

struct Shared<S: SpillStore> {
    state: Mutex<BuilderState>,
    wake: Condvar,
    cache: RasterCache<S>,
    pool: Arc<BufferPool>,
    drawers: DrawerSet,
    config: TileConfig,
    ready_tx: Sender<TileKey>,
}

impl<S: SpillStore> Shared<S> {
    fn tile_dim(&self) -> Dim {
        Dim::new(self.config.tile_width, self.config.tile_height)
    }

    fn blank_raster(&self, screen: Dim) -> Raster {
        let mut raster = self.pool.fetch_image(screen, TILE_FORMAT);
        raster.fill(self.drawers.background);
        raster
    }

    /// Renders `world` and caches the result. `None` means the tile is blank.
    fn render_tile(&self, world: Rect, screen: Dim) -> Result<(RendererKind, Option<Handle>), BuildError> {
        let mut raster = self.pool.fetch_image(screen, TILE_FORMAT);
        let outcome = match self.drawers.draw(&mut raster, world) {
            Ok((kind, true)) => self
                .cache
                .cache_an_image(&raster)
                .map(|h| (kind, Some(h)))
                .map_err(BuildError::from),
            Ok((kind, false)) => Ok((kind, None)),
            Err(e) => Err(e.into()),
        };
        self.pool.return_image(raster)?;
        outcome
    }

    /// Records a finished render. Results for a replaced tree, or for a tile that finished some other way in the meantime,
    /// are dropped.
    fn complete(&self, state: &mut BuilderState, job: &Job, kind: RendererKind, rendered: Option<Handle>) {
        let stale = match state.tree.as_mut().and_then(|t| t.get_mut(job.id)) {
            Some(node) if state.generation == job.generation => {
                node.offering.set_queued(false);
                node.offering.complete(kind, rendered)
            }
            _ => rendered,
        };
        if let Some(h) = stale {
            self.cache.drop_an_image(h);
        }
    }

    /// The part of a tile request that runs under the builder lock.
    fn lookup(&self, state: &mut BuilderState, key: &TileKey) -> Result<Lookup, BuildError> {
        let generation = state.generation;
        let tree = match state.tree.as_mut() {
            Some(t) => t,
            None => return Ok(Lookup::Ready(None)),
        };
        let id = match tree.find_or_create(key) {
            Some(id) => id,
            None => {
                log::warn!("{} is not a tile of the current tree", key);
                return Ok(Lookup::Ready(None));
            }
        };

        match tree[id].offering.state() {
            TileState::Blank => return Ok(Lookup::Ready(Some(self.blank_raster(tree[id].offering.screen())))),
            TileState::HiRes(h) => {
                if let Some(raster) = self.cache.get_an_image(h)? {
                    return Ok(Lookup::Ready(Some(raster)));
                }
                log::warn!("Pixels of {} were dropped; rebuilding it", key);
                tree[id].offering.reset();
            }
            TileState::LoRes(h) => {
                if let Some(raster) = self.cache.get_an_image(h)? {
                    state.bump(id);
                    self.wake.notify_one();
                    return Ok(Lookup::Ready(Some(raster)));
                }
                tree[id].offering.reset();
            }
            TileState::Pending => {}
        }

        let blank_ancestor = tree
            .ancestors(id)
            .any(|a| tree[a].offering.proves_descendants_blank());
        if blank_ancestor {
            let offering = &mut tree[id].offering;
            if let Some(stale) = offering.mark_blank() {
                self.cache.drop_an_image(stale);
            }
            let screen = offering.screen();
            return Ok(Lookup::Ready(Some(self.blank_raster(screen))));
        }

        let source = tree.ancestors(id).find_map(|a| {
            let offering = &tree[a].offering;
            offering.handle().map(|handle| PlaceholderSource {
                id: a,
                handle,
                world: offering.world(),
            })
        });
        state.bump(id);
        self.wake.notify_one();
        Ok(match source {
            Some(source) => Lookup::Upscale { generation, id, source },
            None => Lookup::Ready(None),
        })
    }

    fn next_job(&self, state: &mut BuilderState) -> Option<Job> {
        while let Some(id) = state.queue.pop_front() {
            let generation = state.generation;
            let node = match state.tree.as_mut().and_then(|t| t.get_mut(id)) {
                Some(n) => n,
                None => continue,
            };
            node.offering.set_queued(false);
            if node.offering.is_drawn() {
                continue;
            }
            // Keep it marked while it is in flight so it is not queued twice.
            node.offering.set_queued(true);
            return Some(Job {
                generation,
                id,
                key: node.key(),
                world: node.offering.world(),
                screen: node.offering.screen(),
            });
        }
        None
    }
}

fn worker_loop<S: SpillStore>(shared: Arc<Shared<S>>) {
    log::debug!("Tile worker started");
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.exit {
                    log::debug!("Tile worker exiting");
                    return;
                }
                if let Some(job) = shared.next_job(&mut state) {
                    break job;
                }
                shared.wake.wait(&mut state);
            }
        };

        let started = std::time::Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| shared.render_tile(job.world, job.screen)))
            .unwrap_or(Err(BuildError::WorkerPanicked));
        let elapsed = started.elapsed();

        let mut state = shared.state.lock();
        match result {
            Ok((kind, rendered)) => {
                shared.complete(&mut state, &job, kind, rendered);
                state.timer.complete_item(elapsed);
                log::debug!(
                    "Built tile {} in {:?} (average {:?} over {} tiles)",
                    job.key,
                    elapsed,
                    state.timer.average(),
                    state.timer.items_completed()
                );
                // The receiver lives in the builder; if it is gone, nobody is listening anyway.
                let _ = shared.ready_tx.send(job.key);
            }
            Err(e) => {
                log::error!("Tile worker stopped after failing to build {}: {}", job.key, e);
                if let Some(node) = state.tree.as_mut().and_then(|t| t.get_mut(job.id)) {
                    node.offering.set_queued(false);
                }
                state.error = Some(Arc::new(e));
                return;
            }
        }
        if state.exit {
            log::debug!("Tile worker exiting");
            return;
        }
    }
}

/// Partitions the world into a quad-tree of tiles and keeps them rendered and cached.
pub struct BufferBuilder<S: SpillStore = FileSpill> {
    shared: Arc<Shared<S>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    ready_rx: Receiver<TileKey>,
}

impl<S> BufferBuilder<S>
where
    S: SpillStore + 'static,
    S::Slot: 'static,
{
    /// Starts the background worker. Nothing is rendered until [`BufferBuilder::build_bufs`].
    pub fn new(config: TileConfig, drawers: DrawerSet, cache: RasterCache<S>) -> Result<Self, BuildError> {
        let (ready_tx, ready_rx) = channel::unbounded();
        let pool = cache.pool().clone();
        let shared = Arc::new(Shared {
            state: Mutex::new(BuilderState {
                tree: None,
                generation: 0,
                queue: VecDeque::new(),
                exit: false,
                error: None,
                timer: WorkTimer::new(),
            }),
            wake: Condvar::new(),
            cache,
            pool,
            drawers,
            config,
            ready_tx,
        });
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("fabric-tile-worker".into())
            .spawn(move || worker_loop(worker_shared))
            .map_err(BuildError::Spawn)?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            ready_rx,
        })
    }

    pub fn config(&self) -> &TileConfig {
        &self.shared.config
    }

    pub fn cache(&self) -> &RasterCache<S> {
        &self.shared.cache
    }

    /// Lays out a fresh tile tree over `world`. The root and its four children are rendered before this returns; everything
    /// down to the precompute depth is queued for the worker. Any previous tree and its cached tiles are discarded.
    pub fn build_bufs(&self, world: Rect) -> Result<(), BuildError> {
        self.check_running()?;
        let config = &self.shared.config;
        let mut tree = TileTree::new(world, self.shared.tile_dim(), config.max_depth);

        let eager = tree.breadth_first(config.max_depth.min(1));
        for &id in eager.iter() {
            let offering = &mut tree[id].offering;
            let (kind, rendered) = self.shared.render_tile(offering.world(), offering.screen())?;
            offering.complete(kind, rendered);
        }
        let precompute: Vec<NodeId> = tree
            .breadth_first(config.precompute_depth.min(config.max_depth))
            .into_iter()
            .filter(|&id| tree[id].key().depth > 1)
            .collect();
        log::info!(
            "Built {} eager tiles over {:?}, queued {} more",
            eager.len(),
            world,
            precompute.len()
        );

        let mut state = self.shared.state.lock();
        if let Some(old) = state.tree.take() {
            for (_, node) in old.iter() {
                if let Some(h) = node.offering.handle() {
                    self.shared.cache.drop_an_image(h);
                }
            }
        }
        state.generation += 1;
        state.queue.clear();
        state.tree = Some(tree);
        for id in precompute {
            state.enqueue_back(id);
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    /// The whole world as one tile.
    pub fn get_top_image(&self) -> Result<Option<Raster>, BuildError> {
        let key = {
            let state = self.shared.state.lock();
            match state.tree.as_ref() {
                Some(tree) => TileKey::new(0, tree.world()),
                None => return Ok(None),
            }
        };
        self.get_image_for_piece(key.depth, key.rect)
    }

    /// The tile at `depth` covering exactly `rect`, at the best resolution currently available.
    ///
    /// Returns `None` if nothing can be shown yet (including when `rect` is not a tile of the tree). A request for an
    /// unfinished tile always moves it to the front of the work queue.
    pub fn get_image_for_piece(&self, depth: u8, rect: Rect) -> Result<Option<Raster>, BuildError> {
        self.check_running()?;
        let key = TileKey::new(depth, rect);
        let shared = &*self.shared;

        let (generation, id, source) = {
            let mut guard = shared.state.lock();
            match shared.lookup(&mut guard, &key)? {
                Lookup::Ready(raster) => return Ok(raster),
                Lookup::Upscale { generation, id, source } => (generation, id, source),
            }
        };

        // Outside the lock: fetch the ancestor and upscale its piece.
        let ancestor = match shared.cache.get_an_image(source.handle)? {
            Some(a) => a,
            None => {
                // The ancestor's pixels are gone too; have it rebuilt.
                let mut guard = shared.state.lock();
                let state = &mut *guard;
                if state.generation == generation {
                    if let Some(node) = state.tree.as_mut().and_then(|t| t.get_mut(source.id)) {
                        if node.offering.handle() == Some(source.handle) {
                            node.offering.reset();
                        }
                    }
                    state.enqueue_back(source.id);
                    shared.wake.notify_one();
                }
                return Ok(None);
            }
        };
        let mut placeholder = shared.blank_raster(shared.tile_dim());
        upscale_from_ancestor(&ancestor, source.world, &mut placeholder, rect);
        shared.pool.return_image(ancestor)?;
        let handle = shared.cache.cache_an_image(&placeholder)?;

        // Back under the lock: the worker may have finished this tile while we were upscaling.
        let mut guard = shared.state.lock();
        let state = &mut *guard;
        let installed = match state.tree.as_mut().and_then(|t| t.get_mut(id)) {
            Some(node) if state.generation == generation => node.offering.install_placeholder(handle),
            _ => Err(handle),
        };
        if let Err(refused) = installed {
            log::trace!("Discarding placeholder for {}, which finished first", key);
            shared.cache.drop_an_image(refused);
        }
        Ok(Some(placeholder))
    }

    /// Renders the whole world into a single `screen`-sized image, bypassing the tile tree and cache.
    pub fn build_one_buf(&self, world: Rect, screen: Dim) -> Result<Raster, BuildError> {
        let mut raster = self.shared.pool.fetch_image(screen, TILE_FORMAT);
        let (kind, drew) = self.shared.drawers.draw(&mut raster, world)?;
        log::debug!("Built overview of {:?} with {:?} renderer (blank: {})", world, kind, !drew);
        Ok(raster)
    }

    /// Delivers finished-tile notifications to `client` on the calling thread. Returns how many were delivered.
    pub fn dispatch_ready(&self, client: &mut dyn BufferBuilderClient) -> usize {
        let mut count = 0;
        for key in self.ready_rx.try_iter() {
            client.your_order_is_ready(key);
            count += 1;
        }
        count
    }

    /// The receiving end of finished-tile notifications, for callers that integrate with their own event loop.
    pub fn ready_channel(&self) -> &Receiver<TileKey> {
        &self.ready_rx
    }

    /// Stops the worker after its current tile and waits for it. Idempotent.
    pub fn release(&self) {
        {
            let mut state = self.shared.state.lock();
            state.exit = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                log::error!("Tile worker panicked while exiting");
            }
        }
    }

    /// The error that stopped the worker, if any.
    pub fn worker_error(&self) -> Option<Arc<BuildError>> {
        self.shared.state.lock().error.clone()
    }

    /// Tiles waiting for the worker.
    pub fn pending_jobs(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn tile_state(&self, depth: u8, rect: Rect) -> Option<TileState> {
        let state = self.shared.state.lock();
        let tree = state.tree.as_ref()?;
        let id = tree.find(&TileKey::new(depth, rect))?;
        tree.get(id).map(|n| n.offering.state())
    }

    /// A copy of the offering for a tile that has been referenced.
    pub fn offering(&self, depth: u8, rect: Rect) -> Option<WorldPieceOffering> {
        let state = self.shared.state.lock();
        let tree = state.tree.as_ref()?;
        let id = tree.find(&TileKey::new(depth, rect))?;
        tree.get(id).map(|n| n.offering.clone())
    }

    /// Number of tiles referenced so far, rendered or not.
    pub fn num_tiles(&self) -> usize {
        self.shared.state.lock().tree.as_ref().map_or(0, |t| t.len())
    }

    fn check_running(&self) -> Result<(), BuildError> {
        if self.shared.state.lock().exit {
            Err(BuildError::Released)
        } else {
            Ok(())
        }
    }
}

impl<S: SpillStore> Drop for BufferBuilder<S> {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.exit = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.join();
        }
    }
}
