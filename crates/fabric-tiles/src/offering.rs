use crate::cache::Handle;

use fabric_core::{Dim, Rect};
use fabric_render::RendererKind;

/// Where a tile is in its life.
///
/// `Pending` and `LoRes` move forward to `HiRes` or `Blank` when the worker finishes the tile. The terminal states are
/// never replaced by a placeholder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TileState {
    /// Known, but nothing to show yet.
    Pending,
    /// Showing an upscaled piece of an ancestor while the real render is queued.
    LoRes(Handle),
    /// Rendered at full resolution.
    HiRes(Handle),
    /// Rendered, and nothing was drawn.
    Blank,
}

/// Book-keeping for one tile: what part of the world it shows, at what size, and what is cached for it.
#[derive(Clone, Debug)]
pub struct WorldPieceOffering {
    world: Rect,
    screen: Dim,
    state: TileState,
    queued: bool,
    drawn_by: Option<RendererKind>,
}

impl WorldPieceOffering {
    pub fn new(world: Rect, screen: Dim) -> Self {
        Self {
            world,
            screen,
            state: TileState::Pending,
            queued: false,
            drawn_by: None,
        }
    }

    pub fn world(&self) -> Rect {
        self.world
    }

    pub fn screen(&self) -> Dim {
        self.screen
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn handle(&self) -> Option<Handle> {
        match self.state {
            TileState::LoRes(h) | TileState::HiRes(h) => Some(h),
            TileState::Pending | TileState::Blank => None,
        }
    }

    /// The tile's own render has finished.
    pub fn is_drawn(&self) -> bool {
        matches!(self.state, TileState::HiRes(_) | TileState::Blank)
    }

    /// The renderer that produced the tile's own pixels, once it is drawn.
    pub fn drawn_by(&self) -> Option<RendererKind> {
        self.drawn_by
    }

    /// Blank under the vector renderer. Descendants are never denser, so they would take the vector path too and draw a
    /// subset of nothing. A bucket blank says nothing about annotations or labels.
    pub fn proves_descendants_blank(&self) -> bool {
        self.state == TileState::Blank && self.drawn_by == Some(RendererKind::Vector)
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn set_queued(&mut self, queued: bool) {
        self.queued = queued;
    }

    /// Installs `placeholder` only if the tile is still pending. On refusal the placeholder is handed back so the caller can
    /// drop it.
    pub fn install_placeholder(&mut self, placeholder: Handle) -> Result<(), Handle> {
        if self.state == TileState::Pending {
            self.state = TileState::LoRes(placeholder);
            Ok(())
        } else {
            Err(placeholder)
        }
    }

    /// Records a finished render by `kind` (`None` means blank). Returns the handle that is now unused and should be
    /// dropped from the cache: the placeholder being replaced, or `rendered` itself if the tile was already finished.
    pub fn complete(&mut self, kind: RendererKind, rendered: Option<Handle>) -> Option<Handle> {
        let stale = match self.state {
            TileState::HiRes(_) | TileState::Blank => return rendered,
            TileState::LoRes(placeholder) => Some(placeholder),
            TileState::Pending => None,
        };
        self.state = match rendered {
            Some(h) => TileState::HiRes(h),
            None => TileState::Blank,
        };
        self.drawn_by = Some(kind);
        stale
    }

    /// Resolves the tile as blank without rendering it, because an ancestor proved it empty. Returns a placeholder handle
    /// to drop, if there was one.
    pub fn mark_blank(&mut self) -> Option<Handle> {
        if self.is_drawn() {
            return None;
        }
        self.complete(RendererKind::Vector, None)
    }

    /// Forgets a handle whose pixels are gone, so the tile gets rendered again.
    pub fn reset(&mut self) {
        self.state = TileState::Pending;
        self.drawn_by = None;
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
    use crate::cache::RasterCache;
    use crate::config::RasterCacheConfig;
    use crate::spill::MemorySpill;
    use fabric_core::{BufferPool, PixelFormat, Raster};
    use std::sync::Arc;

    fn handles(n: usize) -> Vec<Handle> {
        let cache = RasterCache::new(&RasterCacheConfig::default(), MemorySpill::default(), Arc::new(BufferPool::default()));
        let raster = Raster::new(Dim::new(1, 1), PixelFormat::Rgb);
        (0..n).map(|_| cache.cache_an_image(&raster).unwrap()).collect()
    }

    fn offering() -> WorldPieceOffering {
        WorldPieceOffering::new(Rect::new(0, 0, 10, 10), Dim::new(4, 4))
    }

    #[test]
    fn placeholder_then_hi_res() {
        let h = handles(2);
        let mut o = offering();
        assert_eq!(o.install_placeholder(h[0]), Ok(()));
        assert_eq!(o.state(), TileState::LoRes(h[0]));
        assert!(!o.is_drawn());

        assert_eq!(o.complete(RendererKind::Vector, Some(h[1])), Some(h[0]));
        assert_eq!(o.state(), TileState::HiRes(h[1]));
        assert!(o.is_drawn());
    }

    #[test]
    fn late_placeholder_never_replaces_hi_res() {
        let h = handles(2);
        let mut o = offering();
        assert_eq!(o.complete(RendererKind::Vector, Some(h[0])), None);
        assert_eq!(o.install_placeholder(h[1]), Err(h[1]));
        assert_eq!(o.state(), TileState::HiRes(h[0]));
    }

    #[test]
    fn duplicate_completion_is_discarded() {
        let h = handles(2);
        let mut o = offering();
        assert_eq!(o.complete(RendererKind::Vector, None), None);
        assert_eq!(o.complete(RendererKind::Vector, Some(h[0])), Some(h[0]));
        assert_eq!(o.state(), TileState::Blank);
        assert_eq!(o.mark_blank(), None);

        let mut o = offering();
        o.install_placeholder(h[1]).unwrap();
        assert_eq!(o.mark_blank(), Some(h[1]));
        assert_eq!(o.state(), TileState::Blank);
    }

    #[test]
    fn only_vector_blanks_cover_descendants() {
        let mut o = offering();
        o.complete(RendererKind::Bucket, None);
        assert_eq!(o.state(), TileState::Blank);
        assert!(!o.proves_descendants_blank());

        let mut o = offering();
        o.complete(RendererKind::Vector, None);
        assert!(o.proves_descendants_blank());

        let mut o = offering();
        assert_eq!(o.mark_blank(), None);
        assert!(o.proves_descendants_blank());
        o.reset();
        assert_eq!(o.drawn_by(), None);
        assert!(!o.proves_descendants_blank());
    }
}
