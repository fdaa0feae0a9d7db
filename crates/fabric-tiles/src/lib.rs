//! Multi-resolution tiles of a fabric view, rendered in the background and kept in a compressed cache.
//!
//! [`BufferBuilder`] is the entry point. It partitions the world into a [`TileTree`], renders tiles with the renderers of
//! `fabric-render`, and stores them in a [`RasterCache`] that spills to disk when it outgrows its memory budget.

pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod offering;
pub mod spill;
pub mod tile_tree;
pub mod upscale;

pub use builder::{BufferBuilder, BufferBuilderClient};
pub use cache::{CacheStats, Handle, RasterCache};
pub use config::{RasterCacheConfig, TileConfig};
pub use error::{BuildError, CacheError};
pub use offering::{TileState, WorldPieceOffering};
pub use spill::{FileSpill, MemorySpill, SpillStore};
pub use tile_tree::{TileKey, TileNode, TileTree};
pub use upscale::upscale_from_ancestor;
