//! Shared building blocks for the fabric tile renderer.
//!
//! World space is measured in integer model units. One grid step (a node row or a link column) is [`GRID_SIZE`] units, which
//! is also the pixel pitch of a grid step at 1.0 zoom.

pub mod allocator;
pub mod geometry;
pub mod pool;
pub mod raster;
pub mod work_timer;

pub use allocator::{Arena, NodeId};
pub use geometry::{Dim, MinMax, Rect, GRID_SIZE};
pub use pool::{BufferPool, PoolConfig, PoolError, PoolStats};
pub use raster::{PixelFormat, Raster, Rgba};
pub use work_timer::WorkTimer;

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use bytemuck;
pub use static_assertions;
