use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RasterCacheConfig {
    /// Ceiling on the uncompressed size of all in-memory entries.
    pub max_resident_bytes: usize,
    /// Where spill files go. `None` means the platform temp directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for RasterCacheConfig {
    fn default() -> Self {
        Self {
            // About 64 full-resolution 1024x256 tiles.
            max_resident_bytes: 64 << 20,
            cache_dir: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TileConfig {
    /// Pixel size of every tile, at every depth.
    pub tile_width: u32,
    pub tile_height: u32,
    /// The deepest quad-tree level. Depth 0 is the whole world in one tile.
    pub max_depth: u8,
    /// Levels up to and including this depth are queued for background rendering up front. Setting it below `max_depth`
    /// leaves the deeper tiles to be rendered when first requested.
    pub precompute_depth: u8,
    /// Tiles denser than this are drawn by the bucket renderer.
    pub links_per_pixel_threshold: f64,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_width: 1024,
            tile_height: 256,
            max_depth: 6,
            precompute_depth: 6,
            links_per_pixel_threshold: 20.0,
        }
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
    fn every_level_is_precomputed_by_default() {
        let config = TileConfig::default();
        assert_eq!(config.precompute_depth, config.max_depth);
    }
}
