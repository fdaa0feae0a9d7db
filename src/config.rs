use fabric_core::PoolConfig;
use fabric_render::{BucketConfig, DisplayOptions, SceneConfig};
use fabric_tiles::{RasterCacheConfig, TileConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Ron(#[from] ron::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every tunable of the renderer, readable from a RON file. Omitted sections take their defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayOptions,
    pub pool: PoolConfig,
    pub cache: RasterCacheConfig,
    pub scene: SceneConfig,
    pub bucket: BucketConfig,
    pub tiles: TileConfig,
}

impl Config {
    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let reader = std::fs::File::open(path)?;
        let config: Self = ron::de::from_reader(reader)?;
        config.validate()?;

        Ok(config)
    }

    /// Rejects values the renderer cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scene.label_font_sizes.is_empty() {
            return Err(ConfigError::Invalid("scene.label_font_sizes must not be empty".into()));
        }
        if self.pool.byte_bin_size == 0 {
            return Err(ConfigError::Invalid("pool.byte_bin_size must be positive".into()));
        }
        Ok(())
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
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "(tiles: (tile_width: 64, tile_height: 32, max_depth: 3, precompute_depth: 2, links_per_pixel_threshold: 8.0))"
        )
        .unwrap();

        let config = Config::read_file(file.path()).unwrap();
        assert_eq!(config.tiles.tile_width, 64);
        assert_eq!(config.tiles.max_depth, 3);
        assert_eq!(config.tiles.links_per_pixel_threshold, 8.0);
        assert_eq!(config.scene.node_label_font_size, SceneConfig::default().node_label_font_size);
        assert_eq!(config.cache.max_resident_bytes, RasterCacheConfig::default().max_resident_bytes);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Config::read_file(dir.path().join("nope.ron")), Err(ConfigError::Io(_))));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(tiles: [1, 2").unwrap();
        assert!(matches!(Config::read_file(file.path()), Err(ConfigError::Ron(_))));
    }

    #[test]
    fn zero_bin_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(pool: (byte_bin_size: 0, max_pooled_per_key: 4))").unwrap();
        assert!(matches!(Config::read_file(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn empty_font_ladder_is_rejected() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.scene.label_font_sizes.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
