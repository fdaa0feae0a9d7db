use fabric_core::PoolError;

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("spill file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("compressed raster is corrupt: {0}")]
    Decompress(io::Error),
    #[error("decompressed {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("failed to start the tile worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("tile worker panicked")]
    WorkerPanicked,
    #[error("buffer builder was released")]
    Released,
}
