//! A process-wide free list of raster buffers and scratch arrays.
//!
//! Tile rendering repeatedly needs same-sized rasters and accumulation buffers. Borrowers take exclusive ownership of a buffer
//! with one of the `fetch_*` methods and must give it back with the matching `return_*` method when done.

use crate::geometry::Dim;
use crate::raster::{PixelFormat, Raster};
use crate::SmallKeyHashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PoolError {
    /// The same allocation is already sitting in the free list.
    #[error("buffer at {0:#x} was returned to the pool twice")]
    DoubleReturn(usize),
    /// The returned buffer owns no allocation.
    #[error("returned buffer has no backing allocation")]
    EmptyReturn,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Byte buffers are binned by capacity to this granularity, so that requests of slightly different lengths can share.
    pub byte_bin_size: usize,
    /// Buffers returned beyond this many per key are dropped instead of pooled.
    pub max_pooled_per_key: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            byte_bin_size: 64 * 1024,
            max_pooled_per_key: 32,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub pooled_buffers: usize,
}

type ImageKey = (Dim, PixelFormat);

#[derive(Default)]
struct FreeLists {
    images: SmallKeyHashMap<ImageKey, Vec<Vec<u32>>>,
    ints: SmallKeyHashMap<usize, Vec<Vec<u32>>>,
    bytes: SmallKeyHashMap<usize, Vec<Vec<u8>>>,
    stats: PoolStats,
}

pub struct BufferPool {
    config: PoolConfig,
    free: Mutex<FreeLists>,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl BufferPool {
    pub fn new(config: PoolConfig) -> Self {
        assert!(config.byte_bin_size > 0);
        Self {
            config,
            free: Mutex::new(FreeLists::default()),
        }
    }

    /// Borrows a raster of exactly `dim` and `format`. The pixel contents are unspecified.
    pub fn fetch_image(&self, dim: Dim, format: PixelFormat) -> Raster {
        let reused = {
            let mut free = self.free.lock();
            let popped = free.images.get_mut(&(dim, format)).and_then(Vec::pop);
            free.record(popped.is_some());
            popped
        };
        match reused.and_then(|pixels| Raster::from_pixels(dim, format, pixels)) {
            Some(raster) => raster,
            None => Raster::new(dim, format),
        }
    }

    /// Borrows a zero-filled `u32` buffer of exactly `len` elements.
    pub fn fetch_buf(&self, len: usize) -> Vec<u32> {
        let reused = {
            let mut free = self.free.lock();
            let popped = free.ints.get_mut(&len).and_then(Vec::pop);
            free.record(popped.is_some());
            popped
        };
        match reused {
            Some(mut buf) => {
                buf.fill(0);
                buf
            }
            None => vec![0; len],
        }
    }

    /// Borrows a zero-filled byte buffer of `len` bytes. Its capacity is rounded up to the bin size.
    pub fn fetch_byte_buf(&self, len: usize) -> Vec<u8> {
        let bin = self.byte_bin_for_len(len);
        let reused = {
            let mut free = self.free.lock();
            let popped = free.bytes.get_mut(&bin).and_then(Vec::pop);
            free.record(popped.is_some());
            popped
        };
        let mut buf = reused.unwrap_or_else(|| Vec::with_capacity(bin));
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    pub fn return_image(&self, raster: Raster) -> Result<(), PoolError> {
        let key = (raster.dim(), raster.format());
        let pixels = raster.into_pixels();
        let max = self.config.max_pooled_per_key;
        let mut free = self.free.lock();
        let FreeLists { images, stats, .. } = &mut *free;
        push_unique(images.entry(key).or_default(), pixels, max, stats)
    }

    pub fn return_buf(&self, buf: Vec<u32>) -> Result<(), PoolError> {
        let key = buf.len();
        let max = self.config.max_pooled_per_key;
        let mut free = self.free.lock();
        let FreeLists { ints, stats, .. } = &mut *free;
        push_unique(ints.entry(key).or_default(), buf, max, stats)
    }

    pub fn return_byte_buf(&self, buf: Vec<u8>) -> Result<(), PoolError> {
        // A buffer can serve any request whose bin is no larger than its capacity.
        let bin = (buf.capacity() / self.config.byte_bin_size) * self.config.byte_bin_size;
        if buf.capacity() > 0 && bin == 0 {
            // Too small to be useful for any bin.
            return Ok(());
        }
        let max = self.config.max_pooled_per_key;
        let mut free = self.free.lock();
        let FreeLists { bytes, stats, .. } = &mut *free;
        push_unique(bytes.entry(bin).or_default(), buf, max, stats)
    }

    pub fn stats(&self) -> PoolStats {
        self.free.lock().stats
    }

    /// Drops every pooled buffer.
    pub fn clear(&self) {
        let mut free = self.free.lock();
        free.images.clear();
        free.ints.clear();
        free.bytes.clear();
        free.stats.pooled_buffers = 0;
    }

    fn byte_bin_for_len(&self, len: usize) -> usize {
        let bin = self.config.byte_bin_size;
        ((len + bin - 1) / bin).max(1) * bin
    }
}

impl FreeLists {
    fn record(&mut self, hit: bool) {
        if hit {
            self.stats.hits += 1;
            self.stats.pooled_buffers -= 1;
        } else {
            self.stats.misses += 1;
        }
    }
}

fn push_unique<T>(list: &mut Vec<Vec<T>>, buf: Vec<T>, max: usize, stats: &mut PoolStats) -> Result<(), PoolError> {
    if buf.capacity() == 0 {
        log::error!("Empty buffer returned to pool");
        return Err(PoolError::EmptyReturn);
    }
    let addr = buf.as_ptr() as usize;
    if list.iter().any(|b| b.as_ptr() as usize == addr) {
        log::error!("Buffer {:#x} returned to pool twice", addr);
        return Err(PoolError::DoubleReturn(addr));
    }
    if list.len() < max {
        list.push(buf);
        stats.pooled_buffers += 1;
    }
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
