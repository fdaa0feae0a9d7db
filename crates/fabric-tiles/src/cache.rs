//! An LRU cache of compressed tile rasters with spill-to-disk.
//!
//! Every raster is LZ4-compressed when it is stored. Entries are charged their uncompressed size against the resident
//! budget; when the budget is exceeded, the least recently used entries leave memory. An entry leaving memory for the
//! first time is written to the [`SpillStore`], so eviction never loses data. A spilled entry that is read again comes back
//! into memory but keeps its spill slot, so evicting it a second time costs nothing.

use crate::config::RasterCacheConfig;
use crate::error::CacheError;
use crate::spill::{FileSpill, SpillStore};

use fabric_core::{BufferPool, Dim, PixelFormat, Raster, SmallKeyHashMap};

use either::Either;
use hashlink::LinkedHashSet;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use parking_lot::Mutex;
use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;

/// Opaque key of a cached raster.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Handle(u64);

impl Handle {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "raster-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    /// Uncompressed size of everything in memory.
    pub resident_bytes: usize,
    pub resident_count: usize,
    /// Entries that have a spill slot, resident or not.
    pub spilled_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub spill_writes: u64,
    pub spill_reads: u64,
}

#[derive(Clone, Copy, Debug)]
struct RasterMeta {
    dim: Dim,
    format: PixelFormat,
}

impl RasterMeta {
    fn of(raster: &Raster) -> Self {
        Self {
            dim: raster.dim(),
            format: raster.format(),
        }
    }

    fn byte_len(&self) -> usize {
        self.dim.num_pixels() * 4
    }
}

struct Entry<Slot> {
    meta: RasterMeta,
    /// Present while the entry is resident.
    compressed: Option<Arc<[u8]>>,
    spill: Option<Slot>,
}

impl<Slot> Entry<Slot> {
    /// The in-memory bytes if resident, otherwise the spill slot.
    fn locate(&self) -> Option<Either<Arc<[u8]>, &Slot>> {
        match (&self.compressed, &self.spill) {
            (Some(bytes), _) => Some(Either::Left(bytes.clone())),
            (None, Some(slot)) => Some(Either::Right(slot)),
            (None, None) => None,
        }
    }
}

struct CacheState<S: SpillStore> {
    entries: SmallKeyHashMap<Handle, Entry<S::Slot>>,
    /// Resident handles, least recently used first.
    recency: LinkedHashSet<Handle>,
    store: S,
    next_handle: u64,
    stats: CacheStats,
}

impl<S: SpillStore> CacheState<S> {
    fn remove(&mut self, handle: Handle) -> bool {
        let entry = match self.entries.remove(&handle) {
            Some(e) => e,
            None => return false,
        };
        if entry.compressed.is_some() {
            self.recency.remove(&handle);
            self.stats.resident_bytes -= entry.meta.byte_len();
        }
        if entry.spill.is_some() {
            self.stats.spilled_count -= 1;
        }
        true
    }
}

pub struct RasterCache<S: SpillStore = FileSpill> {
    state: Mutex<CacheState<S>>,
    max_resident_bytes: usize,
    pool: Arc<BufferPool>,
}

impl RasterCache<FileSpill> {
    pub fn with_file_spill(config: &RasterCacheConfig, pool: Arc<BufferPool>) -> Self {
        Self::new(config, FileSpill::new(config.cache_dir.clone()), pool)
    }
}

impl<S: SpillStore> RasterCache<S> {
    pub fn new(config: &RasterCacheConfig, store: S, pool: Arc<BufferPool>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: SmallKeyHashMap::default(),
                recency: LinkedHashSet::new(),
                store,
                next_handle: 1,
                stats: CacheStats::default(),
            }),
            max_resident_bytes: config.max_resident_bytes,
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    /// Compresses `raster` and stores it under a new handle, evicting older entries if needed.
    pub fn cache_an_image(&self, raster: &Raster) -> Result<Handle, CacheError> {
        let compressed = compress(raster)?;
        let mut state = self.state.lock();
        let handle = Handle(state.next_handle);
        state.next_handle += 1;
        state.entries.insert(
            handle,
            Entry {
                meta: RasterMeta::of(raster),
                compressed: Some(compressed),
                spill: None,
            },
        );
        state.recency.insert(handle);
        state.stats.resident_bytes += raster.byte_len();
        if let Err(e) = self.maintain_size(&mut state) {
            // Nobody has seen the handle yet, so nobody could ever drop it.
            state.remove(handle);
            return Err(e);
        }
        Ok(handle)
    }

    /// Reconstitutes the raster stored under `handle` into a pooled image. Returns `None` for an unknown (or dropped)
    /// handle.
    pub fn get_an_image(&self, handle: Handle) -> Result<Option<Raster>, CacheError> {
        let (meta, compressed) = {
            let mut state = self.state.lock();
            let state = &mut *state;
            let entry = match state.entries.get_mut(&handle) {
                Some(e) => e,
                None => {
                    state.stats.misses += 1;
                    return Ok(None);
                }
            };
            let meta = entry.meta;
            let compressed = match entry.locate() {
                Some(Either::Left(bytes)) => {
                    state.recency.to_back(&handle);
                    bytes
                }
                Some(Either::Right(slot)) => {
                    let bytes: Arc<[u8]> = state.store.read(slot)?.into();
                    log::debug!("Reloaded {} from spill", handle);
                    state.stats.spill_reads += 1;
                    entry.compressed = Some(bytes.clone());
                    state.recency.insert(handle);
                    state.stats.resident_bytes += meta.byte_len();
                    bytes
                }
                None => {
                    state.stats.misses += 1;
                    return Ok(None);
                }
            };
            state.stats.hits += 1;
            self.maintain_size(state)?;
            (meta, compressed)
        };

        let mut raster = self.pool.fetch_image(meta.dim, meta.format);
        if let Err(e) = decompress_into(&compressed, &mut raster) {
            // The image came from the pool, so it goes back even when it is useless.
            let _ = self.pool.return_image(raster);
            return Err(e);
        }
        Ok(Some(raster))
    }

    /// Swaps the pixels stored under `handle` for `raster`. The entry becomes the most recently used, and any stale spill
    /// slot is freed. Returns `false` if `handle` is unknown.
    pub fn replace_an_image(&self, handle: Handle, raster: &Raster) -> Result<bool, CacheError> {
        let compressed = compress(raster)?;
        let mut state = self.state.lock();
        let state = &mut *state;
        let entry = match state.entries.get_mut(&handle) {
            Some(e) => e,
            None => return Ok(false),
        };
        if entry.compressed.is_some() {
            state.stats.resident_bytes -= entry.meta.byte_len();
        }
        if entry.spill.take().is_some() {
            state.stats.spilled_count -= 1;
        }
        entry.meta = RasterMeta::of(raster);
        entry.compressed = Some(compressed);
        state.stats.resident_bytes += raster.byte_len();
        state.recency.insert(handle);
        state.recency.to_back(&handle);
        self.maintain_size(state)?;
        Ok(true)
    }

    /// Forgets `handle`, from memory and spill storage alike. Returns `false` if it was unknown.
    pub fn drop_an_image(&self, handle: Handle) -> bool {
        self.state.lock().remove(handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.state.lock().entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handle` is currently held in memory.
    pub fn is_resident(&self, handle: Handle) -> bool {
        self.state.lock().recency.contains(&handle)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            resident_count: state.recency.len(),
            ..state.stats
        }
    }

    /// Evicts least recently used entries until the resident bytes fit the budget.
    fn maintain_size(&self, state: &mut CacheState<S>) -> Result<(), CacheError> {
        while state.stats.resident_bytes > self.max_resident_bytes {
            let handle = match state.recency.pop_front() {
                Some(h) => h,
                None => break,
            };
            let entry = match state.entries.get_mut(&handle) {
                Some(e) => e,
                None => continue,
            };
            let compressed = match entry.compressed.take() {
                Some(c) => c,
                None => continue,
            };
            if entry.spill.is_none() {
                match state.store.write(&handle.to_string(), &compressed) {
                    Ok(slot) => {
                        entry.spill = Some(slot);
                        state.stats.spill_writes += 1;
                        state.stats.spilled_count += 1;
                        log::debug!("Spilled {} ({} compressed bytes)", handle, compressed.len());
                    }
                    Err(e) => {
                        // Keep the entry resident rather than lose it.
                        entry.compressed = Some(compressed);
                        state.recency.insert(handle);
                        state.recency.to_front(&handle);
                        log::error!("Failed to spill {}: {}", handle, e);
                        return Err(e);
                    }
                }
            }
            state.stats.resident_bytes -= entry.meta.byte_len();
        }
        Ok(())
    }
}

fn compress(raster: &Raster) -> Result<Arc<[u8]>, CacheError> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder.write_all(raster.as_bytes())?;
    let bytes = encoder.finish().map_err(|e| CacheError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(bytes.into())
}

fn decompress_into(bytes: &[u8], raster: &mut Raster) -> Result<(), CacheError> {
    let expected = raster.byte_len();
    let mut decoder = FrameDecoder::new(bytes);
    let mut writer = raster.as_bytes_mut();
    let actual = io::copy(&mut decoder, &mut writer).map_err(CacheError::Decompress)? as usize;
    if actual != expected {
        return Err(CacheError::SizeMismatch { expected, actual });
    }
    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
