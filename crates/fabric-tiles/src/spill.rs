//! Where evicted rasters go.

use crate::error::CacheError;

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempPath;

/// Long-term storage for compressed rasters that no longer fit in memory.
///
/// A slot owns its storage: dropping it frees the space.
pub trait SpillStore: Send {
    type Slot: Send;

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<Self::Slot, CacheError>;

    fn read(&self, slot: &Self::Slot) -> Result<Vec<u8>, CacheError>;
}

/// Spills to temporary files, removed when their slot is dropped (and so at the latest when the cache is dropped).
#[derive(Debug, Default)]
pub struct FileSpill {
    dir: Option<PathBuf>,
}

impl FileSpill {
    /// Files are created in `dir`, or in the platform temp directory.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl SpillStore for FileSpill {
    type Slot = TempPath;

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<TempPath, CacheError> {
        let prefix = format!("fabric-{}-", name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".lz4");
        let mut file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    fn read(&self, slot: &TempPath) -> Result<Vec<u8>, CacheError> {
        Ok(fs::read(slot)?)
    }
}

/// Keeps "spilled" bytes on the heap. Useful when no writable directory is available, and in tests.
#[derive(Debug, Default)]
pub struct MemorySpill {
    writes: usize,
}

impl MemorySpill {
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl SpillStore for MemorySpill {
    type Slot = Box<[u8]>;

    fn write(&mut self, _name: &str, bytes: &[u8]) -> Result<Box<[u8]>, CacheError> {
        self.writes += 1;
        Ok(bytes.into())
    }

    fn read(&self, slot: &Box<[u8]>) -> Result<Vec<u8>, CacheError> {
        Ok(slot.to_vec())
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
    fn file_slots_are_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSpill::new(Some(dir.path().to_owned()));
        let slot = store.write("raster-1", b"hello").unwrap();
        assert!(slot.starts_with(dir.path()));
        assert_eq!(store.read(&slot).unwrap(), b"hello");

        let path = slot.to_path_buf();
        assert!(path.exists());
        drop(slot);
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileSpill::new(Some(dir.path().join("does-not-exist")));
        assert!(matches!(store.write("raster-1", b"x"), Err(CacheError::Io(_))));
    }
}
