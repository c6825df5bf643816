//! Memory-mapped file I/O for weight loading.
//!
//! Safetensors files are mapped read-only and parsed in place; tensor data
//! is decoded straight out of the mapped pages.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{ModelError, Result};

/// A memory-mapped file handle.
///
/// The mapped region remains valid for the lifetime of this struct.
/// Dropping it unmaps the file.
pub struct MappedFile {
    mmap: Mmap,
    size: usize,
}

impl MappedFile {
    /// Map a file into memory.
    ///
    /// # Safety
    /// The file must not be modified while mapped. This holds for
    /// safetensors files, which are read-only model weights.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            ModelError::WeightLoad(format!("failed to open {}: {e}", path.display()))
        })?;

        let metadata = file.metadata().map_err(|e| {
            ModelError::WeightLoad(format!("failed to read metadata for {}: {e}", path.display()))
        })?;
        let size = metadata.len() as usize;

        // Safety: we treat the file as read-only and it won't be modified externally.
        let mmap = unsafe {
            Mmap::map(&file).map_err(|e| {
                ModelError::WeightLoad(format!("failed to mmap {}: {e}", path.display()))
            })?
        };

        Ok(MappedFile { mmap, size })
    }

    /// The full mapped data as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// A subslice at the given offset and length.
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        if offset + len > self.size {
            return Err(ModelError::WeightLoad(format!(
                "slice [{offset}..{}] exceeds file size {}",
                offset + len,
                self.size,
            )));
        }
        Ok(&self.mmap[offset..offset + len])
    }

    /// Total file size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}
