//! Backing devices: a volatile in-memory image and a memory-mapped file.


use memmap2::{MmapMut, MmapOptions};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{FsError, FsResult};
use crate::layout::Block;
use crate::layout::constants::BLOCK_SIZE;

/// A fixed-size array of blocks. Reads and writes move whole blocks.
pub trait BlockDevice {
    fn block_count(&self) -> u32;

    /// # Errors
    /// Returns [`FsError::Corrupt`] if `index` is past the end of the device.
    fn read_block(&self, index: u32, buf: &mut Block) -> FsResult<()>;

    /// # Errors
    /// Returns [`FsError::Corrupt`] if `index` is past the end of the device.
    fn write_block(&mut self, index: u32, buf: &Block) -> FsResult<()>;

    /// # Errors
    /// Returns [`FsError::Io`] if the backing store rejects the flush.
    fn flush(&mut self) -> FsResult<()>;
}

fn block_range(index: u32, block_count: u32) -> FsResult<std::ops::Range<usize>> {
    if index >= block_count {
        return Err(FsError::corrupt(format!(
            "block {index} past end of device ({block_count} blocks)"
        )));
    }
    let start = index as usize * BLOCK_SIZE;
    Ok(start..start + BLOCK_SIZE)
}

/// Volatile device; contents vanish when it is dropped.
#[derive(Debug, Clone)]
pub struct MemDisk {
    bytes: Vec<u8>,
}

impl MemDisk {
    #[must_use]
    pub fn new(blocks: u32) -> Self {
        Self {
            bytes: vec![0u8; blocks as usize * BLOCK_SIZE],
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl BlockDevice for MemDisk {
    fn block_count(&self) -> u32 {
        (self.bytes.len() / BLOCK_SIZE) as u32
    }

    fn read_block(&self, index: u32, buf: &mut Block) -> FsResult<()> {
        let range = block_range(index, self.block_count())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> FsResult<()> {
        let range = block_range(index, self.block_count())?;
        self.bytes[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// Memory-mapped image file. Contents persist across sessions.
pub struct Disk {
    path: PathBuf,
    // Kept open for the lifetime of the mapping.
    _file: File,
    map: MmapMut,
    len: u64,
    /// True if the image did not exist or was empty before opening.
    pub fresh: bool,
}

impl Disk {
    /// Opens `path`, creating it if needed. The file is grown to at least
    /// `len` bytes (rounded down to whole blocks) but never shrunk, so an
    /// existing image keeps its contents and size.
    ///
    /// # Errors
    /// Returns an error if the image cannot be created, sized or mapped.
    pub fn open_prealloc(path: impl AsRef<Path>, len: u64) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let prev_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let len = prev_len.max(len) / BLOCK_SIZE as u64 * BLOCK_SIZE as u64;
        if len == 0 {
            anyhow::bail!("image {} must hold at least one block", path.display());
        }
        if u32::try_from(len / BLOCK_SIZE as u64).is_err() {
            anyhow::bail!("image length {len} exceeds the block address space");
        }
        if len > prev_len {
            file.set_len(len)?;
        }

        let map_len = usize::try_from(len)
            .map_err(|_| anyhow::anyhow!("image length {len} exceeds addressable size"))?;
        // SAFETY: the session has exclusive use of the image; nothing else
        // truncates it while mapped.
        let map = unsafe { MmapOptions::new().len(map_len).map_mut(&file)? };

        Ok(Self {
            path,
            _file: file,
            map,
            len,
            fresh: prev_len == 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl BlockDevice for Disk {
    fn block_count(&self) -> u32 {
        (self.len / BLOCK_SIZE as u64) as u32
    }

    fn read_block(&self, index: u32, buf: &mut Block) -> FsResult<()> {
        let range = block_range(index, self.block_count())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> FsResult<()> {
        let range = block_range(index, self.block_count())?;
        self.map[range].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> FsResult<()> {
        self.map.flush()?;
        Ok(())
    }
}
