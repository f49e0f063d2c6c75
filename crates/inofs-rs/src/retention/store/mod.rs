//! Data-block allocator over a [`BlockDevice`].
//!
//! The free-block bitmap is cached in memory and every change is written
//! through to its block on the device, so the on-disk bitmap never lags the
//! cache by more than the operation in flight.


use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::bits::Bitmap;
use crate::layout::constants::BLOCK_SIZE;
use crate::layout::superblock::Superblock;
use crate::layout::{Block, BlockId, empty_block};
use crate::retention::disk::BlockDevice;

pub struct BlockStore<D: BlockDevice> {
    device: D,
    bitmap: Bitmap,
    bitmap_start: u32,
    data_start: u32,
}

impl<D: BlockDevice> BlockStore<D> {
    /// Starts an empty data region: every block free, bitmap blocks zeroed.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn format(device: D, sb: &Superblock) -> FsResult<Self> {
        let mut store = Self {
            device,
            bitmap: Bitmap::new(sb.data_blocks),
            bitmap_start: sb.block_bitmap_start,
            data_start: sb.data_start,
        };
        let zero = empty_block();
        for block in 0..sb.block_bitmap_blocks {
            store.device.write_block(sb.block_bitmap_start + block, &zero)?;
        }
        Ok(store)
    }

    /// Reads the persisted bitmap back.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn load(device: D, sb: &Superblock) -> FsResult<Self> {
        let mut stored = Vec::with_capacity(sb.block_bitmap_blocks as usize * BLOCK_SIZE);
        let mut buf = empty_block();
        for block in 0..sb.block_bitmap_blocks {
            device.read_block(sb.block_bitmap_start + block, &mut buf)?;
            stored.extend_from_slice(&buf);
        }
        Ok(Self {
            device,
            bitmap: Bitmap::from_bytes(&stored, sb.data_blocks),
            bitmap_start: sb.block_bitmap_start,
            data_start: sb.data_start,
        })
    }

    /// Hands out the lowest-numbered free block, zero-filled.
    ///
    /// # Errors
    /// Returns [`FsError::OutOfSpace`] when every data block is in use.
    pub fn allocate(&mut self) -> FsResult<BlockId> {
        let id = self.bitmap.first_clear().ok_or(FsError::OutOfSpace)?;
        self.device.write_block(self.data_start + id, &empty_block())?;
        self.bitmap.set(id, true);
        self.persist_bit(id)?;
        debug!(block = id, "allocated data block");
        Ok(id)
    }

    /// Returns `id` to the pool. Contents are left as they are.
    ///
    /// # Errors
    /// Returns [`FsError::Corrupt`] for an out-of-range id or a block that is
    /// already free.
    pub fn free(&mut self, id: BlockId) -> FsResult<()> {
        self.check_range(id)?;
        if !self.bitmap.set(id, false) {
            return Err(FsError::corrupt(format!("double free of block {id}")));
        }
        self.persist_bit(id)?;
        debug!(block = id, "freed data block");
        Ok(())
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] for an out-of-range id.
    pub fn read(&self, id: BlockId, buf: &mut Block) -> FsResult<()> {
        self.check_range(id)?;
        self.device.read_block(self.data_start + id, buf)
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] for an out-of-range id.
    pub fn write(&mut self, id: BlockId, buf: &Block) -> FsResult<()> {
        self.check_range(id)?;
        self.device.write_block(self.data_start + id, buf)
    }

    #[must_use]
    pub fn free_count(&self) -> u32 {
        self.bitmap.count_clear()
    }

    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.bitmap.len()
    }

    #[must_use]
    pub fn is_allocated(&self, id: BlockId) -> bool {
        self.bitmap.get(id)
    }

    #[must_use]
    pub const fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    /// Reads a metadata block by absolute device index.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn read_raw(&self, index: u32, buf: &mut Block) -> FsResult<()> {
        self.device.read_block(index, buf)
    }

    /// Writes a metadata block by absolute device index.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn write_raw(&mut self, index: u32, buf: &Block) -> FsResult<()> {
        self.device.write_block(index, buf)
    }

    /// # Errors
    /// Propagates device errors.
    pub fn flush(&mut self) -> FsResult<()> {
        self.device.flush()
    }

    pub fn into_device(self) -> D {
        self.device
    }

    fn check_range(&self, id: BlockId) -> FsResult<()> {
        if id >= self.bitmap.len() {
            return Err(FsError::corrupt(format!(
                "block {id} outside data region ({} blocks)",
                self.bitmap.len()
            )));
        }
        Ok(())
    }

    fn persist_bit(&mut self, id: BlockId) -> FsResult<()> {
        let index = Bitmap::block_of(id);
        let mut buf = empty_block();
        buf.copy_from_slice(self.bitmap.block_bytes(index));
        self.device.write_block(self.bitmap_start + index, &buf)
    }
}
