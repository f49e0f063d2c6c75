//! Fixed-capacity inode table with a free-inode bitmap.
//!
//! Bit `i` of the bitmap tracks inode id `i + 1`. The table itself lives in
//! the blocks following the bitmap; both are reached through the
//! [`BlockStore`]'s raw block access.


use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::bits::Bitmap;
use crate::layout::constants::{INODE_SIZE, INODES_PER_BLOCK};
use crate::layout::inode::Inode;
use crate::layout::superblock::Superblock;
use crate::layout::{InodeId, NodeKind, empty_block};
use crate::retention::disk::BlockDevice;
use crate::retention::store::BlockStore;

pub struct InodeTable {
    bitmap: Bitmap,
    bitmap_start: u32,
    table_start: u32,
}

impl InodeTable {
    /// Zeroes the inode bitmap and table regions.
    ///
    /// # Errors
    /// Propagates device errors.
    pub fn format<D: BlockDevice>(store: &mut BlockStore<D>, sb: &Superblock) -> FsResult<Self> {
        let zero = empty_block();
        for block in 0..sb.inode_bitmap_blocks {
            store.write_raw(sb.inode_bitmap_start + block, &zero)?;
        }
        for block in 0..sb.inode_table_blocks {
            store.write_raw(sb.inode_table_start + block, &zero)?;
        }
        Ok(Self {
            bitmap: Bitmap::new(sb.inode_count),
            bitmap_start: sb.inode_bitmap_start,
            table_start: sb.inode_table_start,
        })
    }

    /// # Errors
    /// Propagates device errors.
    pub fn load<D: BlockDevice>(store: &BlockStore<D>, sb: &Superblock) -> FsResult<Self> {
        let mut stored = Vec::new();
        let mut buf = empty_block();
        for block in 0..sb.inode_bitmap_blocks {
            store.read_raw(sb.inode_bitmap_start + block, &mut buf)?;
            stored.extend_from_slice(&buf);
        }
        Ok(Self {
            bitmap: Bitmap::from_bytes(&stored, sb.inode_count),
            bitmap_start: sb.inode_bitmap_start,
            table_start: sb.inode_table_start,
        })
    }

    /// Takes the lowest free slot and initializes it with one link and no
    /// blocks.
    ///
    /// # Errors
    /// Returns [`FsError::OutOfSpace`] when the table is full.
    pub fn allocate<D: BlockDevice>(
        &mut self,
        store: &mut BlockStore<D>,
        kind: NodeKind,
    ) -> FsResult<InodeId> {
        let index = self.bitmap.first_clear().ok_or(FsError::OutOfSpace)?;
        let id = index + 1;
        self.write_slot(store, id, Some(&Inode::new(kind)))?;
        self.bitmap.set(index, true);
        self.persist_bit(store, index)?;
        debug!(ino = id, ?kind, "allocated inode");
        Ok(id)
    }

    /// # Errors
    /// [`FsError::NotFound`] if `id` is not a live inode; [`FsError::Corrupt`]
    /// if the bitmap and the table disagree.
    pub fn get<D: BlockDevice>(&self, store: &BlockStore<D>, id: InodeId) -> FsResult<Inode> {
        if !self.is_live(id) {
            return Err(FsError::NotFound);
        }
        self.read_slot(store, id)?
            .ok_or_else(|| FsError::corrupt(format!("inode {id} marked live but slot is empty")))
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] if `id` is not live.
    pub fn put<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        id: InodeId,
        inode: &Inode,
    ) -> FsResult<()> {
        if !self.is_live(id) {
            return Err(FsError::corrupt(format!("write to free inode {id}")));
        }
        self.write_slot(store, id, Some(inode))
    }

    /// Releases the slot. Data blocks must already be returned to the store.
    ///
    /// # Errors
    /// Returns [`FsError::Corrupt`] if the inode is free or still linked.
    pub fn free<D: BlockDevice>(&mut self, store: &mut BlockStore<D>, id: InodeId) -> FsResult<()> {
        let inode = self.get(store, id).map_err(|err| match err {
            FsError::NotFound => FsError::corrupt(format!("double free of inode {id}")),
            other => other,
        })?;
        if inode.nlink != 0 {
            return Err(FsError::corrupt(format!(
                "free of inode {id} with {} links",
                inode.nlink
            )));
        }
        self.write_slot(store, id, None)?;
        self.bitmap.set(id - 1, false);
        self.persist_bit(store, id - 1)?;
        debug!(ino = id, "freed inode");
        Ok(())
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
    pub fn is_live(&self, id: InodeId) -> bool {
        id != 0 && self.bitmap.get(id - 1)
    }

    /// Ids of all live inodes, ascending.
    pub fn live_ids(&self) -> impl Iterator<Item = InodeId> + '_ {
        self.bitmap.iter_set().map(|index| index + 1)
    }

    /// Decodes a slot regardless of the bitmap.
    ///
    /// # Errors
    /// [`FsError::Corrupt`] for an out-of-range id or an undecodable record.
    pub fn read_slot<D: BlockDevice>(
        &self,
        store: &BlockStore<D>,
        id: InodeId,
    ) -> FsResult<Option<Inode>> {
        let (block, offset) = self.locate(id)?;
        let mut buf = empty_block();
        store.read_raw(block, &mut buf)?;
        let mut rec = [0u8; INODE_SIZE];
        rec.copy_from_slice(&buf[offset..offset + INODE_SIZE]);
        Inode::from_bytes(&rec)
    }

    fn write_slot<D: BlockDevice>(
        &self,
        store: &mut BlockStore<D>,
        id: InodeId,
        inode: Option<&Inode>,
    ) -> FsResult<()> {
        let (block, offset) = self.locate(id)?;
        let mut buf = empty_block();
        store.read_raw(block, &mut buf)?;
        let mut rec = [0u8; INODE_SIZE];
        if let Some(inode) = inode {
            inode.write_bytes(&mut rec);
        }
        buf[offset..offset + INODE_SIZE].copy_from_slice(&rec);
        store.write_raw(block, &buf)
    }

    fn locate(&self, id: InodeId) -> FsResult<(u32, usize)> {
        if id == 0 || id > self.bitmap.len() {
            return Err(FsError::corrupt(format!("inode {id} out of range")));
        }
        let index = id - 1;
        let block = self.table_start + index / INODES_PER_BLOCK;
        let offset = (index % INODES_PER_BLOCK) as usize * INODE_SIZE;
        Ok((block, offset))
    }

    fn persist_bit<D: BlockDevice>(&self, store: &mut BlockStore<D>, index: u32) -> FsResult<()> {
        let block = Bitmap::block_of(index);
        let mut buf = empty_block();
        buf.copy_from_slice(self.bitmap.block_bytes(block));
        store.write_raw(self.bitmap_start + block, &buf)
    }
}
