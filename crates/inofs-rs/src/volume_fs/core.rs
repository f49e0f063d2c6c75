use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::constants::{
    BLOCK_SIZE, DIRECT_PTRS, MAX_FILE_SIZE, PTRS_PER_BLOCK, UNALLOCATED_BLOCK,
};
use crate::layout::inode::{Inode, read_u32};
use crate::layout::{Block, BlockId, InodeId, div_ceil, empty_block};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

impl<D: BlockDevice> VolumeFs<D> {
    pub(crate) fn load_inode(&self, id: InodeId) -> FsResult<Inode> {
        self.inodes.get(&self.store, id)
    }

    pub(crate) fn store_inode(&mut self, id: InodeId, inode: &Inode) -> FsResult<()> {
        self.inodes.put(&mut self.store, id, inode)
    }

    /// Data block holding content block `index` of `inode`.
    pub(crate) fn block_of(&self, inode: &Inode, index: usize) -> FsResult<BlockId> {
        let ptr = if index < DIRECT_PTRS {
            inode.direct[index]
        } else {
            let slot = index - DIRECT_PTRS;
            if slot >= PTRS_PER_BLOCK || inode.indirect == UNALLOCATED_BLOCK {
                return Err(FsError::corrupt(format!(
                    "content block {index} has no indirection block"
                )));
            }
            let table = self.read_block(inode.indirect)?;
            read_u32(&table, slot * 4)
        };
        if ptr == UNALLOCATED_BLOCK {
            return Err(FsError::corrupt(format!("hole at content block {index}")));
        }
        Ok(ptr)
    }

    fn set_block_of(&mut self, inode: &mut Inode, index: usize, block: BlockId) -> FsResult<()> {
        if index < DIRECT_PTRS {
            inode.direct[index] = block;
            return Ok(());
        }
        let slot = index - DIRECT_PTRS;
        if slot >= PTRS_PER_BLOCK {
            return Err(FsError::FileTooLarge);
        }
        let mut table = if inode.indirect == UNALLOCATED_BLOCK {
            inode.indirect = self.store.allocate()?;
            [0xFFu8; BLOCK_SIZE]
        } else {
            self.read_block(inode.indirect)?
        };
        table[slot * 4..slot * 4 + 4].copy_from_slice(&block.to_le_bytes());
        self.store.write(inode.indirect, &table)
    }

    /// All data blocks of `inode` in content order, indirection block excluded.
    pub(crate) fn owned_blocks(&self, inode: &Inode) -> FsResult<Vec<BlockId>> {
        (0..inode.block_count())
            .map(|index| self.block_of(inode, index))
            .collect()
    }

    /// Blocks that growing `inode` to `new_size` bytes would take from the
    /// store, counting a new indirection block.
    ///
    /// # Errors
    /// Returns [`FsError::FileTooLarge`] past the addressable size.
    pub(crate) fn blocks_needed(&self, inode: &Inode, new_size: u64) -> FsResult<u32> {
        if new_size > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge);
        }
        let have = inode.block_count();
        let want = div_ceil(new_size, BLOCK_SIZE as u64) as usize;
        let data = want.saturating_sub(have) as u32;
        let indirect = u32::from(want > DIRECT_PTRS && inode.indirect == UNALLOCATED_BLOCK);
        Ok(data + indirect)
    }

    pub(crate) fn ensure_free_blocks(&self, needed: u32) -> FsResult<()> {
        if self.store.free_count() < needed {
            return Err(FsError::OutOfSpace);
        }
        Ok(())
    }

    /// Reads up to `len` bytes starting at `offset`, clamped to the size.
    pub(crate) fn read_at(&self, inode: &Inode, offset: u64, len: u64) -> FsResult<Vec<u8>> {
        let end = offset.saturating_add(len).min(inode.size);
        if offset >= end {
            return Ok(Vec::new());
        }
        let mut out = Vec::with_capacity((end - offset) as usize);
        let mut pos = offset;
        while pos < end {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let within = (pos % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - within).min((end - pos) as usize);
            let block = self.read_block(self.block_of(inode, index)?)?;
            out.extend_from_slice(&block[within..within + take]);
            pos += take as u64;
        }
        Ok(out)
    }

    /// Writes `data` at `offset`, allocating blocks past the current end and
    /// growing `size`. The caller pre-checks space and persists the inode.
    pub(crate) fn write_at(&mut self, inode: &mut Inode, offset: u64, data: &[u8]) -> FsResult<()> {
        let end = offset + data.len() as u64;
        let mut owned = inode.block_count();
        let mut pos = offset;
        while pos < end {
            let index = (pos / BLOCK_SIZE as u64) as usize;
            let within = (pos % BLOCK_SIZE as u64) as usize;
            let take = (BLOCK_SIZE - within).min((end - pos) as usize);
            let src = &data[(pos - offset) as usize..(pos - offset) as usize + take];

            let (id, mut block) = if index < owned {
                let id = self.block_of(inode, index)?;
                let block = if take == BLOCK_SIZE {
                    empty_block()
                } else {
                    self.read_block(id)?
                };
                (id, block)
            } else if index == owned {
                let id = self.store.allocate()?;
                self.set_block_of(inode, index, id)?;
                owned += 1;
                (id, empty_block())
            } else {
                return Err(FsError::corrupt(format!(
                    "write at content block {index} past {owned} owned blocks"
                )));
            };
            block[within..within + take].copy_from_slice(src);
            self.store.write(id, &block)?;
            pos += take as u64;
        }
        inode.size = inode.size.max(end);
        Ok(())
    }

    /// Cuts `inode` down to `new_size` bytes, releasing blocks past the new
    /// end and the indirection block once it is no longer needed.
    pub(crate) fn shrink_to(&mut self, inode: &mut Inode, new_size: u64) -> FsResult<()> {
        let keep = div_ceil(new_size, BLOCK_SIZE as u64) as usize;
        let blocks = self.owned_blocks(inode)?;
        for (index, id) in blocks.iter().enumerate().skip(keep) {
            self.store.free(*id)?;
            if index < DIRECT_PTRS {
                inode.direct[index] = UNALLOCATED_BLOCK;
            }
        }
        if inode.indirect != UNALLOCATED_BLOCK {
            if keep <= DIRECT_PTRS {
                self.store.free(inode.indirect)?;
                inode.indirect = UNALLOCATED_BLOCK;
            } else if keep < blocks.len() {
                let mut table = self.read_block(inode.indirect)?;
                for slot in keep - DIRECT_PTRS..blocks.len() - DIRECT_PTRS {
                    table[slot * 4..slot * 4 + 4]
                        .copy_from_slice(&UNALLOCATED_BLOCK.to_le_bytes());
                }
                self.store.write(inode.indirect, &table)?;
            }
        }
        inode.size = inode.size.min(new_size);
        Ok(())
    }

    /// Releases an unlinked inode and everything it owns.
    pub(crate) fn reclaim(&mut self, id: InodeId, mut inode: Inode) -> FsResult<()> {
        if inode.nlink != 0 {
            return Err(FsError::corrupt(format!(
                "reclaim of inode {id} with {} links",
                inode.nlink
            )));
        }
        let blocks = inode.block_count();
        self.shrink_to(&mut inode, 0)?;
        self.store_inode(id, &inode)?;
        self.inodes.free(&mut self.store, id)?;
        debug!(ino = id, blocks, "reclaimed inode");
        Ok(())
    }

    fn read_block(&self, id: BlockId) -> FsResult<Block> {
        let mut block = empty_block();
        self.store.read(id, &mut block)?;
        Ok(block)
    }
}
