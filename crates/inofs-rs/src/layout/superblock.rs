//! Superblock codec and volume geometry planning.
//!
//! Block 0 holds the superblock:
//! - magic: b"INOFS001"
//! - version, block_size, total_blocks, inode_count: u32
//! - inode_bitmap_start, inode_bitmap_blocks: u32
//! - inode_table_start, inode_table_blocks: u32
//! - block_bitmap_start, block_bitmap_blocks: u32
//! - data_start, data_blocks: u32
//! - root_inode: u32
//! - sha256 over all preceding bytes
//!
//! The regions follow in that order and cover the volume without gaps, so the
//! bitmaps can always be recomputed from the inode table alone.

use sha2::{Digest, Sha256};

use super::bits::Bitmap;
use super::constants::{
    BITS_PER_BLOCK, BLOCK_SIZE, INODES_PER_BLOCK, MAGIC, ROOT_INO, VERSION,
};
use super::{Block, div_ceil};
use crate::error::{FsError, FsResult};

const FIELDS_END: usize = 8 + 13 * 4;
const CHECKSUM_END: usize = FIELDS_END + 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superblock {
    pub version: u32,
    pub block_size: u32,
    pub total_blocks: u32,
    pub inode_count: u32,
    pub inode_bitmap_start: u32,
    pub inode_bitmap_blocks: u32,
    pub inode_table_start: u32,
    pub inode_table_blocks: u32,
    pub block_bitmap_start: u32,
    pub block_bitmap_blocks: u32,
    pub data_start: u32,
    pub data_blocks: u32,
    pub root_inode: u32,
}

impl Superblock {
    /// Lays out a fresh volume of `total_blocks` blocks with room for
    /// `inode_count` inodes.
    ///
    /// # Errors
    /// Returns an error if the volume is too small for metadata plus at least
    /// one data block.
    pub fn plan(total_blocks: u32, inode_count: u32) -> anyhow::Result<Self> {
        if inode_count < ROOT_INO {
            anyhow::bail!("inode count must be at least 1");
        }
        let inode_bitmap_start = 1u32;
        let inode_bitmap_blocks = Bitmap::blocks_for(inode_count);
        let inode_table_start = inode_bitmap_start + inode_bitmap_blocks;
        let inode_table_blocks =
            div_ceil(u64::from(inode_count), u64::from(INODES_PER_BLOCK)) as u32;
        let block_bitmap_start = inode_table_start + inode_table_blocks;
        let remaining = total_blocks
            .checked_sub(block_bitmap_start)
            .ok_or_else(|| anyhow::anyhow!("not enough space for the inode table"))?;
        let (block_bitmap_blocks, data_blocks) = compute_bitmap_blocks(remaining)?;

        Ok(Self {
            version: VERSION,
            block_size: BLOCK_SIZE as u32,
            total_blocks,
            inode_count,
            inode_bitmap_start,
            inode_bitmap_blocks,
            inode_table_start,
            inode_table_blocks,
            block_bitmap_start,
            block_bitmap_blocks,
            data_start: block_bitmap_start + block_bitmap_blocks,
            data_blocks,
            root_inode: ROOT_INO,
        })
    }

    /// Decodes block 0. `Ok(None)` means the volume was never formatted.
    ///
    /// # Errors
    /// Returns [`FsError::Corrupt`] if the magic is present but the rest of the
    /// superblock cannot be trusted.
    pub fn from_bytes(buf: &Block) -> FsResult<Option<Self>> {
        if &buf[..8] != MAGIC {
            return Ok(None);
        }
        let digest = Sha256::digest(&buf[..FIELDS_END]);
        if buf[FIELDS_END..CHECKSUM_END] != digest[..] {
            return Err(FsError::corrupt("superblock checksum mismatch"));
        }
        let field = |i: usize| {
            let at = 8 + i * 4;
            u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };
        let sb = Self {
            version: field(0),
            block_size: field(1),
            total_blocks: field(2),
            inode_count: field(3),
            inode_bitmap_start: field(4),
            inode_bitmap_blocks: field(5),
            inode_table_start: field(6),
            inode_table_blocks: field(7),
            block_bitmap_start: field(8),
            block_bitmap_blocks: field(9),
            data_start: field(10),
            data_blocks: field(11),
            root_inode: field(12),
        };
        sb.validate()?;
        Ok(Some(sb))
    }

    pub fn write_bytes(&self, buf: &mut Block) {
        buf.fill(0);
        buf[..8].copy_from_slice(MAGIC);
        let fields = [
            self.version,
            self.block_size,
            self.total_blocks,
            self.inode_count,
            self.inode_bitmap_start,
            self.inode_bitmap_blocks,
            self.inode_table_start,
            self.inode_table_blocks,
            self.block_bitmap_start,
            self.block_bitmap_blocks,
            self.data_start,
            self.data_blocks,
            self.root_inode,
        ];
        for (i, value) in fields.iter().enumerate() {
            let at = 8 + i * 4;
            buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
        let digest = Sha256::digest(&buf[..FIELDS_END]);
        buf[FIELDS_END..CHECKSUM_END].copy_from_slice(&digest);
    }

    /// Checks that the regions are contiguous and sized for their contents.
    ///
    /// # Errors
    /// Returns [`FsError::Corrupt`] describing the first inconsistency.
    pub fn validate(&self) -> FsResult<()> {
        if self.version != VERSION {
            return Err(FsError::corrupt(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.block_size as usize != BLOCK_SIZE {
            return Err(FsError::corrupt(format!(
                "unsupported block size {}",
                self.block_size
            )));
        }
        if self.root_inode != ROOT_INO || self.inode_count < ROOT_INO {
            return Err(FsError::corrupt("bad root inode"));
        }
        let contiguous = self.inode_bitmap_start == 1
            && self.inode_table_start == self.inode_bitmap_start + self.inode_bitmap_blocks
            && self.block_bitmap_start == self.inode_table_start + self.inode_table_blocks
            && self.data_start == self.block_bitmap_start + self.block_bitmap_blocks
            && u64::from(self.data_start) + u64::from(self.data_blocks)
                == u64::from(self.total_blocks);
        if !contiguous {
            return Err(FsError::corrupt("superblock regions overlap or leave gaps"));
        }
        let sized = self.inode_bitmap_blocks >= Bitmap::blocks_for(self.inode_count)
            && u64::from(self.inode_table_blocks) * u64::from(INODES_PER_BLOCK)
                >= u64::from(self.inode_count)
            && self.block_bitmap_blocks >= Bitmap::blocks_for(self.data_blocks)
            && self.data_blocks > 0;
        if !sized {
            return Err(FsError::corrupt("superblock regions too small"));
        }
        Ok(())
    }
}

/// Splits the blocks after the inode table between the block bitmap and the
/// data it tracks. `b` bitmap blocks cover `b * BITS_PER_BLOCK` data blocks,
/// so the smallest fitting bitmap is `ceil(remaining / (BITS_PER_BLOCK + 1))`.
fn compute_bitmap_blocks(remaining: u32) -> anyhow::Result<(u32, u32)> {
    let bitmap_blocks = remaining.div_ceil(BITS_PER_BLOCK + 1).max(1);
    if remaining <= bitmap_blocks {
        anyhow::bail!("not enough space for data blocks");
    }
    Ok((bitmap_blocks, remaining - bitmap_blocks))
}
