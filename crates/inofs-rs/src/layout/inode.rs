//! Inode record codec.
//!
//! Each record is INODE_SIZE (64) bytes:
//! - [0]       kind (0 = free slot, 1 = file, 2 = directory)
//! - [4..8]    link count
//! - [8..16]   size in bytes
//! - [16..56]  DIRECT_PTRS direct block pointers
//! - [56..60]  single-indirection block pointer

use super::NodeKind;
use super::constants::{BLOCK_SIZE, DIRECT_PTRS, INODE_SIZE, UNALLOCATED_BLOCK};
use super::div_ceil;
use crate::error::{FsError, FsResult};

const NLINK_AT: usize = 4;
const SIZE_AT: usize = 8;
const DIRECT_AT: usize = 16;
const INDIRECT_AT: usize = DIRECT_AT + DIRECT_PTRS * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub kind: NodeKind,
    pub size: u64,
    pub nlink: u32,
    pub direct: [u32; DIRECT_PTRS],
    pub indirect: u32,
}

impl Inode {
    /// A fresh inode: one link, no blocks.
    #[must_use]
    pub const fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            size: 0,
            nlink: 1,
            direct: [UNALLOCATED_BLOCK; DIRECT_PTRS],
            indirect: UNALLOCATED_BLOCK,
        }
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Dir)
    }

    /// Number of data blocks the content occupies, excluding the indirection
    /// block.
    #[must_use]
    pub const fn block_count(&self) -> usize {
        div_ceil(self.size, BLOCK_SIZE as u64) as usize
    }

    /// Decodes one table slot. `Ok(None)` is a free slot.
    ///
    /// # Errors
    /// Returns [`FsError::Corrupt`] for an unknown kind byte.
    pub fn from_bytes(buf: &[u8; INODE_SIZE]) -> FsResult<Option<Self>> {
        if buf[0] == 0 {
            return Ok(None);
        }
        let kind = NodeKind::from_byte(buf[0])
            .ok_or_else(|| FsError::corrupt(format!("unknown inode kind {}", buf[0])))?;
        let mut direct = [UNALLOCATED_BLOCK; DIRECT_PTRS];
        for (i, slot) in direct.iter_mut().enumerate() {
            *slot = read_u32(buf, DIRECT_AT + i * 4);
        }
        let mut size = [0u8; 8];
        size.copy_from_slice(&buf[SIZE_AT..SIZE_AT + 8]);
        Ok(Some(Self {
            kind,
            size: u64::from_le_bytes(size),
            nlink: read_u32(buf, NLINK_AT),
            direct,
            indirect: read_u32(buf, INDIRECT_AT),
        }))
    }

    pub fn write_bytes(&self, buf: &mut [u8; INODE_SIZE]) {
        buf.fill(0);
        buf[0] = self.kind.to_byte();
        buf[NLINK_AT..NLINK_AT + 4].copy_from_slice(&self.nlink.to_le_bytes());
        buf[SIZE_AT..SIZE_AT + 8].copy_from_slice(&self.size.to_le_bytes());
        for (i, slot) in self.direct.iter().enumerate() {
            let at = DIRECT_AT + i * 4;
            buf[at..at + 4].copy_from_slice(&slot.to_le_bytes());
        }
        buf[INDIRECT_AT..INDIRECT_AT + 4].copy_from_slice(&self.indirect.to_le_bytes());
    }
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
