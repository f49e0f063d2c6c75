use crate::error::FsResult;
use crate::layout::constants::UNALLOCATED_BLOCK;
use crate::layout::{InodeId, NodeKind};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

/// Attributes of one inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub ino: InodeId,
    pub kind: NodeKind,
    pub size: u64,
    pub links: u32,
    /// Blocks held, indirection block included.
    pub blocks: u32,
}

impl<D: BlockDevice> VolumeFs<D> {
    /// # Errors
    /// As [`Self::resolve`].
    pub fn stat(&self, cwd: InodeId, path: &str) -> FsResult<Stat> {
        let ino = self.resolve(cwd, path)?;
        self.stat_inode(ino)
    }

    /// # Errors
    /// [`crate::FsError::NotFound`] if `ino` is not live.
    pub fn stat_inode(&self, ino: InodeId) -> FsResult<Stat> {
        let inode = self.load_inode(ino)?;
        let indirect = u32::from(inode.indirect != UNALLOCATED_BLOCK);
        Ok(Stat {
            ino,
            kind: inode.kind,
            size: inode.size,
            links: inode.nlink,
            blocks: inode.block_count() as u32 + indirect,
        })
    }
}
