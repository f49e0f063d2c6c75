//! The mounted volume.
//!
//! On-disk format
//!
//! Layout is block-based with BLOCK_SIZE (512) blocks.
//!
//! Block 0: superblock (see [`Superblock`])
//!
//! Next: inode bitmap, 1 bit per inode
//!
//! Next: inode table (fixed-size INODE_SIZE records)
//!
//! Next: block bitmap, 1 bit per data block
//!
//! Remaining: data blocks (file contents, directory records, indirection
//! blocks)
//!
//! Operations are split by concern across the `ops_*` modules; every one of
//! them works on a [`VolumeFs`] and takes the caller's current directory
//! explicitly where a path is involved.

mod core;
mod ops_attr;
mod ops_dir;
mod ops_fd;
mod ops_fsck;
mod ops_io;
mod ops_link;
mod ops_path;

#[cfg(test)]
mod volume_fs_tests;

use anyhow::Context;
use tracing::info;

use crate::error::FsResult;
use crate::layout::constants::{DEFAULT_INODE_COUNT, DEFAULT_TOTAL_BLOCKS, ROOT_INO};
use crate::layout::superblock::Superblock;
use crate::layout::{InodeId, NodeKind, empty_block};
use crate::retention::disk::BlockDevice;
use crate::retention::inode_table::InodeTable;
use crate::retention::store::BlockStore;

pub use crate::layout::dirent::DirEntry;
pub use ops_attr::Stat;
pub use ops_fd::{Access, Fd, FileTable, OpenFile, OpenMode};
pub use ops_fsck::{FsckProblem, FsckReport};

/// Size of a volume created by formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub total_blocks: u32,
    pub inode_count: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            total_blocks: DEFAULT_TOTAL_BLOCKS,
            inode_count: DEFAULT_INODE_COUNT,
        }
    }
}

pub struct VolumeFs<D: BlockDevice> {
    store: BlockStore<D>,
    inodes: InodeTable,
    superblock: Superblock,
}

impl<D: BlockDevice> VolumeFs<D> {
    /// Mounts the volume on `device`, formatting it with `geometry` first if
    /// block 0 carries no superblock.
    ///
    /// # Errors
    /// Returns an error if the device cannot be read, or if a superblock is
    /// present but damaged. A damaged volume is never reformatted.
    pub fn mount_or_format(device: D, geometry: Geometry) -> anyhow::Result<Self> {
        let mut buf = empty_block();
        device
            .read_block(0, &mut buf)
            .context("failed to read superblock")?;
        match Superblock::from_bytes(&buf).context("refusing to mount damaged volume")? {
            Some(superblock) => Self::mount(device, superblock),
            None => Self::format(device, geometry),
        }
    }

    /// Lays out an empty volume holding only the root directory.
    ///
    /// # Errors
    /// Returns an error if `geometry` does not fit the device or leaves no
    /// room for data.
    pub fn format(device: D, geometry: Geometry) -> anyhow::Result<Self> {
        if geometry.total_blocks > device.block_count() {
            anyhow::bail!(
                "volume of {} blocks does not fit a device of {} blocks",
                geometry.total_blocks,
                device.block_count()
            );
        }
        let superblock = Superblock::plan(geometry.total_blocks, geometry.inode_count)?;
        let mut store = BlockStore::format(device, &superblock)?;
        let mut inodes = InodeTable::format(&mut store, &superblock)?;

        let root = inodes.allocate(&mut store, NodeKind::Dir)?;
        if root != ROOT_INO {
            anyhow::bail!("root directory landed on inode {root}");
        }
        let mut fs = Self {
            store,
            inodes,
            superblock,
        };
        fs.init_dir(root, root)
            .context("failed to initialize root directory")?;

        let mut sb_block = empty_block();
        superblock.write_bytes(&mut sb_block);
        fs.store.write_raw(0, &sb_block)?;
        fs.store.flush()?;

        info!(
            total_blocks = superblock.total_blocks,
            inodes = superblock.inode_count,
            data_blocks = superblock.data_blocks,
            "formatted volume"
        );
        Ok(fs)
    }

    fn mount(device: D, superblock: Superblock) -> anyhow::Result<Self> {
        if superblock.total_blocks > device.block_count() {
            anyhow::bail!(
                "superblock describes {} blocks but the device holds {}",
                superblock.total_blocks,
                device.block_count()
            );
        }
        let store = BlockStore::load(device, &superblock)?;
        let inodes = InodeTable::load(&store, &superblock)?;
        let fs = Self {
            store,
            inodes,
            superblock,
        };
        let root = fs
            .load_inode(ROOT_INO)
            .context("root directory is missing")?;
        if !root.is_dir() {
            anyhow::bail!("root inode is not a directory");
        }
        info!(
            total_blocks = superblock.total_blocks,
            free_blocks = fs.free_blocks(),
            free_inodes = fs.free_inodes(),
            "mounted volume"
        );
        Ok(fs)
    }

    #[must_use]
    pub const fn root(&self) -> InodeId {
        ROOT_INO
    }

    #[must_use]
    pub const fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    #[must_use]
    pub fn free_blocks(&self) -> u32 {
        self.store.free_count()
    }

    #[must_use]
    pub fn free_inodes(&self) -> u32 {
        self.inodes.free_count()
    }

    #[must_use]
    pub fn is_live(&self, id: InodeId) -> bool {
        self.inodes.is_live(id)
    }

    /// # Errors
    /// Returns [`crate::FsError::Io`] if the backing store cannot be synced.
    pub fn flush(&mut self) -> FsResult<()> {
        self.store.flush()
    }

    pub fn into_device(self) -> D {
        self.store.into_device()
    }
}
