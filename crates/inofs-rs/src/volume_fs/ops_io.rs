use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::{InodeId, NodeKind};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

impl<D: BlockDevice> VolumeFs<D> {
    /// Opens `path` for appending, creating an empty file if the final
    /// segment is missing.
    ///
    /// # Errors
    /// [`FsError::NotAFile`] for a directory, [`FsError::InvalidName`] when
    /// the final segment is "." or "..", plus the errors of
    /// [`Self::resolve_parent`] and [`Self::create`].
    pub fn open_append(&mut self, cwd: InodeId, path: &str) -> FsResult<InodeId> {
        let (parent, name) = self.resolve_parent(cwd, path)?;
        if name == "." || name == ".." {
            return Err(FsError::InvalidName);
        }
        match self.lookup(parent, &name) {
            Ok(id) => {
                if self.load_inode(id)?.is_dir() {
                    return Err(FsError::NotAFile);
                }
                Ok(id)
            }
            Err(FsError::NotFound) => self.create(parent, &name, NodeKind::File),
            Err(err) => Err(err),
        }
    }

    /// Appends `data` to the end of `file` and returns the new size.
    ///
    /// # Errors
    /// [`FsError::NotAFile`] for a directory, [`FsError::FileTooLarge`] past
    /// the addressable size, [`FsError::OutOfSpace`] when the store cannot
    /// supply every block needed. Nothing changes on error.
    pub fn append(&mut self, file: InodeId, data: &[u8]) -> FsResult<u64> {
        let mut inode = self.load_inode(file)?;
        if inode.is_dir() {
            return Err(FsError::NotAFile);
        }
        let end = inode.size + data.len() as u64;
        let needed = self.blocks_needed(&inode, end)?;
        self.ensure_free_blocks(needed)?;
        let at = inode.size;
        self.write_at(&mut inode, at, data)?;
        self.store_inode(file, &inode)?;
        debug!(ino = file, bytes = data.len(), size = inode.size, "appended");
        Ok(inode.size)
    }

    /// Whole content of `file`.
    ///
    /// # Errors
    /// [`FsError::NotAFile`] for a directory.
    pub fn read_all(&self, file: InodeId) -> FsResult<Vec<u8>> {
        let inode = self.load_inode(file)?;
        if inode.is_dir() {
            return Err(FsError::NotAFile);
        }
        self.read_at(&inode, 0, inode.size)
    }

    /// # Errors
    /// As [`Self::resolve`] and [`Self::read_all`].
    pub fn read_path(&self, cwd: InodeId, path: &str) -> FsResult<Vec<u8>> {
        let file = self.resolve(cwd, path)?;
        self.read_all(file)
    }
}
