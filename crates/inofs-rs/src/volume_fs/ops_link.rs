//! Entry creation and removal with link-count bookkeeping.
//!
//! A link count is the number of entries naming the inode, "." excluded, so a
//! directory's count is one for its name plus one per child's "..".

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::dirent::{DirEntry, validate_name};
use crate::layout::{InodeId, NodeKind};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

impl<D: BlockDevice> VolumeFs<D> {
    /// Creates a `kind` inode named `name` in `parent`.
    ///
    /// # Errors
    /// Name errors as [`Self::insert`]; [`FsError::OutOfSpace`] if an inode or
    /// any block needed is unavailable. Nothing changes on error.
    pub fn create(&mut self, parent: InodeId, name: &str, kind: NodeKind) -> FsResult<InodeId> {
        validate_name(name)?;
        let mut dir = self.load_dir(parent)?;
        if self.find_entry(&dir, name)?.is_some() {
            return Err(FsError::NameExists);
        }
        if self.inodes.free_count() == 0 {
            return Err(FsError::OutOfSpace);
        }
        let own = u32::from(kind == NodeKind::Dir);
        let growth = self.dir_growth(&dir)?;
        self.ensure_free_blocks(growth + own)?;

        let id = self.inodes.allocate(&mut self.store, kind)?;
        if kind == NodeKind::Dir {
            self.init_dir(id, parent)?;
            dir.nlink += 1;
        }
        self.append_record(&mut dir, &DirEntry::new(id, kind, name))?;
        self.store_inode(parent, &dir)?;
        debug!(parent, name, ino = id, ?kind, "created");
        Ok(id)
    }

    /// Adds a hard link `name` in `parent` to the file `target`.
    ///
    /// # Errors
    /// [`FsError::IsADirectory`] if `target` is a directory, then as
    /// [`Self::insert`].
    pub fn link(&mut self, parent: InodeId, name: &str, target: InodeId) -> FsResult<()> {
        let mut inode = self.load_inode(target)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.insert(parent, name, target)?;
        inode.nlink += 1;
        self.store_inode(target, &inode)?;
        debug!(parent, name, ino = target, links = inode.nlink, "linked");
        Ok(())
    }

    /// Removes the file entry `name`, reclaiming the inode at zero links.
    ///
    /// # Errors
    /// [`FsError::NotFound`] if absent, [`FsError::IsADirectory`] for a
    /// directory.
    pub fn unlink(&mut self, parent: InodeId, name: &str) -> FsResult<()> {
        let dir = self.load_dir(parent)?;
        let (_, entry) = self.find_entry(&dir, name)?.ok_or(FsError::NotFound)?;
        let mut inode = self.load_inode(entry.inode)?;
        if inode.is_dir() {
            return Err(FsError::IsADirectory);
        }
        self.remove(parent, name)?;
        inode.nlink = drop_link(entry.inode, inode.nlink)?;
        if inode.nlink == 0 {
            self.reclaim(entry.inode, inode)
        } else {
            self.store_inode(entry.inode, &inode)
        }
    }

    /// Removes the empty directory `name` from `parent`.
    ///
    /// # Errors
    /// [`FsError::InvalidName`] for "." and "..", [`FsError::NotFound`] if
    /// absent, [`FsError::NotADirectory`] for a file,
    /// [`FsError::DirectoryNotEmpty`] if it still holds entries.
    pub fn rmdir(&mut self, parent: InodeId, name: &str) -> FsResult<()> {
        if name == "." || name == ".." {
            return Err(FsError::InvalidName);
        }
        let dir = self.load_dir(parent)?;
        let (_, entry) = self.find_entry(&dir, name)?.ok_or(FsError::NotFound)?;
        let mut inode = self.load_inode(entry.inode)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if !self.is_empty(entry.inode)? {
            return Err(FsError::DirectoryNotEmpty);
        }

        self.remove(parent, name)?;
        inode.nlink = drop_link(entry.inode, inode.nlink)?;
        if inode.nlink == 0 {
            self.reclaim(entry.inode, inode)?;
        } else {
            self.store_inode(entry.inode, &inode)?;
        }

        // The removed ".." no longer names the parent.
        let mut dir = self.load_dir(parent)?;
        dir.nlink = drop_link(parent, dir.nlink)?;
        self.store_inode(parent, &dir)?;
        debug!(parent, name, ino = entry.inode, "removed directory");
        Ok(())
    }

    /// # Errors
    /// As [`Self::resolve_parent`] and [`Self::create`].
    pub fn mkdir(&mut self, cwd: InodeId, path: &str) -> FsResult<InodeId> {
        let (parent, name) = self.resolve_parent(cwd, path)?;
        self.create(parent, &name, NodeKind::Dir)
    }

    /// # Errors
    /// As [`Self::resolve_parent`] and [`Self::rmdir`].
    pub fn rmdir_at(&mut self, cwd: InodeId, path: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_parent(cwd, path)?;
        self.rmdir(parent, &name)
    }

    /// Links `new_path` to the file at `target_path`.
    ///
    /// # Errors
    /// As [`Self::resolve`], [`Self::resolve_parent`] and [`Self::link`].
    pub fn link_at(&mut self, cwd: InodeId, target_path: &str, new_path: &str) -> FsResult<()> {
        let target = self.resolve(cwd, target_path)?;
        let (parent, name) = self.resolve_parent(cwd, new_path)?;
        self.link(parent, &name, target)
    }

    /// # Errors
    /// As [`Self::resolve_parent`] and [`Self::unlink`].
    pub fn unlink_at(&mut self, cwd: InodeId, path: &str) -> FsResult<()> {
        let (parent, name) = self.resolve_parent(cwd, path)?;
        self.unlink(parent, &name)
    }

    /// Writes the "." and ".." records of a fresh directory. Takes one block
    /// from the store.
    pub(crate) fn init_dir(&mut self, id: InodeId, parent: InodeId) -> FsResult<()> {
        let mut inode = self.load_inode(id)?;
        self.append_record(&mut inode, &DirEntry::new(id, NodeKind::Dir, "."))?;
        self.append_record(&mut inode, &DirEntry::new(parent, NodeKind::Dir, ".."))?;
        self.store_inode(id, &inode)
    }
}

fn drop_link(id: InodeId, nlink: u32) -> FsResult<u32> {
    nlink
        .checked_sub(1)
        .ok_or_else(|| FsError::corrupt(format!("inode {id} link count underflow")))
}
