//! Open files: descriptors with an access mode and a byte position.
//!
//! The descriptor table belongs to the caller, like the working directory, so
//! two sessions on one volume never see each other's descriptors. A
//! descriptor names an inode only; removing the last link to an open file
//! reclaims it and later operations on the descriptor report
//! [`FsError::NotFound`].

use std::io::SeekFrom;

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::constants::MAX_OPEN_FILES;
use crate::layout::{InodeId, NodeKind};
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

/// Index into a [`FileTable`].
pub type Fd = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    const fn can_read(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    const fn can_write(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// How [`VolumeFs::open`] treats the named file.
///
/// `create` and `truncate` need write access; with `append` the position
/// starts at the end of the file instead of at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub access: Access,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

impl OpenMode {
    pub const READ: Self = Self {
        access: Access::Read,
        create: false,
        truncate: false,
        append: false,
    };

    pub const WRITE: Self = Self {
        access: Access::Write,
        create: false,
        truncate: false,
        append: false,
    };

    pub const READ_WRITE: Self = Self {
        access: Access::ReadWrite,
        create: false,
        truncate: false,
        append: false,
    };

    #[must_use]
    pub const fn create(mut self) -> Self {
        self.create = true;
        self
    }

    #[must_use]
    pub const fn truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    #[must_use]
    pub const fn append(mut self) -> Self {
        self.append = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFile {
    pub ino: InodeId,
    pub mode: OpenMode,
    pub pos: u64,
}

/// Per-session descriptor table with [`MAX_OPEN_FILES`] slots. The lowest
/// free slot is handed out first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTable {
    slots: Vec<Option<OpenFile>>,
}

impl Default for FileTable {
    fn default() -> Self {
        Self {
            slots: vec![None; MAX_OPEN_FILES],
        }
    }
}

impl FileTable {
    #[must_use]
    pub fn get(&self, fd: Fd) -> Option<&OpenFile> {
        self.slots.get(fd).and_then(Option::as_ref)
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    fn entry(&mut self, fd: Fd) -> FsResult<&mut OpenFile> {
        self.slots
            .get_mut(fd)
            .and_then(Option::as_mut)
            .ok_or(FsError::BadDescriptor)
    }

    fn free_slot(&self) -> FsResult<Fd> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)
    }
}

impl<D: BlockDevice> VolumeFs<D> {
    /// Opens the file at `path` and returns its descriptor in `files`.
    ///
    /// # Errors
    /// - [`FsError::NotPermitted`] for `create` or `truncate` without write
    ///   access.
    /// - [`FsError::NotFound`] when the file is missing and `create` is off.
    /// - [`FsError::NotAFile`] for a directory, [`FsError::InvalidName`] when
    ///   `create` is set and the final segment is "." or "..".
    /// - [`FsError::TooManyOpenFiles`] when every slot is taken.
    ///
    /// Nothing changes on error.
    pub fn open(
        &mut self,
        files: &mut FileTable,
        cwd: InodeId,
        path: &str,
        mode: OpenMode,
    ) -> FsResult<Fd> {
        if (mode.create || mode.truncate) && !mode.access.can_write() {
            return Err(FsError::NotPermitted);
        }
        let fd = files.free_slot()?;
        let (parent, name) = self.resolve_parent(cwd, path)?;
        if mode.create && (name == "." || name == "..") {
            return Err(FsError::InvalidName);
        }
        let ino = match self.lookup(parent, &name) {
            Ok(id) => id,
            Err(FsError::NotFound) if mode.create => self.create(parent, &name, NodeKind::File)?,
            Err(err) => return Err(err),
        };

        let mut inode = self.load_inode(ino)?;
        if inode.is_dir() {
            return Err(FsError::NotAFile);
        }
        if mode.truncate && inode.size > 0 {
            self.shrink_to(&mut inode, 0)?;
            self.store_inode(ino, &inode)?;
        }
        let pos = if mode.append { inode.size } else { 0 };
        files.slots[fd] = Some(OpenFile { ino, mode, pos });
        debug!(fd, ino, ?mode, "opened");
        Ok(fd)
    }

    /// # Errors
    /// [`FsError::BadDescriptor`] if `fd` is not open.
    pub fn close(&self, files: &mut FileTable, fd: Fd) -> FsResult<()> {
        let slot = files.slots.get_mut(fd).ok_or(FsError::BadDescriptor)?;
        slot.take().ok_or(FsError::BadDescriptor)?;
        debug!(fd, "closed");
        Ok(())
    }

    /// Reads up to `len` bytes from the descriptor's position and advances
    /// it. An empty result means the position is at the end of the file.
    ///
    /// # Errors
    /// [`FsError::BadDescriptor`], [`FsError::NotPermitted`] without read
    /// access, [`FsError::NotFound`] once the file has been reclaimed.
    pub fn read(&self, files: &mut FileTable, fd: Fd, len: u64) -> FsResult<Vec<u8>> {
        let open = files.entry(fd)?;
        if !open.mode.access.can_read() {
            return Err(FsError::NotPermitted);
        }
        let inode = self.load_inode(open.ino)?;
        let data = self.read_at(&inode, open.pos, len)?;
        open.pos += data.len() as u64;
        Ok(data)
    }

    /// Writes `data` at the descriptor's position, overwriting what is there
    /// and growing the file past its end. Returns the new position.
    ///
    /// # Errors
    /// [`FsError::BadDescriptor`], [`FsError::NotPermitted`] without write
    /// access, [`FsError::InvalidSeek`] if the file shrank below the
    /// position, then as [`Self::append`]. Nothing changes on error.
    pub fn write(&mut self, files: &mut FileTable, fd: Fd, data: &[u8]) -> FsResult<u64> {
        let open = files.entry(fd)?;
        if !open.mode.access.can_write() {
            return Err(FsError::NotPermitted);
        }
        let (ino, at) = (open.ino, open.pos);
        let mut inode = self.load_inode(ino)?;
        if at > inode.size {
            return Err(FsError::InvalidSeek);
        }
        let end = at + data.len() as u64;
        let needed = self.blocks_needed(&inode, end.max(inode.size))?;
        self.ensure_free_blocks(needed)?;
        self.write_at(&mut inode, at, data)?;
        self.store_inode(ino, &inode)?;

        files.entry(fd)?.pos = end;
        debug!(fd, ino, bytes = data.len(), size = inode.size, "wrote");
        Ok(end)
    }

    /// Moves the descriptor's position and returns it. The result must lie
    /// within the file: from zero up to its size.
    ///
    /// # Errors
    /// [`FsError::BadDescriptor`], [`FsError::InvalidSeek`] outside the file.
    pub fn seek(&self, files: &mut FileTable, fd: Fd, to: SeekFrom) -> FsResult<u64> {
        let open = files.entry(fd)?;
        let size = self.load_inode(open.ino)?.size;
        let target = match to {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => open.pos.checked_add_signed(delta),
            SeekFrom::End(delta) => size.checked_add_signed(delta),
        };
        let pos = target
            .filter(|pos| *pos <= size)
            .ok_or(FsError::InvalidSeek)?;
        open.pos = pos;
        Ok(pos)
    }
}
