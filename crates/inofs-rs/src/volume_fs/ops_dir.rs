use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::layout::constants::DIRENT_SIZE;
use crate::layout::dirent::{DirEntry, validate_name};
use crate::layout::inode::Inode;
use crate::layout::InodeId;
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

impl<D: BlockDevice> VolumeFs<D> {
    /// Entries of `dir` in storage order, "." and ".." first.
    ///
    /// # Errors
    /// [`FsError::NotADirectory`] if `dir` is a file.
    pub fn list(&self, dir: InodeId) -> FsResult<Vec<DirEntry>> {
        let inode = self.load_dir(dir)?;
        self.entries_of(&inode)
    }

    /// # Errors
    /// [`FsError::NotFound`] if `name` is absent, [`FsError::NotADirectory`]
    /// if `dir` is a file.
    pub fn lookup(&self, dir: InodeId, name: &str) -> FsResult<InodeId> {
        let inode = self.load_dir(dir)?;
        self.find_entry(&inode, name)?
            .map(|(_, entry)| entry.inode)
            .ok_or(FsError::NotFound)
    }

    /// Adds `name -> target` to `dir`. Link counts are left to the caller.
    ///
    /// # Errors
    /// [`FsError::InvalidName`] / [`FsError::NameTooLong`] for unusable
    /// names, [`FsError::NameExists`] for duplicates, [`FsError::OutOfSpace`]
    /// when the directory cannot grow. Nothing changes on error.
    pub fn insert(&mut self, dir: InodeId, name: &str, target: InodeId) -> FsResult<()> {
        validate_name(name)?;
        let mut inode = self.load_dir(dir)?;
        if self.find_entry(&inode, name)?.is_some() {
            return Err(FsError::NameExists);
        }
        let kind = self.load_inode(target)?.kind;
        let growth = self.dir_growth(&inode)?;
        self.ensure_free_blocks(growth)?;
        self.append_record(&mut inode, &DirEntry::new(target, kind, name))?;
        self.store_inode(dir, &inode)?;
        debug!(dir, name, ino = target, "inserted entry");
        Ok(())
    }

    /// Drops `name` from `dir`. The last record takes the vacated slot and a
    /// trailing block left empty goes back to the store. Link counts are left
    /// to the caller.
    ///
    /// # Errors
    /// [`FsError::InvalidName`] for "." and "..", [`FsError::NotFound`] if
    /// absent.
    pub fn remove(&mut self, dir: InodeId, name: &str) -> FsResult<DirEntry> {
        if name == "." || name == ".." {
            return Err(FsError::InvalidName);
        }
        let mut inode = self.load_dir(dir)?;
        let (slot, entry) = self.find_entry(&inode, name)?.ok_or(FsError::NotFound)?;

        let rec = DIRENT_SIZE as u64;
        let last = inode.size / rec - 1;
        if slot as u64 != last {
            let moved = self.read_at(&inode, last * rec, rec)?;
            self.write_at(&mut inode, slot as u64 * rec, &moved)?;
        }
        self.shrink_to(&mut inode, last * rec)?;
        self.store_inode(dir, &inode)?;
        debug!(dir, name, ino = entry.inode, "removed entry");
        Ok(entry)
    }

    /// True iff `dir` holds nothing besides "." and "..".
    ///
    /// # Errors
    /// [`FsError::NotADirectory`] if `dir` is a file.
    pub fn is_empty(&self, dir: InodeId) -> FsResult<bool> {
        let inode = self.load_dir(dir)?;
        Ok(inode.size <= 2 * DIRENT_SIZE as u64)
    }

    pub(crate) fn load_dir(&self, dir: InodeId) -> FsResult<Inode> {
        let inode = self.load_inode(dir)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(inode)
    }

    pub(crate) fn entries_of(&self, inode: &Inode) -> FsResult<Vec<DirEntry>> {
        if inode.size % DIRENT_SIZE as u64 != 0 {
            return Err(FsError::corrupt(format!(
                "directory size {} is not a whole number of records",
                inode.size
            )));
        }
        let data = self.read_at(inode, 0, inode.size)?;
        data.chunks_exact(DIRENT_SIZE).map(DirEntry::decode).collect()
    }

    pub(crate) fn find_entry(
        &self,
        inode: &Inode,
        name: &str,
    ) -> FsResult<Option<(usize, DirEntry)>> {
        Ok(self
            .entries_of(inode)?
            .into_iter()
            .enumerate()
            .find(|(_, entry)| entry.name == name))
    }

    /// Blocks one more record would take. A directory that cannot address
    /// another block is out of space rather than too large.
    pub(crate) fn dir_growth(&self, inode: &Inode) -> FsResult<u32> {
        match self.blocks_needed(inode, inode.size + DIRENT_SIZE as u64) {
            Err(FsError::FileTooLarge) => Err(FsError::OutOfSpace),
            other => other,
        }
    }

    /// Writes `entry` past the last record. The caller persists `inode`.
    pub(crate) fn append_record(&mut self, inode: &mut Inode, entry: &DirEntry) -> FsResult<()> {
        let mut rec = [0u8; DIRENT_SIZE];
        entry.encode(&mut rec)?;
        let at = inode.size;
        self.write_at(inode, at, &rec)
    }
}
