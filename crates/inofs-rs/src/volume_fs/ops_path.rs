use crate::error::{FsError, FsResult};
use crate::layout::InodeId;
use crate::layout::constants::ROOT_INO;
use crate::retention::disk::BlockDevice;

use super::VolumeFs;

impl<D: BlockDevice> VolumeFs<D> {
    /// Walks `path` from `start` (or from the root if it begins with "/").
    /// Empty segments are skipped; "." and ".." are followed through the
    /// records every directory stores.
    ///
    /// # Errors
    /// [`FsError::NotADirectory`] when a segment is taken inside a file,
    /// [`FsError::NotFound`] for a missing segment.
    pub fn resolve(&self, start: InodeId, path: &str) -> FsResult<InodeId> {
        let mut cur = if path.starts_with('/') { ROOT_INO } else { start };
        if !self.inodes.is_live(cur) {
            return Err(FsError::NotFound);
        }
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            cur = self.lookup(cur, segment)?;
        }
        Ok(cur)
    }

    /// Resolves everything but the last segment, which comes back verbatim.
    /// Trailing "/" are ignored.
    ///
    /// # Errors
    /// [`FsError::InvalidName`] if `path` has no final segment ("", "/").
    /// The parent must be a directory.
    pub fn resolve_parent(&self, start: InodeId, path: &str) -> FsResult<(InodeId, String)> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(FsError::InvalidName);
        }
        let (parent_path, name) = match trimmed.rfind('/') {
            Some(at) => (&trimmed[..=at], &trimmed[at + 1..]),
            None => ("", trimmed),
        };
        let parent = self.resolve(start, parent_path)?;
        self.load_dir(parent)?;
        Ok((parent, name.to_string()))
    }

    /// Target of a `cd`: `path` must name a directory.
    ///
    /// # Errors
    /// As [`Self::resolve`], plus [`FsError::NotADirectory`] for a file.
    pub fn chdir(&self, start: InodeId, path: &str) -> FsResult<InodeId> {
        let dir = self.resolve(start, path)?;
        self.load_dir(dir)?;
        Ok(dir)
    }

    /// Absolute path of directory `dir`, rebuilt by climbing ".." records.
    ///
    /// # Errors
    /// [`FsError::Corrupt`] if the climb never reaches the root or a parent
    /// does not list its child.
    pub fn path_of(&self, dir: InodeId) -> FsResult<String> {
        let mut names = Vec::new();
        let mut cur = dir;
        let mut budget = self.inodes.capacity();
        while cur != ROOT_INO {
            if budget == 0 {
                return Err(FsError::corrupt(format!("directory {dir} is not under root")));
            }
            budget -= 1;
            let parent = self.lookup(cur, "..")?;
            let name = self
                .list(parent)?
                .into_iter()
                .find(|entry| entry.inode == cur && !entry.is_dot())
                .ok_or_else(|| {
                    FsError::corrupt(format!("directory {cur} missing from its parent {parent}"))
                })?
                .name;
            names.push(name);
            cur = parent;
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }
}
