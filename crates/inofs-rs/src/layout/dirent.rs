//! Directory record codec and entry name rules.
//!
//! A directory's content is a packed array of DIRENT_SIZE (32) byte records:
//! - [0..4]  inode id (never 0 inside the array)
//! - [4]     kind of the referenced inode
//! - [5]     name length
//! - [6..32] name bytes, zero padded
//!
//! Records 0 and 1 are always "." and "..". The array has no holes, so the
//! directory size is always `count * DIRENT_SIZE`.

use super::constants::{DIRENT_SIZE, MAX_NAME_LEN};
use super::inode::read_u32;
use super::{InodeId, NodeKind};
use crate::error::{FsError, FsResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: InodeId,
    pub kind: NodeKind,
    pub name: String,
}

impl DirEntry {
    #[must_use]
    pub fn new(inode: InodeId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            inode,
            kind,
            name: name.into(),
        }
    }

    /// True for the "." and ".." records every directory carries.
    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.name == "." || self.name == ".."
    }

    /// # Errors
    /// Returns [`FsError::NameTooLong`] if the name does not fit a record.
    pub fn encode(&self, buf: &mut [u8]) -> FsResult<()> {
        let name = self.name.as_bytes();
        if name.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        let rec = &mut buf[..DIRENT_SIZE];
        rec.fill(0);
        rec[0..4].copy_from_slice(&self.inode.to_le_bytes());
        rec[4] = self.kind.to_byte();
        rec[5] = name.len() as u8;
        rec[6..6 + name.len()].copy_from_slice(name);
        Ok(())
    }

    /// # Errors
    /// Returns [`FsError::Corrupt`] if the record cannot be a live entry.
    pub fn decode(buf: &[u8]) -> FsResult<Self> {
        let rec = buf
            .get(..DIRENT_SIZE)
            .ok_or_else(|| FsError::corrupt("short directory record"))?;
        let inode = read_u32(rec, 0);
        if inode == 0 {
            return Err(FsError::corrupt("directory record without inode"));
        }
        let kind = NodeKind::from_byte(rec[4])
            .ok_or_else(|| FsError::corrupt(format!("directory record kind {}", rec[4])))?;
        let len = rec[5] as usize;
        if len == 0 || len > MAX_NAME_LEN {
            return Err(FsError::corrupt(format!("directory record name length {len}")));
        }
        let name = std::str::from_utf8(&rec[6..6 + len])
            .map_err(|_| FsError::corrupt("directory record name is not utf-8"))?;
        Ok(Self::new(inode, kind, name))
    }
}

/// Checks a name for use as a new directory entry.
///
/// # Errors
/// [`FsError::InvalidName`] for "", ".", ".." or names containing "/" or NUL;
/// [`FsError::NameTooLong`] past MAX_NAME_LEN bytes.
pub fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(FsError::InvalidName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}
