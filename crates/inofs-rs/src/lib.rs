//! Inode-based block file system engine: on-disk layout codecs, backing
//! devices, allocation tables and the mounted volume with its directory,
//! path, file I/O, open-file, link and consistency-check operations.
#![allow(clippy::cargo_common_metadata)]

pub mod error;
pub mod layout;
pub mod retention;
pub mod volume_fs;

pub use error::{FsError, FsResult};
pub use layout::constants::{BLOCK_SIZE, ROOT_INO};
pub use layout::{BlockId, InodeId, NodeKind};
pub use retention::disk::{BlockDevice, Disk, MemDisk};
pub use volume_fs::{
    Access, DirEntry, Fd, FileTable, FsckProblem, FsckReport, Geometry, OpenFile, OpenMode, Stat,
    VolumeFs,
};
