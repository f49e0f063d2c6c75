//! On-disk layout: format constants, allocation bitmaps and the codecs for
//! the superblock, inode records and directory records.

pub mod bits;
pub mod constants;
pub mod dirent;
pub mod inode;
pub mod superblock;

use constants::BLOCK_SIZE;

/// Block is the unit of transfer between the engine and a device.
pub type Block = [u8; BLOCK_SIZE];
/// BlockId indexes the data region, starting at 0.
pub type BlockId = u32;
/// InodeId indexes the inode table, starting at 1. 0 means "no inode".
pub type InodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    pub(crate) const fn to_byte(self) -> u8 {
        match self {
            Self::File => 1,
            Self::Dir => 2,
        }
    }

    pub(crate) const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::File),
            2 => Some(Self::Dir),
            _ => None,
        }
    }
}

#[must_use]
pub const fn empty_block() -> Block {
    [0u8; BLOCK_SIZE]
}

pub(crate) const fn div_ceil(a: u64, b: u64) -> u64 {
    if a == 0 { 0 } else { a.div_ceil(b) }
}
