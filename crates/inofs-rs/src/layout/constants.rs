//! Fixed parameters of the on-disk format.

/// BLOCK_SIZE is the size of every block on the volume, in bytes.
pub const BLOCK_SIZE: usize = 512;
/// BITS_PER_BLOCK is the number of allocation bits one bitmap block holds.
pub const BITS_PER_BLOCK: u32 = (BLOCK_SIZE * 8) as u32;
/// MAGIC identifies a formatted volume in block 0.
pub const MAGIC: &[u8; 8] = b"INOFS001";
/// VERSION is the on-disk format version.
pub const VERSION: u32 = 1;
/// ROOT_INO is the inode number of the root directory. It is never reclaimed.
pub const ROOT_INO: u32 = 1;

/// INODE_SIZE is the byte size of one inode record.
pub const INODE_SIZE: usize = 64;
/// INODES_PER_BLOCK is the number of inode records per table block.
pub const INODES_PER_BLOCK: u32 = (BLOCK_SIZE / INODE_SIZE) as u32;
/// DIRECT_PTRS is the number of block pointers stored inside an inode.
pub const DIRECT_PTRS: usize = 10;
/// PTRS_PER_BLOCK is the number of block pointers in an indirection block.
pub const PTRS_PER_BLOCK: usize = BLOCK_SIZE / 4;
/// MAX_FILE_BLOCKS is the largest block list an inode can address.
pub const MAX_FILE_BLOCKS: usize = DIRECT_PTRS + PTRS_PER_BLOCK;
/// MAX_FILE_SIZE is the largest size in bytes an inode can describe.
pub const MAX_FILE_SIZE: u64 = (MAX_FILE_BLOCKS * BLOCK_SIZE) as u64;
/// UNALLOCATED_BLOCK marks an empty block pointer slot.
pub const UNALLOCATED_BLOCK: u32 = u32::MAX;

/// DIRENT_SIZE is the byte size of one directory record.
pub const DIRENT_SIZE: usize = 32;
/// DIRENTS_PER_BLOCK is the number of directory records per data block.
pub const DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / DIRENT_SIZE;
/// MAX_NAME_LEN is the longest entry name, in bytes.
pub const MAX_NAME_LEN: usize = DIRENT_SIZE - 6;

/// MAX_OPEN_FILES is the capacity of one session's descriptor table.
pub const MAX_OPEN_FILES: usize = 16;

/// DEFAULT_TOTAL_BLOCKS is the volume size used when none is configured (1 MiB).
pub const DEFAULT_TOTAL_BLOCKS: u32 = 2048;
/// DEFAULT_INODE_COUNT is the inode table capacity used when none is configured.
pub const DEFAULT_INODE_COUNT: u32 = 256;
