//! Retention layer: backing devices, the data-block store and the inode table.

pub mod disk;
pub mod inode_table;
pub mod store;
