use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use inofs_rs::Geometry;
use inofs_rs::layout::constants::{DEFAULT_INODE_COUNT, DEFAULT_TOTAL_BLOCKS};

#[derive(Parser, Debug)]
#[command(
    name = "inofs",
    author,
    version,
    about = "Line-oriented shell over an inode-based block file system"
)]
pub struct Cli {
    /// Backing image; created and formatted if missing or blank.
    #[arg(long, env = "INOFS_IMAGE", default_value = "inofs.img")]
    pub image: PathBuf,

    /// Use a volatile in-memory volume instead of the image.
    #[arg(long, env = "INOFS_MEMORY")]
    pub memory: bool,

    /// Total blocks when formatting.
    #[arg(long, env = "INOFS_BLOCKS", default_value_t = DEFAULT_TOTAL_BLOCKS)]
    pub blocks: u32,

    /// Inode table capacity when formatting.
    #[arg(long, env = "INOFS_INODES", default_value_t = DEFAULT_INODE_COUNT)]
    pub inodes: u32,

    #[arg(long, env = "INOFS_FSCK", value_enum, default_value_t = FsckMode::Check)]
    pub fsck: FsckMode,

    #[arg(long, env = "INOFS_FLUSH", value_enum, default_value_t = FlushMode::OnExit)]
    pub flush: FlushMode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FsckMode {
    Off,
    Check,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FlushMode {
    OnExit,
    EachCommand,
}

/// Settings the shell consults while running.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    pub fsck: FsckMode,
    pub flush: FlushMode,
    /// Print a prompt before each command.
    pub interactive: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            fsck: FsckMode::Check,
            flush: FlushMode::OnExit,
            interactive: false,
        }
    }
}

impl Cli {
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        Geometry {
            total_blocks: self.blocks,
            inode_count: self.inodes,
        }
    }

    #[must_use]
    pub const fn shell_config(&self, interactive: bool) -> ShellConfig {
        ShellConfig {
            fsck: self.fsck,
            flush: self.flush,
            interactive,
        }
    }
}
