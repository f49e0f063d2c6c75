//! Error taxonomy for the file system engine.
//!
//! Everything except [`FsError::Corrupt`] and [`FsError::Io`] is a user-facing
//! error: the failing command reports it and the volume is left exactly as it
//! was. The two fatal kinds mean the on-disk invariants can no longer be
//! trusted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,

    #[error("name already exists")]
    NameExists,

    #[error("invalid name")]
    InvalidName,

    #[error("name too long")]
    NameTooLong,

    #[error("not a directory")]
    NotADirectory,

    #[error("not a file")]
    NotAFile,

    #[error("is a directory")]
    IsADirectory,

    #[error("directory not empty")]
    DirectoryNotEmpty,

    #[error("no space left on volume")]
    OutOfSpace,

    #[error("file too large")]
    FileTooLarge,

    #[error("too many open files")]
    TooManyOpenFiles,

    #[error("bad file descriptor")]
    BadDescriptor,

    #[error("operation not permitted by open mode")]
    NotPermitted,

    #[error("invalid seek position")]
    InvalidSeek,

    #[error("volume corrupted: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Fatal errors end the session; all others are reported and ignored.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::Io(_))
    }

    pub(crate) fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt(detail.into())
    }
}
