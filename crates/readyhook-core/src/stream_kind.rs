//! Classification of the standard-input descriptor.
//!
//! The decision is made from the file-type bits of `st_mode` alone. A regular
//! file already holds all of its data, so reading it is never an interactive
//! wait; every other kind of descriptor can block on a peer.

use serde::Serialize;

/// File-type mask and type values from `<sys/stat.h>`.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

/// What standard input is attached to.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    RegularFile = 1,
    Pipe = 2,
    CharDevice = 3,
    Socket = 4,
    BlockDevice = 5,
    Directory = 6,
    Symlink = 7,
    Unknown = 8,
    /// `fstat` on the descriptor failed (typically a closed stdin).
    Unavailable = 9,
}

impl StreamKind {
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::RegularFile,
            S_IFIFO => Self::Pipe,
            S_IFCHR => Self::CharDevice,
            S_IFSOCK => Self::Socket,
            S_IFBLK => Self::BlockDevice,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            _ => Self::Unknown,
        }
    }

    /// Classify the outcome of an `fstat` call; `None` means it failed.
    #[must_use]
    pub const fn from_fstat(mode: Option<u32>) -> Self {
        match mode {
            Some(mode) => Self::from_mode(mode),
            None => Self::Unavailable,
        }
    }

    /// Whether reads from a descriptor of this kind warrant a readiness signal.
    ///
    /// Applied identically for every channel backend.
    #[must_use]
    pub const fn needs_notify(self) -> bool {
        !matches!(self, Self::RegularFile | Self::Unavailable)
    }

    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::RegularFile => "regular file",
            Self::Pipe => "FIFO/pipe",
            Self::CharDevice => "character device",
            Self::Socket => "socket",
            Self::BlockDevice => "block device",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
            Self::Unknown => "unknown",
            Self::Unavailable => "unavailable",
        }
    }

    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}
