//! Archive entry kind.

/// Kind of an archive entry as declared by the archive itself.
///
/// Only files and directories are ever materialized; everything else
/// (symlinks, devices) is skipped by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,

    /// Directory.
    Directory,

    /// Symlink or any other special entry.
    Other,
}

impl EntryKind {
    /// Returns `true` if this is a regular file.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    /// Returns `true` if this is a directory.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}
