//! ZIP archive source.

use std::io;
use std::io::Cursor;

use zip::ZipArchive;

use super::traits::ArchiveSource;
use super::traits::SourceEntry;
use crate::ExtractionError;
use crate::Result;
use crate::types::EntryKind;

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// In-memory ZIP archive.
///
/// Parsing reads the central directory only; entry data is decompressed
/// lazily as each entry is opened.
pub struct ZipSource<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> ZipSource<'a> {
    /// Parses the central directory of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::InvalidArchive`] if the bytes are not a
    /// readable ZIP archive.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::InvalidArchive(e.to_string()))?;
        Ok(Self { archive })
    }
}

impl std::fmt::Debug for ZipSource<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipSource")
            .field("entries", &self.archive.len())
            .finish()
    }
}

impl ArchiveSource for ZipSource<'_> {
    fn entry_count(&self) -> usize {
        self.archive.len()
    }

    fn entry(&mut self, index: usize) -> io::Result<SourceEntry<'_>> {
        let file = self.archive.by_index(index).map_err(io::Error::other)?;

        let kind = if file.is_dir() {
            EntryKind::Directory
        } else if file
            .unix_mode()
            .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
        {
            EntryKind::Other
        } else {
            EntryKind::File
        };

        Ok(SourceEntry {
            name: file.name().to_string(),
            declared_size: file.size(),
            kind,
            reader: Box::new(file),
        })
    }

    fn format_name(&self) -> &str {
        "zip"
    }
}
