//! Test utilities for archive creation.
//!
//! Helpers for building in-memory ZIP archives and synthetic archive
//! sources whose declared metadata disagrees with their data.
//!
//! # Panics
//!
//! All functions in this module may panic on I/O errors since they are
//! designed for test use only where panics are acceptable.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::io;
use std::io::Cursor;
use std::io::Write;

use crate::formats::ArchiveSource;
use crate::formats::SourceEntry;
use crate::types::EntryKind;

/// Creates an in-memory ZIP archive from a list of entries.
///
/// Each entry is a tuple of (path, content). Files are stored uncompressed
/// with mode 0o644.
///
/// # Examples
///
/// ```
/// use reposweep_core::test_utils::create_test_zip;
///
/// let zip_data = create_test_zip(&[("file.txt", b"hello"), ("dir/nested.txt", b"world")]);
/// ```
#[must_use]
pub fn create_test_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    entries
        .iter()
        .fold(ZipTestBuilder::new(), |builder, (path, data)| {
            builder.add_file(path, data)
        })
        .build()
}

/// Builder for ZIP test archives with various entry types.
///
/// # Examples
///
/// ```
/// use reposweep_core::test_utils::ZipTestBuilder;
///
/// let zip_data = ZipTestBuilder::new()
///     .add_directory("repo-main/")
///     .add_file("repo-main/file.txt", b"content")
///     .build();
/// ```
pub struct ZipTestBuilder {
    zip: zip::ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipTestBuilder {
    /// Creates a new ZIP test builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            zip: zip::ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    /// Adds a stored (uncompressed) regular file.
    #[must_use]
    pub fn add_file(mut self, path: &str, data: &[u8]) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .unix_permissions(0o644);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a deflate-compressed regular file.
    #[must_use]
    pub fn add_deflated_file(mut self, path: &str, data: &[u8]) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(0o644);

        self.zip.start_file(path, options).unwrap();
        self.zip.write_all(data).unwrap();
        self
    }

    /// Adds a directory.
    #[must_use]
    pub fn add_directory(mut self, path: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default().unix_permissions(0o755);
        self.zip.add_directory(path, options).unwrap();
        self
    }

    /// Adds a symlink pointing at `target`.
    #[must_use]
    pub fn add_symlink(mut self, path: &str, target: &str) -> Self {
        use zip::write::SimpleFileOptions;

        let options = SimpleFileOptions::default();
        self.zip.add_symlink(path, target, options).unwrap();
        self
    }

    /// Builds and returns the ZIP archive data.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.zip.finish().unwrap().into_inner()
    }
}

impl Default for ZipTestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One synthetic entry of a [`MemoryArchive`].
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// Raw entry name.
    pub name: String,
    /// Size reported to the extractor.
    pub declared_size: u64,
    /// Declared kind.
    pub kind: EntryKind,
    /// Bytes the data stream actually yields.
    pub data: Vec<u8>,
}

/// Archive source built from synthetic entries.
///
/// Unlike a real ZIP, declared sizes and stream lengths are independent,
/// which allows modelling archives that lie about their contents.
///
/// # Examples
///
/// ```
/// use reposweep_core::formats::ArchiveSource;
/// use reposweep_core::test_utils::MemoryArchive;
///
/// let archive = MemoryArchive::new()
///     .file("a.txt", b"hello")
///     .lying_file("big.txt", 10, vec![b'x'; 1000]);
/// assert_eq!(archive.entry_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    entries: Vec<MemoryEntry>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file whose declared size matches its data.
    #[must_use]
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.lying_file(name, data.len() as u64, data.to_vec())
    }

    /// Adds a file declaring `declared_size` but streaming `data`.
    #[must_use]
    pub fn lying_file(mut self, name: &str, declared_size: u64, data: Vec<u8>) -> Self {
        self.entries.push(MemoryEntry {
            name: name.to_string(),
            declared_size,
            kind: EntryKind::File,
            data,
        });
        self
    }

    /// Adds a directory entry.
    #[must_use]
    pub fn directory(mut self, name: &str) -> Self {
        self.entries.push(MemoryEntry {
            name: name.to_string(),
            declared_size: 0,
            kind: EntryKind::Directory,
            data: Vec::new(),
        });
        self
    }

    /// Adds an entry of an unsupported kind.
    #[must_use]
    pub fn other(mut self, name: &str) -> Self {
        self.entries.push(MemoryEntry {
            name: name.to_string(),
            declared_size: 0,
            kind: EntryKind::Other,
            data: Vec::new(),
        });
        self
    }
}

impl ArchiveSource for MemoryArchive {
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn entry(&mut self, index: usize) -> io::Result<SourceEntry<'_>> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such entry"))?;

        Ok(SourceEntry {
            name: entry.name.clone(),
            declared_size: entry.declared_size,
            kind: entry.kind,
            reader: Box::new(entry.data.as_slice()),
        })
    }

    fn format_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_zip() {
        let zip_data = create_test_zip(&[("file.txt", b"hello")]);
        assert!(!zip_data.is_empty());
    }

    #[test]
    fn test_zip_builder() {
        let zip_data = ZipTestBuilder::new()
            .add_file("file.txt", b"content")
            .add_deflated_file("packed.txt", &[b'a'; 4096])
            .add_directory("dir/")
            .build();
        assert!(!zip_data.is_empty());
    }

    #[test]
    fn test_memory_archive_streams_more_than_declared() {
        use std::io::Read;

        let mut archive = MemoryArchive::new().lying_file("x", 1, vec![0; 50]);
        let mut entry = archive.entry(0).unwrap();
        assert_eq!(entry.declared_size, 1);

        let mut data = Vec::new();
        entry.reader.read_to_end(&mut data).unwrap();
        assert_eq!(data.len(), 50);
    }
}
