//! Common traits for archive sources.

use std::io;
use std::io::Read;

use crate::types::EntryKind;

/// One untrusted record read from an archive.
///
/// Every field comes from the archive and is attacker-controlled.
pub struct SourceEntry<'a> {
    /// Raw entry name as stored in the archive.
    pub name: String,

    /// Uncompressed size the archive declares for this entry.
    pub declared_size: u64,

    /// Declared entry kind.
    pub kind: EntryKind,

    /// Decompressed data stream. May yield more or fewer bytes than
    /// `declared_size`.
    pub reader: Box<dyn Read + 'a>,
}

impl std::fmt::Debug for SourceEntry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEntry")
            .field("name", &self.name)
            .field("declared_size", &self.declared_size)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Random-access view over the entries of a parsed archive.
pub trait ArchiveSource {
    /// Number of entries the archive declares.
    fn entry_count(&self) -> usize;

    /// Opens the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if this single entry cannot be read; other entries
    /// may still be readable.
    fn entry(&mut self, index: usize) -> io::Result<SourceEntry<'_>>;

    /// Returns the archive format name.
    fn format_name(&self) -> &str;
}
