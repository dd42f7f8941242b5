//! Core extraction engine.

use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use log::debug;
use log::warn;

use crate::ExtractionLimits;
use crate::ExtractionReport;
use crate::Result;
use crate::copy::CopyBuffer;
use crate::copy::copy_bounded;
use crate::error::PolicyViolation;
use crate::formats::ArchiveSource;
use crate::formats::ZipSource;
use crate::security::ExtractionBudget;
use crate::security::resolve_entry_path;
use crate::security::screen_entry_name;
use crate::types::DestRoot;
use crate::types::EntryKind;

/// Permission bits for created directories.
const DIR_MODE: u32 = 0o700;

/// Permission bits for created files.
const FILE_MODE: u32 = 0o600;

/// Writes archive entries under a destination root.
///
/// Unsafe entries are skipped and counted; only a malformed archive or a
/// decompression-bomb ceiling aborts the extraction.
///
/// # Examples
///
/// ```no_run
/// use reposweep_core::DestRoot;
/// use reposweep_core::ExtractionLimits;
/// use reposweep_core::extraction::ExtractionEngine;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("repo.zip")?;
/// let root = DestRoot::new("/tmp/out")?;
/// let engine = ExtractionEngine::new(ExtractionLimits::default());
/// let report = engine.extract(&bytes, &root)?;
/// println!("{} files, {} skipped", report.files_extracted, report.entries_skipped);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractionEngine {
    limits: ExtractionLimits,
}

impl ExtractionEngine {
    /// Creates a new extraction engine with the given limits.
    #[must_use]
    pub const fn new(limits: ExtractionLimits) -> Self {
        Self { limits }
    }

    /// Extracts ZIP `archive_bytes` under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be parsed or exceeds the entry
    /// count or cumulative declared size ceilings.
    pub fn extract(&self, archive_bytes: &[u8], root: &DestRoot) -> Result<ExtractionReport> {
        let mut source = ZipSource::new(archive_bytes)?;
        self.extract_source(&mut source, root)
    }

    /// Extracts every entry of `source` under `root`.
    ///
    /// The entry count is checked before anything is written. Each entry's
    /// declared size is added to the running total before its data is
    /// written, so an oversized archive stops at the first entry that crosses
    /// the ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if a ceiling is exceeded.
    pub fn extract_source<S: ArchiveSource + ?Sized>(
        &self,
        source: &mut S,
        root: &DestRoot,
    ) -> Result<ExtractionReport> {
        let start = Instant::now();
        let mut budget = ExtractionBudget::new(self.limits);
        let mut report = ExtractionReport::new();
        let mut buffer = CopyBuffer::new();

        let count = source.entry_count();
        budget.check_entry_count(count)?;
        debug!(
            "extracting {count} {} entries into {}",
            source.format_name(),
            root.as_path().display()
        );

        for index in 0..count {
            let entry = match source.entry(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("could not open archive entry #{index}: {e}");
                    report.entries_skipped += 1;
                    continue;
                }
            };

            if let Err(violation) = screen_entry_name(&entry.name) {
                skip(&mut report, &entry.name, &violation);
                continue;
            }

            budget.record_declared(entry.declared_size)?;

            if entry.kind == EntryKind::Other {
                skip(&mut report, &entry.name, &PolicyViolation::UnsupportedType);
                continue;
            }

            let path = match resolve_entry_path(&entry.name, root, self.limits.max_depth) {
                Ok(path) => path,
                Err(violation) => {
                    skip(&mut report, &entry.name, &violation);
                    continue;
                }
            };

            if entry.kind.is_directory() {
                match create_private_dir(&path) {
                    Ok(()) => report.directories_created += 1,
                    Err(e) => {
                        warn!("could not create directory {}: {e}", path.display());
                        report.entries_skipped += 1;
                    }
                }
                continue;
            }

            let mut reader = entry.reader;
            match write_file(&path, &mut reader, entry.declared_size, &mut buffer) {
                Ok(written) => {
                    report.files_extracted += 1;
                    report.bytes_written += written;
                }
                Err(e) => {
                    warn!("could not write {}: {e}", path.display());
                    report.entries_skipped += 1;
                }
            }
        }

        report.duration = start.elapsed();
        debug!(
            "extracted {} files and {} directories into {} ({} skipped)",
            report.files_extracted,
            report.directories_created,
            root.as_path().display(),
            report.entries_skipped
        );
        Ok(report)
    }
}

fn skip(report: &mut ExtractionReport, name: &str, violation: &PolicyViolation) {
    debug!("skipping entry {name:?}: {violation}");
    report.entries_skipped += 1;
}

/// Creates `path` and any missing parents with owner-only permissions.
pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

fn open_new_file(path: &Path) -> io::Result<File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE).custom_flags(libc::O_NOFOLLOW);
    }
    options.open(path)
}

fn write_file<R: Read + ?Sized>(
    path: &Path,
    reader: &mut R,
    declared_size: u64,
    buffer: &mut CopyBuffer,
) -> io::Result<u64> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }

    let mut file = open_new_file(path)?;
    match copy_bounded(reader, &mut file, declared_size, buffer) {
        Ok(written) => Ok(written),
        Err(e) => {
            drop(file);
            // only reached after create_new succeeded, so the file is ours
            if let Err(remove_err) = fs::remove_file(path) {
                warn!("could not remove partial file {}: {remove_err}", path.display());
            }
            Err(e)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::ExtractionError;
    use crate::QuotaResource;
    use crate::test_utils::MemoryArchive;
    use crate::test_utils::ZipTestBuilder;
    use tempfile::TempDir;

    fn create_test_dest() -> (TempDir, DestRoot) {
        let temp = TempDir::new().expect("failed to create temp dir");
        let dest = DestRoot::new(temp.path()).expect("failed to create dest");
        (temp, dest)
    }

    #[test]
    fn test_extract_zip_files_and_dirs() {
        let (_temp, dest) = create_test_dest();
        let bytes = ZipTestBuilder::new()
            .add_directory("repo-main/")
            .add_file("repo-main/README.md", b"# readme")
            .add_deflated_file("repo-main/src/lib.rs", &[b'x'; 10_000])
            .build();

        let report = ExtractionEngine::default().extract(&bytes, &dest).unwrap();
        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.directories_created, 1);
        assert_eq!(report.entries_skipped, 0);
        assert_eq!(report.bytes_written, 10_008);

        let lib = dest.as_path().join("repo-main/src/lib.rs");
        assert_eq!(fs::read(&lib).unwrap().len(), 10_000);
    }

    #[test]
    #[cfg(unix)]
    fn test_extract_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new()
            .directory("d/")
            .file("d/e/f.txt", b"data");
        ExtractionEngine::default()
            .extract_source(&mut source, &dest)
            .unwrap();

        for dir in ["d", "d/e"] {
            let mode = fs::metadata(dest.as_path().join(dir)).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700, "{dir}");
        }
        let mode = fs::metadata(dest.as_path().join("d/e/f.txt"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_extract_skips_nested_and_unc() {
        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new()
            .file("inner.zip", b"PK")
            .file(r"a\\b.txt", b"x")
            .file("ok.txt", b"ok");

        let report = ExtractionEngine::default()
            .extract_source(&mut source, &dest)
            .unwrap();
        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.entries_skipped, 2);
        assert!(!dest.as_path().join("inner.zip").exists());
    }

    #[test]
    fn test_extract_skips_symlink_entries() {
        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new().other("link");

        let report = ExtractionEngine::default()
            .extract_source(&mut source, &dest)
            .unwrap();
        assert_eq!(report.entries_skipped, 1);
        assert!(fs::symlink_metadata(dest.as_path().join("link")).is_err());
    }

    #[test]
    fn test_extract_duplicate_entry_keeps_first() {
        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new()
            .file("dup.txt", b"first")
            .file("dup.txt", b"second!");

        let report = ExtractionEngine::default()
            .extract_source(&mut source, &dest)
            .unwrap();
        assert_eq!(report.files_extracted, 1);
        assert_eq!(report.entries_skipped, 1);
        assert_eq!(fs::read(dest.as_path().join("dup.txt")).unwrap(), b"first");
    }

    #[test]
    fn test_extract_short_stream_writes_what_exists() {
        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new().lying_file("short.txt", 100, b"abc".to_vec());

        let report = ExtractionEngine::default()
            .extract_source(&mut source, &dest)
            .unwrap();
        assert_eq!(report.bytes_written, 3);
    }

    #[test]
    fn test_extract_entry_count_ceiling() {
        let (_temp, dest) = create_test_dest();
        let mut source = MemoryArchive::new().file("a", b"a").file("b", b"b");
        let engine = ExtractionEngine::new(ExtractionLimits {
            max_entries: 1,
            ..Default::default()
        });

        let result = engine.extract_source(&mut source, &dest);
        assert!(matches!(
            result,
            Err(ExtractionError::QuotaExceeded {
                resource: QuotaResource::EntryCount { current: 2, max: 1 }
            })
        ));
        assert!(!dest.as_path().join("a").exists());
    }

    #[test]
    fn test_extract_invalid_zip() {
        let (_temp, dest) = create_test_dest();
        let result = ExtractionEngine::default().extract(b"not a zip", &dest);
        assert!(matches!(result, Err(ExtractionError::InvalidArchive(_))));
    }

    #[test]
    fn test_create_private_dir_existing_ok() {
        let (_temp, dest) = create_test_dest();
        let dir = dest.as_path().join("x/y");
        create_private_dir(&dir).unwrap();
        create_private_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    #[cfg(unix)]
    fn test_open_new_file_refuses_symlink() {
        use std::os::unix::fs::symlink;

        let (_temp, dest) = create_test_dest();
        let target = dest.as_path().join("target.txt");
        fs::write(&target, b"keep").unwrap();
        let link = dest.as_path().join("link.txt");
        symlink(&target, &link).unwrap();

        assert!(open_new_file(&link).is_err());
        assert_eq!(fs::read(&target).unwrap(), b"keep");
    }
}
