//! Error types for the fetch-extract-scan pipeline.
//!
//! Errors are layered by blast radius:
//!
//! - [`PolicyViolation`]: one archive entry is unsafe and gets skipped.
//! - [`ExtractionError`]: the whole archive is abandoned.
//! - [`FetchError`] and [`ScanError`]: one target is abandoned.
//! - [`TargetError`]: everything that can end one target, never propagated
//!   past the worker that produced it.
//! - [`ConfigError`]: startup failures, the only errors fatal to the process.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Result type alias using `ExtractionError`.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Represents a specific extraction ceiling that was exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaResource {
    /// Archive holds more entries than allowed.
    EntryCount {
        /// Number of entries in the archive.
        current: usize,
        /// Maximum allowed entry count.
        max: usize,
    },
    /// Cumulative declared uncompressed size exceeded.
    TotalSize {
        /// Declared bytes accumulated so far, including the offending entry.
        current: u64,
        /// Maximum allowed total size in bytes.
        max: u64,
    },
    /// Integer overflow detected in budget tracking.
    IntegerOverflow,
}

impl std::fmt::Display for QuotaResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryCount { current, max } => {
                write!(f, "quota exceeded: entry count ({current} > {max})")
            }
            Self::TotalSize { current, max } => {
                write!(f, "quota exceeded: total uncompressed size ({current} > {max})")
            }
            Self::IntegerOverflow => {
                write!(f, "quota exceeded: integer overflow in budget tracking")
            }
        }
    }
}

/// Errors that abort the extraction of a whole archive.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// I/O operation on the destination root failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive is corrupted or cannot be parsed at all.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// A decompression-bomb ceiling was exceeded.
    #[error("{resource}")]
    QuotaExceeded {
        /// The ceiling that was exceeded.
        resource: QuotaResource,
    },
}

impl ExtractionError {
    /// Returns `true` if this error is a decompression-bomb defense firing.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposweep_core::ExtractionError;
    /// use reposweep_core::QuotaResource;
    ///
    /// let err = ExtractionError::QuotaExceeded {
    ///     resource: QuotaResource::EntryCount { current: 11, max: 10 },
    /// };
    /// assert!(err.is_bomb_defense());
    ///
    /// let err = ExtractionError::InvalidArchive("bad header".into());
    /// assert!(!err.is_bomb_defense());
    /// ```
    #[must_use]
    pub const fn is_bomb_defense(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Returns the quota resource that was exceeded, if applicable.
    #[must_use]
    pub const fn quota_resource(&self) -> Option<&QuotaResource> {
        match self {
            Self::QuotaExceeded { resource } => Some(resource),
            _ => None,
        }
    }
}

/// Reason a single archive entry was refused by the extraction policy.
///
/// A violation only skips the entry; extraction of the archive continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    /// Entry name contains a Windows UNC separator sequence.
    #[error("entry name contains a UNC path sequence")]
    UncPath,

    /// Entry is itself an archive of the same format.
    #[error("nested archive")]
    NestedArchive,

    /// Entry name contains a null byte.
    #[error("entry name contains a null byte")]
    NullByte,

    /// Entry name is empty after normalization.
    #[error("empty entry name")]
    EmptyName,

    /// Entry name contains a `..` segment.
    #[error("parent directory traversal in entry name")]
    ParentTraversal,

    /// Entry name is absolute.
    #[error("absolute entry name")]
    AbsolutePath,

    /// Entry name is nested deeper than allowed.
    #[error("path depth {depth} exceeds maximum {max}")]
    TooDeep {
        /// Number of path segments in the entry name.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },

    /// Canonicalized path escapes the destination root.
    #[error("resolves outside the destination root: {path}")]
    OutsideRoot {
        /// The candidate output path.
        path: PathBuf,
    },

    /// A filesystem object already exists at the output path.
    #[error("refusing to overwrite existing path: {path}")]
    AlreadyExists {
        /// The existing path.
        path: PathBuf,
    },

    /// The output path could not be resolved on disk, for example because
    /// a regular file sits where a parent directory is expected.
    #[error("cannot resolve output path {path}: {kind}")]
    Unresolvable {
        /// The candidate output path.
        path: PathBuf,
        /// Kind of the underlying I/O error.
        kind: std::io::ErrorKind,
    },

    /// Entry is neither a regular file nor a directory.
    #[error("unsupported entry type")]
    UnsupportedType,
}

/// Errors returned by the archive fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server answered 404.
    #[error("404 status code")]
    NotFound,

    /// The server answered 422.
    #[error("422 status code")]
    Unprocessable,

    /// Any other non-200 status or a transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors returned by the scan invoker.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The temporary output file could not be created.
    #[error("could not create scanner output file: {0}")]
    OutputFile(#[source] std::io::Error),

    /// The scanner process could not be started.
    #[error("could not start scanner {binary}: {source}")]
    Spawn {
        /// Scanner binary that failed to start.
        binary: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the scanner process failed.
    #[error("failed waiting for scanner: {0}")]
    Wait(#[source] std::io::Error),

    /// The scanner exited unsuccessfully.
    #[error("scanner finished with {0}")]
    ExitStatus(ExitStatus),

    /// The scanner's output file could not be read.
    #[error("could not read scanner output: {0}")]
    ReadOutput(#[source] std::io::Error),

    /// The scanner's output file is not valid JSON of the expected shape.
    #[error("unparsable scanner output: {0}")]
    Parse(#[from] serde_json::Error),

    /// The findings report could not be written.
    #[error("could not write report {path}: {source}")]
    Report {
        /// Report path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors fatal to the whole process at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The user's home directory could not be resolved.
    #[error("unable to determine the user home directory")]
    HomeDirUnavailable,

    /// The output directory could not be created or is unusable.
    #[error("could not create the output directory {path}: {source}")]
    OutputDir {
        /// Output directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The scanner config file exists but could not be read.
    #[error("could not read scanner config {path}: {source}")]
    ScannerConfig {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A range filter expression could not be parsed.
    #[error("invalid filter '{0}' (expected N, A-B, A- or -B)")]
    InvalidFilter(String),

    /// Worker count must be at least one.
    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Everything that can end the processing of one target.
#[derive(Error, Debug)]
pub enum TargetError {
    /// Target string is not a valid repository URL.
    #[error("{0} is not a valid github.com repository url")]
    InvalidTarget(String),

    /// Archive download failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Archive extraction was aborted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The analysis tool failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Target excluded by an operator-specified criterion.
    #[error("target filtered out: {reason}")]
    Filtered {
        /// Which criterion excluded the target.
        reason: String,
    },

    /// The per-target directory would land outside the output root.
    #[error("download path outside of output directory: {path}")]
    DestinationEscape {
        /// Offending path.
        path: PathBuf,
    },

    /// The per-target directory already exists.
    #[error("destination already exists: {path}")]
    DestinationExists {
        /// Existing path.
        path: PathBuf,
    },

    /// Filesystem error outside the extractor.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TargetError {
    /// Returns `true` if the repository does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::NotFound))
    }

    /// Returns `true` if the outcome is not worth an error line.
    ///
    /// Unprocessable archives and filtered targets are dropped silently.
    ///
    /// # Examples
    ///
    /// ```
    /// use reposweep_core::FetchError;
    /// use reposweep_core::TargetError;
    ///
    /// assert!(TargetError::Fetch(FetchError::Unprocessable).is_silent());
    /// assert!(!TargetError::Fetch(FetchError::NotFound).is_silent());
    /// ```
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        matches!(
            self,
            Self::Fetch(FetchError::Unprocessable) | Self::Filtered { .. }
        )
    }
}
