//! Concurrent fetch-extract-scan pipeline for GitHub repositories.
//!
//! `reposweep-core` downloads repository archives, extracts them under a
//! hardened policy (no traversal, no overwrite, no symlinks, bounded
//! expansion) and runs a static analysis tool on the result, with a fixed
//! pool of workers and two-stage cancellation.
//!
//! # Examples
//!
//! ```no_run
//! use reposweep_core::DestRoot;
//! use reposweep_core::ExtractionLimits;
//! use reposweep_core::extract;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("repo.zip")?;
//! let root = DestRoot::new("/output/dir")?;
//! let report = extract(&bytes, &root, ExtractionLimits::default())?;
//! println!("Extracted {} files", report.files_extracted);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cancel;
pub mod config;
pub mod copy;
pub mod error;
pub mod extraction;
pub mod feed;
pub mod fetch;
pub mod formats;
pub mod pipeline;
pub mod report;
pub mod scan;
pub mod security;
pub mod types;

#[doc(hidden)]
pub mod test_utils;

pub use config::ExtractionLimits;
pub use config::RunOptions;
pub use config::ScannerConfig;
pub use config::SweepConfig;
pub use error::ConfigError;
pub use error::ExtractionError;
pub use error::FetchError;
pub use error::PolicyViolation;
pub use error::QuotaResource;
pub use error::Result;
pub use error::ScanError;
pub use error::TargetError;
pub use report::ExtractionReport;
pub use report::RunSummary;
pub use report::TargetReport;

pub use types::DestRoot;
pub use types::EntryKind;
pub use types::Target;

/// Extracts ZIP `archive_bytes` under `root` with the given ceilings.
///
/// Unsafe entries are skipped; see
/// [`ExtractionEngine`](extraction::ExtractionEngine).
///
/// # Errors
///
/// Returns an error if the archive is malformed or exceeds the entry count
/// or cumulative size ceiling.
pub fn extract(archive_bytes: &[u8], root: &DestRoot, limits: ExtractionLimits) -> Result<ExtractionReport> {
    extraction::ExtractionEngine::new(limits).extract(archive_bytes, root)
}
