//! Per-extraction, per-target and per-run reporting.

use std::time::Duration;

use serde::Serialize;

use crate::error::TargetError;
use crate::scan::ScanResult;
use crate::types::Target;

/// Report of one archive extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Number of files written.
    pub files_extracted: usize,

    /// Number of directory entries created.
    pub directories_created: usize,

    /// Total bytes written to disk.
    pub bytes_written: u64,

    /// Entries skipped by policy or because of a per-entry I/O error.
    pub entries_skipped: usize,

    /// Wall time of the extraction.
    #[serde(skip)]
    pub duration: Duration,
}

impl ExtractionReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files plus directories created.
    #[must_use]
    pub const fn total_items(&self) -> usize {
        self.files_extracted + self.directories_created
    }
}

/// Everything a worker learned about one successful target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// The processed target.
    pub target: Target,

    /// Regular files in the extracted repository, when counted.
    pub file_count: Option<u64>,

    /// Extraction statistics.
    pub extraction: ExtractionReport,

    /// Scanner findings, unless scanning is disabled.
    pub scan: Option<ScanResult>,

    /// Wall time spent on the target.
    pub duration: Duration,
}

impl TargetReport {
    /// Number of findings, zero when the target was not scanned.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.scan.as_ref().map_or(0, ScanResult::hits)
    }
}

/// Receives per-target outcomes as workers finish them.
///
/// Called concurrently from every worker thread; implementations must
/// serialize their own output.
///
/// # Examples
///
/// ```
/// use reposweep_core::Target;
/// use reposweep_core::TargetError;
/// use reposweep_core::report::Reporter;
/// use reposweep_core::report::TargetReport;
///
/// struct Quiet;
///
/// impl Reporter for Quiet {
///     fn target_succeeded(&self, report: &TargetReport) {
///         println!("{} ({} hits)", report.target, report.hits());
///     }
///
///     fn target_not_found(&self, target: &Target) {
///         println!("[404] {target}");
///     }
///
///     fn target_failed(&self, target: &Target, error: &TargetError) {
///         eprintln!("{target}: {error}");
///     }
/// }
/// ```
pub trait Reporter: Send + Sync {
    /// A target was fetched, extracted and (optionally) scanned.
    fn target_succeeded(&self, report: &TargetReport);

    /// The repository host answered 404.
    fn target_not_found(&self, target: &Target);

    /// The target was abandoned. Not called for silent outcomes
    /// (422 responses and filtered targets).
    fn target_failed(&self, target: &Target, error: &TargetError);
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn target_succeeded(&self, _report: &TargetReport) {}

    fn target_not_found(&self, _target: &Target) {}

    fn target_failed(&self, _target: &Target, _error: &TargetError) {}
}

/// Routes one target outcome to the matching [`Reporter`] method.
pub fn dispatch<R: Reporter + ?Sized>(
    reporter: &R,
    target: &Target,
    outcome: &Result<TargetReport, TargetError>,
) {
    match outcome {
        Ok(report) => reporter.target_succeeded(report),
        Err(e) if e.is_not_found() => reporter.target_not_found(target),
        Err(e) if e.is_silent() => {}
        Err(e) => reporter.target_failed(target, e),
    }
}

/// Totals for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Targets a worker finished, whatever the outcome.
    pub completed: usize,

    /// Targets that succeeded.
    pub succeeded: usize,

    /// Targets answered with 404.
    pub not_found: usize,

    /// Targets abandoned with a reported error.
    pub failed: usize,

    /// Targets dropped silently (422 or filtered).
    pub silent: usize,

    /// Total findings across succeeded targets.
    pub hits: usize,

    /// Whether the run ended because of a stop request.
    pub interrupted: bool,

    /// Wall time of the run.
    #[serde(skip)]
    pub duration: Duration,
}

impl RunSummary {
    /// Creates an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one target outcome.
    pub fn record(&mut self, outcome: &Result<TargetReport, TargetError>) {
        self.completed += 1;
        match outcome {
            Ok(report) => {
                self.succeeded += 1;
                self.hits += report.hits();
            }
            Err(e) if e.is_not_found() => self.not_found += 1,
            Err(e) if e.is_silent() => self.silent += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Adds another summary's counters to this one.
    pub fn merge(&mut self, other: &Self) {
        self.completed += other.completed;
        self.succeeded += other.succeeded;
        self.not_found += other.not_found;
        self.failed += other.failed;
        self.silent += other.silent;
        self.hits += other.hits;
        self.interrupted |= other.interrupted;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::Mutex;

    fn target() -> Target {
        "github.com/owner/repo".parse().unwrap()
    }

    fn success() -> TargetReport {
        TargetReport {
            target: target(),
            file_count: Some(3),
            extraction: ExtractionReport::new(),
            scan: None,
            duration: Duration::ZERO,
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<&'static str>>);

    impl Reporter for Recording {
        fn target_succeeded(&self, _report: &TargetReport) {
            self.0.lock().unwrap().push("ok");
        }

        fn target_not_found(&self, _target: &Target) {
            self.0.lock().unwrap().push("404");
        }

        fn target_failed(&self, _target: &Target, _error: &TargetError) {
            self.0.lock().unwrap().push("err");
        }
    }

    #[test]
    fn test_total_items() {
        let report = ExtractionReport {
            files_extracted: 10,
            directories_created: 5,
            ..Default::default()
        };
        assert_eq!(report.total_items(), 15);
    }

    #[test]
    fn test_dispatch_routes_outcomes() {
        let reporter = Recording::default();
        let outcomes: Vec<Result<TargetReport, TargetError>> = vec![
            Ok(success()),
            Err(FetchError::NotFound.into()),
            Err(FetchError::Unprocessable.into()),
            Err(TargetError::Filtered {
                reason: "files".into(),
            }),
            Err(FetchError::Transport("reset".into()).into()),
        ];
        for outcome in &outcomes {
            dispatch(&reporter, &target(), outcome);
        }
        assert_eq!(*reporter.0.lock().unwrap(), ["ok", "404", "err"]);
    }

    #[test]
    fn test_summary_record_and_merge() {
        let mut a = RunSummary::new();
        a.record(&Ok(success()));
        a.record(&Err(FetchError::NotFound.into()));

        let mut b = RunSummary::new();
        b.record(&Err(FetchError::Unprocessable.into()));
        b.record(&Err(FetchError::Transport("x".into()).into()));
        b.interrupted = true;

        a.merge(&b);
        assert_eq!(a.completed, 4);
        assert_eq!(a.succeeded, 1);
        assert_eq!(a.not_found, 1);
        assert_eq!(a.silent, 1);
        assert_eq!(a.failed, 1);
        assert!(a.interrupted);
    }
}
