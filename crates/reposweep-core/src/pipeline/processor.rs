//! Fetch, extract and scan of a single target.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use log::warn;
use walkdir::WalkDir;

use crate::cancel::ChildRegistry;
use crate::config::ExtractionLimits;
use crate::config::RunOptions;
use crate::config::SweepConfig;
use crate::error::PolicyViolation;
use crate::error::TargetError;
use crate::extraction::ExtractionEngine;
use crate::fetch::ArchiveFetcher;
use crate::fetch::HttpFetcher;
use crate::pipeline::context::WorkerSlot;
use crate::pipeline::context::WorkerState;
use crate::report::TargetReport;
use crate::scan::CommandScanner;
use crate::scan::ScanResult;
use crate::scan::Scanner;
use crate::security::resolve_entry_path;
use crate::types::DestRoot;
use crate::types::Target;

/// Name of the findings report directory under the output root.
pub const REPORTS_DIR: &str = "reports";

/// Work done for one dequeued target.
pub trait TargetProcessor: Send + Sync {
    /// Processes `target`, publishing progress through `slot`.
    ///
    /// # Errors
    ///
    /// Returns the reason the target was abandoned.
    fn process(&self, target: &Target, slot: &WorkerSlot<'_>) -> Result<TargetReport, TargetError>;
}

/// The standard per-target pipeline: fetch, extract, count, scan, report.
pub struct SweepPipeline {
    fetcher: Box<dyn ArchiveFetcher>,
    scanner: Option<Box<dyn Scanner>>,
    engine: ExtractionEngine,
    output_root: DestRoot,
    reports_dir: PathBuf,
    options: RunOptions,
}

impl std::fmt::Debug for SweepPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweepPipeline")
            .field("scanner", &self.scanner.is_some())
            .field("engine", &self.engine)
            .field("output_root", &self.output_root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SweepPipeline {
    /// Creates a pipeline writing under `output_root` with scanning
    /// disabled and default limits.
    #[must_use]
    pub fn new(fetcher: Box<dyn ArchiveFetcher>, output_root: DestRoot) -> Self {
        let reports_dir = output_root.as_path().join(REPORTS_DIR);
        Self {
            fetcher,
            scanner: None,
            engine: ExtractionEngine::default(),
            output_root,
            reports_dir,
            options: RunOptions::default(),
        }
    }

    /// Builds the pipeline described by `config`.
    ///
    /// Downloads go through an [`HttpFetcher`]; scanning uses a
    /// [`CommandScanner`] registered with `children` when
    /// `config.scanner` is set.
    #[must_use]
    pub fn from_config(config: &SweepConfig, output_root: DestRoot, children: Arc<ChildRegistry>) -> Self {
        let fetcher = HttpFetcher::new()
            .with_mirror(config.mirror.clone())
            .with_max_bytes(config.max_archive_bytes);

        let mut pipeline = Self::new(Box::new(fetcher), output_root)
            .with_limits(config.limits)
            .with_options(config.options.clone());
        if let Some(scanner) = &config.scanner {
            pipeline = pipeline.with_scanner(Box::new(CommandScanner::new(scanner.clone(), children)));
        }
        pipeline
    }

    /// Enables scanning with `scanner`.
    #[must_use]
    pub fn with_scanner(mut self, scanner: Box<dyn Scanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Sets the extraction ceilings.
    #[must_use]
    pub const fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.engine = ExtractionEngine::new(limits);
        self
    }

    /// Sets branch, retention and filtering options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Root under which per-target directories are created.
    #[must_use]
    pub const fn output_root(&self) -> &DestRoot {
        &self.output_root
    }

    /// Directory receiving findings reports.
    #[must_use]
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Path of the per-target directory, checked against the output root.
    fn destination(&self, target: &Target) -> Result<PathBuf, TargetError> {
        let name = target.dir_name();
        match resolve_entry_path(&name, &self.output_root, 1) {
            Ok(path) => Ok(path),
            Err(PolicyViolation::AlreadyExists { path }) => Err(TargetError::DestinationExists { path }),
            Err(violation) => {
                debug!("{target}: {violation}");
                Err(TargetError::DestinationEscape {
                    path: self.output_root.as_path().join(name),
                })
            }
        }
    }
}

impl TargetProcessor for SweepPipeline {
    fn process(&self, target: &Target, slot: &WorkerSlot<'_>) -> Result<TargetReport, TargetError> {
        let start = Instant::now();
        let branch = self.options.branch.as_deref();
        let destination = self.destination(target)?;

        slot.enter(WorkerState::Fetching);
        let bytes = self.fetcher.fetch(target, branch)?;

        let workdir = WorkDir::create(destination, self.options.save_repo)?;
        let root = DestRoot::new(workdir.path())?;

        slot.enter(WorkerState::Extracting);
        let extraction = self.engine.extract(&bytes, &root)?;
        drop(bytes);

        let file_count = self
            .options
            .needs_file_count()
            .then(|| count_files(root.as_path()));
        if let (Some(filter), Some(count)) = (self.options.file_filter, file_count)
            && !filter.contains(count)
        {
            return Err(TargetError::Filtered {
                reason: format!("{count} files outside {filter}"),
            });
        }

        let scan = match &self.scanner {
            Some(scanner) => {
                slot.enter(WorkerState::Scanning);
                let output = scanner.invoke(root.as_path(), self.output_root.as_path())?;
                let mut result = ScanResult::from_output(
                    output,
                    target,
                    branch,
                    root.as_path(),
                    self.options.github1s,
                );
                result.write_report(target, &self.reports_dir)?;
                Some(result)
            }
            None => None,
        };

        Ok(TargetReport {
            target: target.clone(),
            file_count,
            extraction,
            scan,
            duration: start.elapsed(),
        })
    }
}

/// Per-target directory, removed on drop unless kept.
#[derive(Debug)]
struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    fn create(path: PathBuf, keep: bool) -> Result<Self, TargetError> {
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        match builder.create(&path) {
            Ok(()) => Ok(Self { path, keep }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(TargetError::DestinationExists { path })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("could not remove {}: {e}", self.path.display());
        }
    }
}

/// Regular files under `root`, symlinks not followed.
#[must_use]
pub fn count_files(root: &Path) -> u64 {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::RangeFilter;
    use crate::error::FetchError;
    use crate::error::ScanError;
    use crate::pipeline::context::PipelineContext;
    use crate::scan::ScanOutput;
    use crate::test_utils::ZipTestBuilder;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StaticFetcher(Result<Vec<u8>, FetchError>);

    impl ArchiveFetcher for StaticFetcher {
        fn fetch(&self, _target: &Target, _branch: Option<&str>) -> Result<Vec<u8>, FetchError> {
            self.0.clone()
        }
    }

    /// Records the scanned directory and its file listing.
    #[derive(Default)]
    struct RecordingScanner {
        seen: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl Scanner for RecordingScanner {
        fn invoke(&self, source: &Path, _output_dir: &Path) -> Result<ScanOutput, ScanError> {
            let has_readme = source.join("repo-main/README.md").is_file();
            self.seen.lock().unwrap().push((source.to_path_buf(), has_readme));
            let json = format!(
                r#"{{"results":[{{"check_id":"rule","path":"{}/repo-main/README.md","start":{{"line":1}},"end":{{"line":1}},"extra":{{"metadata":{{"impact":"HIGH"}}}}}}]}}"#,
                source.display()
            );
            Ok(serde_json::from_str(&json)?)
        }
    }

    impl Scanner for Arc<RecordingScanner> {
        fn invoke(&self, source: &Path, output_dir: &Path) -> Result<ScanOutput, ScanError> {
            (**self).invoke(source, output_dir)
        }
    }

    fn repo_zip() -> Vec<u8> {
        ZipTestBuilder::new()
            .add_directory("repo-main/")
            .add_file("repo-main/README.md", b"# hi")
            .add_file("repo-main/src/lib.rs", b"fn main() {}")
            .build()
    }

    fn target() -> Target {
        "github.com/owner/repo".parse().unwrap()
    }

    fn setup(fetch: Result<Vec<u8>, FetchError>) -> (TempDir, SweepPipeline) {
        let temp = TempDir::new().unwrap();
        let root = DestRoot::new(temp.path()).unwrap();
        (temp, SweepPipeline::new(Box::new(StaticFetcher(fetch)), root))
    }

    fn run(pipeline: &SweepPipeline) -> Result<TargetReport, TargetError> {
        let context = PipelineContext::new(1);
        pipeline.process(&target(), &context.slot(0))
    }

    #[test]
    fn test_process_removes_workdir_by_default() {
        let (temp, pipeline) = setup(Ok(repo_zip()));
        let report = run(&pipeline).unwrap();

        assert_eq!(report.extraction.files_extracted, 2);
        assert_eq!(report.file_count, None);
        assert!(report.scan.is_none());
        assert!(!temp.path().join("owner-repo").exists());
    }

    #[test]
    fn test_process_keeps_workdir_when_saving() {
        let (temp, pipeline) = setup(Ok(repo_zip()));
        let pipeline = pipeline.with_options(RunOptions {
            save_repo: true,
            count_files: true,
            ..Default::default()
        });

        let report = run(&pipeline).unwrap();
        assert_eq!(report.file_count, Some(2));
        assert!(temp.path().join("owner-repo/repo-main/README.md").is_file());
    }

    #[test]
    fn test_process_not_found_creates_nothing() {
        let (temp, pipeline) = setup(Err(FetchError::NotFound));
        let err = run(&pipeline).unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_process_existing_destination() {
        let (temp, pipeline) = setup(Ok(repo_zip()));
        fs::create_dir(temp.path().join("owner-repo")).unwrap();
        fs::write(temp.path().join("owner-repo/keep.txt"), b"keep").unwrap();

        let err = run(&pipeline).unwrap_err();
        assert!(matches!(err, TargetError::DestinationExists { .. }));
        assert_eq!(
            fs::read(temp.path().join("owner-repo/keep.txt")).unwrap(),
            b"keep"
        );
    }

    #[test]
    fn test_process_filtered() {
        let (_temp, pipeline) = setup(Ok(repo_zip()));
        let pipeline = pipeline.with_options(RunOptions {
            file_filter: Some("5-".parse::<RangeFilter>().unwrap()),
            ..Default::default()
        });

        let err = run(&pipeline).unwrap_err();
        assert!(err.is_silent());
        assert!(err.to_string().contains("2 files outside 5-"));
    }

    #[test]
    fn test_process_invalid_archive_abandons_target() {
        let (temp, pipeline) = setup(Ok(b"not a zip".to_vec()));
        let err = run(&pipeline).unwrap_err();

        assert!(matches!(err, TargetError::Extraction(_)));
        assert!(!temp.path().join("owner-repo").exists());
    }

    #[test]
    fn test_process_scans_and_writes_report() {
        let (temp, pipeline) = setup(Ok(repo_zip()));
        let scanner = Arc::new(RecordingScanner::default());
        let pipeline = pipeline.with_scanner(Box::new(Arc::clone(&scanner)));

        let report = run(&pipeline).unwrap();
        let scan = report.scan.unwrap();
        assert_eq!(scan.hits(), 1);
        assert_eq!(scan.findings[0].path, "README.md");
        assert_eq!(
            scan.report_path.as_deref(),
            Some(temp.path().canonicalize().unwrap().join("reports/owner-repo.json").as_path())
        );

        let seen = scanner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1, "scanner ran before extraction finished");
        assert!(!temp.path().join("owner-repo").exists());
    }

    #[test]
    fn test_count_files_ignores_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/one"), b"1").unwrap();
        fs::write(temp.path().join("a/b/two"), b"2").unwrap();
        assert_eq!(count_files(temp.path()), 2);
    }
}
