//! Per-run configuration records.
//!
//! Everything a run needs is passed by value through these types; no
//! component reads ambient flags.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::fetch::DEFAULT_MAX_ARCHIVE_BYTES;

/// Flags handed to the scanner when no config file provides any.
pub const DEFAULT_SCANNER_FLAGS: &[&str] = &["--config", "auto"];

/// Name of the scanner config file looked up next to the output root.
pub const SCANNER_CONFIG_FILE: &str = "reposweep.conf";

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 3;

/// Queue slots allotted per worker.
pub const QUEUE_SLOTS_PER_WORKER: usize = 20;

/// Hard ceilings applied to every archive extraction.
///
/// These are decompression-bomb defenses: they are checked against the
/// archive's declared sizes before data is written.
///
/// # Examples
///
/// ```
/// use reposweep_core::ExtractionLimits;
///
/// let limits = ExtractionLimits::default();
/// assert_eq!(limits.max_entries, 500_000);
///
/// let tight = ExtractionLimits {
///     max_total_size: 1024 * 1024,
///     ..Default::default()
/// };
/// assert_eq!(tight.max_depth, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLimits {
    /// Maximum number of entries an archive may declare.
    pub max_entries: usize,

    /// Maximum cumulative declared uncompressed size in bytes.
    pub max_total_size: u64,

    /// Maximum number of path segments in an entry name.
    pub max_depth: usize,
}

impl Default for ExtractionLimits {
    /// Default values:
    /// - `max_entries`: 500,000
    /// - `max_total_size`: 60 GiB
    /// - `max_depth`: 100
    fn default() -> Self {
        Self {
            max_entries: 500_000,
            max_total_size: 60 * 1024 * 1024 * 1024,
            max_depth: 100,
        }
    }
}

/// How to launch the external analysis tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Scanner executable.
    pub binary: PathBuf,

    /// Opaque flags passed through to the scanner.
    pub extra_flags: Vec<String>,

    /// Directory appended to the child's `PATH`, if any.
    pub extra_path: Option<PathBuf>,
}

impl ScannerConfig {
    /// Resolves the scanner binary and its flags.
    ///
    /// The binary is `binary` when given, otherwise `~/.local/bin/semgrep`
    /// when that file exists, otherwise `semgrep` looked up on `PATH`.
    /// Flags come from the `FLAGS=` line of `config_path` (or
    /// [`SCANNER_CONFIG_FILE`] next to `output_dir`); a missing file yields
    /// [`DEFAULT_SCANNER_FLAGS`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read.
    pub fn resolve(
        binary: Option<PathBuf>,
        config_path: Option<&Path>,
        output_dir: &Path,
        home: &Path,
    ) -> Result<Self, ConfigError> {
        let local_bin = home.join(".local").join("bin");
        let binary = binary.unwrap_or_else(|| {
            let candidate = local_bin.join("semgrep");
            if candidate.is_file() {
                candidate
            } else {
                PathBuf::from("semgrep")
            }
        });

        let config_path = config_path.map_or_else(
            || {
                output_dir
                    .parent()
                    .unwrap_or(output_dir)
                    .join(SCANNER_CONFIG_FILE)
            },
            Path::to_path_buf,
        );

        Ok(Self {
            binary,
            extra_flags: load_scanner_flags(&config_path)?,
            extra_path: Some(local_bin),
        })
    }
}

/// Reads scanner flags from a config file.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn load_scanner_flags(path: &Path) -> Result<Vec<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_scanner_flags(&contents).unwrap_or_else(default_flags)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(default_flags()),
        Err(source) => Err(ConfigError::ScannerConfig {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Extracts the flags from the first `FLAGS=` line, if any.
#[must_use]
pub fn parse_scanner_flags(contents: &str) -> Option<Vec<String>> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("FLAGS="))
        .map(|flags| flags.split_whitespace().map(str::to_string).collect())
}

fn default_flags() -> Vec<String> {
    DEFAULT_SCANNER_FLAGS.iter().map(|s| (*s).to_string()).collect()
}

/// Inclusive numeric range used to filter targets.
///
/// Accepted forms: `3000`, `500-700`, `500-` (at least), `-300` (at most).
/// Values may carry a `k` suffix (`1.5k` is 1500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeFilter {
    min: u64,
    max: Option<u64>,
}

impl RangeFilter {
    /// Returns `true` if `value` lies inside the range.
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        value >= self.min && self.max.is_none_or(|max| value <= max)
    }
}

impl std::fmt::Display for RangeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{max}"),
            Some(max) => write!(f, "{}-{max}", self.min),
            None => write!(f, "{}-", self.min),
        }
    }
}

impl FromStr for RangeFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidFilter(s.to_string());
        let trimmed = s.trim();

        let (min, max) = match trimmed.split_once('-') {
            None => {
                let value = parse_count(trimmed).ok_or_else(invalid)?;
                (value, Some(value))
            }
            Some(("", "")) => return Err(invalid()),
            Some(("", to)) => (0, Some(parse_count(to).ok_or_else(invalid)?)),
            Some((from, "")) => (parse_count(from).ok_or_else(invalid)?, None),
            Some((from, to)) => (
                parse_count(from).ok_or_else(invalid)?,
                Some(parse_count(to).ok_or_else(invalid)?),
            ),
        };

        if max.is_some_and(|max| max < min) {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_count(s: &str) -> Option<u64> {
    let s = s.trim();
    if let Some(thousands) = s.strip_suffix(['k', 'K']) {
        let value: f64 = thousands.parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        return Some((value * 1000.0).round() as u64);
    }
    s.parse().ok()
}

/// Per-run behavior switches for the target pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Branch to download; `None` means the repository default branch.
    pub branch: Option<String>,

    /// Keep extracted repositories on disk after scanning.
    pub save_repo: bool,

    /// Count regular files in each extracted repository.
    pub count_files: bool,

    /// Only report targets whose file count lies in this range.
    pub file_filter: Option<RangeFilter>,

    /// Build finding links for github1s.com instead of github.com.
    pub github1s: bool,
}

impl RunOptions {
    /// Returns `true` if extracted files need counting.
    #[must_use]
    pub const fn needs_file_count(&self) -> bool {
        self.count_files || self.file_filter.is_some()
    }
}

/// Top-level configuration for one sweep.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Number of concurrent workers.
    pub workers: usize,

    /// Root under which one directory per target is created.
    pub output_dir: PathBuf,

    /// Host replacing `github.com/` in download URLs.
    pub mirror: Option<String>,

    /// Ceilings applied to every extraction.
    pub limits: ExtractionLimits,

    /// Scanner launch settings; `None` disables scanning.
    pub scanner: Option<ScannerConfig>,

    /// Pipeline behavior switches.
    pub options: RunOptions,

    /// Maximum archive download size in bytes.
    pub max_archive_bytes: u64,
}

impl SweepConfig {
    /// Creates a configuration with defaults for everything but the output
    /// directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            output_dir: output_dir.into(),
            mirror: None,
            limits: ExtractionLimits::default(),
            scanner: None,
            options: RunOptions::default(),
            max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        }
    }

    /// Capacity of the bounded work queue.
    #[must_use]
    pub const fn queue_capacity(&self) -> usize {
        queue_capacity(self.workers)
    }

    /// Validates settings that cannot be expressed in the types.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker count is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

/// Normalizes a mirror host for URL rewriting.
///
/// The scheme is dropped and a trailing `/` added, so the result can stand
/// in for `github.com/`.
///
/// # Examples
///
/// ```
/// use reposweep_core::config::normalize_mirror;
///
/// assert_eq!(
///     normalize_mirror("https://abc.example.com/proxy"),
///     "abc.example.com/proxy/"
/// );
/// ```
#[must_use]
pub fn normalize_mirror(host: &str) -> String {
    let host = host.trim();
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    if host.ends_with('/') {
        host.to_string()
    } else {
        format!("{host}/")
    }
}

/// Capacity of the bounded work queue for `workers` workers.
#[must_use]
pub const fn queue_capacity(workers: usize) -> usize {
    workers.saturating_mul(QUEUE_SLOTS_PER_WORKER)
}

/// Resolves the current user's home directory.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .ok_or(ConfigError::HomeDirUnavailable)
}

/// Default output root: `~/reposweep/scans`.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn default_output_dir() -> Result<PathBuf, ConfigError> {
    Ok(home_dir()?.join("reposweep").join("scans"))
}

/// Creates the output root (owner-only permissions) if it is missing.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the path exists
/// but is not a directory.
pub fn prepare_output_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let wrap = |source| ConfigError::OutputDir {
        path: path.to_path_buf(),
        source,
    };

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path).map_err(wrap)?;

    path.canonicalize().map_err(wrap)
}
