//! Scanner output parsing and findings reports.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ScanError;
use crate::types::Target;

/// Raw JSON document written by the scanner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanOutput {
    /// One record per match.
    #[serde(default)]
    pub results: Vec<RawResult>,
}

/// One raw scanner match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResult {
    /// Rule identifier.
    #[serde(default)]
    pub check_id: String,
    /// Path of the matched file as the scanner saw it.
    #[serde(default)]
    pub path: String,
    /// First matched position.
    #[serde(default)]
    pub start: RawPosition,
    /// Last matched position.
    #[serde(default)]
    pub end: RawPosition,
    /// Message, code and metadata.
    #[serde(default)]
    pub extra: RawExtra,
}

/// Position inside a matched file.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawPosition {
    /// 1-based line number.
    #[serde(default)]
    pub line: u64,
}

/// Additional match details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtra {
    /// Matched source lines.
    #[serde(default)]
    pub lines: String,
    /// Rule message.
    #[serde(default)]
    pub message: String,
    /// Rule metadata.
    #[serde(default)]
    pub metadata: RawMetadata,
}

/// Rule metadata the report uses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    /// Impact rating, usually `HIGH`, `MEDIUM` or `LOW`.
    #[serde(default)]
    pub impact: String,
}

/// A normalized finding tied to a browsable location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Rule identifier.
    pub rule_id: String,
    /// Impact rating.
    pub severity: String,
    /// Rule message.
    pub message: String,
    /// Matched source lines.
    pub code: String,
    /// First matched line.
    pub start_line: u64,
    /// Last matched line.
    pub end_line: u64,
    /// Path relative to the repository root.
    pub path: String,
    /// Link to the lines on the repository host.
    pub link: String,
}

/// Parsed scanner results for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Findings sorted by severity, then rule id.
    pub findings: Vec<Finding>,
    /// Written findings report, once generated.
    pub report_path: Option<PathBuf>,
}

impl ScanResult {
    /// Normalizes raw scanner output for `target`.
    ///
    /// `source` is the directory the scanner ran on. Archive downloads wrap
    /// the repository in one top-level folder, which is dropped from
    /// finding paths. With `github1s`, links point at `github1s.com`.
    #[must_use]
    pub fn from_output(
        output: ScanOutput,
        target: &Target,
        branch: Option<&str>,
        source: &Path,
        github1s: bool,
    ) -> Self {
        let reference = branch.unwrap_or("HEAD");
        let base = link_base(target, github1s);
        let mut findings: Vec<Finding> = output
            .results
            .into_iter()
            .map(|result| {
                let path = repository_relative_path(&result.path, source);
                let link = format!(
                    "{base}/blob/{reference}/{path}#L{}-L{}",
                    result.start.line,
                    result.end.line
                );
                Finding {
                    rule_id: result.check_id,
                    severity: result.extra.metadata.impact,
                    message: result.extra.message,
                    code: result.extra.lines,
                    start_line: result.start.line,
                    end_line: result.end.line,
                    path,
                    link,
                }
            })
            .collect();

        sort_findings(&mut findings);
        Self {
            findings,
            report_path: None,
        }
    }

    /// Number of findings.
    #[must_use]
    pub fn hits(&self) -> usize {
        self.findings.len()
    }

    /// Findings per severity label.
    #[must_use]
    pub fn severity_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.severity.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Writes the findings report for `target` into `reports_dir` and
    /// records its path.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Report`] if the report cannot be written.
    pub fn write_report(&mut self, target: &Target, reports_dir: &Path) -> Result<&Path, ScanError> {
        let path = reports_dir.join(format!("{}.json", target.dir_name()));
        let wrap = |source| ScanError::Report {
            path: path.clone(),
            source,
        };

        let report = FindingsReport::new(target, &self.findings);
        let json = serde_json::to_vec_pretty(&report).map_err(|e| wrap(io::Error::other(e)))?;

        fs::create_dir_all(reports_dir).map_err(wrap)?;
        let mut file = fs::File::create(&path).map_err(wrap)?;
        file.write_all(&json).map_err(wrap)?;
        file.write_all(b"\n").map_err(wrap)?;

        Ok(self.report_path.insert(path).as_path())
    }
}

/// Serialized form of a findings report.
#[derive(Debug, Serialize)]
struct FindingsReport<'a> {
    target: &'a str,
    total: usize,
    severity_stats: BTreeMap<&'a str, usize>,
    rule_stats: Vec<RuleCount<'a>>,
    findings: &'a [Finding],
}

#[derive(Debug, Serialize)]
struct RuleCount<'a> {
    rule_id: &'a str,
    count: usize,
}

impl<'a> FindingsReport<'a> {
    fn new(target: &'a Target, findings: &'a [Finding]) -> Self {
        let mut severity_stats = BTreeMap::new();
        let mut rule_stats: Vec<RuleCount<'a>> = Vec::new();

        for finding in findings {
            *severity_stats.entry(finding.severity.as_str()).or_insert(0) += 1;
            match rule_stats.iter_mut().find(|r| r.rule_id == finding.rule_id) {
                Some(rule) => rule.count += 1,
                None => rule_stats.push(RuleCount {
                    rule_id: &finding.rule_id,
                    count: 1,
                }),
            }
        }

        Self {
            target: target.url(),
            total: findings.len(),
            severity_stats,
            rule_stats,
            findings,
        }
    }
}

/// Rank of a severity label; unknown labels sort last.
#[must_use]
pub fn severity_rank(severity: &str) -> u8 {
    match severity.to_ascii_uppercase().as_str() {
        "HIGH" => 0,
        "MEDIUM" => 1,
        "LOW" => 2,
        _ => 3,
    }
}

/// Sorts findings by severity rank, then rule id. Stable.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        match severity_rank(&a.severity).cmp(&severity_rank(&b.severity)) {
            Ordering::Equal => a.rule_id.cmp(&b.rule_id),
            other => other,
        }
    });
}

fn link_base(target: &Target, github1s: bool) -> String {
    if github1s {
        target.url().replacen("github.com/", "github1s.com/", 1)
    } else {
        target.url().to_string()
    }
}

/// Path of `raw` inside the repository.
///
/// Under `source` the archive's top-level folder is dropped; any other path
/// is kept whole.
fn repository_relative_path(raw: &str, source: &Path) -> String {
    let raw_path = Path::new(raw);
    let (relative, wrapper) = match raw_path.strip_prefix(source) {
        Ok(stripped) => (stripped, 1),
        Err(_) => (raw_path, 0),
    };
    relative
        .iter()
        .skip(wrapper)
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
