//! JSON lines output for machine-readable results.

use std::collections::BTreeMap;
use std::io;
use std::io::Write;
use std::sync::Mutex;
use std::sync::PoisonError;

use log::warn;
use reposweep_core::ExtractionReport;
use reposweep_core::RunSummary;
use reposweep_core::Target;
use reposweep_core::TargetError;
use reposweep_core::report::Reporter;
use reposweep_core::report::TargetReport;
use serde::Serialize;

use super::JsonLine;
use super::OutputReporter;
use super::Status;

/// Writes one JSON object per target, then one for the summary.
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn output<T: Serialize>(&self, value: &T) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *out, value)
            .map_err(io::Error::other)
            .and_then(|()| writeln!(out));
        if let Err(e) = written {
            warn!("could not write output: {e}");
        }
    }
}

#[derive(Serialize)]
struct SuccessData<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<u64>,
    extraction: &'a ExtractionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    hits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
    duration_ms: u128,
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn target_succeeded(&self, report: &TargetReport) {
        let scan = report.scan.as_ref();
        let data = SuccessData {
            files: report.file_count,
            extraction: &report.extraction,
            hits: scan.map(reposweep_core::scan::ScanResult::hits),
            severity: scan.map(reposweep_core::scan::ScanResult::severity_counts),
            report: scan
                .and_then(|s| s.report_path.as_ref())
                .map(|p| p.display().to_string()),
            duration_ms: report.duration.as_millis(),
        };
        self.output(&JsonLine {
            target: report.target.url(),
            status: Status::Success,
            data: Some(data),
            error: None,
        });
    }

    fn target_not_found(&self, target: &Target) {
        self.output(&JsonLine::<()> {
            target: target.url(),
            status: Status::NotFound,
            data: None,
            error: None,
        });
    }

    fn target_failed(&self, target: &Target, err: &TargetError) {
        self.output(&JsonLine::<()> {
            target: target.url(),
            status: Status::Error,
            data: None,
            error: Some(err.to_string()),
        });
    }
}

impl<W: Write + Send> OutputReporter for JsonReporter<W> {
    fn finish(&self, summary: &RunSummary) {
        #[derive(Serialize)]
        struct SummaryLine<'a> {
            summary: &'a RunSummary,
            duration_ms: u128,
        }

        self.output(&SummaryLine {
            summary,
            duration_ms: summary.duration.as_millis(),
        });
    }
}
