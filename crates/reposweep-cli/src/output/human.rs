//! Human-readable output with colors and styling.

use std::sync::Mutex;
use std::sync::PoisonError;

use console::Term;
use console::style;
use log::error;
use log::info;
use reposweep_core::Target;
use reposweep_core::TargetError;
use reposweep_core::report::Reporter;
use reposweep_core::report::RunSummary;
use reposweep_core::report::TargetReport;

use super::OutputReporter;

/// One line per target on stdout; failures go to the log.
pub struct HumanReporter {
    show_files: bool,
    term: Term,
    lock: Mutex<()>,
}

impl HumanReporter {
    pub fn new(show_files: bool) -> Self {
        Self {
            show_files,
            term: Term::stdout(),
            lock: Mutex::new(()),
        }
    }

    fn write_line(&self, line: &str) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self.term.write_line(line);
    }

    pub(crate) fn success_line(&self, report: &TargetReport) -> String {
        let mut line = format!("{} {}", report.target, style("[200]").green());

        if self.show_files
            && let Some(files) = report.file_count
        {
            line.push_str(&format!(" {}", style(format!("[{files} files]")).magenta()));
        }

        if let Some(scan) = &report.scan {
            line.push_str(&format!(" {}", style(format!("[{} hits]", scan.hits())).magenta()));
            if scan.hits() > 0
                && let Some(path) = &scan.report_path
            {
                line.push_str(&format!(" [file://{}]", path.display()));
            }
        }

        line
    }
}

impl Reporter for HumanReporter {
    fn target_succeeded(&self, report: &TargetReport) {
        self.write_line(&self.success_line(report));
    }

    fn target_not_found(&self, target: &Target) {
        self.write_line(&format!("{target} {}", style("[404]").red()));
    }

    fn target_failed(&self, target: &Target, err: &TargetError) {
        error!("could not process {target}: {err}");
    }
}

impl OutputReporter for HumanReporter {
    fn finish(&self, summary: &RunSummary) {
        let status = if summary.interrupted {
            "interrupted"
        } else {
            "done"
        };
        info!(
            "{status}: {} targets in {:.1}s ({} ok, {} not found, {} failed, {} skipped, {} hits)",
            summary.completed,
            summary.duration.as_secs_f64(),
            summary.succeeded,
            summary.not_found,
            summary.failed,
            summary.silent,
            summary.hits
        );
    }
}
