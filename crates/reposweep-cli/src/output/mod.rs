//! Output reporting module.

mod human;
mod json;

use reposweep_core::report::Reporter;
use reposweep_core::report::RunSummary;
use serde::Serialize;
use std::sync::Arc;

pub use human::HumanReporter;
pub use json::JsonReporter;

/// A [`Reporter`] that also renders the end-of-run summary.
pub trait OutputReporter: Reporter {
    /// Writes the run summary.
    fn finish(&self, summary: &RunSummary);
}

/// Creates an output reporter based on CLI flags
pub fn create_reporter(json: bool, show_files: bool) -> Arc<dyn OutputReporter> {
    if json {
        Arc::new(JsonReporter::stdout())
    } else {
        Arc::new(HumanReporter::new(show_files))
    }
}

/// Generic JSON line structure
#[derive(Debug, Serialize)]
pub struct JsonLine<'a, T> {
    pub target: &'a str,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    NotFound,
    Error,
}
