//! Integration tests for the worker pool and cancellation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reposweep_core::DestRoot;
use reposweep_core::FetchError;
use reposweep_core::Target;
use reposweep_core::TargetError;
use reposweep_core::cancel::ChildRegistry;
use reposweep_core::cancel::InterruptAction;
use reposweep_core::cancel::InterruptController;
use reposweep_core::cancel::StopSignal;
use reposweep_core::feed::feed_lines;
use reposweep_core::fetch::ArchiveFetcher;
use reposweep_core::pipeline::PipelineContext;
use reposweep_core::pipeline::SweepPipeline;
use reposweep_core::pipeline::WorkerPool;
use reposweep_core::report::Reporter;
use reposweep_core::report::TargetReport;
use reposweep_core::test_utils::ZipTestBuilder;
use std::fs;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

struct NotFoundFetcher;

impl ArchiveFetcher for NotFoundFetcher {
    fn fetch(&self, _target: &Target, _branch: Option<&str>) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::NotFound)
    }
}

/// Serves the same archive for every target, slowly.
struct SlowFetcher {
    archive: Vec<u8>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ArchiveFetcher for SlowFetcher {
    fn fetch(&self, _target: &Target, _branch: Option<&str>) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        Ok(self.archive.clone())
    }
}

#[derive(Default)]
struct CountingReporter {
    succeeded: AtomicUsize,
    not_found: Mutex<Vec<String>>,
    failed: AtomicUsize,
}

impl Reporter for CountingReporter {
    fn target_succeeded(&self, _report: &TargetReport) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn target_not_found(&self, target: &Target) {
        self.not_found.lock().unwrap().push(target.url().to_string());
    }

    fn target_failed(&self, _target: &Target, _error: &TargetError) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

fn target_lines(count: usize) -> String {
    (0..count)
        .map(|i| format!("github.com/owner/repo-{i}\n"))
        .collect()
}

#[test]
fn test_thousand_not_found_targets() {
    let temp = TempDir::new().unwrap();
    let root = DestRoot::new(temp.path()).unwrap();
    let pipeline = SweepPipeline::new(Box::new(NotFoundFetcher), root);
    let reporter = Arc::new(CountingReporter::default());
    let context = Arc::new(PipelineContext::new(4));

    let input = target_lines(1000);
    let summary = WorkerPool::new(Arc::clone(&context))
        .run(Arc::new(pipeline), Arc::clone(&reporter), move |queue| {
            feed_lines(Cursor::new(input), queue);
        })
        .unwrap();

    assert_eq!(summary.completed, 1000);
    assert_eq!(summary.not_found, 1000);
    assert_eq!(summary.failed, 0);
    assert!(!summary.interrupted);
    assert_eq!(reporter.not_found.lock().unwrap().len(), 1000);
    assert_eq!(reporter.failed.load(Ordering::SeqCst), 0);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_first_interrupt_drains_and_returns() {
    let temp = TempDir::new().unwrap();
    let root = DestRoot::new(temp.path()).unwrap();
    let fetcher = SlowFetcher {
        archive: ZipTestBuilder::new()
            .add_file("repo-main/a.txt", b"a")
            .build(),
        delay: Duration::from_millis(100),
        calls: AtomicUsize::new(0),
    };
    let pipeline = SweepPipeline::new(Box::new(fetcher), root);

    let stop = Arc::new(StopSignal::new());
    let children = Arc::new(ChildRegistry::new());
    let controller = InterruptController::new(Arc::clone(&stop), Arc::clone(&children));
    let context = Arc::new(PipelineContext::with_signals(2, stop, children));
    let reporter = Arc::new(CountingReporter::default());

    let interrupter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        controller.on_interrupt()
    });

    let input = target_lines(500);
    let summary = WorkerPool::new(Arc::clone(&context))
        .run(Arc::new(pipeline), Arc::clone(&reporter), move |queue| {
            feed_lines(Cursor::new(input), queue);
        })
        .unwrap();

    assert_eq!(interrupter.join().unwrap(), InterruptAction::Drain);
    assert!(summary.interrupted);
    // in-flight targets finish, nothing new is dequeued
    assert!((1..=2).contains(&summary.completed), "{}", summary.completed);
    assert_eq!(reporter.succeeded.load(Ordering::SeqCst), summary.completed);
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_second_interrupt_requests_force_exit() {
    let stop = Arc::new(StopSignal::new());
    let controller = InterruptController::new(Arc::clone(&stop), Arc::new(ChildRegistry::new()));

    assert_eq!(controller.on_interrupt(), InterruptAction::Drain);
    assert_eq!(controller.on_interrupt(), InterruptAction::ForceExit);
    assert!(stop.is_stopped());
}

#[test]
fn test_independent_pipelines_in_one_process() {
    let first = Arc::new(PipelineContext::new(2));
    let second = Arc::new(PipelineContext::new(2));
    first.stop().trigger();

    let temp = TempDir::new().unwrap();
    let pipeline = Arc::new(SweepPipeline::new(
        Box::new(NotFoundFetcher),
        DestRoot::new(temp.path()).unwrap(),
    ));

    let stopped = WorkerPool::new(first)
        .run(Arc::clone(&pipeline), Arc::new(CountingReporter::default()), |queue| {
            feed_lines(Cursor::new(target_lines(10)), queue);
        })
        .unwrap();
    let running = WorkerPool::new(second)
        .run(pipeline, Arc::new(CountingReporter::default()), |queue| {
            feed_lines(Cursor::new(target_lines(10)), queue);
        })
        .unwrap();

    assert_eq!(stopped.completed, 0);
    assert!(stopped.interrupted);
    assert_eq!(running.completed, 10);
    assert!(!running.interrupted);
}
