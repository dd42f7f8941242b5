//! Bounded producer/consumer worker pool.

use std::io;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::bounded;
use crossbeam_channel::select;
use log::debug;
use log::error;
use log::info;

use crate::cancel::StopSignal;
use crate::config::queue_capacity;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::context::WorkerState;
use crate::pipeline::processor::TargetProcessor;
use crate::report;
use crate::report::Reporter;
use crate::report::RunSummary;
use crate::types::Target;

/// Sending half of the work queue, handed to the feed.
///
/// Dropping it closes the queue; workers drain what is left and exit.
#[derive(Debug)]
pub struct QueueProducer {
    sender: Sender<Target>,
    stop: Arc<StopSignal>,
    stop_listener: Receiver<()>,
}

impl QueueProducer {
    fn new(sender: Sender<Target>, stop: Arc<StopSignal>) -> Self {
        let stop_listener = stop.listener();
        Self {
            sender,
            stop,
            stop_listener,
        }
    }

    /// Enqueues `target`, waiting for a free slot.
    ///
    /// Returns `false` if the target was not enqueued because a stop was
    /// requested or every worker is gone; the feed should then return.
    pub fn push(&self, target: Target) -> bool {
        if self.stop.is_stopped() {
            return false;
        }
        select! {
            send(self.sender, target) -> sent => sent.is_ok(),
            recv(self.stop_listener) -> _ => false,
        }
    }

    /// Returns `true` once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

/// Fixed-size pool of worker threads pulling from one bounded queue.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use reposweep_core::DestRoot;
/// use reposweep_core::fetch::HttpFetcher;
/// use reposweep_core::pipeline::PipelineContext;
/// use reposweep_core::pipeline::SweepPipeline;
/// use reposweep_core::pipeline::WorkerPool;
/// use reposweep_core::report::NoopReporter;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let context = Arc::new(PipelineContext::new(3));
/// let pipeline = SweepPipeline::new(Box::new(HttpFetcher::new()), DestRoot::new("/tmp/out")?);
/// let summary = WorkerPool::new(context).run(
///     Arc::new(pipeline),
///     Arc::new(NoopReporter),
///     |queue| {
///         queue.push("github.com/owner/repo".parse().unwrap());
///     },
/// )?;
/// println!("{} targets", summary.completed);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WorkerPool {
    context: Arc<PipelineContext>,
    capacity: usize,
}

impl WorkerPool {
    /// Creates a pool with one worker per context slot and a queue of
    /// 20 slots per worker.
    #[must_use]
    pub fn new(context: Arc<PipelineContext>) -> Self {
        let capacity = queue_capacity(context.worker_count()).max(1);
        Self { context, capacity }
    }

    /// Overrides the queue capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Shared context of this pool.
    #[must_use]
    pub const fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    /// Runs `feed` and the workers concurrently until the queue is closed
    /// and drained, or a stop was requested.
    ///
    /// Every worker is joined before this returns. The feed thread is joined
    /// too, unless a stop was requested while it was still running: it may
    /// be blocked reading its input and is left detached.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned. Workers already
    /// started are stopped and joined first.
    pub fn run<P, R, F>(&self, processor: Arc<P>, reporter: Arc<R>, feed: F) -> io::Result<RunSummary>
    where
        P: TargetProcessor + ?Sized + 'static,
        R: Reporter + ?Sized + 'static,
        F: FnOnce(&QueueProducer) + Send + 'static,
    {
        let start = Instant::now();
        let (sender, receiver) = bounded::<Target>(self.capacity);
        let worker_count = self.context.worker_count();
        info!(
            "starting {worker_count} workers (queue capacity {})",
            self.capacity
        );

        let mut workers = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let context = Arc::clone(&self.context);
            let receiver = receiver.clone();
            let processor = Arc::clone(&processor);
            let reporter = Arc::clone(&reporter);
            let spawned = thread::Builder::new()
                .name(format!("reposweep-worker-{index}"))
                .spawn(move || worker_loop(&context, index, &receiver, &*processor, &*reporter));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    self.context.stop().trigger();
                    drop(sender);
                    join_workers(workers);
                    return Err(e);
                }
            }
        }
        drop(receiver);

        let producer = QueueProducer::new(sender, Arc::clone(self.context.stop()));
        let feed_handle = thread::Builder::new()
            .name("reposweep-feed".into())
            .spawn(move || feed(&producer));
        let feed_handle = match feed_handle {
            Ok(handle) => handle,
            Err(e) => {
                // the failed spawn dropped the producer, closing the queue
                join_workers(workers);
                return Err(e);
            }
        };

        let mut summary = join_workers(workers);

        if self.context.is_stopped() && !feed_handle.is_finished() {
            debug!("feed still blocked on input, leaving it detached");
        } else if feed_handle.join().is_err() {
            error!("feed thread panicked");
        }

        summary.interrupted = self.context.is_stopped();
        summary.duration = start.elapsed();
        info!(
            "run finished: {} completed in {:.1}s",
            summary.completed,
            summary.duration.as_secs_f64()
        );
        Ok(summary)
    }
}

fn join_workers(workers: Vec<JoinHandle<RunSummary>>) -> RunSummary {
    let mut total = RunSummary::new();
    for handle in workers {
        match handle.join() {
            Ok(summary) => total.merge(&summary),
            Err(_) => error!("worker thread panicked"),
        }
    }
    total
}

fn worker_loop<P, R>(
    context: &PipelineContext,
    index: usize,
    queue: &Receiver<Target>,
    processor: &P,
    reporter: &R,
) -> RunSummary
where
    P: TargetProcessor + ?Sized,
    R: Reporter + ?Sized,
{
    let slot = context.slot(index);
    let stop = context.stop().listener();
    let mut summary = RunSummary::new();

    loop {
        if context.is_stopped() {
            break;
        }

        let target = select! {
            recv(queue) -> message => match message {
                Ok(target) => target,
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        };

        // select! picks among ready operations at random
        if context.is_stopped() {
            debug!("worker {index}: dropping {target}, stop requested");
            break;
        }

        let outcome = processor.process(&target, &slot);
        slot.enter(WorkerState::Idle);

        report::dispatch(reporter, &target, &outcome);
        summary.record(&outcome);
        context.mark_completed();
    }

    slot.enter(WorkerState::Stopped);
    summary
}
