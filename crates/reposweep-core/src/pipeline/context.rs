//! Shared state of one pipeline run.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use log::debug;

use crate::cancel::ChildRegistry;
use crate::cancel::StopSignal;

/// What a worker is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting on the work queue.
    Idle = 0,
    /// Downloading an archive.
    Fetching = 1,
    /// Writing archive entries to disk.
    Extracting = 2,
    /// Waiting on the scanner.
    Scanning = 3,
    /// Exited its loop; terminal.
    Stopped = 4,
}

impl WorkerState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Fetching,
            2 => Self::Extracting,
            3 => Self::Scanning,
            4 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Scanning => "scanning",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Context shared by the producer and every worker of one run.
///
/// Built explicitly per run, so independent pipelines can coexist in one
/// process.
#[derive(Debug)]
pub struct PipelineContext {
    stop: Arc<StopSignal>,
    children: Arc<ChildRegistry>,
    completed: AtomicUsize,
    states: Vec<AtomicU8>,
}

impl PipelineContext {
    /// Creates a context for `workers` workers with a fresh stop signal and
    /// child registry.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        Self::with_signals(
            workers,
            Arc::new(StopSignal::new()),
            Arc::new(ChildRegistry::new()),
        )
    }

    /// Creates a context around an existing stop signal and child registry,
    /// typically the ones an interrupt handler drives.
    #[must_use]
    pub fn with_signals(
        workers: usize,
        stop: Arc<StopSignal>,
        children: Arc<ChildRegistry>,
    ) -> Self {
        Self {
            stop,
            children,
            completed: AtomicUsize::new(0),
            states: (0..workers)
                .map(|_| AtomicU8::new(WorkerState::Idle as u8))
                .collect(),
        }
    }

    /// Number of worker slots.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.states.len()
    }

    /// The run's stop broadcast.
    #[must_use]
    pub const fn stop(&self) -> &Arc<StopSignal> {
        &self.stop
    }

    /// Registry of running scanner process groups.
    #[must_use]
    pub const fn children(&self) -> &Arc<ChildRegistry> {
        &self.children
    }

    /// Returns `true` once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Targets finished so far, whatever their outcome.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current state of worker `index`, if it exists.
    #[must_use]
    pub fn worker_state(&self, index: usize) -> Option<WorkerState> {
        self.states
            .get(index)
            .map(|state| WorkerState::from_u8(state.load(Ordering::Relaxed)))
    }

    /// Handle through which worker `index` publishes its state.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`worker_count`](Self::worker_count).
    #[must_use]
    pub fn slot(&self, index: usize) -> WorkerSlot<'_> {
        assert!(index < self.states.len(), "worker index out of range");
        WorkerSlot {
            context: self,
            index,
        }
    }
}

/// One worker's view of the [`PipelineContext`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerSlot<'a> {
    context: &'a PipelineContext,
    index: usize,
}

impl WorkerSlot<'_> {
    /// Worker index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Publishes a state transition.
    pub fn enter(&self, state: WorkerState) {
        let previous = self.context.states[self.index].swap(state as u8, Ordering::Relaxed);
        if previous != state as u8 {
            debug!(
                "worker {}: {} -> {state}",
                self.index,
                WorkerState::from_u8(previous)
            );
        }
    }

    /// Last published state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.context.states[self.index].load(Ordering::Relaxed))
    }

    /// Returns `true` once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.context.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_track_state() {
        let context = PipelineContext::new(2);
        let slot = context.slot(1);
        assert_eq!(slot.state(), WorkerState::Idle);

        slot.enter(WorkerState::Fetching);
        slot.enter(WorkerState::Extracting);
        assert_eq!(context.worker_state(1), Some(WorkerState::Extracting));
        assert_eq!(context.worker_state(0), Some(WorkerState::Idle));
        assert_eq!(context.worker_state(2), None);
    }

    #[test]
    fn test_contexts_are_independent() {
        let a = PipelineContext::new(1);
        let b = PipelineContext::new(1);
        a.stop().trigger();
        a.mark_completed();

        assert!(a.is_stopped());
        assert!(!b.is_stopped());
        assert_eq!(a.completed(), 1);
        assert_eq!(b.completed(), 0);
    }

    #[test]
    #[should_panic(expected = "worker index out of range")]
    fn test_slot_out_of_range() {
        let _ = PipelineContext::new(1).slot(1);
    }
}
