//! Two-stage cancellation.
//!
//! The first operator interrupt fires a [`StopSignal`] that the queue
//! producer and every worker observe; in-flight targets finish. The second
//! interrupt kills every registered scanner process group and exits the
//! process with status 1.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use crossbeam_channel::bounded;
use log::error;
use log::warn;

/// One-shot stop broadcast.
///
/// Firing drops the only sender of a channel, which disconnects every
/// cloned [`Receiver`] at once; listeners use that in `select!` to stop
/// waiting on the work queue.
///
/// # Examples
///
/// ```
/// use reposweep_core::cancel::StopSignal;
///
/// let stop = StopSignal::new();
/// let listener = stop.listener();
/// assert!(!stop.is_stopped());
///
/// assert!(stop.trigger());
/// assert!(!stop.trigger());
/// assert!(stop.is_stopped());
/// assert!(listener.recv().is_err());
/// ```
#[derive(Debug)]
pub struct StopSignal {
    fired: AtomicBool,
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl StopSignal {
    /// Creates an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = bounded(0);
        Self {
            fired: AtomicBool::new(false),
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Fires the signal. Returns `true` only for the call that fired it.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        lock(&self.sender).take();
        true
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Returns a receiver that becomes ready (disconnected) when the signal
    /// fires. It never yields a message.
    #[must_use]
    pub fn listener(&self) -> Receiver<()> {
        self.receiver.clone()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Process groups of running scanner children.
///
/// Registration is scoped: the returned guard removes the entry when the
/// child has been waited on.
#[derive(Debug, Default)]
pub struct ChildRegistry {
    groups: Mutex<HashSet<u32>>,
}

impl ChildRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the process group led by `pid`.
    pub fn register(&self, pid: u32) -> ChildGuard<'_> {
        lock(&self.groups).insert(pid);
        ChildGuard {
            registry: self,
            pid,
        }
    }

    /// Number of registered process groups.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.groups).len()
    }

    /// Returns `true` if no child is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `SIGKILL` to every registered process group.
    ///
    /// Returns the number of groups signalled successfully.
    pub fn kill_all(&self) -> usize {
        let groups: Vec<u32> = lock(&self.groups).iter().copied().collect();
        groups.into_iter().filter(|&pid| kill_group(pid)).count()
    }
}

/// Removes its process group from the [`ChildRegistry`] on drop.
#[derive(Debug)]
pub struct ChildGuard<'a> {
    registry: &'a ChildRegistry,
    pid: u32,
}

impl Drop for ChildGuard<'_> {
    fn drop(&mut self) {
        lock(&self.registry.groups).remove(&self.pid);
    }
}

#[cfg(unix)]
fn kill_group(pid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pgid <= 0 {
        return false;
    }

    // SAFETY: kill() takes plain integers and has no memory-safety
    // preconditions; a negative pid addresses the whole process group.
    #[allow(unsafe_code)]
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    result == 0
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) -> bool {
    false
}

/// What an interrupt asks the process to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop taking new targets and let in-flight ones finish.
    Drain,
    /// Kill children and exit immediately.
    ForceExit,
}

/// Counts operator interrupts and maps them to actions.
#[derive(Debug)]
pub struct InterruptController {
    count: AtomicUsize,
    stop: Arc<StopSignal>,
    children: Arc<ChildRegistry>,
}

impl InterruptController {
    /// Creates a controller driving `stop` and `children`.
    #[must_use]
    pub fn new(stop: Arc<StopSignal>, children: Arc<ChildRegistry>) -> Self {
        Self {
            count: AtomicUsize::new(0),
            stop,
            children,
        }
    }

    /// Records one interrupt.
    ///
    /// The first fires the stop signal; every later one asks for a forced
    /// exit. Killing and exiting is left to the caller (see
    /// [`force_exit`](Self::force_exit)).
    pub fn on_interrupt(&self) -> InterruptAction {
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            self.stop.trigger();
            warn!("interrupt received, finishing in-flight targets (press Ctrl+C again to force exit)");
            InterruptAction::Drain
        } else {
            InterruptAction::ForceExit
        }
    }

    /// Kills every registered scanner process group and exits with status 1.
    pub fn force_exit(&self) -> ! {
        let killed = self.children.kill_all();
        error!("forced exit, killed {killed} scanner process group(s)");
        std::process::exit(1);
    }

    /// Installs this controller as the process-wide Ctrl+C handler.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler is already installed or the signal
    /// handler cannot be registered.
    pub fn install(self: Arc<Self>) -> Result<(), ctrlc::Error> {
        ctrlc::set_handler(move || {
            if self.on_interrupt() == InterruptAction::ForceExit {
                self.force_exit();
            }
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
