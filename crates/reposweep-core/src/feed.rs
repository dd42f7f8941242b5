//! Target feeds: single targets, files and stdin.

use std::collections::HashSet;
use std::io::BufRead;

use log::debug;
use log::warn;

use crate::pipeline::QueueProducer;
use crate::types::Target;

/// What a feed did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Targets enqueued.
    pub accepted: usize,
    /// Lines that were not repository URLs.
    pub invalid: usize,
    /// Repeated targets dropped.
    pub duplicates: usize,
    /// Whether the feed ended early because of a stop request.
    pub stopped: bool,
}

/// Pushes one target per valid line of `reader`.
///
/// Blank lines are ignored, invalid ones logged and skipped, repeats
/// dropped. Reading ends at end of input, on a read error, or when the
/// queue refuses a target because a stop was requested.
pub fn feed_lines<R: BufRead>(reader: R, queue: &QueueProducer) -> FeedStats {
    let mut stats = FeedStats::default();
    let mut seen = HashSet::new();

    for line in reader.lines() {
        if queue.is_stopped() {
            stats.stopped = true;
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("error reading targets: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let target = match Target::parse(&line) {
            Ok(target) => target,
            Err(e) => {
                debug!("{e}");
                stats.invalid += 1;
                continue;
            }
        };
        if !seen.insert(target.url().to_string()) {
            stats.duplicates += 1;
            continue;
        }
        if !queue.push(target) {
            stats.stopped = true;
            break;
        }
        stats.accepted += 1;
    }

    debug!(
        "feed closed: {} accepted, {} invalid, {} duplicates",
        stats.accepted, stats.invalid, stats.duplicates
    );
    stats
}

/// Pushes already validated targets, dropping repeats.
pub fn feed_targets<I>(targets: I, queue: &QueueProducer) -> FeedStats
where
    I: IntoIterator<Item = Target>,
{
    let mut stats = FeedStats::default();
    let mut seen = HashSet::new();

    for target in targets {
        if !seen.insert(target.clone()) {
            stats.duplicates += 1;
            continue;
        }
        if !queue.push(target) {
            stats.stopped = true;
            break;
        }
        stats.accepted += 1;
    }
    stats
}
