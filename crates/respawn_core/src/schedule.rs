//! # Tick-Driven Scheduler
//!
//! Deferred work (chunked prewarm, pool expansion, expiry timers, spawn
//! loops) is modelled as plain job values queued against simulated time.
//! The owner advances the clock once per frame and interprets whatever
//! comes due.
//!
//! ## Cancellation
//!
//! Every job carries a [`CancellationToken`] tied to the lifetime of the
//! pool or coordinator that scheduled it. Cancelled jobs are dropped when
//! they come due, and handlers still re-validate their target before
//! mutating anything.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared flag that invalidates every job holding a clone of it.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels this token and every clone of it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once [`CancellationToken::cancel`] was called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Entry<J> {
    due: Duration,
    seq: u64,
    job: J,
    token: CancellationToken,
}

impl<J> PartialEq for Entry<J> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<J> Eq for Entry<J> {}

impl<J> PartialOrd for Entry<J> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<J> Ord for Entry<J> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

/// Timer queue of jobs over simulated time.
///
/// Jobs due at the same instant come out in the order they were scheduled.
pub struct Scheduler<J> {
    now: Duration,
    ticks: u64,
    next_seq: u64,
    dropped: u64,
    queue: BinaryHeap<Reverse<Entry<J>>>,
}

impl<J> Scheduler<J> {
    /// Creates an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            ticks: 0,
            next_seq: 0,
            dropped: 0,
            queue: BinaryHeap::new(),
        }
    }

    /// Current simulated time.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> Duration {
        self.now
    }

    /// Number of `advance` calls so far.
    #[inline]
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Jobs dropped because their token was cancelled.
    #[inline]
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Jobs still queued (cancelled ones included until they come due).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// When the earliest queued job comes due.
    #[must_use]
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    /// Queues `job` for the next call to [`Scheduler::advance`].
    pub fn schedule_next_tick(&mut self, job: J, token: CancellationToken) {
        self.schedule_at(self.now, job, token);
    }

    /// Queues `job` to come due `delay` from now.
    pub fn schedule_after(&mut self, delay: Duration, job: J, token: CancellationToken) {
        self.schedule_at(self.now.saturating_add(delay), job, token);
    }

    fn schedule_at(&mut self, due: Duration, job: J, token: CancellationToken) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Entry { due, seq, job, token }));
    }

    /// Moves the clock forward by `dt` and returns every live job now due.
    ///
    /// Jobs scheduled while the caller handles the returned batch are not
    /// part of it; they come out on the next call at the earliest.
    pub fn advance(&mut self, dt: Duration) -> Vec<J> {
        self.now = self.now.saturating_add(dt);
        self.ticks += 1;

        let mut due = Vec::new();
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.due <= self.now)
        {
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            if entry.token.is_cancelled() {
                self.dropped += 1;
                tracing::trace!(seq = entry.seq, "dropping cancelled job");
                continue;
            }
            due.push(entry.job);
        }
        due
    }

    /// Drops every queued job.
    pub fn clear(&mut self) {
        self.dropped += self.queue.len() as u64;
        self.queue.clear();
    }
}

impl<J> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}
