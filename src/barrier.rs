//! A reusable phase barrier.

use crate::{
    loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering::*},
    park::{self, Contention},
    util::CachePadded,
};
use core::fmt;

/// A synchronization point that `participants` threads advance through in
/// *phases*.
///
/// Each phase completes once every participant has arrived at it; arrival
/// and waiting are separate steps, so a thread can [`arrive`] at a phase,
/// go do something else, and only later [`wait`] for the stragglers — or
/// do both at once with [`arrive_and_wait`]. When the final arrival lands,
/// an optional completion callback runs before any waiter is released, and
/// the barrier resets itself for the next phase.
///
/// Unlike [`std::sync::Barrier`], arrivals are decoupled from waits, a
/// completion callback can be attached, and a participant can permanently
/// leave the group with [`arrive_and_drop`].
///
/// # Examples
///
/// ```
/// use tollgate::Barrier;
/// use std::thread;
///
/// let barrier = Barrier::new(2);
/// thread::scope(|s| {
///     s.spawn(|| {
///         barrier.arrive_and_wait();
///     });
///     barrier.arrive_and_wait();
/// });
/// ```
///
/// Running a completion callback once per phase:
///
/// ```
/// use tollgate::Barrier;
/// use std::{
///     sync::atomic::{AtomicUsize, Ordering},
///     thread,
/// };
///
/// static PHASES: AtomicUsize = AtomicUsize::new(0);
///
/// let barrier = Barrier::with_completion(2, || {
///     PHASES.fetch_add(1, Ordering::Relaxed);
/// });
/// thread::scope(|s| {
///     s.spawn(|| barrier.arrive_and_wait());
///     barrier.arrive_and_wait();
/// });
/// assert_eq!(PHASES.load(Ordering::Relaxed), 1);
/// ```
///
/// [`arrive`]: Self::arrive
/// [`wait`]: Self::wait
/// [`arrive_and_wait`]: Self::arrive_and_wait
/// [`arrive_and_drop`]: Self::arrive_and_drop
pub struct Barrier<F = fn()> {
    /// Arrivals still outstanding in the current phase; counts down to
    /// zero, then is reset from `expected`.
    outstanding: CachePadded<AtomicUsize>,
    /// Participants expected in each following phase.
    expected: AtomicUsize,
    /// The current phase number. Waiters park on this word.
    phase: CachePadded<AtomicU64>,
    contention: Contention,
    completion: F,
}

/// Proof of one arrival at one phase of a [`Barrier`].
///
/// Returned by [`Barrier::arrive`] and consumed by [`Barrier::wait`]. The
/// token is bound to the phase it arrived at: waiting on it blocks only
/// until *that* phase completes, no matter how many phases the barrier has
/// advanced since.
#[derive(Debug)]
#[must_use = "an `ArrivalToken` does nothing unless passed to `Barrier::wait`"]
pub struct ArrivalToken {
    phase: u64,
}

fn noop() {}

// === impl Barrier ===

impl Barrier {
    loom_const_fn! {
        /// Returns a new barrier for `participants` threads, with no
        /// completion callback.
        ///
        /// # Panics
        ///
        /// If `participants` is zero or exceeds [`Barrier::max()`].
        #[must_use]
        pub fn new(participants: usize) -> Self {
            Barrier::with_completion(participants, noop as fn())
        }
    }
}

impl<F: Fn()> Barrier<F> {
    loom_const_fn! {
        /// Returns a new barrier for `participants` threads that runs
        /// `completion` on the final arriver of each phase, before any
        /// waiter of that phase is released.
        ///
        /// # Panics
        ///
        /// If `participants` is zero or exceeds [`Barrier::max()`].
        #[must_use]
        pub fn with_completion(participants: usize, completion: F) -> Self {
            assert!(participants > 0, "a barrier must have participants");
            assert!(
                participants <= Self::max(),
                "too many barrier participants",
            );
            Self {
                outstanding: CachePadded::new(AtomicUsize::new(participants)),
                expected: AtomicUsize::new(participants),
                phase: CachePadded::new(AtomicU64::new(0)),
                contention: Contention::new(),
                completion,
            }
        }
    }

    /// The greatest number of participants any barrier supports.
    #[must_use]
    pub const fn max() -> usize {
        isize::MAX as usize
    }

    /// Records `n` arrivals at the current phase, returning a token
    /// [`wait`](Self::wait) can block on until the phase completes.
    ///
    /// If these are the phase's final arrivals, the completion callback
    /// runs on the calling thread, every thread blocked in `wait` on this
    /// phase is released, and the next phase begins.
    ///
    /// `n` must be at least 1 and must not exceed the arrivals still
    /// outstanding in the current phase; both are contract violations,
    /// checked only in debug builds.
    #[cfg_attr(test, track_caller)]
    pub fn arrive(&self, n: usize) -> ArrivalToken {
        debug_assert!(n > 0, "must arrive at least once");
        // The final arrival bumps `phase`, so the token's phase must be
        // captured before the decrement below makes this arrival visible.
        let phase = self.phase.load(Relaxed);
        let prev = test_dbg!(self.outstanding.fetch_sub(n, AcqRel));
        debug_assert!(
            prev >= n,
            "{} arrivals at a phase with only {} outstanding",
            n,
            prev,
        );
        if prev == n {
            self.complete(phase);
        }
        ArrivalToken { phase }
    }

    /// Blocks the calling thread until the phase `token` arrived at has
    /// completed.
    ///
    /// Returns immediately if it already has. Consumes the token: each
    /// arrival is waited on at most once.
    pub fn wait(&self, token: ArrivalToken) {
        while self.phase.load(Acquire) == token.phase {
            trace!(phase = token.phase, "waiting out phase");
            park::wait(&*self.phase, token.phase, Acquire, &self.contention);
        }
    }

    /// Arrives once at the current phase and waits for it to complete, as
    /// a single call.
    pub fn arrive_and_wait(&self) {
        self.wait(self.arrive(1));
    }

    /// Arrives once at the current phase and permanently removes the
    /// calling participant from every following phase.
    ///
    /// The current phase still counts this arrival; each later phase
    /// expects one participant fewer.
    #[cfg_attr(test, track_caller)]
    pub fn arrive_and_drop(&self) {
        // Published by the arrival's read-modify-write on `outstanding`:
        // whichever thread completes the current phase observes this when
        // it resets the count for the next one.
        self.expected.fetch_sub(1, Relaxed);
        let _token = self.arrive(1);
    }

    /// Finishes phase `phase`: runs the completion callback, resets the
    /// arrival count, opens the next phase, and releases the waiters.
    fn complete(&self, phase: u64) {
        trace!(phase, "barrier phase complete");
        (self.completion)();
        // Reset before the phase bump publishes the new phase; arrivals at
        // phase + 1 are contractually ordered after observing that bump.
        let expected = self.expected.load(Relaxed);
        self.outstanding.store(expected, Relaxed);
        let _prev = test_dbg!(self.phase.fetch_add(1, Release));
        debug_assert_eq!(_prev, phase, "phases completed out of order");
        park::notify_all(&*self.phase, &self.contention);
    }
}

impl<F> fmt::Debug for Barrier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Barrier")
            .field("outstanding", &self.outstanding.load(Relaxed))
            .field("expected", &self.expected.load(Relaxed))
            .field("phase", &self.phase.load(Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
