//! The pure-atomic semaphore backend.

use crate::{
    loom::sync::atomic::{AtomicIsize, Ordering::*},
    park::{self, Contention},
    util::CachePadded,
};
#[cfg(not(loom))]
use crate::util::poll_with_backoff;
use core::time::Duration;

/// A counting semaphore backed by an atomic counter and address parking,
/// with no native semaphore underneath.
///
/// This is the portable backend: it exists on every target (and under
/// loom), and it is the only backend able to represent token counts past
/// the platform semaphore's limit. It does no batching; every
/// acquire/release pair that crosses zero goes through the park layer.
#[derive(Debug)]
pub(super) struct AtomicSemaphore {
    /// Number of available tokens. Never negative: an acquirer that
    /// observes zero parks rather than driving the count below it.
    count: CachePadded<AtomicIsize>,
    contention: Contention,
}

// === impl AtomicSemaphore ===

impl AtomicSemaphore {
    loom_const_fn! {
        pub(super) fn new(tokens: isize) -> Self {
            Self {
                count: CachePadded::new(AtomicIsize::new(tokens)),
                contention: Contention::new(),
            }
        }
    }

    /// Adds `n` tokens, waking waiters if the count was exhausted.
    pub(super) fn release(&self, n: usize) {
        let n = n as isize;
        let prev = test_dbg!(self.count.fetch_add(n, Release));
        debug_assert!(
            prev >= 0 && prev.checked_add(n).is_some(),
            "semaphore count overflowed ({} + {})",
            prev,
            n,
        );
        if prev == 0 {
            // More than one token may have become available, and wakeup
            // order is not guaranteed, so a batched release rouses every
            // waiter.
            if n > 1 {
                park::notify_all(&*self.count, &self.contention);
            } else {
                park::notify_one(&*self.count, &self.contention);
            }
        }
    }

    /// Removes one token, blocking until one is available.
    pub(super) fn acquire(&self) {
        let mut cur = self.count.load(Relaxed);
        let mut was_parked = false;
        loop {
            while cur == 0 {
                trace!("acquire: out of tokens; parking");
                park::wait(&*self.count, 0, Relaxed, &self.contention);
                was_parked = true;
                cur = self.count.load(Relaxed);
            }
            match test_dbg!(self
                .count
                .compare_exchange_weak(cur, cur - 1, Acquire, Relaxed))
            {
                Ok(_) => {
                    // A release that finds the count already positive skips
                    // its wake; a woken waiter passes the wake along while
                    // surplus tokens remain, so pooled tokens reach every
                    // parked thread.
                    if was_parked && cur > 1 {
                        park::notify_one(&*self.count, &self.contention);
                    }
                    return;
                }
                Err(actual) => cur = actual,
            }
        }
    }

    /// Removes one token if one is immediately available.
    pub(super) fn try_acquire(&self) -> bool {
        let mut cur = self.count.load(Relaxed);
        while cur > 0 {
            match test_dbg!(self
                .count
                .compare_exchange_weak(cur, cur - 1, Acquire, Relaxed))
            {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
        false
    }

    /// Removes one token, polling with backoff for up to `timeout`.
    ///
    /// There is no native timed primitive here, so this is a bounded
    /// polling loop rather than a single timed block.
    #[cfg(not(loom))]
    pub(super) fn try_acquire_for(&self, timeout: Duration) -> bool {
        poll_with_backoff(|| self.try_acquire(), timeout)
    }

    #[cfg(loom)]
    pub(super) fn try_acquire_for(&self, _timeout: Duration) -> bool {
        // Time does not advance inside a model; a timed acquire is a poll.
        self.try_acquire()
    }

    /// The number of currently available tokens.
    #[cfg(test)]
    pub(super) fn available(&self) -> isize {
        self.count.load(Acquire)
    }
}
