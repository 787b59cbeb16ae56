//! Buffered layers over a native semaphore.
//!
//! A native semaphore pays one kernel round-trip per token, in both
//! directions. The two layers here wrap a [`RawSemaphore`] so that the
//! common cases never reach the kernel at all:
//!
//! - [`BackBuffered`] banks all but one token of a multi-token release in
//!   an atomic *backbuffer*, posting a single native token; waiters pull
//!   the banked tokens over as they pass through, waking each other in a
//!   cascade.
//! - [`FrontBuffered`] serves uncontended acquires and releases from a
//!   purely atomic *front counter*, falling through to the back-buffered
//!   semaphore only when tokens run dry.
//!
//! Stacked, they make release a single atomic add and an uncontended
//! acquire a single compare-and-swap, while contended paths degrade to the
//! native semaphore's blocking behavior.

use crate::{
    loom::sync::atomic::{AtomicI64, AtomicIsize, Ordering::*},
    raw::RawSemaphore,
    util::CachePadded,
};
use core::{fmt, time::Duration};

/// One token in the high half of [`FrontBuffered`]'s packed word.
const TOKEN: i64 = 1 << 32;
/// One registered fallback entrant in the low half.
const ENTRANT: i64 = 1;
const ENTRANT_MASK: i64 = TOKEN - 1;

const fn tokens(word: i64) -> i64 {
    word >> 32
}

const fn entrants(word: i64) -> i64 {
    word & ENTRANT_MASK
}

/// A layer that banks multi-token releases so the wrapped semaphore only
/// ever absorbs one post per release call.
///
/// At every point, `backbuffer + native count` is the layer's logical token
/// count; [`Self::backfill`] moves tokens from the former to the latter
/// without changing the sum.
pub(super) struct BackBuffered<S> {
    /// Tokens released but not yet posted to the native semaphore.
    backbuffer: CachePadded<AtomicIsize>,
    sem: S,
}

/// A layer that serves uncontended traffic from an atomic *front counter*,
/// falling through to the wrapped semaphore only under contention.
///
/// The front word packs two fields: the high half counts tokens available
/// to the fast path, the low half counts *entrants* — threads that missed
/// the fast path and are somewhere inside the fallback. While any entrant
/// is registered, released tokens are routed to the back semaphore, where
/// a blocked entrant can observe them; with no entrants registered, release
/// is a single CAS on the front word.
pub(super) struct FrontBuffered<S> {
    /// Packed `tokens:32 | entrants:32` word.
    front: CachePadded<AtomicI64>,
    back: BackBuffered<S>,
}

// === impl BackBuffered ===

impl<S: RawSemaphore> BackBuffered<S> {
    pub(super) fn new(tokens: usize) -> Self {
        Self {
            backbuffer: CachePadded::new(AtomicIsize::new(0)),
            sem: S::new(tokens),
        }
    }

    /// Adds `n` tokens: banks all but one, posts one.
    pub(super) fn release(&self, n: usize) {
        debug_assert!(n > 0);
        if n > 1 {
            test_dbg!(self.backbuffer.fetch_add(n as isize - 1, Release));
        }
        self.sem.post();
    }

    /// Removes one token, blocking until one is available.
    pub(super) fn acquire(&self) {
        if self.try_take_banked() {
            return;
        }
        self.backfill();
        self.sem.wait();
        self.backfill();
    }

    /// Removes one token if one is immediately available.
    pub(super) fn try_acquire(&self) -> bool {
        if self.try_take_banked() {
            return true;
        }
        if self.sem.try_wait() {
            // This may have consumed the single post of a banked release
            // out from under a sleeping waiter; push banked tokens over so
            // that waiter still gets its wake.
            self.backfill();
            return true;
        }
        false
    }

    /// Removes one token, blocking for up to `timeout`.
    pub(super) fn try_acquire_for(&self, timeout: Duration) -> bool {
        if self.try_take_banked() {
            return true;
        }
        self.backfill();
        if self.sem.try_wait_for(timeout) {
            self.backfill();
            return true;
        }
        false
    }

    /// Moves up to two banked tokens into the native semaphore.
    ///
    /// Runs on the way into a native wait and again on the way out. Taking
    /// two at a time means a woken waiter both frees itself and wakes the
    /// next, so a banked batch drains in a cascade instead of one thread
    /// flooding the native count with posts.
    fn backfill(&self) {
        let mut cur = self.backbuffer.load(Relaxed);
        loop {
            if cur <= 0 {
                return;
            }
            let take = cur.min(2);
            match test_dbg!(self.backbuffer.compare_exchange_weak(
                cur,
                cur - take,
                AcqRel,
                Relaxed,
            )) {
                Ok(_) => {
                    trace!(moved = take, "backfill: posting banked tokens");
                    for _ in 0..take {
                        self.sem.post();
                    }
                    return;
                }
                Err(actual) => cur = actual,
            }
        }
    }

    /// Takes one token straight out of the backbuffer, if it holds any.
    fn try_take_banked(&self) -> bool {
        let mut cur = self.backbuffer.load(Relaxed);
        while cur > 0 {
            match test_dbg!(self.backbuffer.compare_exchange_weak(
                cur,
                cur - 1,
                Acquire,
                Relaxed,
            )) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
        false
    }

    /// The number of tokens currently banked (not yet posted natively).
    #[cfg(test)]
    pub(super) fn banked(&self) -> isize {
        self.backbuffer.load(Acquire)
    }

    /// The wrapped native semaphore.
    #[cfg(test)]
    pub(super) fn native(&self) -> &S {
        &self.sem
    }
}

impl<S: fmt::Debug> fmt::Debug for BackBuffered<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackBuffered")
            .field("backbuffer", &self.backbuffer.load(Relaxed))
            .field("sem", &self.sem)
            .finish()
    }
}

// === impl FrontBuffered ===

impl<S: RawSemaphore> FrontBuffered<S> {
    pub(super) fn new(tokens: usize) -> Self {
        debug_assert!(tokens <= S::MAX_VALUE);
        Self {
            // Initial tokens are front tokens; the back starts empty.
            front: CachePadded::new(AtomicI64::new((tokens as i64) << 32)),
            back: BackBuffered::new(0),
        }
    }

    /// Adds `n` tokens.
    pub(super) fn release(&self, n: usize) {
        let mut cur = self.front.load(Relaxed);
        loop {
            if entrants(cur) != 0 {
                // Someone is (or is about to be) blocked in the back;
                // route the tokens where a native wait can observe them.
                self.back.release(n);
                return;
            }
            match test_dbg!(self.front.compare_exchange_weak(
                cur,
                cur + (n as i64) * TOKEN,
                Release,
                Relaxed,
            )) {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Removes one token, blocking until one is available.
    pub(super) fn acquire(&self) {
        if self.try_acquire_fast() {
            return;
        }
        if self.begin_fallback() {
            return;
        }
        self.back.acquire();
        self.end_fallback();
    }

    /// Removes one token if one is immediately available.
    pub(super) fn try_acquire(&self) -> bool {
        if self.try_acquire_fast() {
            return true;
        }
        if self.begin_fallback() {
            return true;
        }
        let acquired = self.back.try_acquire();
        self.end_fallback();
        acquired
    }

    /// Removes one token, blocking for up to `timeout`.
    pub(super) fn try_acquire_for(&self, timeout: Duration) -> bool {
        if self.try_acquire_fast() {
            return true;
        }
        if self.begin_fallback() {
            return true;
        }
        let acquired = self.back.try_acquire_for(timeout);
        self.end_fallback();
        acquired
    }

    /// Takes a front token by CAS, if any are available.
    fn try_acquire_fast(&self) -> bool {
        let mut cur = self.front.load(Relaxed);
        while tokens(cur) > 0 {
            match test_dbg!(self.front.compare_exchange_weak(
                cur,
                cur - TOKEN,
                Acquire,
                Relaxed,
            )) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
        false
    }

    /// Registers the caller as a fallback entrant, claiming a front token
    /// in the same step if one appears.
    ///
    /// Returns `true` if a token was claimed; the caller is then already
    /// deregistered and owns the token. Returns `false` with the caller
    /// left registered: it must pass through the back semaphore and then
    /// call [`Self::end_fallback`].
    fn begin_fallback(&self) -> bool {
        let mut cur = test_dbg!(self.front.fetch_add(ENTRANT, AcqRel)) + ENTRANT;
        trace!("fallback: entrant registered");
        while tokens(cur) > 0 {
            // Claim and deregister in one CAS: a release that put this
            // token in the front (having seen no entrants) must not slip
            // past us while we head for the back.
            match test_dbg!(self.front.compare_exchange_weak(
                cur,
                cur - TOKEN - ENTRANT,
                Acquire,
                Relaxed,
            )) {
                Ok(_) => {
                    trace!("fallback: claimed front token");
                    return true;
                }
                Err(actual) => cur = actual,
            }
        }
        false
    }

    fn end_fallback(&self) {
        let _prev = test_dbg!(self.front.fetch_sub(ENTRANT, Release));
        debug_assert!(entrants(_prev) > 0, "deregistered with no entrants");
        trace!("fallback: entrant deregistered");
    }

    /// The number of tokens currently held by the front counter.
    #[cfg(test)]
    pub(super) fn front_tokens(&self) -> i64 {
        tokens(self.front.load(Acquire))
    }

    /// The number of currently registered fallback entrants.
    #[cfg(test)]
    pub(super) fn registered_entrants(&self) -> i64 {
        entrants(self.front.load(Acquire))
    }

    /// The number of tokens banked behind the native semaphore.
    #[cfg(test)]
    pub(super) fn banked(&self) -> isize {
        self.back.banked()
    }

    /// The native semaphore at the bottom of the stack.
    #[cfg(test)]
    pub(super) fn native(&self) -> &S {
        self.back.native()
    }
}

impl<S: fmt::Debug> fmt::Debug for FrontBuffered<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = self.front.load(Relaxed);
        f.debug_struct("FrontBuffered")
            .field("tokens", &tokens(word))
            .field("entrants", &entrants(word))
            .field("back", &self.back)
            .finish()
    }
}
