//! Counting semaphores for OS threads.
//!
//! A counting semaphore holds some number of *tokens*. [`acquire`] takes a
//! token, blocking the calling thread until one is available; [`release`]
//! puts tokens back, unblocking waiters. Unlike a mutex, tokens have no
//! owner: any thread may release, whether or not it ever acquired, which
//! makes a semaphore equally usable as a bound on concurrency (start with
//! `n` tokens), a signal (start with zero), or a non-reentrant lock (a
//! [`BinarySemaphore`] holding one token).
//!
//! # Backends
//!
//! The upper bound `MAX` is a compile-time parameter, and the construction
//! path uses it to pick the cheapest backend the platform offers:
//!
//! - On Unix targets with working POSIX semaphores (not Apple platforms,
//!   where `sem_init` is unimplemented), a semaphore whose bound fits the
//!   native `SEM_VALUE_MAX` uses a native `sem_t` wrapped in two buffering
//!   layers, so uncontended acquires and releases stay out of the kernel
//!   entirely.
//! - Everywhere else — and for bounds a native semaphore cannot represent,
//!   and for binary semaphores, which park more cheaply than they can
//!   round-trip through the kernel — a pure atomic counter plus address
//!   parking is used.
//!
//! The choice is made once, when the semaphore is constructed; every
//! operation afterwards is a match on the selected variant.
//!
//! [`acquire`]: Semaphore::acquire
//! [`release`]: Semaphore::release

use core::{fmt, time::Duration};
use std::time::Instant;

mod atomic;
#[cfg(any(test, all(unix, not(target_vendor = "apple"), not(loom))))]
mod buffered;

use self::atomic::AtomicSemaphore;
#[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
use self::buffered::FrontBuffered;
#[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
use crate::raw::{OsSemaphore, RawSemaphore};

/// The largest token bound any [`Semaphore`] can be instantiated with.
pub const MAX_SEMAPHORE_VALUE: usize = isize::MAX as usize;

/// A counting semaphore holding up to `MAX` tokens.
///
/// See the [module documentation](self) for an overview and how the
/// blocking backend is chosen.
///
/// # Examples
///
/// Bounding concurrent access to a resource:
///
/// ```
/// use tollgate::Semaphore;
/// use std::{sync::Arc, thread};
///
/// let sem = Arc::new(Semaphore::<2>::new(2));
/// let workers: Vec<_> = (0..4)
///     .map(|_| {
///         let sem = sem.clone();
///         thread::spawn(move || {
///             sem.acquire();
///             // at most two threads are inside this section at once
///             sem.release(1);
///         })
///     })
///     .collect();
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// ```
pub struct Semaphore<const MAX: usize = { MAX_SEMAPHORE_VALUE }> {
    inner: Inner,
}

/// A [`Semaphore`] that can hold at most one token.
///
/// With one initial token this is a mutex-shaped lock, minus reentrancy
/// and minus any notion of an owning thread; with zero it is a one-shot
/// signal.
pub type BinarySemaphore = Semaphore<1>;

/// The backend selected at construction.
#[derive(Debug)]
enum Inner {
    /// A pure atomic counter plus address parking.
    Atomic(AtomicSemaphore),
    /// The buffered stack over a native POSIX semaphore.
    #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
    Buffered(FrontBuffered<OsSemaphore>),
}

// === impl Semaphore ===

impl<const MAX: usize> Semaphore<MAX> {
    /// The maximum number of tokens this semaphore can hold.
    #[must_use]
    pub const fn max() -> usize {
        MAX
    }

    /// Returns a new semaphore holding `initial` tokens.
    ///
    /// # Panics
    ///
    /// - If `initial` exceeds `MAX`.
    /// - If `MAX` exceeds [`MAX_SEMAPHORE_VALUE`].
    /// - If the platform semaphore backend was selected and the platform
    ///   refuses to initialize it. This is a resource-exhaustion condition
    ///   (see `sem_init(3)`), and it is treated as fatal rather than
    ///   surfaced as a recoverable error.
    pub fn new(initial: usize) -> Self {
        assert!(
            MAX <= MAX_SEMAPHORE_VALUE,
            "semaphore bound ({}) exceeds MAX_SEMAPHORE_VALUE",
            MAX,
        );
        assert!(
            initial <= MAX,
            "initial token count ({}) exceeds this semaphore's bound ({})",
            initial,
            MAX,
        );
        Self {
            inner: Inner::new(initial, MAX),
        }
    }

    /// Adds `n` tokens to the semaphore, waking blocked acquirers.
    ///
    /// Any thread may release, including threads that never acquired. The
    /// token count must not be driven past [`max()`](Self::max); that is a
    /// contract violation. Debug builds check each call's `n` against the
    /// bound and the backing counter for overflow, but a violation spread
    /// across calls may go undetected.
    #[cfg_attr(test, track_caller)]
    pub fn release(&self, n: usize) {
        debug_assert!(
            n <= MAX,
            "released {} tokens into a semaphore bounded at {}",
            n,
            MAX,
        );
        if n == 0 {
            return;
        }
        match &self.inner {
            Inner::Atomic(sem) => sem.release(n),
            #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
            Inner::Buffered(sem) => sem.release(n),
        }
    }

    /// Adds one token to the semaphore.
    ///
    /// Equivalent to [`release(1)`](Self::release).
    #[cfg_attr(test, track_caller)]
    pub fn release_one(&self) {
        self.release(1);
    }

    /// Removes one token, blocking the calling thread until one is
    /// available.
    ///
    /// Blocks indefinitely: the only way out is a matching
    /// [`release`](Self::release) from some thread. For bounded blocking,
    /// use [`try_acquire_for`](Self::try_acquire_for) or
    /// [`try_acquire_until`](Self::try_acquire_until).
    pub fn acquire(&self) {
        match &self.inner {
            Inner::Atomic(sem) => sem.acquire(),
            #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
            Inner::Buffered(sem) => sem.acquire(),
        }
    }

    /// Removes one token if one is immediately available, without
    /// blocking.
    ///
    /// Returns `true` iff a token was taken.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        match &self.inner {
            Inner::Atomic(sem) => sem.try_acquire(),
            #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
            Inner::Buffered(sem) => sem.try_acquire(),
        }
    }

    /// Removes one token, blocking for at most `timeout` for one to become
    /// available.
    ///
    /// Returns `true` if a token was taken, `false` if the timeout elapsed
    /// first — an ordinary outcome, not an error. A zero `timeout` makes
    /// this equivalent to [`try_acquire`](Self::try_acquire).
    ///
    /// On the atomic backend the wait is a polling loop with exponential
    /// backoff; on the buffered backend it is a native timed wait. Either
    /// way the timeout is respected to ordinary scheduling accuracy, not
    /// to a real-time guarantee.
    #[must_use]
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        match &self.inner {
            Inner::Atomic(sem) => sem.try_acquire_for(timeout),
            #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
            Inner::Buffered(sem) => sem.try_acquire_for(timeout),
        }
    }

    /// Removes one token, blocking until `deadline` at the latest.
    ///
    /// A `deadline` at or before the current instant makes this equivalent
    /// to [`try_acquire`](Self::try_acquire).
    #[must_use]
    pub fn try_acquire_until(&self, deadline: Instant) -> bool {
        match deadline.checked_duration_since(Instant::now()) {
            Some(timeout) => self.try_acquire_for(timeout),
            None => self.try_acquire(),
        }
    }
}

impl<const MAX: usize> fmt::Debug for Semaphore<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("max", &MAX)
            .field("inner", &self.inner)
            .finish()
    }
}

// === impl Inner ===

impl Inner {
    fn new(initial: usize, max: usize) -> Self {
        #[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
        if 1 < max && max <= OsSemaphore::MAX_VALUE {
            return Inner::Buffered(FrontBuffered::new(initial));
        }
        #[cfg(not(all(unix, not(target_vendor = "apple"), not(loom))))]
        let _ = max;

        Inner::Atomic(AtomicSemaphore::new(initial as isize))
    }
}
