//! Futex-shaped thread parking keyed on an atomic word.
//!
//! This is the blocking layer the atomic semaphore backend and the barrier
//! are built on: [`wait`] blocks the calling thread while an atomic word
//! holds an expected value, and [`notify_one`]/[`notify_all`] wake threads
//! blocked on that word. Each parkable object owns a [`Contention`] record
//! counting parked threads, which lets a notifier skip the wake entirely
//! when no one is waiting — the common case for an uncontended semaphore.
//!
//! Outside of loom models, parking goes through `parking_lot_core`'s global
//! table, keyed by the atomic's address, with the value re-checked under the
//! table's bucket lock so a wake delivered between the caller's load and the
//! park cannot be lost. Under loom, each `Contention` carries a
//! mutex/condvar pair instead, so models stay free of real syscalls while
//! still exploring every wake interleaving.

use crate::loom::sync::atomic::{
    fence, AtomicIsize, AtomicU64, AtomicUsize,
    Ordering::{self, *},
};
use core::fmt;

#[cfg(loom)]
use crate::loom::sync::{Condvar, Mutex};
#[cfg(not(loom))]
use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

/// An atomic word whose address threads can park on.
pub(crate) trait Waitable {
    type Value: Copy + Eq + fmt::Debug;

    fn load(&self, order: Ordering) -> Self::Value;
}

/// Per-object record of parked threads.
///
/// Purely an optimization to avoid wake calls with no one to wake; not part
/// of any logical counter. Owned by (and dropped with) the object whose
/// atomic word threads park on.
pub(crate) struct Contention {
    /// Number of threads currently inside [`wait`] on the associated word.
    parked: AtomicUsize,
    #[cfg(loom)]
    lock: Mutex<()>,
    #[cfg(loom)]
    cond: Condvar,
}

// === impl Contention ===

impl Contention {
    loom_const_fn! {
        pub(crate) fn new() -> Self {
            Self {
                parked: AtomicUsize::new(0),
                #[cfg(loom)]
                lock: Mutex::new(()),
                #[cfg(loom)]
                cond: Condvar::new(),
            }
        }
    }

    fn begin_wait(&self) {
        self.parked.fetch_add(1, Relaxed);
        // Orders the count increment before the waiter's value re-check,
        // pairing with the fence in `should_notify`: either the notifier
        // sees this increment, or this waiter's next load sees the value
        // the notifier published before notifying.
        fence(SeqCst);
    }

    fn end_wait(&self) {
        let _prev = self.parked.fetch_sub(1, Release);
        debug_assert!(_prev > 0, "unbalanced end_wait");
    }

    /// Returns `true` if any thread may currently be parked.
    fn should_notify(&self) -> bool {
        // Pairs with the fence in `begin_wait`; see there.
        fence(SeqCst);
        test_dbg!(self.parked.load(Relaxed)) != 0
    }
}

impl fmt::Debug for Contention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contention")
            .field("parked", &self.parked.load(Relaxed))
            .finish_non_exhaustive()
    }
}

/// Blocks the calling thread while `atomic`'s value, loaded with `order`,
/// equals `expected`.
///
/// May return spuriously; callers re-check in a loop. `contention` must be
/// the [`Contention`] record owned by the same object as `atomic`.
pub(crate) fn wait<T: Waitable>(
    atomic: &T,
    expected: T::Value,
    order: Ordering,
    contention: &Contention,
) {
    contention.begin_wait();

    #[cfg(not(loom))]
    {
        let key = atomic as *const T as usize;
        while atomic.load(order) == expected {
            test_debug!(key, "parking");
            // SAFETY: the key is the atomic's address, which is borrowed for
            // the duration of this call, and the callbacks neither park nor
            // unpark.
            let _result = unsafe {
                parking_lot_core::park(
                    key,
                    // Re-checked under the bucket lock: a notify delivered
                    // between the load above and the park lands either
                    // before this closure (which then sees the new value)
                    // or after the park (and wakes it).
                    || atomic.load(order) == expected,
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                )
            };
        }
    }

    #[cfg(loom)]
    {
        let mut guard = contention
            .lock
            .lock()
            .expect("loom mutex will never poison");
        while atomic.load(order) == expected {
            guard = contention
                .cond
                .wait(guard)
                .expect("loom condvar will never poison");
        }
    }

    contention.end_wait();
}

/// Wakes one thread blocked in [`wait`] on `atomic`.
///
/// Callers must publish the new value *before* notifying; the wake is
/// skipped entirely when no thread is parked.
pub(crate) fn notify_one<T: Waitable>(atomic: &T, contention: &Contention) {
    if !contention.should_notify() {
        return;
    }

    #[cfg(not(loom))]
    {
        let key = atomic as *const T as usize;
        trace!(key, "notify_one");
        // SAFETY: the callback neither parks nor unparks.
        let _unparked = unsafe { parking_lot_core::unpark_one(key, |_| DEFAULT_UNPARK_TOKEN) };
    }

    #[cfg(loom)]
    {
        let _ = atomic;
        // Locking the mutex (even empty) serializes with a waiter that has
        // re-checked the value but not yet slept on the condvar.
        drop(
            contention
                .lock
                .lock()
                .expect("loom mutex will never poison"),
        );
        contention.cond.notify_one();
    }
}

/// Wakes every thread blocked in [`wait`] on `atomic`.
///
/// Same contract as [`notify_one`].
pub(crate) fn notify_all<T: Waitable>(atomic: &T, contention: &Contention) {
    if !contention.should_notify() {
        return;
    }

    #[cfg(not(loom))]
    {
        let key = atomic as *const T as usize;
        trace!(key, "notify_all");
        // SAFETY: `unpark_all` invokes no callbacks.
        let _unparked = unsafe { parking_lot_core::unpark_all(key, DEFAULT_UNPARK_TOKEN) };
    }

    #[cfg(loom)]
    {
        let _ = atomic;
        drop(
            contention
                .lock
                .lock()
                .expect("loom mutex will never poison"),
        );
        contention.cond.notify_all();
    }
}

// === impl Waitable ===

impl Waitable for AtomicIsize {
    type Value = isize;

    #[inline]
    fn load(&self, order: Ordering) -> isize {
        AtomicIsize::load(self, order)
    }
}

impl Waitable for AtomicU64 {
    type Value = u64;

    #[inline]
    fn load(&self, order: Ordering) -> u64 {
        AtomicU64::load(self, order)
    }
}
