//! Raw native semaphore primitives.
//!
//! The [`RawSemaphore`] trait is the seam between the buffered layers in
//! [`crate::semaphore`] and whatever the operating system provides:
//! implement it for a platform primitive and the buffered layers supply
//! multi-token release, timed acquire, and contention shortcuts on top.
//! [`OsSemaphore`] is the POSIX implementation used on non-Apple unices.

use core::time::Duration;

#[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
mod os;

#[cfg(all(unix, not(target_vendor = "apple"), not(loom)))]
pub use self::os::OsSemaphore;

/// A native counting semaphore.
///
/// The four operations here are the smallest surface the buffered layers
/// need: post one, wait for one, poll for one, and wait with a deadline.
/// Implementations are expected to be usable from any thread through a
/// shared reference.
///
/// Errors that would indicate misuse of the underlying primitive (an
/// uninitialized or destroyed handle, a counter driven past the platform
/// limit) are program bugs, and implementations panic on them rather than
/// report them.
pub trait RawSemaphore {
    /// The largest token count this implementation can hold.
    const MAX_VALUE: usize;

    /// Returns a new semaphore holding `tokens` tokens.
    ///
    /// # Panics
    ///
    /// If `tokens` exceeds [`Self::MAX_VALUE`], or the platform refuses to
    /// initialize the primitive.
    fn new(tokens: usize) -> Self;

    /// Adds one token, waking a waiting thread if there is one.
    fn post(&self);

    /// Removes one token, blocking until one is available.
    fn wait(&self);

    /// Removes one token if one is immediately available.
    ///
    /// Returns `false` without blocking if the count is zero.
    #[must_use]
    fn try_wait(&self) -> bool;

    /// Removes one token, blocking for up to `timeout` for one to become
    /// available.
    ///
    /// Returns `false` if the timeout elapsed with no token taken.
    #[must_use]
    fn try_wait_for(&self, timeout: Duration) -> bool;
}
