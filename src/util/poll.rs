use super::Backoff;
use core::cmp;
use core::time::Duration;
use std::thread;
use std::time::Instant;

/// Elapsed time after which each failed poll sleeps for [`MAX_SLEEP`].
const SLEEP_CAP_THRESHOLD: Duration = Duration::from_millis(128);
/// Elapsed time after which each failed poll sleeps for half the elapsed time.
const SLEEP_THRESHOLD: Duration = Duration::from_micros(64);
/// Elapsed time after which each failed poll yields the thread.
const YIELD_THRESHOLD: Duration = Duration::from_micros(4);
/// The longest a single poll iteration will sleep.
const MAX_SLEEP: Duration = Duration::from_millis(8);

/// Polls `f` until it returns `true` or `timeout` has elapsed, backing off
/// between attempts.
///
/// One attempt is always made before the clock is consulted, so a zero
/// `timeout` is exactly a single non-blocking try. After that, each failed
/// attempt backs off based on how long the poll has been running: spinning at
/// first, then yielding the thread, then sleeping in increasing increments
/// (capped at a few milliseconds, and clamped so the final sleep does not
/// overshoot the deadline).
///
/// Returns `true` as soon as `f` does; `false` once the timeout elapses with
/// `f` still returning `false`. The poll never blocks past its deadline, but
/// like any sleep-based wait it may return slightly after it.
pub fn poll_with_backoff(mut f: impl FnMut() -> bool, timeout: Duration) -> bool {
    if f() {
        return true;
    }
    if timeout.is_zero() {
        return false;
    }
    match Instant::now().checked_add(timeout) {
        Some(deadline) => poll_until(f, deadline),
        // A timeout too large to represent as a deadline is effectively
        // forever.
        None => loop {
            if f() {
                return true;
            }
            thread::sleep(MAX_SLEEP);
        },
    }
}

/// Polls `f` until it returns `true` or `deadline` passes, backing off between
/// attempts.
///
/// This is the deadline-based form of [`poll_with_backoff`]; see its
/// documentation for the backoff schedule.
pub fn poll_until(mut f: impl FnMut() -> bool, deadline: Instant) -> bool {
    let start = Instant::now();
    let mut backoff = Backoff::new();
    loop {
        if f() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let remaining = deadline - now;
        let elapsed = now - start;
        if elapsed > SLEEP_CAP_THRESHOLD {
            thread::sleep(cmp::min(MAX_SLEEP, remaining));
        } else if elapsed > SLEEP_THRESHOLD {
            thread::sleep(cmp::min(elapsed / 2, remaining));
        } else if elapsed > YIELD_THRESHOLD {
            thread::yield_now();
        } else {
            backoff.spin();
        }
    }
}
