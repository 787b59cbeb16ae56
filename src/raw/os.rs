//! POSIX unnamed semaphores.
//!
//! Not available on Apple targets: macOS stubs out `sem_init` with
//! `ENOSYS`, so those targets fall back to the pure-atomic semaphore
//! backend instead.

use super::RawSemaphore;
use core::{cell::UnsafeCell, fmt, mem, time::Duration};
use std::io;

/// `SEM_VALUE_MAX` on Linux is `INT_MAX`.
#[cfg(any(target_os = "linux", target_os = "android"))]
const SEM_VALUE_MAX: usize = i32::MAX as usize;

/// Elsewhere, assume only the `_POSIX_SEM_VALUE_MAX` floor (32767) that
/// POSIX requires every implementation to support.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEM_VALUE_MAX: usize = 32767;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A POSIX unnamed semaphore (`sem_t`).
///
/// Thin wrapper over `sem_init`/`sem_post`/`sem_wait` and friends, with
/// `EINTR` retried internally so callers never observe interrupted waits.
pub struct OsSemaphore {
    /// Boxed so the `sem_t` keeps the address it was initialized at even if
    /// the `OsSemaphore` itself moves; POSIX forbids operating on a copy of
    /// an initialized `sem_t`.
    sem: Box<UnsafeCell<libc::sem_t>>,
}

/// Converts a relative timeout into the absolute `CLOCK_REALTIME` deadline
/// `sem_timedwait` expects, saturating at the platform's `time_t` range.
fn deadline_after(timeout: Duration) -> libc::timespec {
    // SAFETY: an all-zero `timespec` is a valid value; `clock_gettime`
    // overwrites it.
    let mut now: libc::timespec = unsafe { mem::zeroed() };
    // SAFETY: `now` outlives the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut now) };
    debug_assert_eq!(rc, 0, "clock_gettime(CLOCK_REALTIME) failed");

    let mut sec = (now.tv_sec as i64).saturating_add(timeout.as_secs().min(i64::MAX as u64) as i64);
    let mut nsec = now.tv_nsec as i64 + i64::from(timeout.subsec_nanos());
    if nsec >= NANOS_PER_SEC {
        nsec -= NANOS_PER_SEC;
        sec = sec.saturating_add(1);
    }

    // SAFETY: see above; the fields are assigned below.
    let mut deadline: libc::timespec = unsafe { mem::zeroed() };
    deadline.tv_sec = sec.min(libc::time_t::MAX as i64) as _;
    deadline.tv_nsec = nsec as _;
    deadline
}

// === impl OsSemaphore ===

// SAFETY: POSIX requires the `sem_*` entry points to be callable from any
// thread, and the `sem_t` is only ever touched through them.
unsafe impl Send for OsSemaphore {}
// SAFETY: as above.
unsafe impl Sync for OsSemaphore {}

impl RawSemaphore for OsSemaphore {
    const MAX_VALUE: usize = SEM_VALUE_MAX;

    fn new(tokens: usize) -> Self {
        assert!(
            tokens <= Self::MAX_VALUE,
            "initial token count ({}) exceeds SEM_VALUE_MAX ({})",
            tokens,
            Self::MAX_VALUE,
        );
        // SAFETY: an all-zero `sem_t` is a valid (if uninitialized) value;
        // `sem_init` overwrites it before any other operation runs.
        let sem = Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        // pshared = 0: shared between the threads of this process only.
        // SAFETY: the pointer is valid and uniquely ours until we return.
        let rc = unsafe { libc::sem_init(sem.get(), 0, tokens as libc::c_uint) };
        if rc != 0 {
            panic!("sem_init failed: {}", io::Error::last_os_error());
        }
        Self { sem }
    }

    #[inline]
    fn post(&self) {
        // SAFETY: `self.sem` was initialized in `new` and lives until drop.
        let rc = unsafe { libc::sem_post(self.sem.get()) };
        // `EOVERFLOW` means the native count was driven past
        // `SEM_VALUE_MAX`; the layers above bank surplus tokens precisely
        // so that this cannot happen.
        assert_eq!(rc, 0, "sem_post failed: {}", io::Error::last_os_error());
    }

    fn wait(&self) {
        // SAFETY: as in `post`.
        while unsafe { libc::sem_wait(self.sem.get()) } != 0 {
            let err = io::Error::last_os_error();
            assert_eq!(
                err.raw_os_error(),
                Some(libc::EINTR),
                "sem_wait failed: {}",
                err,
            );
        }
    }

    fn try_wait(&self) -> bool {
        loop {
            // SAFETY: as in `post`.
            if unsafe { libc::sem_trywait(self.sem.get()) } == 0 {
                return true;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => return false,
                Some(libc::EINTR) => continue,
                _ => panic!("sem_trywait failed: {}", err),
            }
        }
    }

    fn try_wait_for(&self, timeout: Duration) -> bool {
        let deadline = deadline_after(timeout);
        loop {
            // SAFETY: as in `post`; `deadline` outlives the call.
            if unsafe { libc::sem_timedwait(self.sem.get(), &deadline) } == 0 {
                return true;
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ETIMEDOUT) => return false,
                Some(libc::EINTR) => continue,
                _ => panic!("sem_timedwait failed: {}", err),
            }
        }
    }
}

impl Drop for OsSemaphore {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`; `&mut self` means no other thread
        // is blocked on it.
        let _rc = unsafe { libc::sem_destroy(self.sem.get()) };
        debug_assert_eq!(
            _rc,
            0,
            "sem_destroy failed: {}",
            io::Error::last_os_error()
        );
    }
}

impl fmt::Debug for OsSemaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value: libc::c_int = 0;
        // SAFETY: as in `post`; `value` outlives the call.
        if unsafe { libc::sem_getvalue(self.sem.get(), &mut value) } == 0 {
            f.debug_struct("OsSemaphore").field("value", &value).finish()
        } else {
            f.debug_struct("OsSemaphore").finish_non_exhaustive()
        }
    }
}
