use core::{
    fmt,
    ops::{Deref, DerefMut},
};

/// Pads and aligns a value to the length of a cache line.
///
/// In concurrent programming, sometimes it is desirable to make sure commonly
/// accessed pieces of data are not placed into the same cache line. Updating
/// an atomic value invalidates the whole cache line it belongs to, which makes
/// the next access to the same cache line slower for other CPU cores. Use
/// `CachePadded` to ensure updating one piece of data doesn't invalidate other
/// cached data (false sharing).
///
/// # Size and alignment
///
/// Cache lines are assumed to be N bytes long, depending on the architecture:
///
/// - On x86-64 and aarch64, N = 128.
/// - On all others, N = 64.
///
/// The size of `CachePadded<T>` is the smallest multiple of N bytes large
/// enough to accommodate a value of type `T`.
///
/// When the `no-cache-pad` crate feature is enabled, this is simply a no-op
/// wrapper struct. This is intended for use on platforms where the size or
/// alignment of a cache line is smaller than the assumed value.
#[derive(Clone, Copy, Default, Hash, PartialEq, Eq)]
// Starting from Intel's Sandy Bridge, spatial prefetcher pulls pairs of
// 64-byte cache lines at a time. ARM's big.LITTLE architectures have "big"
// cores with 128-byte cache lines.
#[cfg_attr(
    all(
        not(feature = "no-cache-pad"),
        any(target_arch = "x86_64", target_arch = "aarch64")
    ),
    repr(align(128))
)]
#[cfg_attr(
    all(
        not(feature = "no-cache-pad"),
        not(any(target_arch = "x86_64", target_arch = "aarch64"))
    ),
    repr(align(64))
)]
pub struct CachePadded<T>(T);

// === impl CachePadded ===

impl<T> CachePadded<T> {
    /// Pads `value` to the length of a cache line.
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Unwraps the inner value and returns it.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for CachePadded<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for CachePadded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T> From<T> for CachePadded<T> {
    fn from(t: T) -> Self {
        Self::new(t)
    }
}
