#[allow(unused_imports)]
pub(crate) use self::inner::*;

#[cfg(loom)]
mod inner {
    #![allow(dead_code)]
    #![allow(unused_imports)]

    pub(crate) use loom::{hint, model, thread};

    pub(crate) mod sync {
        pub(crate) use loom::sync::*;
    }
}

#[cfg(not(loom))]
mod inner {
    #![allow(dead_code, unused_imports)]

    pub(crate) mod sync {
        #[cfg(test)]
        pub(crate) use std::sync::Arc;

        pub(crate) mod atomic {
            pub use core::sync::atomic::{fence, Ordering};
            pub use portable_atomic::*;
        }
    }

    pub(crate) use portable_atomic::hint;


    /// Run `f` once, the way `loom::model` would run it under a model. This
    /// lets the same test exercise real threads under `cargo test` and the
    /// model checker under `--cfg loom`.
    #[cfg(test)]
    pub(crate) fn model(f: impl FnOnce()) {
        let _trace = crate::util::test::trace_init();
        let _span = tracing::info_span!(
            "test",
            message = std::thread::current().name().unwrap_or("<unnamed>")
        )
        .entered();
        f()
    }
}
