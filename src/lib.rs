#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_debug_implementations, missing_docs)]

#[macro_use]
pub mod util;

pub mod barrier;
mod loom;
mod park;
pub mod raw;
pub mod semaphore;

#[doc(inline)]
pub use self::{
    barrier::{ArrivalToken, Barrier},
    semaphore::{BinarySemaphore, Semaphore, MAX_SEMAPHORE_VALUE},
};
