//! Synchroniser and Permuter: the two components that govern how close
//! together racing threads start, and in what order they're released.

pub mod permuter;
pub mod synchroniser;

pub use permuter::{Permuter, RandomPermuter, StaticPermuter};
pub use synchroniser::{FullBarrier, Spinner, Synchroniser, WaitResult};
