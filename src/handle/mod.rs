//! Reference-counted ownership handles
//!
//! The shared ownership primitive everything else builds on, plus
//! live-record accounting for leak hunts.

mod shared;
pub mod trace;

pub use shared::{Handle, WeakHandle};
