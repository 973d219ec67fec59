//! Object lifetime foundations for a game engine
//!
//! This crate is the ownership kernel the rest of an engine is wired
//! through:
//! - Reference-counted handles with destruction notification ([`handle`])
//! - Dense object pools addressed through stable slot handles ([`pool`])
//! - Event channels whose subscriptions die with their owners ([`event`])
//!
//! Everything here is single-threaded by design: counts are not atomic
//! and none of the types are `Send` or `Sync`. Reference cycles are not
//! detected; break them with [`handle::WeakHandle`].

pub mod event;
pub mod handle;
pub mod pool;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::event::{Connection, Event, Listener, Notifier};
    pub use crate::handle::{Handle, WeakHandle};
    pub use crate::pool::{Pool, PoolHandle, Slot};
}
