//! Event channels
//!
//! Multicast callbacks with subscription-scoped lifetimes.

mod channel;

pub use channel::{Connection, Event, Listener, Notifier};
