//! Multicast event channels
//!
//! A channel indexes its listeners but never owns them: each subscription
//! lives in the [`Connection`] handle returned by [`Event::connect`], and
//! releasing that handle is what disconnects the listener. Because the
//! channel only holds weak entries, channels and subscribers can be torn
//! down in either order.

use std::cell::{Cell, RefCell};
use std::fmt;

use smallvec::SmallVec;

use crate::handle::{Handle, WeakHandle};

/// One subscription: a callback plus its connected flag.
///
/// Owned by the [`Connection`] handle its subscriber holds; the channel
/// only keeps a weak entry pointing here.
pub struct Listener<T> {
    callback: Box<dyn Fn(&T)>,
    connected: Cell<bool>,
}

impl<T> Listener<T> {
    fn call(&self, arg: &T) {
        (self.callback)(arg);
    }

    /// Stop receiving events without releasing the subscription handle.
    pub fn disconnect(&self) {
        self.connected.set(false);
        log::trace!("listener disconnected");
    }

    /// True until the listener is explicitly disconnected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("connected", &self.connected.get())
            .finish()
    }
}

/// The owning handle to a subscription.
///
/// Dropping the last clone disconnects the listener from its channel.
pub type Connection<T> = Handle<Listener<T>>;

/// A multicast callback registry dispatching `&T` to its listeners.
///
/// Dispatch runs over a snapshot: listeners connected or disconnected by
/// a callback take effect from the next [`Event::emit`] onwards, never
/// within the running pass.
pub struct Event<T> {
    listeners: RefCell<SmallVec<[WeakHandle<Listener<T>>; 4]>>,
}

/// An event carrying no data, used for pure notifications such as
/// [`Handle::destruction_event`](crate::handle::Handle::destruction_event).
pub type Notifier = Event<()>;

impl<T> Event<T> {
    /// Create a channel with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(SmallVec::new()),
        }
    }

    /// Subscribe `callback` to this channel.
    ///
    /// The returned connection owns the subscription: keep it for as long
    /// as the callback should stay wired, and drop it to disconnect.
    /// Connecting the same callback twice yields two independent
    /// listeners.
    #[must_use = "dropping the connection immediately disconnects the listener"]
    pub fn connect(&self, callback: impl Fn(&T) + 'static) -> Connection<T> {
        let listener = Handle::new(Listener {
            callback: Box::new(callback),
            connected: Cell::new(true),
        });
        self.listeners.borrow_mut().push(listener.downgrade());
        log::trace!("listener connected ({} active)", self.listener_count());
        listener
    }

    /// Dispatch `arg` to every listener, in subscription order.
    ///
    /// With no listeners this is a no-op. Re-entrant emits are allowed;
    /// each pass snapshots the listener list when it starts.
    pub fn emit(&self, arg: &T) {
        let snapshot: SmallVec<[Connection<T>; 4]> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|entry| entry.is_valid());
            listeners
                .iter()
                .filter_map(WeakHandle::upgrade)
                .filter(|listener| listener.is_connected())
                .collect()
        };

        for listener in &snapshot {
            listener.call(arg);
        }
    }

    /// Number of live, connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|entry| entry.upgrade().is_some_and(|l| l.is_connected()))
            .count()
    }
}

impl Event<()> {
    /// Dispatch a data-free notification.
    pub fn notify(&self) {
        self.emit(&());
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
