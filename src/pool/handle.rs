//! Pool slot handles
//!
//! A pooled element is addressed through a slot proxy rather than a raw
//! index: the proxy records where the element currently sits and is
//! rewritten whenever compaction moves it. The proxy itself is owned by
//! an ordinary shared [`Handle`], so releasing the last clone of a
//! [`PoolHandle`] is what removes the element from the pool.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Weak;

use crate::event::Notifier;
use crate::handle::Handle;

use super::storage::PoolStorage;

/// A slot proxy: the pool-resident address of one pooled element.
///
/// Holds the element's current index and a weak reference back to the
/// storage. Dropping the proxy (which happens when the last owning
/// handle is released) removes the element via swap-compaction.
pub struct Slot<T> {
    storage: Weak<RefCell<PoolStorage<T>>>,
    index: Cell<usize>,
}

impl<T> Slot<T> {
    pub(super) fn new(storage: Weak<RefCell<PoolStorage<T>>>, index: usize) -> Self {
        Self {
            storage,
            index: Cell::new(index),
        }
    }

    /// The element's current position in the pool.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index.get()
    }

    /// Rewritten by the pool when compaction relocates the element.
    pub(super) fn set_index(&self, index: usize) {
        self.index.set(index);
    }
}

impl<T> Drop for Slot<T> {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.upgrade() {
            let index = self.index.get();
            let removed = storage.borrow_mut().remove(index);
            log::trace!("pool slot {index} removed");
            // the storage borrow has ended, so an element whose own drop
            // releases further pool handles re-enters cleanly
            drop(removed);
        }
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("index", &self.index.get())
            .finish()
    }
}

/// The owning handle to a pooled element.
///
/// A thin wrapper over `Handle<Slot<T>>`: clones share the slot, and the
/// element is removed from its pool when the last clone is released.
pub struct PoolHandle<T> {
    slot: Handle<Slot<T>>,
}

impl<T> PoolHandle<T> {
    pub(super) fn new(slot: Handle<Slot<T>>) -> Self {
        Self { slot }
    }

    /// The element's current position in the pool.
    ///
    /// Compaction can change this between calls; it is a snapshot, not a
    /// stable address.
    #[must_use]
    pub fn index(&self) -> usize {
        self.slot.index()
    }

    /// True while the backing pool is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot.get().storage.strong_count() > 0
    }

    /// Read the element.
    ///
    /// # Panics
    ///
    /// Panics if the pool was dropped before this handle, or if the pool
    /// is already mutably borrowed (for example from within
    /// [`Pool::values_mut`](super::Pool::values_mut)).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let slot = self.slot.get();
        let storage = slot
            .storage
            .upgrade()
            .expect("pool handle outlived its pool");
        let storage = storage.borrow();
        f(&storage.elems[slot.index.get()])
    }

    /// Mutate the element.
    ///
    /// # Panics
    ///
    /// Same conditions as [`PoolHandle::with`].
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let slot = self.slot.get();
        let storage = slot
            .storage
            .upgrade()
            .expect("pool handle outlived its pool");
        let mut storage = storage.borrow_mut();
        let index = slot.index.get();
        f(&mut storage.elems[index])
    }

    /// The slot's destruction event.
    ///
    /// Fires when the last handle to this slot is released, before the
    /// element is compacted out of the pool, so caches keyed on the
    /// element can still read it while invalidating.
    #[must_use]
    pub fn destruction_event(&self) -> &Notifier {
        self.slot.destruction_event()
    }

    /// The underlying shared handle over the slot proxy.
    #[must_use]
    pub fn slot(&self) -> &Handle<Slot<T>> {
        &self.slot
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("index", &self.index())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use crate::pool::Pool;

    use super::*;

    #[test]
    fn test_with_mut_roundtrip() {
        let pool: Pool<u32> = Pool::new();
        let handle = pool.create(1);

        handle.with_mut(|v| *v = 41);
        assert_eq!(handle.with(|v| *v + 1), 42);
        assert_eq!(*pool.values(), [41]);
    }

    #[test]
    fn test_clones_share_one_slot() {
        let pool: Pool<u32> = Pool::new();
        let a = pool.create(7);
        let b = a.clone();
        assert_eq!(a, b);

        drop(a);
        assert_eq!(pool.len(), 1, "slot survives while a clone remains");
        assert_eq!(b.with(|v| *v), 7);

        drop(b);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_handle_outliving_pool_detaches() {
        let handle = {
            let pool: Pool<u32> = Pool::new();
            let handle = pool.create(3);
            assert!(handle.is_attached());
            handle
        };

        assert!(!handle.is_attached());
        drop(handle);
    }

    #[test]
    #[should_panic(expected = "outlived its pool")]
    fn test_access_after_pool_death_panics() {
        let handle = {
            let pool: Pool<u32> = Pool::new();
            pool.create(3)
        };
        handle.with(|v| *v);
    }

    #[test]
    fn test_destruction_event_fires_before_compaction() {
        let pool = Rc::new(Pool::<u32>::new());
        let handle = pool.create(9);
        let seen_len = Rc::new(Cell::new(0));

        let pool_view = Rc::clone(&pool);
        let seen = Rc::clone(&seen_len);
        let _conn = handle
            .destruction_event()
            .connect(move |_| seen.set(pool_view.len()));

        drop(handle);
        assert_eq!(seen_len.get(), 1, "element still pooled during notification");
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn test_element_drop_releasing_other_handles() {
        /// An element that owns a handle to another slot in the same pool.
        struct Chained {
            _next: Option<PoolHandle<Chained>>,
        }

        let pool: Pool<Chained> = Pool::new();
        let tail = pool.create(Chained { _next: None });
        let head = pool.create(Chained { _next: Some(tail) });

        assert_eq!(pool.len(), 2);
        drop(head);
        assert_eq!(pool.len(), 0, "releasing head cascades into tail");
    }
}
