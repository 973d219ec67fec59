//! Dense pool storage
//!
//! Elements live in one contiguous array so high-churn value types (per
//! frame render state, sprites, particles) never touch the allocator per
//! object. External code addresses elements through [`PoolHandle`]s; when
//! the last handle to a slot is released the pool swap-compacts, so the
//! array stays dense and the moved slot's recorded index is rewritten.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::handle::{Handle, WeakHandle};

use super::handle::{PoolHandle, Slot};

/// The shared backing arrays of a pool.
///
/// `elems` and `proxies` are parallel: `proxies[i]` is a weak entry for
/// the slot proxy whose element currently sits at `elems[i]`.
pub(super) struct PoolStorage<T> {
    pub(super) elems: Vec<T>,
    pub(super) proxies: Vec<WeakHandle<Slot<T>>>,
}

impl<T> PoolStorage<T> {
    /// Swap-compact `index` out of the arrays in O(1).
    ///
    /// The element that was last is moved into `index` and its proxy's
    /// recorded index is rewritten, so live handles keep resolving to
    /// the right element. Returns the removed element so the caller can
    /// drop it after releasing the storage borrow.
    pub(super) fn remove(&mut self, index: usize) -> T {
        let removed = self.elems.swap_remove(index);
        self.proxies.swap_remove(index);

        if index < self.elems.len() {
            if let Some(moved) = self.proxies[index].upgrade() {
                moved.set_index(index);
            }
        }

        removed
    }
}

/// A dense, swap-compacting object pool addressed through stable handles.
///
/// Elements occupy indices `[0, len)` contiguously. [`Pool::create`]
/// appends; removal happens only when a slot's last [`PoolHandle`] is
/// released, never through the pool's own API.
pub struct Pool<T> {
    storage: Rc<RefCell<PoolStorage<T>>>,
}

impl<T> Pool<T> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a pool with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Rc::new(RefCell::new(PoolStorage {
                elems: Vec::with_capacity(capacity),
                proxies: Vec::with_capacity(capacity),
            })),
        }
    }

    /// Move `value` into the pool and return the owning handle to it.
    ///
    /// Storage grows as needed; any outstanding [`Pool::values`] borrow
    /// must have ended, since growth relocates every element.
    pub fn create(&self, value: T) -> PoolHandle<T> {
        let mut storage = self.storage.borrow_mut();
        let index = storage.elems.len();
        storage.elems.push(value);

        let slot = Handle::new(Slot::new(Rc::downgrade(&self.storage), index));
        storage.proxies.push(slot.downgrade());
        drop(storage);

        log::trace!("pool slot {index} created");
        PoolHandle::new(slot)
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.borrow().elems.len()
    }

    /// True if the pool holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the live elements as one contiguous slice.
    ///
    /// Iteration order is compaction order, not creation order. The
    /// borrow must end before the next `create` or slot release; holding
    /// it across one is a borrow panic rather than a dangling reference.
    #[must_use]
    pub fn values(&self) -> Ref<'_, [T]> {
        Ref::map(self.storage.borrow(), |storage| storage.elems.as_slice())
    }

    /// Mutably borrow the live elements as one contiguous slice.
    #[must_use]
    pub fn values_mut(&self) -> RefMut<'_, [T]> {
        RefMut::map(self.storage.borrow_mut(), |storage| {
            storage.elems.as_mut_slice()
        })
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_appends_densely() {
        let pool: Pool<u32> = Pool::new();

        let a = pool.create(10);
        let b = pool.create(11);
        let c = pool.create(12);

        assert_eq!(pool.len(), 3);
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert_eq!(*pool.values(), [10, 11, 12]);
    }

    #[test]
    fn test_release_swap_compacts() {
        let pool: Pool<u32> = Pool::new();

        let a = pool.create(10);
        let b = pool.create(11);
        let c = pool.create(12);

        // releasing the middle slot moves the last element into its place
        drop(b);

        assert_eq!(pool.len(), 2);
        assert_eq!(*pool.values(), [10, 12]);
        assert_eq!(a.index(), 0);
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn test_release_last_slot() {
        let pool: Pool<u32> = Pool::new();

        let a = pool.create(1);
        drop(a);
        assert!(pool.is_empty());

        let b = pool.create(2);
        assert_eq!(b.index(), 0);
        assert_eq!(*pool.values(), [2]);
    }

    #[test]
    fn test_index_stability_under_churn() {
        let pool: Pool<usize> = Pool::new();
        let mut handles: Vec<PoolHandle<usize>> = (0..8).map(|i| pool.create(i * 100)).collect();

        let check = |handles: &[PoolHandle<usize>], pool: &Pool<usize>| {
            let values = pool.values();
            for handle in handles {
                assert_eq!(values[handle.index()], handle.with(|v| *v));
            }
        };

        // drop in an order that exercises first, middle and last slots
        for victim in [0, 3, handles.len() - 3] {
            handles.remove(victim);
            check(&handles, &pool);
        }

        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn test_growth_preserves_contents() {
        let pool: Pool<usize> = Pool::with_capacity(2);
        let handles: Vec<PoolHandle<usize>> = (0..64).map(|i| pool.create(i)).collect();

        // several doublings later, every element and index must survive
        let values = pool.values();
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.index(), i);
            assert_eq!(values[i], i);
        }
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn test_values_borrow_blocks_create() {
        let pool: Pool<u32> = Pool::new();
        let _held = pool.values();

        // element references must not survive a mutating pool operation
        let _ = pool.create(1);
    }

    #[test]
    fn test_values_mut_updates_elements() {
        let pool: Pool<u32> = Pool::new();
        let handle = pool.create(5);

        for value in pool.values_mut().iter_mut() {
            *value += 1;
        }

        assert_eq!(handle.with(|v| *v), 6);
    }
}
